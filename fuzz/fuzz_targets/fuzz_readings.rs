#![no_main]

use libfuzzer_sys::fuzz_target;
use wattson::readings::{Interval, ReadingsPayload, build_timeseries, extract_summations};

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(payload) = serde_json::from_str::<ReadingsPayload>(body) else {
        return;
    };
    let records = payload.into_records();
    let _ = extract_summations(&records);
    for interval in [
        Interval::Hourly,
        Interval::Daily,
        Interval::Weekly,
        Interval::Monthly,
        Interval::Raw,
    ] {
        let series = build_timeseries(&records, interval);
        assert!(series.iter().all(|p| p.value >= 0.0));
    }
});
