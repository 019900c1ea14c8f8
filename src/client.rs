//! Polling façade: one call from token to two-utility snapshot
//!
//! A `WattsonClient` owns everything that lives across polls (cookie
//! session, token set, device ids). Token state is only changed through the
//! `TokenManager`, device ids only through the `DeviceResolver`, both on the
//! same call path that reads them.

use crate::auth::{Credentials, TokenManager, TokenSet};
use crate::config::{Config, EndpointsConfig};
use crate::devices::{DeviceIdentifiers, DeviceResolver};
use crate::error::{Result, WattsonError, excerpt};
use crate::http::HttpSession;
use crate::logging::{LogContext, StructuredLogger, get_logger, get_logger_with_context};
use crate::readings::{Interval, RawReading, ReadingsPayload};
use crate::snapshot::{Snapshot, Utility, UtilitySnapshot};

/// Lower bound of the date range sent to the data endpoints
pub const RANGE_START: &str = "1900-01-01 00:00:00 +0000";
/// Upper bound of the date range sent to the data endpoints
pub const RANGE_END: &str = "2100-01-01 00:00:00 +0000";

/// Client for one account
#[derive(Debug)]
pub struct WattsonClient {
    endpoints: EndpointsConfig,
    credentials: Credentials,
    session: HttpSession,
    tokens: TokenManager,
    devices: DeviceIdentifiers,
    resolver: DeviceResolver,
    interval: Interval,
    logger: StructuredLogger,
}

impl WattsonClient {
    /// Build a client from configuration; device ids given there skip discovery
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            endpoints: config.endpoints.clone(),
            credentials: config.account.credentials(),
            session: HttpSession::new(&config.http)?,
            tokens: TokenManager::new(None),
            devices: DeviceIdentifiers::new(
                config.account.water_device_id.clone(),
                config.account.heating_device_id.clone(),
            ),
            resolver: DeviceResolver::new(),
            interval: config.timeseries_interval,
            logger: get_logger("client"),
        })
    }

    /// Warm start from a persisted token set
    pub fn with_tokens(mut self, tokens: Option<TokenSet>) -> Self {
        self.tokens = TokenManager::new(tokens);
        self
    }

    /// Warm start from persisted device ids; ids already set are kept
    pub fn with_devices(mut self, devices: DeviceIdentifiers) -> Self {
        self.devices = self.devices.fill_unset(devices);
        self
    }

    pub fn tokens(&self) -> Option<&TokenSet> {
        self.tokens.tokens()
    }

    pub fn devices(&self) -> &DeviceIdentifiers {
        &self.devices
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Cached, refreshed or freshly signed-in access token
    pub async fn ensure_access_token(&mut self) -> Result<String> {
        self.tokens
            .ensure_access_token(&self.session, &self.endpoints, &self.credentials)
            .await
    }

    /// Re-run device discovery; prior ids survive a failed lookup
    pub async fn resolve_devices(&mut self) -> Result<&DeviceIdentifiers> {
        let token = self.ensure_access_token().await?;
        self.resolve_devices_with(&token).await;
        Ok(&self.devices)
    }

    async fn resolve_devices_with(&mut self, access_token: &str) {
        self.devices = self
            .resolver
            .resolve(&self.session, &self.endpoints, access_token, &self.devices)
            .await;
    }

    /// Fetch and aggregate both utilities
    ///
    /// Any fetch failure fails the whole call; no partial snapshot is returned.
    pub async fn fetch_data(&mut self) -> Result<Snapshot> {
        let token = self.ensure_access_token().await?;
        if !self.devices.is_resolved() {
            let found = self
                .resolver
                .resolve(&self.session, &self.endpoints, &token, &self.devices)
                .await;
            self.devices = self.devices.fill_unset(found);
        }

        let heating = self.fetch_utility(Utility::Heating, &token).await?;
        let water = self.fetch_utility(Utility::Water, &token).await?;

        let now = chrono::Utc::now();
        let snapshot = Snapshot {
            water: UtilitySnapshot::from_records(&water, self.interval, now),
            heating: UtilitySnapshot::from_records(&heating, self.interval, now),
        };
        self.logger.info(&format!(
            "Fetched {} water and {} heating records ({} / {} buckets)",
            water.len(),
            heating.len(),
            snapshot.water.statistics.len(),
            snapshot.heating.statistics.len()
        ));
        Ok(snapshot)
    }

    /// `fetch_data` on a private current-thread runtime
    pub fn fetch_data_blocking(&mut self) -> Result<Snapshot> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.fetch_data())
    }

    fn device_id(&self, utility: Utility) -> Option<&str> {
        match utility {
            Utility::Water => self.devices.water_device_id.as_deref(),
            Utility::Heating => self.devices.heating_device_id.as_deref(),
        }
    }

    async fn fetch_utility(&self, utility: Utility, access_token: &str) -> Result<Vec<RawReading>> {
        let logger = get_logger_with_context(LogContext::new("client").with_utility(utility.as_str()));
        let device_id = self.device_id(utility).ok_or_else(|| {
            WattsonError::fetch(format!("{utility}: device id could not be resolved"))
        })?;
        if device_id.is_empty() {
            logger.debug("No device on the account, skipping");
            return Ok(Vec::new());
        }

        let (url, range) = match utility {
            Utility::Water => (
                self.endpoints.water_data_url(device_id),
                [("startDate", RANGE_START), ("endDate", RANGE_END)],
            ),
            Utility::Heating => (
                self.endpoints.heating_data_url(device_id),
                [("fromDate", RANGE_START), ("toDate", RANGE_END)],
            ),
        };

        let resp = self
            .session
            .client()
            .get(url)
            .bearer_auth(access_token)
            .query(&range)
            .send()
            .await
            .map_err(|e| WattsonError::fetch(format!("{utility}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| WattsonError::fetch(format!("{utility}: {e}")))?;
        if !status.is_success() {
            return Err(WattsonError::fetch(format!(
                "{utility}: HTTP {}: {}",
                status.as_u16(),
                excerpt(&body)
            )));
        }

        let records = serde_json::from_str::<ReadingsPayload>(&body)
            .map_err(|e| WattsonError::fetch(format!("{utility}: unexpected response shape: {e}")))?
            .into_records();
        logger.debug(&format!("Received {} records", records.len()));
        Ok(records)
    }
}
