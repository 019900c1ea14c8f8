use tracing::Level;
use wattson::config::LoggingConfig;
use wattson::logging::{LogContext, get_logger_with_context, init_logging, parse_log_level};

#[test]
fn parse_log_level_accepts_aliases() {
    assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
    assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
    assert!(parse_log_level("loud").is_err());
}

#[test]
fn init_logging_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        level: "DEBUG".to_string(),
        file: dir.path().join("wattson.log").to_string_lossy().to_string(),
        backup_count: 2,
        console_output: false,
        json_format: false,
    };
    init_logging(&config).unwrap();
    init_logging(&config).unwrap();

    let logger = get_logger_with_context(LogContext::new("client").with_utility("water"));
    logger.info("logging initialized for test");
    assert_eq!(logger.component(), "client");
}
