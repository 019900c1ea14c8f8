//! Configuration management for Wattson
//!
//! This module handles loading, validation, and management of the client
//! configuration from YAML files with support for environment variable
//! overrides of the account credentials.

use crate::auth::Credentials;
use crate::error::{Result, WattsonError};
use crate::readings::Interval;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Environment variable overriding `account.username`
pub const ENV_USERNAME: &str = "WATTSON_USERNAME";
/// Environment variable overriding `account.password`
pub const ENV_PASSWORD: &str = "WATTSON_PASSWORD";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account credentials and optional pre-resolved device ids
    pub account: AccountConfig,

    /// Login and API endpoints
    pub endpoints: EndpointsConfig,

    /// HTTP client settings
    pub http: HttpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Seconds between two polls of the data endpoints
    pub poll_interval_secs: u64,

    /// Granularity of the statistics time series
    pub timeseries_interval: Interval,

    /// Where tokens and device ids are persisted between restarts
    pub state_file: String,
}

/// Account credentials
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AccountConfig {
    /// Login e-mail
    pub username: String,

    /// Login password
    pub password: String,

    /// Water meter device id; discovered when absent
    pub water_device_id: Option<String>,

    /// Heating meter device id; discovered when absent
    pub heating_device_id: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("water_device_id", &self.water_device_id)
            .field("heating_device_id", &self.heating_device_id)
            .finish()
    }
}

impl AccountConfig {
    /// Credentials used by the login flow
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

/// Azure AD B2C tenant and metering API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// B2C login host, e.g. `https://tenant.b2clogin.com`
    pub auth_base: String,

    /// B2C tenant name
    pub tenant: String,

    /// B2C user flow policy
    pub policy: String,

    /// OAuth client id of the mobile app
    pub client_id: String,

    /// Redirect URI registered for the client
    pub redirect_uri: String,

    /// Space-separated scopes
    pub scopes: String,

    /// Metering API host
    pub api_base: String,
}

impl EndpointsConfig {
    fn policy_base(&self) -> String {
        format!(
            "{}/{}/{}",
            self.auth_base.trim_end_matches('/'),
            self.tenant,
            self.policy
        )
    }

    /// Scheme and host of the login pages, sent as `Origin`
    pub fn origin(&self) -> String {
        self.auth_base.trim_end_matches('/').to_string()
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.policy_base())
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.policy_base())
    }

    pub fn self_asserted_url(&self) -> String {
        format!("{}/SelfAsserted", self.policy_base())
    }

    pub fn confirmed_url(&self) -> String {
        format!("{}/api/CombinedSigninAndSignup/confirmed", self.policy_base())
    }

    pub fn locations_url(&self) -> String {
        format!(
            "{}/provisioning/api/v1/locations",
            self.api_base.trim_end_matches('/')
        )
    }

    pub fn water_data_url(&self, device_id: &str) -> String {
        format!(
            "{}/water/api/data/{}",
            self.api_base.trim_end_matches('/'),
            device_id
        )
    }

    pub fn heating_data_url(&self, device_id: &str) -> String {
        format!(
            "{}/heating/api/v1/devices/{}/data",
            self.api_base.trim_end_matches('/'),
            device_id
        )
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header value
    pub user_agent: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (its parent directory receives the rotated files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `path`, or from the default locations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::load_default_locations()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_default_locations() -> Result<Self> {
        let default_paths = [
            "wattson.yaml",
            "/data/wattson.yaml",
            "/etc/wattson/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Replace credentials with `WATTSON_USERNAME` / `WATTSON_PASSWORD` when set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(username) = std::env::var(ENV_USERNAME)
            && !username.trim().is_empty()
        {
            self.account.username = username;
        }
        if let Ok(password) = std::env::var(ENV_PASSWORD)
            && !password.is_empty()
        {
            self.account.password = password;
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.account.username.trim().is_empty() {
            return Err(WattsonError::validation(
                "account.username",
                "Username cannot be empty",
            ));
        }

        if self.account.password.is_empty() {
            return Err(WattsonError::validation(
                "account.password",
                "Password cannot be empty",
            ));
        }

        for (field, value) in [
            ("endpoints.auth_base", &self.endpoints.auth_base),
            ("endpoints.api_base", &self.endpoints.api_base),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(WattsonError::validation(
                    field.to_string(),
                    format!("Not a valid URL: {value}"),
                ));
            }
        }

        if self.endpoints.client_id.trim().is_empty() {
            return Err(WattsonError::validation(
                "endpoints.client_id",
                "Client id cannot be empty",
            ));
        }

        if self.http.timeout_secs == 0 {
            return Err(WattsonError::validation(
                "http.timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(WattsonError::validation(
                "poll_interval_secs",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_account() -> Config {
        let mut config = Config::default();
        config.account.username = "user@example.com".to_string();
        config.account.password = "secret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 1800);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.timeseries_interval, Interval::Daily);
        assert!(config.account.water_device_id.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = config_with_account();
        assert!(config.validate().is_ok());

        config.account.username = String::new();
        assert!(config.validate().is_err());

        config = config_with_account();
        config.endpoints.api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        config = config_with_account();
        config.http.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoints = EndpointsConfig {
            auth_base: "https://login.example.com/".to_string(),
            tenant: "tenant.onmicrosoft.com".to_string(),
            policy: "b2c_1_signin".to_string(),
            api_base: "https://api.example.com".to_string(),
            ..EndpointsConfig::default()
        };
        assert_eq!(
            endpoints.authorize_url(),
            "https://login.example.com/tenant.onmicrosoft.com/b2c_1_signin/oauth2/v2.0/authorize"
        );
        assert_eq!(
            endpoints.confirmed_url(),
            "https://login.example.com/tenant.onmicrosoft.com/b2c_1_signin/api/CombinedSigninAndSignup/confirmed"
        );
        assert_eq!(endpoints.origin(), "https://login.example.com");
        assert_eq!(
            endpoints.heating_data_url("h-1"),
            "https://api.example.com/heating/api/v1/devices/h-1/data"
        );
    }

    #[test]
    fn test_password_is_not_debug_printed() {
        let config = config_with_account();
        let printed = format!("{:?}", config.account);
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "account:\n  username: a@b.c\n  password: pw\ntimeseries_interval: hourly\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.account.username, "a@b.c");
        assert_eq!(config.timeseries_interval, Interval::Hourly);
        assert_eq!(config.poll_interval_secs, 1800);
    }
}
