//! Device discovery through the provisioning locations endpoint
//!
//! Resolution is best effort: a failed lookup leaves the previous ids in
//! place and is retried on the next cycle.

use crate::config::EndpointsConfig;
use crate::error::{Result, WattsonError};
use crate::http::HttpSession;
use crate::logging::{StructuredLogger, get_logger};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Water and heating meter ids of the account
///
/// `None` means not resolved yet, `Some("")` means resolved and absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentifiers {
    #[serde(default)]
    pub water_device_id: Option<String>,
    #[serde(default)]
    pub heating_device_id: Option<String>,
}

impl DeviceIdentifiers {
    pub fn new(water_device_id: Option<String>, heating_device_id: Option<String>) -> Self {
        Self {
            water_device_id,
            heating_device_id,
        }
    }

    /// Both ids resolved (possibly to the absent sentinel)
    pub fn is_resolved(&self) -> bool {
        self.water_device_id.is_some() && self.heating_device_id.is_some()
    }

    /// Fill only the ids still unset from `found`; set ids are kept
    pub fn fill_unset(&self, found: DeviceIdentifiers) -> Self {
        Self {
            water_device_id: self.water_device_id.clone().or(found.water_device_id),
            heating_device_id: self.heating_device_id.clone().or(found.heating_device_id),
        }
    }
}

/// One entry of the locations response
#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    #[serde(rename = "deviceId", deserialize_with = "string_or_number")]
    pub device_id: String,
    #[serde(rename = "utilityType")]
    pub utility_type: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "deviceId must be a string or number, got {other}"
        ))),
    }
}

fn first_matching(devices: &[Device], needle: &str) -> String {
    devices
        .iter()
        .find(|d| d.utility_type.to_lowercase().contains(needle))
        .map(|d| d.device_id.clone())
        .unwrap_or_default()
}

/// Pick the first heating and first water device of the first location
///
/// `None` when there is no location at all; a category without a match
/// resolves to `""`.
pub fn select_devices(locations: &[Location]) -> Option<DeviceIdentifiers> {
    let devices = &locations.first()?.devices;
    Some(DeviceIdentifiers {
        water_device_id: Some(first_matching(devices, "water")),
        heating_device_id: Some(first_matching(devices, "heating")),
    })
}

/// Looks device ids up for a bearer token
#[derive(Debug, Clone)]
pub struct DeviceResolver {
    logger: StructuredLogger,
}

impl Default for DeviceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceResolver {
    pub fn new() -> Self {
        Self {
            logger: get_logger("devices"),
        }
    }

    /// GET the locations list
    pub async fn fetch_locations(
        &self,
        session: &HttpSession,
        endpoints: &EndpointsConfig,
        access_token: &str,
    ) -> Result<Vec<Location>> {
        let resp = session
            .client()
            .get(endpoints.locations_url())
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(WattsonError::fetch(format!(
                "locations: HTTP {}: {}",
                status.as_u16(),
                crate::error::excerpt(&body)
            )));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Resolve device ids, keeping `prior` when the lookup fails
    pub async fn resolve(
        &self,
        session: &HttpSession,
        endpoints: &EndpointsConfig,
        access_token: &str,
        prior: &DeviceIdentifiers,
    ) -> DeviceIdentifiers {
        let selected = self
            .fetch_locations(session, endpoints, access_token)
            .await
            .and_then(|locations| {
                select_devices(&locations)
                    .ok_or_else(|| WattsonError::fetch("locations: no location on the account"))
            });

        match selected {
            Ok(ids) => {
                self.logger.info(&format!(
                    "Resolved devices water={:?} heating={:?}",
                    ids.water_device_id.as_deref().unwrap_or_default(),
                    ids.heating_device_id.as_deref().unwrap_or_default()
                ));
                ids
            }
            Err(e) => {
                self.logger
                    .warn(&format!("Device resolution skipped: {}", e));
                prior.clone()
            }
        }
    }
}
