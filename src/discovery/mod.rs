//! Boundary to the device access-control service (USBGuard) that reports the
//! devices currently attached.
//!
//! The transport is left to implementors of [`DeviceSource`]; this module
//! turns what they return into [`DeviceIdentity`] values the issuance
//! pipeline can consume.

pub mod rule;

use thiserror::Error;
use tracing::{debug, warn};

use crate::device::DeviceIdentity;
use rule::parse_rule;

/// Attribute holding the numeric device id assigned by the service.
pub const USBGUARD_ID_ATTRIBUTE: &str = "usbguard_id";
/// Attribute holding the rule string exactly as received.
pub const RAW_INFO_ATTRIBUTE: &str = "raw_info";

/// Which devices to list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceQuery {
    #[default]
    All,
    Allowed,
    Blocked,
    /// A rule-match expression passed through to the service.
    Match(String),
}

impl DeviceQuery {
    /// The filter string understood by the service.
    pub fn as_filter(&self) -> &str {
        match self {
            DeviceQuery::All => "",
            DeviceQuery::Allowed => "allow",
            DeviceQuery::Blocked => "block",
            DeviceQuery::Match(expr) => expr,
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("device service unavailable: {0}")]
    Unavailable(String),

    #[error("device service rejected query {query:?}: {reason}")]
    QueryRejected { query: String, reason: String },
}

/// One device as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: u32,
    pub rule: String,
}

impl DeviceRecord {
    pub fn new(device_id: u32, rule: impl Into<String>) -> Self {
        Self {
            device_id,
            rule: rule.into(),
        }
    }

    /// Converts the record into a device identity.
    ///
    /// Fields come from the parsed rule. A rule that does not parse yields an
    /// identity with empty fields; the id and raw rule attributes are always set.
    pub fn to_identity(&self) -> DeviceIdentity {
        let mut device = DeviceIdentity::new();
        device
            .add_attribute(USBGUARD_ID_ATTRIBUTE, self.device_id.to_string())
            .add_attribute(RAW_INFO_ATTRIBUTE, self.rule.as_str());

        match parse_rule(&self.rule) {
            Ok(parsed) => {
                if let Some((vendor, product)) = &parsed.id {
                    device.set_id(vendor.as_str(), product.as_str());
                }
                device
                    .set_name(parsed.name.as_deref())
                    .set_serial(parsed.serial.as_deref());
                for (key, value) in parsed.attributes {
                    device.add_attribute(key, value);
                }
                if let Some(target) = parsed.target {
                    device.add_attribute("target", target.as_str());
                }
            }
            Err(err) => {
                warn!(device_id = self.device_id, error = %err, "unparseable device rule");
            }
        }

        device
    }
}

/// A service able to enumerate attached devices.
pub trait DeviceSource {
    /// Lists the devices matching `query`.
    ///
    /// No matching devices is an empty vector, not an error.
    fn list_devices(&self, query: &DeviceQuery) -> Result<Vec<DeviceRecord>, DiscoveryError>;
}

/// Lists devices from `source` and converts each into a [`DeviceIdentity`].
pub fn discover(
    source: &impl DeviceSource,
    query: &DeviceQuery,
) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
    let records = source.list_devices(query)?;
    debug!(filter = query.as_filter(), count = records.len(), "listed devices");
    Ok(records.iter().map(DeviceRecord::to_identity).collect())
}
