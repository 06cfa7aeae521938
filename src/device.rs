use std::collections::BTreeMap;
use std::fmt;

/// Identity of one USB device as known to the issuance pipeline.
///
/// All fields may be empty. Nothing is validated here; values are sanitized
/// only when they are composed into a certificate subject.
///
/// # Example
/// ```
/// use usbcert::device::DeviceIdentity;
///
/// let mut device = DeviceIdentity::new();
/// device
///     .set_id("048d", "1234")
///     .set_name("My USB Flash")
///     .set_serial("SN987654321")
///     .add_attribute("speed", "480Mbps");
///
/// assert_eq!(device.id(), "048d:1234");
/// assert_eq!(device.attribute("speed"), Some("480Mbps"));
/// assert_eq!(device.attribute("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: String,
    name: String,
    serial: String,
    attributes: BTreeMap<String, String>,
}

impl DeviceIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the id to `vendor:product`. An absent or empty component clears the id.
    pub fn set_id<'a>(
        &mut self,
        vendor_id: impl Into<Option<&'a str>>,
        product_id: impl Into<Option<&'a str>>,
    ) -> &mut Self {
        self.id = match (vendor_id.into(), product_id.into()) {
            (Some(vendor), Some(product)) if !vendor.is_empty() && !product.is_empty() => {
                format!("{vendor}:{product}")
            }
            _ => String::new(),
        };
        self
    }

    /// Sets the free-text device name. `None` clears it.
    pub fn set_name<'a>(&mut self, name: impl Into<Option<&'a str>>) -> &mut Self {
        self.name = name.into().unwrap_or_default().to_string();
        self
    }

    /// Sets the serial number. `None` clears it.
    pub fn set_serial<'a>(&mut self, serial: impl Into<Option<&'a str>>) -> &mut Self {
        self.serial = serial.into().unwrap_or_default().to_string();
        self
    }

    /// Records an auxiliary attribute, replacing any earlier value for the same key.
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the attribute stored under `key`, or `None` if there is none.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `VVVV:PPPP` identifier, or an empty string.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_unset(s: &str) -> &str {
            if s.is_empty() { "(unset)" } else { s }
        }

        writeln!(f, "USB device")?;
        writeln!(f, "  id:     {}", or_unset(&self.id))?;
        writeln!(f, "  name:   {}", or_unset(&self.name))?;
        writeln!(f, "  serial: {}", or_unset(&self.serial))?;
        write!(f, "  attributes ({}):", self.attributes.len())?;
        for (key, value) in &self.attributes {
            write!(f, "\n    {key}: {value}")?;
        }
        Ok(())
    }
}
