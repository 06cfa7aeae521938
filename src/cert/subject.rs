use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, Ia5String, PrintableString, SetOfVec};
use der::{Tag, Tagged};
use tracing::debug;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use crate::device::DeviceIdentity;
use crate::sanitize::sanitize_optional;

pub const COMMON_NAME_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
pub const ORGANIZATION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
pub const ORGANIZATIONAL_UNIT_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");

/// Common name used when a device exposes no identifying string at all.
pub const FALLBACK_COMMON_NAME: &str = "usb-device";
/// Organization used when a device has no name.
pub const FALLBACK_ORGANIZATION: &str = "unknown";
/// Organizational unit carried by every device certificate.
pub const DEVICE_ORGANIZATIONAL_UNIT: &str = "usb";

/// Subject of a device certificate: `CN`, `O` and `OU`.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DeviceSubject {
    pub common_name: String,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DeviceSubject {
    /// Composes the subject for a device.
    ///
    /// `CN` is the first non-empty of serial, id and name (sanitized), falling
    /// back to `"usb-device"`. `O` is the sanitized name or `"unknown"`. `OU`
    /// is always `"usb"`.
    pub fn from_device(device: &DeviceIdentity) -> Self {
        let serial = sanitize_optional(Some(device.serial()));
        let id = sanitize_optional(Some(device.id()));
        let name = sanitize_optional(Some(device.name()));

        let common_name = match (serial, id, name.clone()) {
            (Some(serial), _, _) => serial,
            (None, Some(id), _) => {
                debug!("device has no serial, using vendor:product id as CN");
                id
            }
            (None, None, Some(name)) => {
                debug!("device has no serial or id, using name as CN");
                name
            }
            (None, None, None) => {
                debug!("device has no identifying strings, using fallback CN");
                FALLBACK_COMMON_NAME.to_string()
            }
        };

        DeviceSubject {
            common_name,
            organization: Some(name.unwrap_or_else(|| FALLBACK_ORGANIZATION.to_string())),
            organization_unit: Some(DEVICE_ORGANIZATIONAL_UNIT.to_string()),
        }
    }

    /// Converts the subject to an X.509 name with one UTF8String attribute per RDN,
    /// in `CN`, `O`, `OU` order. Absent components are omitted.
    pub fn as_x509_name(&self) -> der::Result<Name> {
        let components = [
            (COMMON_NAME_OID, Some(&self.common_name)),
            (ORGANIZATION_OID, self.organization.as_ref()),
            (ORGANIZATIONAL_UNIT_OID, self.organization_unit.as_ref()),
        ];

        let rdns = components
            .into_iter()
            .filter_map(|(oid, value)| value.map(|v| (oid, v)))
            .map(|(oid, value)| -> der::Result<RelativeDistinguishedName> {
                let atv = AttributeTypeAndValue {
                    oid,
                    value: Any::new(Tag::Utf8String, value.as_bytes())?,
                };
                Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
            })
            .collect::<der::Result<Vec<_>>>()?;

        Ok(RdnSequence(rdns))
    }

    /// Reads `CN`, `O` and `OU` back out of an X.509 name.
    pub fn from_x509_name(name: &Name) -> Self {
        let mut subject = DeviceSubject::default();

        for rdn in name.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = directory_string(&attr.value) else {
                    continue;
                };
                match attr.oid {
                    COMMON_NAME_OID => subject.common_name = value,
                    ORGANIZATION_OID => subject.organization = Some(value),
                    ORGANIZATIONAL_UNIT_OID => subject.organization_unit = Some(value),
                    _ => {}
                }
            }
        }

        subject
    }
}

fn directory_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String => value.decode_as::<String>().ok(),
        Tag::PrintableString => value
            .decode_as::<PrintableString>()
            .ok()
            .map(|s| s.to_string()),
        Tag::Ia5String => value.decode_as::<Ia5String>().ok().map(|s| s.to_string()),
        _ => None,
    }
}
