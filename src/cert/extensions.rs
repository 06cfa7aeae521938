//! The X.509v3 extensions device certificates carry, plus a raw form for
//! extensions read back from a certificate.

use const_oid::AssociatedOid;
use der::{Decode, Encode, oid::ObjectIdentifier};
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;

pub use der::flagset::FlagSet;
pub use x509_cert::ext::pkix::KeyUsages;

/// An extension with a fixed OID and a DER-encoded value.
///
/// # Example
/// ```
/// use usbcert::cert::extensions::{BasicConstraints, ExtensionValue};
/// let leaf = BasicConstraints { is_ca: false, max_path_length: None };
/// let der = leaf.encode_value().unwrap();
/// assert_eq!(der, [0x30, 0x00]);
/// assert!(!BasicConstraints::decode_value(&der).unwrap().is_ca);
/// ```
pub trait ExtensionValue: Sized {
    const OID: ObjectIdentifier;

    fn encode_value(&self) -> der::Result<Vec<u8>>;

    fn decode_value(der_bytes: &[u8]) -> der::Result<Self>;
}

/// `basicConstraints`. The default is an end-entity (`CA:FALSE`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    /// Only meaningful when `is_ca` is set.
    pub max_path_length: Option<u8>,
}

impl ExtensionValue for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn encode_value(&self) -> der::Result<Vec<u8>> {
        let value = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };
        value.to_der()
    }

    fn decode_value(der_bytes: &[u8]) -> der::Result<Self> {
        let decoded = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(BasicConstraints {
            is_ca: decoded.ca,
            max_path_length: decoded.path_len_constraint,
        })
    }
}

/// `keyUsage` as a set of flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ExtensionValue for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn encode_value(&self) -> der::Result<Vec<u8>> {
        X509KeyUsage(self.0).to_der()
    }

    fn decode_value(der_bytes: &[u8]) -> der::Result<Self> {
        X509KeyUsage::from_der(der_bytes).map(|usage| KeyUsage(usage.0))
    }
}

/// `extendedKeyUsage`, purposes in certificate order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ExtensionValue for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn encode_value(&self) -> der::Result<Vec<u8>> {
        let purposes = self.usage.iter().copied().map(ObjectIdentifier::from).collect();
        x509_cert::ext::pkix::ExtendedKeyUsage(purposes).to_der()
    }

    fn decode_value(der_bytes: &[u8]) -> der::Result<Self> {
        let purposes = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(der_bytes)?.0;
        Ok(ExtendedKeyUsage {
            usage: purposes.into_iter().map(ExtendedKeyUsageOption::from).collect(),
        })
    }
}

/// One key purpose of [`ExtendedKeyUsage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    Other(ObjectIdentifier),
}

impl From<ObjectIdentifier> for ExtendedKeyUsageOption {
    fn from(oid: ObjectIdentifier) -> Self {
        match oid {
            const_oid::db::rfc5912::ID_KP_SERVER_AUTH => ExtendedKeyUsageOption::ServerAuth,
            const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => ExtendedKeyUsageOption::ClientAuth,
            other => ExtendedKeyUsageOption::Other(other),
        }
    }
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(option: ExtendedKeyUsageOption) -> Self {
        match option {
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::Other(oid) => oid,
        }
    }
}

/// An extension in encoded form, as placed into or read out of a certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER contents of the `extnValue` OCTET STRING.
    pub value: Vec<u8>,
}

impl ExtensionParam {
    pub fn encode<E: ExtensionValue>(extension: &E, critical: bool) -> der::Result<Self> {
        Ok(ExtensionParam {
            oid: E::OID,
            critical,
            value: extension.encode_value()?,
        })
    }

    /// Decodes the value as `E`. The OID is not checked.
    pub fn decode<E: ExtensionValue>(&self) -> der::Result<E> {
        E::decode_value(&self.value)
    }
}

impl From<&x509_cert::ext::Extension> for ExtensionParam {
    fn from(ext: &x509_cert::ext::Extension) -> Self {
        ExtensionParam {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}
