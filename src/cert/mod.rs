pub mod extensions;
pub mod subject;

use std::path::Path;
use std::time::{Duration, SystemTime};

use der::asn1::{GeneralizedTime, UtcTime};
use der::{DecodePem, Encode, EncodePem};
use extensions::{ExtensionParam, ExtensionValue};
use subject::DeviceSubject;
use time::OffsetDateTime;
use x509_cert::name::Name;
use x509_cert::time::Time;

use crate::error::{Result, UsbCertError};
use crate::key::{PublicKey, SignatureAlgorithm};
use crate::storage;

/// Validity used when the caller does not specify a positive number of days.
pub const DEFAULT_VALIDITY_DAYS: i64 = 365;

const SECONDS_PER_DAY: i64 = 86_400;
/// Last year a four-digit GeneralizedTime can carry.
const MAX_ENCODABLE_YEAR: i32 = 9999;

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    ///
    /// `days <= 0` means unspecified and yields [`DEFAULT_VALIDITY_DAYS`].
    /// Both bounds are whole seconds, matching the resolution of the encoding.
    /// A period ending after 9999-12-31 is a [`UsbCertError::ConfigError`].
    pub fn for_days(days: i64) -> Result<Self> {
        let days = if days <= 0 { DEFAULT_VALIDITY_DAYS } else { days };
        let now = OffsetDateTime::now_utc();
        let now = now.replace_nanosecond(0).unwrap_or(now);
        let not_after = days
            .checked_mul(SECONDS_PER_DAY)
            .map(time::Duration::seconds)
            .and_then(|lifetime| now.checked_add(lifetime))
            .filter(|end| end.year() <= MAX_ENCODABLE_YEAR)
            .ok_or_else(|| {
                UsbCertError::ConfigError(format!(
                    "a validity of {days} days ends past the last encodable date"
                ))
            })?;
        Ok(Self {
            not_before: now,
            not_after,
        })
    }

    /// Converts to the X.509 representation; dates from 2050 on use GeneralizedTime.
    pub fn to_x509_validity(&self) -> der::Result<x509_cert::time::Validity> {
        Ok(x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }
}

fn to_x509_time(at: OffsetDateTime) -> der::Result<Time> {
    let system_time = SystemTime::from(at);
    if at.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_system_time(system_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_system_time(system_time)?))
    }
}

/// A CA-signed device certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats
/// and to inspect the fields the issuance pipeline sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// The inner representation of the certificate.
    pub inner: x509_cert::Certificate,
}

impl IssuedCertificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| UsbCertError::SignError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| UsbCertError::SignError(e.to_string()))
    }

    pub fn from_pem(pem: &str) -> std::result::Result<Self, String> {
        x509_cert::Certificate::from_pem(pem.as_bytes())
            .map(|inner| Self { inner })
            .map_err(|e| e.to_string())
    }

    /// Writes the PEM encoding to `path` atomically, world-readable.
    pub fn write_pem(&self, path: &Path) -> Result<()> {
        let pem = self.to_pem()?;
        storage::ensure_parent_dir(path);
        storage::write_atomic(path, pem.as_bytes(), storage::PUBLIC_FILE_MODE)
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn device_subject(&self) -> DeviceSubject {
        DeviceSubject::from_x509_name(self.subject())
    }

    /// Serial number bytes as encoded (big-endian, sign padding included).
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn not_before(&self) -> Duration {
        self.inner
            .tbs_certificate
            .validity
            .not_before
            .to_unix_duration()
    }

    pub fn not_after(&self) -> Duration {
        self.inner
            .tbs_certificate
            .validity
            .not_after
            .to_unix_duration()
    }

    /// Finds and decodes an extension; `None` when the certificate does not carry it.
    pub fn extension<E: ExtensionValue>(&self) -> Option<der::Result<E>> {
        self.extensions()
            .into_iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.decode())
    }

    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(ExtensionParam::from)
            .collect()
    }

    pub fn public_key(&self) -> std::result::Result<PublicKey, String> {
        PublicKey::from_spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Checks that `ca` issued this certificate: the issuer name matches the CA
    /// subject and the signature verifies under the CA public key.
    pub fn verify_issued_by(&self, ca: &x509_cert::Certificate) -> std::result::Result<(), String> {
        if self.issuer() != &ca.tbs_certificate.subject {
            return Err("issuer does not match the CA subject".to_string());
        }
        let algorithm = SignatureAlgorithm::from_identifier(&self.inner.signature_algorithm)
            .ok_or_else(|| format!("unsupported signature algorithm {}", self.inner.signature_algorithm.oid))?;
        let ca_key = PublicKey::from_spki(&ca.tbs_certificate.subject_public_key_info)?;
        let tbs = self
            .inner
            .tbs_certificate
            .to_der()
            .map_err(|e| e.to_string())?;
        let signature = self
            .inner
            .signature
            .as_bytes()
            .ok_or_else(|| "signature has unused bits".to_string())?;
        ca_key.verify(algorithm, &tbs, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_for_days() {
        for days in [1, 365] {
            let validity = Validity::for_days(days).unwrap();
            assert_eq!(
                validity.not_after - validity.not_before,
                time::Duration::days(days)
            );
            assert_eq!(validity.not_before.nanosecond(), 0);
        }
    }

    #[test]
    fn test_non_positive_days_default() {
        for days in [0, -5] {
            let validity = Validity::for_days(days).unwrap();
            assert_eq!(
                validity.not_after - validity.not_before,
                time::Duration::days(DEFAULT_VALIDITY_DAYS)
            );
        }
    }

    #[test]
    fn test_out_of_range_days_are_config_errors() {
        for days in [3_000_000, i64::MAX / SECONDS_PER_DAY + 1, i64::MAX] {
            let err = Validity::for_days(days).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Config, "{days} days");
        }
    }

    #[test]
    fn test_far_future_validity_still_encodes() {
        // lands in 9999, inside what GeneralizedTime can carry
        let days = (9999 - OffsetDateTime::now_utc().year() as i64) * 365;
        let validity = Validity::for_days(days).unwrap();
        let encoded = validity.to_x509_validity().unwrap();
        assert!(matches!(encoded.not_after, Time::GeneralTime(_)));
    }

    #[test]
    fn test_time_encoding_switches_to_generalized() {
        let early = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert!(matches!(to_x509_time(early).unwrap(), Time::UtcTime(_)));

        let late = OffsetDateTime::from_unix_timestamp(2_600_000_000).unwrap();
        let encoded = to_x509_time(late).unwrap();
        assert!(matches!(encoded, Time::GeneralTime(_)));
        assert_eq!(encoded.to_unix_duration().as_secs(), 2_600_000_000);
    }
}
