use der::asn1::OctetString;
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::Validity;
use crate::cert::extensions::ExtensionParam;
use crate::key::SignatureAlgorithm;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian serial number bytes.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The validity window.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a version 3 `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> der::Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| -> der::Result<x509_cert::ext::Extension> {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<der::Result<Vec<_>>>()?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(&self.serial_number)?,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity: self.validity.to_x509_validity()?,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        })
    }
}

/// Serial number for a certificate issued at `issued_at`.
///
/// Eight big-endian bytes of Unix seconds followed by eight random bytes: the
/// value never decreases between issuances a second apart, and two issuances
/// within the same second differ with overwhelming probability.
pub fn issuance_serial(issued_at: OffsetDateTime) -> Vec<u8> {
    let seconds = u64::try_from(issued_at.unix_timestamp()).unwrap_or(0);
    let mut serial = Vec::with_capacity(16);
    serial.extend_from_slice(&seconds.to_be_bytes());
    serial.extend_from_slice(&rand::random::<u64>().to_be_bytes());
    serial
}

/// Inverse of the timestamp half of [`issuance_serial`], given the encoded serial bytes.
pub fn serial_timestamp(serial: &[u8]) -> Option<u64> {
    let value = serial
        .iter()
        .try_fold(0u128, |acc, &b| acc.checked_mul(256).map(|v| v | u128::from(b)))?;
    u64::try_from(value >> 64).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_layout() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let serial = issuance_serial(at);
        assert_eq!(serial.len(), 16);
        assert_eq!(&serial[..8], &1_700_000_000u64.to_be_bytes());
        assert_eq!(serial_timestamp(&serial), Some(1_700_000_000));
    }

    #[test]
    fn test_serials_differ_within_a_second() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_ne!(issuance_serial(at), issuance_serial(at));
    }

    #[test]
    fn test_serial_encodes_as_positive_integer() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let serial = issuance_serial(at);
        let encoded = SerialNumber::<x509_cert::certificate::Rfc5280>::new(&serial).unwrap();
        assert_eq!(serial_timestamp(encoded.as_bytes()), Some(1_700_000_000));
    }

    #[test]
    fn test_serial_is_monotonic_across_seconds() {
        let earlier = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let later = earlier + time::Duration::seconds(1);
        for _ in 0..32 {
            assert!(issuance_serial(later) > issuance_serial(earlier));
        }
    }
}
