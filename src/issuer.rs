use std::fs;
use std::path::Path;

use der::asn1::BitString;
use der::{DecodePem, Encode};
use tracing::{debug, info, warn};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, ExtensionParam, KeyUsage, KeyUsages,
};
use crate::cert::{IssuedCertificate, Validity};
use crate::csr::CertificateRequest;
use crate::error::{Result, UsbCertError};
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::{TbsCertificate, issuance_serial};

/// Represents an entity capable of issuing certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> &Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Issues a client certificate for `request`.
    ///
    /// Subject and public key are copied verbatim from the request. The
    /// certificate carries `basicConstraints=CA:FALSE`,
    /// `keyUsage=digitalSignature,keyEncipherment` and
    /// `extendedKeyUsage=clientAuth`; an extension that fails to encode is
    /// logged and left out.
    fn issue(&self, request: &CertificateRequest, validity: Validity) -> Result<IssuedCertificate> {
        let key = self.signing_key();
        let sign_err = |e: der::Error| UsbCertError::SignError(e.to_string());

        let tbs_cert = TbsCertificate {
            serial_number: issuance_serial(validity.not_before),
            signature_algorithm: key.signature_algorithm(),
            issuer: self.issuer_name().clone(),
            validity,
            subject: request.subject().clone(),
            subject_public_key_info: request.public_key_info().clone(),
            extensions: client_extensions(),
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner().map_err(sign_err)?;
        let signature = key.sign_data(&tbs_cert_inner.to_der().map_err(sign_err)?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: key.signature_algorithm().into(),
            signature: BitString::from_bytes(&signature).map_err(sign_err)?,
        };

        Ok(IssuedCertificate { inner: cert_inner })
    }
}

fn client_extensions() -> Vec<ExtensionParam> {
    let candidates = [
        (
            "basicConstraints",
            ExtensionParam::encode(&BasicConstraints::default(), false),
        ),
        (
            "keyUsage",
            ExtensionParam::encode(
                &KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment),
                false,
            ),
        ),
        (
            "extendedKeyUsage",
            ExtensionParam::encode(
                &ExtendedKeyUsage {
                    usage: vec![ExtendedKeyUsageOption::ClientAuth],
                },
                false,
            ),
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(name, extension)| match extension {
            Ok(extension) => Some(extension),
            Err(err) => {
                warn!(extension = name, error = %err, "skipping extension that failed to encode");
                None
            }
        })
        .collect()
}

/// A CA certificate together with its private key, loaded read-only.
#[derive(Debug, Clone)]
pub struct CertificationAuthority {
    cert: x509_cert::Certificate,
    key: KeyPair,
}

impl CertificationAuthority {
    /// Loads the trust anchor from PEM files.
    ///
    /// The key must be the private half of the certificate's public key.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert_err = |reason: String| UsbCertError::CaCertLoadError {
            path: cert_path.to_path_buf(),
            reason,
        };
        let key_err = |reason: String| UsbCertError::CaKeyLoadError {
            path: key_path.to_path_buf(),
            reason,
        };

        let cert_pem = fs::read_to_string(cert_path).map_err(|e| cert_err(e.to_string()))?;
        let cert = x509_cert::Certificate::from_pem(cert_pem.as_bytes())
            .map_err(|e| cert_err(e.to_string()))?;
        let cert_key = PublicKey::from_spki(&cert.tbs_certificate.subject_public_key_info)
            .map_err(cert_err)?;

        let key = KeyPair::read_pem_file(key_path).map_err(key_err)?;
        if key.public_key() != cert_key {
            return Err(key_err(
                "key does not match the CA certificate public key".to_string(),
            ));
        }

        debug!(cert = %cert_path.display(), key = %key_path.display(), "loaded CA");
        Ok(Self { cert, key })
    }

    pub fn certificate(&self) -> &x509_cert::Certificate {
        &self.cert
    }
}

impl Issuer for CertificationAuthority {
    fn issuer_name(&self) -> &Name {
        // The name of the issuer is the subject of the certificate
        &self.cert.tbs_certificate.subject
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }
}

/// Issues a certificate for the request at `csr_path`, signed by the CA at
/// `ca_cert_path`/`ca_key_path`, and writes it to `out_cert_path`.
///
/// The request and CA material are read fresh on every call. `validity_days <= 0`
/// means 365 days; a period that cannot be encoded is a configuration error.
/// Nothing is written unless issuance succeeds.
pub fn sign_csr(
    csr_path: &Path,
    ca_cert_path: &Path,
    ca_key_path: &Path,
    out_cert_path: &Path,
    validity_days: i64,
) -> Result<IssuedCertificate> {
    let validity = Validity::for_days(validity_days)?;
    let request = CertificateRequest::load(csr_path)?;
    let ca = CertificationAuthority::load(ca_cert_path, ca_key_path)?;

    let certificate = ca.issue(&request, validity)?;
    certificate.write_pem(out_cert_path)?;

    info!(
        path = %out_cert_path.display(),
        serial = %hex_serial(certificate.serial_number()),
        subject = %certificate.subject(),
        "issued device certificate"
    );
    Ok(certificate)
}

fn hex_serial(serial: &[u8]) -> String {
    serial.iter().map(|b| format!("{b:02x}")).collect()
}
