use std::path::{Path, PathBuf};

use bon::Builder;
use tracing::info;

use crate::cert::{DEFAULT_VALIDITY_DAYS, IssuedCertificate};
use crate::csr;
use crate::device::DeviceIdentity;
use crate::error::Result;
use crate::issuer;
use crate::key::{self, DEFAULT_KEY_BITS};

/// Where each artifact of one issuance lives.
///
/// Concurrent issuances must use distinct `key`, `csr` and `cert` paths; with
/// identical paths the last writer wins.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct IssuancePaths {
    #[builder(into)]
    pub key: PathBuf,
    #[builder(into)]
    pub csr: PathBuf,
    #[builder(into)]
    pub cert: PathBuf,
    #[builder(into)]
    pub ca_cert: PathBuf,
    #[builder(into)]
    pub ca_key: PathBuf,
}

impl IssuancePaths {
    /// Conventional layout: `usb.key`, `usb.csr` and `usb_cert.pem` under
    /// `output_dir`, `ca.crt` and `ca.key` under `ca_dir`.
    pub fn in_dirs(output_dir: impl AsRef<Path>, ca_dir: impl AsRef<Path>) -> Self {
        let output_dir = output_dir.as_ref();
        let ca_dir = ca_dir.as_ref();
        Self {
            key: output_dir.join("usb.key"),
            csr: output_dir.join("usb.csr"),
            cert: output_dir.join("usb_cert.pem"),
            ca_cert: ca_dir.join("ca.crt"),
            ca_key: ca_dir.join("ca.key"),
        }
    }
}

/// Tunables of one issuance.
///
/// # Fields
/// * `key_bits` - RSA modulus size of the device key, at least 1024.
/// * `validity_days` - Certificate lifetime; `<= 0` means 365.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct IssuanceConfig {
    #[builder(default = DEFAULT_KEY_BITS)]
    pub key_bits: usize,
    #[builder(default = DEFAULT_VALIDITY_DAYS)]
    pub validity_days: i64,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Generates a key, builds a request and has the CA sign it.
///
/// Each stage reads its input back from disk. The first failure is returned
/// as-is; artifacts written by earlier stages are left in place. On success
/// the certificate has been written to `paths.cert`.
pub fn issue_certificate(
    device: &DeviceIdentity,
    paths: &IssuancePaths,
    config: &IssuanceConfig,
) -> Result<IssuedCertificate> {
    key::generate_key_file(&paths.key, config.key_bits)?;
    csr::build_csr(&paths.key, device, &paths.csr)?;
    let certificate = issuer::sign_csr(
        &paths.csr,
        &paths.ca_cert,
        &paths.ca_key,
        &paths.cert,
        config.validity_days,
    )?;

    info!(cert = %paths.cert.display(), "device certificate ready");
    Ok(certificate)
}
