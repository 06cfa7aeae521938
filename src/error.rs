//! use usbcert::error::UsbCertError;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Represents errors that can occur while issuing a device certificate.
///
/// Every stage of the issuance pipeline fails with the most specific variant
/// it can; the pipeline never downgrades one kind into another.
#[derive(Debug, Error)]
pub enum UsbCertError {
    /// Invalid configuration, such as a key size below the minimum.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A file could not be opened, read or written.
    #[error("I/O error on {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The key generation primitive failed.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// A device private key could not be parsed.
    #[error("Failed to load private key from {}: {reason}", path.display())]
    KeyLoadError { path: PathBuf, reason: String },

    /// The certificate signing request could not be assembled or signed.
    #[error("Failed to build certificate request: {0}")]
    CsrBuildError(String),

    /// A certificate signing request is missing, corrupt or fails its self-signature check.
    #[error("Failed to load certificate request from {}: {reason}", path.display())]
    CsrLoadError { path: PathBuf, reason: String },

    /// The CA certificate is missing or corrupt.
    #[error("Failed to load CA certificate from {}: {reason}", path.display())]
    CaCertLoadError { path: PathBuf, reason: String },

    /// The CA private key is missing, corrupt or does not match the CA certificate.
    #[error("Failed to load CA key from {}: {reason}", path.display())]
    CaKeyLoadError { path: PathBuf, reason: String },

    /// Signing the certificate failed.
    #[error("Signing error: {0}")]
    SignError(String),

    /// The downstream privileged action exited unsuccessfully.
    #[error("External action {program} failed with status {}", status.map_or_else(|| "<signal>".to_string(), |s| s.to_string()))]
    ExternalActionError { program: String, status: Option<i32> },
}

/// Fieldless mirror of [`UsbCertError`] for matching on the failure kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Io,
    KeyGeneration,
    KeyLoad,
    CsrBuild,
    CsrLoad,
    CaCertLoad,
    CaKeyLoad,
    Sign,
    ExternalAction,
}

impl UsbCertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UsbCertError::ConfigError(_) => ErrorKind::Config,
            UsbCertError::IoError { .. } => ErrorKind::Io,
            UsbCertError::KeyGenerationError(_) => ErrorKind::KeyGeneration,
            UsbCertError::KeyLoadError { .. } => ErrorKind::KeyLoad,
            UsbCertError::CsrBuildError(_) => ErrorKind::CsrBuild,
            UsbCertError::CsrLoadError { .. } => ErrorKind::CsrLoad,
            UsbCertError::CaCertLoadError { .. } => ErrorKind::CaCertLoad,
            UsbCertError::CaKeyLoadError { .. } => ErrorKind::CaKeyLoad,
            UsbCertError::SignError(_) => ErrorKind::Sign,
            UsbCertError::ExternalActionError { .. } => ErrorKind::ExternalAction,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        UsbCertError::IoError {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<rsa::Error> for UsbCertError {
    /// RSA failures outside of key loading only come from the keygen primitive.
    fn from(err: rsa::Error) -> Self {
        UsbCertError::KeyGenerationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UsbCertError>;
