//! # usbcert - Client Certificates for USB Devices
//!
//! usbcert turns the identity of a USB storage device (vendor/product id, name, serial
//! number) into an X.509 client certificate signed by a local certificate authority. It is
//! built entirely with rustcrypto libraries; openssl is only used to cross-check the output
//! in tests.
//!
//! An issuance runs three stages, each reading its input back from disk:
//!
//! 1. a fresh RSA private key is generated and written with owner-only permissions,
//! 2. a PKCS#10 request with subject `CN=<serial>, O=<name>, OU=usb` is built from it,
//! 3. the CA signs the request into a certificate carrying `basicConstraints=CA:FALSE`,
//!    `keyUsage=digitalSignature,keyEncipherment` and `extendedKeyUsage=clientAuth`.
//!
//! Device strings are untrusted and pass through [`sanitize::sanitize_component`] before
//! they reach a subject.
//!
//! ## Supported Key Types
//!
//! - **RSA**: device keys of 1024 bits and more (2048 by default), CA keys of any size
//! - **ECDSA**: P-256 CA keys
//!
//! ## Quick Start
//!
//! ### Issuing a Device Certificate
//!
//! ```rust,no_run
//! use usbcert::{
//!     device::DeviceIdentity,
//!     pipeline::{IssuanceConfig, IssuancePaths, issue_certificate},
//! };
//!
//! # fn main() -> Result<(), usbcert::error::UsbCertError> {
//! let mut device = DeviceIdentity::new();
//! device
//!     .set_id("048d", "1234")
//!     .set_name("My USB Flash")
//!     .set_serial("SN987654321");
//!
//! let paths = IssuancePaths::in_dirs("output", "cert");
//! let config = IssuanceConfig::builder().validity_days(30).build();
//!
//! let certificate = issue_certificate(&device, &paths, &config)?;
//! println!("Issued certificate for {}", certificate.subject());
//! # Ok(())
//! # }
//! ```
//!
//! ### Running the Stages Separately
//!
//! ```rust,no_run
//! use std::path::Path;
//! use usbcert::{csr, device::DeviceIdentity, issuer, key};
//!
//! # fn main() -> Result<(), usbcert::error::UsbCertError> {
//! let mut device = DeviceIdentity::new();
//! device.set_serial("SN987654321");
//!
//! key::generate_key_file(Path::new("output/usb.key"), 2048)?;
//! csr::build_csr(Path::new("output/usb.key"), &device, Path::new("output/usb.csr"))?;
//! issuer::sign_csr(
//!     Path::new("output/usb.csr"),
//!     Path::new("cert/ca.crt"),
//!     Path::new("cert/ca.key"),
//!     Path::new("output/usb_cert.pem"),
//!     365,
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Handing the Certificate to the Partition Script
//!
//! ```rust,no_run
//! use std::path::Path;
//! use usbcert::action::{PartitionAction, SystemExecutor};
//!
//! # fn main() -> Result<(), usbcert::error::UsbCertError> {
//! let action = PartitionAction::builder()
//!     .script("./usbPartition.sh")
//!     .elevate("sudo")
//!     .build();
//! action.run(&SystemExecutor, Path::new("/dev/sdb"), Path::new("output/usb_cert.pem"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every stage fails fast with the most specific error kind:
//!
//! ```rust
//! use std::path::Path;
//! use usbcert::{error::ErrorKind, issuer};
//!
//! let result = issuer::sign_csr(
//!     Path::new("does/not/exist.csr"),
//!     Path::new("cert/ca.crt"),
//!     Path::new("cert/ca.key"),
//!     Path::new("output/usb_cert.pem"),
//!     365,
//! );
//! match result {
//!     Ok(_) => println!("issued"),
//!     Err(e) if e.kind() == ErrorKind::CsrLoad => println!("no request: {}", e),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`device`]: The device identity model
//! - [`sanitize`]: Subject component sanitizing
//! - [`key`]: Key generation, loading and signing
//! - [`csr`]: Certificate signing requests
//! - [`cert`]: Issued certificates, subjects, extensions and validity
//! - [`issuer`]: The certificate authority and CSR signing
//! - [`pipeline`]: Key, request and certificate in one call
//! - [`action`]: The downstream partition script
//! - [`discovery`]: Devices reported by USBGuard
//! - [`storage`]: Atomic file writes
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod action;
pub mod cert;
pub mod csr;
pub mod device;
pub mod discovery;
pub mod error;
pub mod issuer;
pub mod key;
pub mod pipeline;
pub mod sanitize;
pub mod storage;
pub mod tbs_certificate;
