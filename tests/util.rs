#![allow(dead_code)]

use std::path::PathBuf;

use der::asn1::BitString;
use der::{Encode, EncodePem};
use tempfile::TempDir;
use usbcert::cert::Validity;
use usbcert::cert::extensions::{BasicConstraints, ExtensionParam, KeyUsage, KeyUsages};
use usbcert::cert::subject::DeviceSubject;
use usbcert::device::DeviceIdentity;
use usbcert::key::KeyPair;
use usbcert::pipeline::IssuancePaths;
use usbcert::tbs_certificate::{TbsCertificate, issuance_serial};
use x509_cert::certificate::CertificateInner;

pub const CA_COMMON_NAME: &str = "usbcert test CA";

/// A throwaway CA written to `ca.crt` and `ca.key` in its own directory.
pub struct TestCa {
    pub dir: TempDir,
    pub cert: x509_cert::Certificate,
    pub key: KeyPair,
}

impl TestCa {
    pub fn cert_path(&self) -> PathBuf {
        self.dir.path().join("ca.crt")
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.path().join("ca.key")
    }

    /// Issuance paths with outputs under `out_dir` and this CA as trust anchor.
    pub fn paths(&self, out_dir: &std::path::Path) -> IssuancePaths {
        IssuancePaths::in_dirs(out_dir, self.dir.path())
    }
}

pub fn generate_ca_cert(key: &KeyPair) -> x509_cert::Certificate {
    let name = DeviceSubject::builder()
        .common_name(CA_COMMON_NAME.to_string())
        .organization("usbcert tests".to_string())
        .build()
        .as_x509_name()
        .unwrap();

    let validity = Validity::for_days(3650).unwrap();
    let tbs_cert = TbsCertificate {
        serial_number: issuance_serial(validity.not_before),
        signature_algorithm: key.signature_algorithm(),
        issuer: name.clone(),
        validity,
        subject: name,
        subject_public_key_info: key.public_key().to_spki().unwrap(),
        extensions: vec![
            ExtensionParam::encode(
                &BasicConstraints {
                    is_ca: true,
                    max_path_length: None,
                },
                true,
            )
            .unwrap(),
            ExtensionParam::encode(
                &KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign),
                true,
            )
            .unwrap(),
        ],
    };

    let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner().unwrap();
    let signature = key.sign_data(&tbs_cert_inner.to_der().unwrap()).unwrap();

    CertificateInner {
        tbs_certificate: tbs_cert_inner,
        signature_algorithm: key.signature_algorithm().into(),
        signature: BitString::from_bytes(&signature).unwrap(),
    }
}

fn write_ca(key: KeyPair) -> TestCa {
    let dir = tempfile::tempdir().unwrap();
    let cert = generate_ca_cert(&key);
    std::fs::write(
        dir.path().join("ca.crt"),
        cert.to_pem(der::pem::LineEnding::LF).unwrap(),
    )
    .unwrap();
    key.write_pkcs8_pem(&dir.path().join("ca.key")).unwrap();
    TestCa { dir, cert, key }
}

pub fn rsa_ca() -> TestCa {
    write_ca(KeyPair::generate_rsa(2048).unwrap())
}

pub fn p256_ca() -> TestCa {
    write_ca(KeyPair::generate_ecdsa_p256())
}

pub fn flash_drive() -> DeviceIdentity {
    let mut device = DeviceIdentity::new();
    device
        .set_id("048d", "1234")
        .set_name("My USB Flash")
        .set_serial("SN987654321");
    device
}
