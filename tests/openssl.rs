mod util;

use std::fs;

use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509, X509NameRef, X509Req, X509StoreContext};
use usbcert::pipeline::{IssuanceConfig, IssuancePaths, issue_certificate};

fn entry(name: &X509NameRef, nid: Nid) -> String {
    name.entries_by_nid(nid)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap()
        .to_string()
}

fn issue(ca: &util::TestCa, out: &tempfile::TempDir) -> IssuancePaths {
    let paths = ca.paths(out.path());
    // openssl's default security level rejects 1024-bit RSA in chains
    issue_certificate(&util::flash_drive(), &paths, &IssuanceConfig::default()).unwrap();
    paths
}

#[test]
fn test_openssl_crate_validate_cert() {
    let ca = util::rsa_ca();
    let out = tempfile::tempdir().unwrap();
    let paths = issue(&ca, &out);

    let x509 = X509::from_pem(&fs::read(&paths.cert).unwrap()).expect("Failed to parse PEM");
    let ca_x509 = X509::from_pem(&fs::read(ca.cert_path()).unwrap()).unwrap();

    // Check subject
    assert_eq!(entry(x509.subject_name(), Nid::COMMONNAME), "SN987654321");
    assert_eq!(entry(x509.subject_name(), Nid::ORGANIZATIONNAME), "My USB Flash");
    assert_eq!(entry(x509.subject_name(), Nid::ORGANIZATIONALUNITNAME), "usb");

    // Check issuer
    assert_eq!(entry(x509.issuer_name(), Nid::COMMONNAME), util::CA_COMMON_NAME);

    assert_eq!(x509.version(), 2, "X509 version should be 3 (0-based index)");
    assert_eq!(
        x509.signature_algorithm().object().nid(),
        Nid::SHA256WITHRSAENCRYPTION
    );

    // Signature and chain
    assert!(x509.verify(&ca_x509.public_key().unwrap()).unwrap());

    let mut store = X509StoreBuilder::new().unwrap();
    store.add_cert(ca_x509).unwrap();
    let store = store.build();
    let mut context = X509StoreContext::new().unwrap();
    let chain: Stack<X509> = Stack::new().unwrap();
    let verified = context
        .init(&store, &x509, &chain, |c| c.verify_cert())
        .unwrap();
    assert!(verified, "chain verification failed");

    // The certificate carries the device key
    let device_key = PKey::private_key_from_pem(&fs::read(&paths.key).unwrap()).unwrap();
    assert_eq!(device_key.bits(), 2048);
    assert!(x509.public_key().unwrap().public_eq(&device_key));
}

#[test]
fn test_openssl_reads_csr() {
    let ca = util::rsa_ca();
    let out = tempfile::tempdir().unwrap();
    let paths = issue(&ca, &out);

    let req = X509Req::from_pem(&fs::read(&paths.csr).unwrap()).unwrap();
    assert!(req.verify(&req.public_key().unwrap()).unwrap());
    assert_eq!(entry(req.subject_name(), Nid::COMMONNAME), "SN987654321");
}

#[test]
fn test_openssl_text_output() {
    let ca = util::rsa_ca();
    let out = tempfile::tempdir().unwrap();
    let paths = issue(&ca, &out);

    let x509 = X509::from_pem(&fs::read(&paths.cert).unwrap()).unwrap();
    let text = String::from_utf8(x509.to_text().unwrap()).unwrap();

    assert!(text.contains("CA:FALSE"), "basicConstraints missing:\n{text}");
    assert!(text.contains("Digital Signature, Key Encipherment"));
    assert!(text.contains("TLS Web Client Authentication"));
}

#[test]
fn test_openssl_validates_p256_signature() {
    let ca = util::p256_ca();
    let out = tempfile::tempdir().unwrap();
    let paths = issue(&ca, &out);

    let x509 = X509::from_pem(&fs::read(&paths.cert).unwrap()).unwrap();
    let ca_x509 = X509::from_pem(&fs::read(ca.cert_path()).unwrap()).unwrap();
    assert_eq!(x509.signature_algorithm().object().nid(), Nid::ECDSA_WITH_SHA256);
    assert!(x509.verify(&ca_x509.public_key().unwrap()).unwrap());
}
