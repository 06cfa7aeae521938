use std::fs;
use std::path::Path;

use const_oid::db::rfc5912;
use der::Encode;
use p256::ecdsa::{
    Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey,
};
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, LineEnding};
use rand_core::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::{debug, info};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::{Result, UsbCertError};
use crate::storage;

/// Smallest RSA modulus accepted for a device key.
pub const MIN_KEY_BITS: usize = 1024;
/// Modulus size callers should use unless they have a reason not to.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Signature algorithms this crate produces and verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRsa,
    /// SHA-256 with ECDSA.
    Sha256WithEcdsa,
}

impl SignatureAlgorithm {
    /// Maps an algorithm identifier back to a supported algorithm.
    pub fn from_identifier(id: &AlgorithmIdentifierOwned) -> Option<Self> {
        match id.oid {
            rfc5912::SHA_256_WITH_RSA_ENCRYPTION => Some(SignatureAlgorithm::Sha256WithRsa),
            rfc5912::ECDSA_WITH_SHA_256 => Some(SignatureAlgorithm::Sha256WithEcdsa),
            _ => None,
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            // RFC 4055 requires an explicit NULL parameter for RSA.
            SignatureAlgorithm::Sha256WithRsa => AlgorithmIdentifierOwned {
                oid: rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(der::asn1::Any::null()),
            },
            SignatureAlgorithm::Sha256WithEcdsa => AlgorithmIdentifierOwned {
                oid: rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
        }
    }
}

/// An asymmetric key pair.
///
/// Device keys are always RSA. CA keys may also be ECDSA P-256.
#[derive(Debug, Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    ///
    /// Sizes below [`MIN_KEY_BITS`] are rejected with a configuration error.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        if bits < MIN_KEY_BITS {
            return Err(UsbCertError::ConfigError(format!(
                "RSA key size {bits} is below the minimum of {MIN_KEY_BITS} bits"
            )));
        }
        let mut rng = OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Parses an unencrypted PEM private key.
    ///
    /// Accepts PKCS#8 (`PRIVATE KEY`, RSA or P-256), PKCS#1 (`RSA PRIVATE KEY`)
    /// and SEC1 (`EC PRIVATE KEY`, P-256) encodings.
    pub fn from_pem(pem_text: &str) -> std::result::Result<Self, String> {
        let block = pem::parse(pem_text).map_err(|e| e.to_string())?;
        let der = block.contents();
        match block.tag() {
            "PRIVATE KEY" => match RsaPrivateKey::from_pkcs8_der(der) {
                Ok(private) => Ok(Self::from_rsa(private)),
                Err(rsa_err) => P256SigningKey::from_pkcs8_der(der)
                    .map(Self::from_p256)
                    .map_err(|_| format!("unsupported PKCS#8 key: {rsa_err}")),
            },
            "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(der)
                .map(Self::from_rsa)
                .map_err(|e| e.to_string()),
            "EC PRIVATE KEY" => p256::SecretKey::from_sec1_der(der)
                .map(|secret| Self::from_p256(P256SigningKey::from(secret)))
                .map_err(|e| e.to_string()),
            "ENCRYPTED PRIVATE KEY" => Err("encrypted private keys are not supported".to_string()),
            other => Err(format!("unexpected PEM label {other:?}")),
        }
    }

    /// Reads and parses a PEM private key file.
    pub(crate) fn read_pem_file(path: &Path) -> std::result::Result<Self, String> {
        let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::from_pem(&text)
    }

    /// Writes the private key as unencrypted PKCS#8 PEM, readable by the owner only.
    pub fn write_pkcs8_pem(&self, path: &Path) -> Result<()> {
        let pem = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_pem(LineEnding::LF),
            KeyPair::EcdsaP256 { signing_key, .. } => signing_key.to_pkcs8_pem(LineEnding::LF),
        }
        .map_err(|e| UsbCertError::KeyGenerationError(e.to_string()))?;
        storage::write_atomic(path, pem.as_bytes(), storage::PRIVATE_FILE_MODE)
    }

    fn from_rsa(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }

    fn from_p256(signing_key: P256SigningKey) -> Self {
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Bit length of the RSA modulus, `None` for elliptic curve keys.
    pub fn modulus_bits(&self) -> Option<usize> {
        match self {
            KeyPair::Rsa { public, .. } => Some(public.n().bits()),
            KeyPair::EcdsaP256 { .. } => None,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
        }
    }

    /// The algorithm used when this key signs.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRsa,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithEcdsa,
        }
    }

    /// Signs `data` with SHA-256. ECDSA signatures are DER encoded.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key = pkcs1v15::SigningKey::<Sha256>::new(private.as_ref().clone());
                let signature = signing_key
                    .try_sign(data)
                    .map_err(|e| UsbCertError::SignError(e.to_string()))?;
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: P256Signature = signing_key
                    .try_sign(data)
                    .map_err(|e| UsbCertError::SignError(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

/// The public half of a [`KeyPair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        key_pair.public_key()
    }

    /// Decodes a subject public key info; RSA and P-256 keys are supported.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> std::result::Result<Self, String> {
        let der = spki.to_der().map_err(|e| e.to_string())?;
        match spki.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => RsaPublicKey::from_public_key_der(&der)
                .map(PublicKey::Rsa)
                .map_err(|e| e.to_string()),
            rfc5912::ID_EC_PUBLIC_KEY => P256VerifyingKey::from_public_key_der(&der)
                .map(PublicKey::EcdsaP256)
                .map_err(|e| e.to_string()),
            other => Err(format!("unsupported public key algorithm {other}")),
        }
    }

    pub fn to_spki(&self) -> std::result::Result<SubjectPublicKeyInfoOwned, String> {
        match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            PublicKey::EcdsaP256(verifying_key) => SubjectPublicKeyInfoOwned::from_key(*verifying_key),
        }
        .map_err(|e| e.to_string())
    }

    /// Verifies `signature` over `data` with the given algorithm.
    pub fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        data: &[u8],
        signature: &[u8],
    ) -> std::result::Result<(), String> {
        match (self, algorithm) {
            (PublicKey::Rsa(public), SignatureAlgorithm::Sha256WithRsa) => {
                let verifying_key = pkcs1v15::VerifyingKey::<Sha256>::new(public.clone());
                let signature =
                    pkcs1v15::Signature::try_from(signature).map_err(|e| e.to_string())?;
                verifying_key
                    .verify(data, &signature)
                    .map_err(|e| e.to_string())
            }
            (PublicKey::EcdsaP256(verifying_key), SignatureAlgorithm::Sha256WithEcdsa) => {
                let signature = P256Signature::from_der(signature).map_err(|e| e.to_string())?;
                verifying_key
                    .verify(data, &signature)
                    .map_err(|e| e.to_string())
            }
            (_, algorithm) => Err(format!("{algorithm:?} does not match the key type")),
        }
    }
}

/// Generates a fresh RSA key and writes it to `path` as PKCS#8 PEM with mode 0600.
///
/// Missing parent directories are created on a best-effort basis.
pub fn generate_key_file(path: &Path, bits: usize) -> Result<KeyPair> {
    let key_pair = KeyPair::generate_rsa(bits)?;
    storage::ensure_parent_dir(path);
    key_pair.write_pkcs8_pem(path)?;
    info!(path = %path.display(), bits, "generated device key");
    Ok(key_pair)
}

/// Loads a device private key, failing with [`UsbCertError::KeyLoadError`].
pub fn load_private_key(path: &Path) -> Result<KeyPair> {
    debug!(path = %path.display(), "loading device key");
    KeyPair::read_pem_file(path).map_err(|reason| UsbCertError::KeyLoadError {
        path: path.to_path_buf(),
        reason,
    })
}
