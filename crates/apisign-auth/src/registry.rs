//! Key registry trait and implementations.
//!
//! This module defines the [`KeyRegistry`] trait for resolving a caller's
//! [`CallerRecord`] from its key ID, along with a [`StaticKeyRegistry`] that is
//! populated once at startup (in code or from a JSON key file) and only read
//! afterwards.
//!
//! A record holds at most one secret per algorithm family. The
//! [`CallerRecord::secret_for`] lookup hands the signature engine a
//! [`SigningSecret`] whose variant already carries the secret shape the family
//! needs, so dispatch is checked exhaustively at compile time.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::algorithm::{HmacDigest, SignatureAlgorithm};
use crate::error::AuthError;

/// AES-GCM key material, 16 (AES-128) or 32 (AES-256) bytes long.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey(Vec<u8>);

impl CipherKey {
    /// Create a cipher key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] unless the key is 16 or 32 bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, AuthError> {
        let bytes = bytes.into();
        match bytes.len() {
            16 | 32 => Ok(Self(bytes)),
            n => Err(AuthError::InvalidKeyMaterial(format!(
                "cipher key must be 16 or 32 bytes, got {n}"
            ))),
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherKey(<{} bytes>)", self.0.len())
    }
}

/// Ed25519 key material for the asymmetric family.
///
/// The verifying (public) key is always present and is the only key used to
/// validate a caller-produced signature. The signing (private) key is optional:
/// the server holds it only for callers that may use debug issuance, and a
/// client-side registry holds it to produce signatures.
#[derive(Clone)]
pub struct AsymmetricKey {
    verifying: VerifyingKey,
    signing: Option<SigningKey>,
}

impl AsymmetricKey {
    /// Key material that can only verify.
    #[must_use]
    pub fn from_verifying_key(verifying: VerifyingKey) -> Self {
        Self {
            verifying,
            signing: None,
        }
    }

    /// Key material that can sign and verify; the public half is derived.
    #[must_use]
    pub fn from_signing_key(signing: SigningKey) -> Self {
        Self {
            verifying: signing.verifying_key(),
            signing: Some(signing),
        }
    }

    /// Parse hex-encoded 32-byte keys.
    ///
    /// At least one of the keys must be given. When both are given the public
    /// key must be the one derived from the private key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] for bad hex, wrong lengths, an
    /// invalid curve point, or a mismatched pair.
    pub fn from_hex(public: Option<&str>, private: Option<&str>) -> Result<Self, AuthError> {
        let signing = private
            .map(|hex_key| decode_key_bytes(hex_key, "private").map(|b| SigningKey::from_bytes(&b)))
            .transpose()?;

        match (public, signing) {
            (Some(hex_key), signing) => {
                let bytes = decode_key_bytes(hex_key, "public")?;
                let verifying = VerifyingKey::from_bytes(&bytes).map_err(|e| {
                    AuthError::InvalidKeyMaterial(format!("public key is not a valid point: {e}"))
                })?;
                if let Some(signing) = &signing {
                    if signing.verifying_key() != verifying {
                        return Err(AuthError::InvalidKeyMaterial(
                            "public key does not match private key".to_owned(),
                        ));
                    }
                }
                Ok(Self { verifying, signing })
            }
            (None, Some(signing)) => Ok(Self::from_signing_key(signing)),
            (None, None) => Err(AuthError::InvalidKeyMaterial(
                "asymmetric key requires a public or private key".to_owned(),
            )),
        }
    }

    /// The verifying (public) key.
    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying
    }

    /// The signing (private) key, if held.
    #[must_use]
    pub fn signing_key(&self) -> Option<&SigningKey> {
        self.signing.as_ref()
    }
}

impl fmt::Debug for AsymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsymmetricKey")
            .field("verifying", &hex::encode(self.verifying.as_bytes()))
            .field("has_signing_key", &self.signing.is_some())
            .finish()
    }
}

fn decode_key_bytes(hex_key: &str, which: &str) -> Result<[u8; 32], AuthError> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| AuthError::InvalidKeyMaterial(format!("{which} key is not hex: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        AuthError::InvalidKeyMaterial(format!(
            "{which} key must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}

/// The secret a single algorithm family needs, borrowed from a [`CallerRecord`].
#[derive(Clone, Copy)]
pub enum SigningSecret<'a> {
    /// Salt wrapped around the canonical string before hashing.
    HashSymmetric(&'a str),
    /// AES-GCM key.
    CipherSymmetric(&'a CipherKey),
    /// Ed25519 key material.
    Asymmetric(&'a AsymmetricKey),
    /// HMAC key together with the selected digest.
    KeyedHash(HmacDigest, &'a str),
}

impl SigningSecret<'_> {
    /// The algorithm this secret is used with.
    #[must_use]
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::HashSymmetric(_) => SignatureAlgorithm::HashSymmetric,
            Self::CipherSymmetric(_) => SignatureAlgorithm::CipherSymmetric,
            Self::Asymmetric(_) => SignatureAlgorithm::Asymmetric,
            Self::KeyedHash(digest, _) => SignatureAlgorithm::KeyedHash(*digest),
        }
    }
}

impl fmt::Debug for SigningSecret<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret({}, <redacted>)", self.algorithm())
    }
}

/// Everything the registry knows about one caller.
#[derive(Clone)]
pub struct CallerRecord {
    key_id: String,
    hash_secret: Option<String>,
    cipher_key: Option<CipherKey>,
    asymmetric_key: Option<AsymmetricKey>,
    hmac_secret: Option<String>,
}

impl CallerRecord {
    /// Create a record with no secrets configured.
    #[must_use]
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            hash_secret: None,
            cipher_key: None,
            asymmetric_key: None,
            hmac_secret: None,
        }
    }

    /// Set the salted-digest secret.
    #[must_use]
    pub fn with_hash_secret(mut self, secret: impl Into<String>) -> Self {
        self.hash_secret = Some(secret.into());
        self
    }

    /// Set the AES-GCM key.
    #[must_use]
    pub fn with_cipher_key(mut self, key: CipherKey) -> Self {
        self.cipher_key = Some(key);
        self
    }

    /// Set the Ed25519 key material.
    #[must_use]
    pub fn with_asymmetric_key(mut self, key: AsymmetricKey) -> Self {
        self.asymmetric_key = Some(key);
        self
    }

    /// Set the HMAC key shared by all keyed-hash digests.
    #[must_use]
    pub fn with_hmac_secret(mut self, secret: impl Into<String>) -> Self {
        self.hmac_secret = Some(secret.into());
        self
    }

    /// The caller's key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Resolve the secret for the given algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnsupportedAlgorithm`] if the caller has no secret
    /// configured for the algorithm's family.
    pub fn secret_for(&self, algorithm: SignatureAlgorithm) -> Result<SigningSecret<'_>, AuthError> {
        let secret = match algorithm {
            SignatureAlgorithm::HashSymmetric => {
                self.hash_secret.as_deref().map(SigningSecret::HashSymmetric)
            }
            SignatureAlgorithm::CipherSymmetric => {
                self.cipher_key.as_ref().map(SigningSecret::CipherSymmetric)
            }
            SignatureAlgorithm::Asymmetric => {
                self.asymmetric_key.as_ref().map(SigningSecret::Asymmetric)
            }
            SignatureAlgorithm::KeyedHash(digest) => self
                .hmac_secret
                .as_deref()
                .map(|secret| SigningSecret::KeyedHash(digest, secret)),
        };

        secret.ok_or_else(|| {
            AuthError::UnsupportedAlgorithm(format!(
                "{algorithm} is not configured for KeyID '{}'",
                self.key_id
            ))
        })
    }
}

impl fmt::Debug for CallerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerRecord")
            .field("key_id", &self.key_id)
            .field("hash_secret", &self.hash_secret.is_some())
            .field("cipher_key", &self.cipher_key)
            .field("asymmetric_key", &self.asymmetric_key)
            .field("hmac_secret", &self.hmac_secret.is_some())
            .finish()
    }
}

/// Trait for looking up caller records by key ID.
///
/// Implementations may back this with a database, configuration file,
/// or any other key store. Lookups must be safe to run concurrently.
pub trait KeyRegistry: Send + Sync {
    /// Retrieve the record for the given key ID.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownCaller`] if the key ID is not recognized.
    fn lookup(&self, key_id: &str) -> Result<Arc<CallerRecord>, AuthError>;
}

/// A simple in-memory key registry backed by a `HashMap`.
///
/// # Examples
///
/// ```
/// use apisign_auth::registry::{CallerRecord, KeyRegistry, StaticKeyRegistry};
///
/// let registry = StaticKeyRegistry::new(vec![
///     CallerRecord::new("abc123").with_hash_secret("s3cr3t"),
/// ]);
///
/// let record = registry.lookup("abc123").unwrap();
/// assert_eq!(record.key_id(), "abc123");
/// assert!(registry.lookup("nobody").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticKeyRegistry {
    callers: HashMap<String, Arc<CallerRecord>>,
}

/// On-disk key file layout.
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyFile {
    callers: Vec<KeyFileEntry>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyFileEntry {
    key_id: String,
    #[serde(default)]
    hash_secret: Option<String>,
    #[serde(default)]
    cipher_key: Option<String>,
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
    #[serde(default)]
    hmac_secret: Option<String>,
}

impl TryFrom<KeyFileEntry> for CallerRecord {
    type Error = AuthError;

    fn try_from(entry: KeyFileEntry) -> Result<Self, Self::Error> {
        if entry.key_id.is_empty() {
            return Err(AuthError::InvalidKeyMaterial("empty key_id".to_owned()));
        }

        let mut record = Self::new(entry.key_id);
        if let Some(secret) = entry.hash_secret {
            record = record.with_hash_secret(secret);
        }
        if let Some(key) = entry.cipher_key {
            record = record.with_cipher_key(CipherKey::new(key.into_bytes())?);
        }
        if entry.public_key.is_some() || entry.private_key.is_some() {
            record = record.with_asymmetric_key(AsymmetricKey::from_hex(
                entry.public_key.as_deref(),
                entry.private_key.as_deref(),
            )?);
        }
        if let Some(secret) = entry.hmac_secret {
            record = record.with_hmac_secret(secret);
        }
        Ok(record)
    }
}

impl StaticKeyRegistry {
    /// Create a new registry from caller records. A later record with the same
    /// key ID replaces an earlier one.
    pub fn new(records: impl IntoIterator<Item = CallerRecord>) -> Self {
        Self {
            callers: records
                .into_iter()
                .map(|record| (record.key_id.clone(), Arc::new(record)))
                .collect(),
        }
    }

    /// Parse a registry from a JSON key file document.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] if the document is malformed,
    /// a key ID appears twice, or any secret fails validation.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let file: KeyFile = serde_json::from_str(json)
            .map_err(|e| AuthError::InvalidKeyMaterial(format!("malformed key file: {e}")))?;

        let mut callers = HashMap::with_capacity(file.callers.len());
        for entry in file.callers {
            let record = CallerRecord::try_from(entry)?;
            let key_id = record.key_id.clone();
            if callers.insert(key_id.clone(), Arc::new(record)).is_some() {
                return Err(AuthError::InvalidKeyMaterial(format!(
                    "duplicate key_id '{key_id}'"
                )));
            }
        }

        Ok(Self { callers })
    }

    /// Read and parse a JSON key file.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if the file cannot be read, otherwise
    /// see [`StaticKeyRegistry::from_json`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Internal(format!("reading {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Number of registered callers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callers.len()
    }

    /// Whether the registry has no callers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

impl KeyRegistry for StaticKeyRegistry {
    fn lookup(&self, key_id: &str) -> Result<Arc<CallerRecord>, AuthError> {
        self.callers
            .get(key_id)
            .cloned()
            .ok_or_else(|| AuthError::UnknownCaller(key_id.to_owned()))
    }
}
