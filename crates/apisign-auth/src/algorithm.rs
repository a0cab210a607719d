//! Signature algorithm selection.
//!
//! The protected endpoint, not the caller, chooses the algorithm. Names are the
//! wire names used in configuration and on the command line:
//!
//! | Name | Family |
//! |------|--------|
//! | `md5` | salted MD5 digest (hash-symmetric) |
//! | `aes` | AES-GCM encryption (cipher-symmetric) |
//! | `ed25519` | Ed25519 signature (asymmetric) |
//! | `hmac_md5`, `hmac_sha1`, `hmac_sha256` | keyed hash |

use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

/// Digest used by the keyed-hash family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HmacDigest {
    /// HMAC-MD5.
    Md5,
    /// HMAC-SHA1.
    Sha1,
    /// HMAC-SHA256.
    Sha256,
}

/// A signature algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// `md5(secret ++ canonical ++ secret)`, hex encoded.
    HashSymmetric,
    /// AES-GCM encryption of the canonical string, base64 encoded.
    CipherSymmetric,
    /// Ed25519 signature of the canonical string, base64 encoded.
    Asymmetric,
    /// HMAC of the canonical string, hex encoded.
    KeyedHash(HmacDigest),
}

impl SignatureAlgorithm {
    /// All supported algorithms.
    pub const ALL: [Self; 6] = [
        Self::HashSymmetric,
        Self::CipherSymmetric,
        Self::Asymmetric,
        Self::KeyedHash(HmacDigest::Md5),
        Self::KeyedHash(HmacDigest::Sha1),
        Self::KeyedHash(HmacDigest::Sha256),
    ];

    /// The wire name of this algorithm.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HashSymmetric => "md5",
            Self::CipherSymmetric => "aes",
            Self::Asymmetric => "ed25519",
            Self::KeyedHash(HmacDigest::Md5) => "hmac_md5",
            Self::KeyedHash(HmacDigest::Sha1) => "hmac_sha1",
            Self::KeyedHash(HmacDigest::Sha256) => "hmac_sha256",
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| AuthError::UnsupportedAlgorithm(s.to_owned()))
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
