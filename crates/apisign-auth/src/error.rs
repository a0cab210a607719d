//! Error types for request signature verification.
//!
//! All verification failures are represented by [`AuthError`]. Each variant maps
//! to a fieldless [`ErrorKind`] so the HTTP layer can pick a response code
//! without matching on message text.

use std::fmt;

/// Errors that can occur while signing or verifying a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required request field is missing or malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The key ID was not found in the key registry.
    #[error("KeyID '{0}' not found")]
    UnknownCaller(String),

    /// The algorithm is unknown, or the caller has no secret configured for it.
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A debug signature was requested outside debug deployment mode.
    #[error("debug forbidden in release runmode")]
    DebugForbidden,

    /// The timestamp is in the future or older than the lifetime window.
    #[error("Signature expired")]
    SignatureExpired,

    /// The presented signature does not match the request.
    #[error("Signature invalid")]
    SignatureInvalid,

    /// The presented signature could not be decoded or decrypted.
    #[error("Signature could not be decoded: {0}")]
    CryptoFailure(String),

    /// The nonce was already used by this caller within the lifetime window.
    #[error("Nonce {nonce} already used by KeyID '{key_id}'")]
    NonceReused {
        /// Caller that presented the nonce.
        key_id: String,
        /// The replayed nonce.
        nonce: i64,
    },

    /// Secret material in the key registry is malformed.
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// An unexpected server-side failure, distinct from an authentication failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fieldless classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`AuthError::Validation`].
    ValidationError,
    /// See [`AuthError::UnknownCaller`].
    UnknownCaller,
    /// See [`AuthError::UnsupportedAlgorithm`].
    UnsupportedAlgorithm,
    /// See [`AuthError::DebugForbidden`].
    DebugForbidden,
    /// See [`AuthError::SignatureExpired`].
    SignatureExpired,
    /// See [`AuthError::SignatureInvalid`].
    SignatureInvalid,
    /// See [`AuthError::CryptoFailure`].
    CryptoFailure,
    /// See [`AuthError::NonceReused`].
    NonceReused,
    /// See [`AuthError::InvalidKeyMaterial`].
    InvalidKeyMaterial,
    /// See [`AuthError::Internal`].
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::UnknownCaller => "UnknownCaller",
            Self::UnsupportedAlgorithm => "UnsupportedAlgorithm",
            Self::DebugForbidden => "DebugForbidden",
            Self::SignatureExpired => "SignatureExpired",
            Self::SignatureInvalid => "SignatureInvalid",
            Self::CryptoFailure => "CryptoFailure",
            Self::NonceReused => "NonceReused",
            Self::InvalidKeyMaterial => "InvalidKeyMaterial",
            Self::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuthError {
    /// The classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::UnknownCaller(_) => ErrorKind::UnknownCaller,
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::DebugForbidden => ErrorKind::DebugForbidden,
            Self::SignatureExpired => ErrorKind::SignatureExpired,
            Self::SignatureInvalid => ErrorKind::SignatureInvalid,
            Self::CryptoFailure(_) => ErrorKind::CryptoFailure,
            Self::NonceReused { .. } => ErrorKind::NonceReused,
            Self::InvalidKeyMaterial(_) => ErrorKind::InvalidKeyMaterial,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error is a rejection of the caller's request rather than a
    /// server-side fault.
    ///
    /// Malformed registry material and internal errors are server faults; every
    /// other kind is reported to the caller as a rejection with a reason.
    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(self, Self::InvalidKeyMaterial(_) | Self::Internal(_))
    }
}
