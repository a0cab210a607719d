//! Request signing and signature verification for apisign.
//!
//! Callers sign every request with a secret agreed with the server and send the
//! signature along with a `KeyID`, a unix `Timestamp` and a `Nonce`. The server
//! rebuilds the same canonical string from the request it received and checks
//! the signature with the caller's key material.
//!
//! # Overview
//!
//! Six algorithms are supported: salted MD5 (`md5`), AES-GCM encryption of the
//! canonical string (`aes`), Ed25519 (`ed25519`) and HMAC over MD5, SHA-1 or
//! SHA-256 (`hmac_md5`, `hmac_sha1`, `hmac_sha256`). The algorithm is chosen per
//! endpoint, never by the caller.
//!
//! In debug deployments a caller may send `debug=1` instead of a signature to
//! receive a valid `Timestamp`/`Nonce`/`Signature` triple for the request.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use apisign_auth::registry::{CallerRecord, StaticKeyRegistry};
//! use apisign_auth::{DeploymentMode, HmacDigest, SignatureAlgorithm, SigningRequest, Verifier};
//!
//! let registry = StaticKeyRegistry::new(vec![
//!     CallerRecord::new("abc123").with_hmac_secret("k3y"),
//! ]);
//! let verifier = Verifier::new(
//!     Arc::new(registry),
//!     DeploymentMode::Release,
//!     Duration::from_secs(300),
//! );
//!
//! let request = SigningRequest::new(
//!     "GET",
//!     "api.example.com",
//!     "/v1/orders",
//!     [("KeyID", "abc123"), ("Timestamp", "1700000000"), ("Nonce", "42")],
//! );
//! // No signature yet: the request is rejected before any crypto runs.
//! assert!(verifier.verify(&request, SignatureAlgorithm::KeyedHash(HmacDigest::Sha256)).is_err());
//! ```
//!
//! # Modules
//!
//! - [`algorithm`] - Signature algorithm identifiers
//! - [`canonical`] - Canonical string construction
//! - [`engine`] - Signature generation and comparison per algorithm
//! - [`error`] - Authentication error types
//! - [`nonce`] - Nonce replay tracking
//! - [`registry`] - Caller key material and lookup
//! - [`request`] - Request context supplied by the HTTP layer
//! - [`verifier`] - The verification flow

pub mod algorithm;
pub mod canonical;
pub mod engine;
pub mod error;
pub mod nonce;
pub mod registry;
pub mod request;
pub mod verifier;

pub use algorithm::{HmacDigest, SignatureAlgorithm};
pub use apisign_core::DeploymentMode;
pub use canonical::canonicalize;
pub use error::{AuthError, ErrorKind};
pub use nonce::{InMemoryNonceStore, NonceStore};
pub use registry::{CallerRecord, KeyRegistry, StaticKeyRegistry};
pub use request::SigningRequest;
pub use verifier::{IssuedSignature, Outcome, Verifier, check_freshness};
