//! Request verification.
//!
//! [`Verifier::verify`] runs a request through:
//!
//! 1. Parameter extraction: `KeyID` is always required; `Timestamp`, `Nonce`
//!    and `Signature` are required unless debug issuance was requested.
//! 2. Caller lookup and secret resolution for the endpoint's algorithm.
//! 3. Debug issuance (debug deployment mode only), which signs the request on
//!    the caller's behalf and returns the signing parameters instead of
//!    verifying anything.
//! 4. Freshness: the timestamp may not be in the future or at least one
//!    lifetime window old.
//! 5. Canonicalization and signature check.
//! 6. Nonce replay check, when a [`NonceStore`] is configured.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use apisign_core::{ApiSignConfig, DeploymentMode};
use chrono::Utc;
use tracing::{debug, warn};

use crate::algorithm::SignatureAlgorithm;
use crate::canonical::SIGNATURE_PARAM;
use crate::engine;
use crate::error::AuthError;
use crate::nonce::{InMemoryNonceStore, NonceStore};
use crate::registry::{KeyRegistry, SigningSecret};
use crate::request::SigningRequest;

/// Name of the caller identity parameter.
pub const KEY_ID_PARAM: &str = "KeyID";

/// Name of the timestamp parameter (unix seconds).
pub const TIMESTAMP_PARAM: &str = "Timestamp";

/// Name of the nonce parameter.
pub const NONCE_PARAM: &str = "Nonce";

/// Debug nonces are drawn from `1..DEBUG_NONCE_BOUND`.
const DEBUG_NONCE_BOUND: u32 = 100_000;

/// Signing parameters produced by debug issuance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IssuedSignature {
    /// Unix timestamp that was signed.
    pub timestamp: String,
    /// Nonce that was signed.
    pub nonce: String,
    /// The signature.
    pub signature: String,
}

impl IssuedSignature {
    /// The triple as a map keyed by `Timestamp`, `Nonce` and `Signature`.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (TIMESTAMP_PARAM, self.timestamp.clone()),
            (NONCE_PARAM, self.nonce.clone()),
            (SIGNATURE_PARAM, self.signature.clone()),
        ])
    }
}

/// Successful verification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The signature is valid; the request may proceed.
    Accepted {
        /// The authenticated caller.
        key_id: String,
    },
    /// Debug issuance: the caller receives signing parameters to replay.
    DebugIssued(IssuedSignature),
}

/// Required parameters of a non-debug request.
#[derive(Debug)]
struct PublicParams<'a> {
    timestamp: i64,
    nonce: i64,
    signature: &'a str,
}

/// Verifies signed requests against a key registry.
#[derive(Clone)]
pub struct Verifier {
    registry: Arc<dyn KeyRegistry>,
    mode: DeploymentMode,
    lifetime_secs: i64,
    nonce_store: Option<Arc<dyn NonceStore>>,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("mode", &self.mode)
            .field("lifetime_secs", &self.lifetime_secs)
            .field("replay_protection", &self.nonce_store.is_some())
            .finish_non_exhaustive()
    }
}

impl Verifier {
    /// Create a verifier without nonce replay tracking.
    #[must_use]
    pub fn new(registry: Arc<dyn KeyRegistry>, mode: DeploymentMode, lifetime: Duration) -> Self {
        Self {
            registry,
            mode,
            lifetime_secs: i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX),
            nonce_store: None,
        }
    }

    /// Create a verifier from process configuration. Replay protection uses an
    /// [`InMemoryNonceStore`] sized by the configured capacity.
    #[must_use]
    pub fn from_config(config: &ApiSignConfig, registry: Arc<dyn KeyRegistry>) -> Self {
        let verifier = Self::new(registry, config.run_mode, config.signature_lifetime());
        if config.replay_protection {
            verifier.with_nonce_store(Arc::new(InMemoryNonceStore::new(config.nonce_capacity)))
        } else {
            verifier
        }
    }

    /// Reject nonces already accepted within the lifetime window.
    #[must_use]
    pub fn with_nonce_store(mut self, store: Arc<dyn NonceStore>) -> Self {
        self.nonce_store = Some(store);
        self
    }

    /// Deployment mode this verifier runs in.
    #[must_use]
    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Verify a request against the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] describing why the request was rejected.
    pub fn verify(
        &self,
        request: &SigningRequest,
        algorithm: SignatureAlgorithm,
    ) -> Result<Outcome, AuthError> {
        self.verify_at(request, algorithm, Utc::now().timestamp())
    }

    /// Verify a request as if the current unix time were `now`.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] describing why the request was rejected.
    pub fn verify_at(
        &self,
        request: &SigningRequest,
        algorithm: SignatureAlgorithm,
        now: i64,
    ) -> Result<Outcome, AuthError> {
        let key_id = required(request, KEY_ID_PARAM)?;
        let params = if request.is_debug() {
            None
        } else {
            Some(extract_public_params(request)?)
        };

        let record = self.registry.lookup(key_id)?;
        let secret = record.secret_for(algorithm)?;

        let Some(params) = params else {
            if !self.mode.allows_debug_issuance() {
                warn!(key_id, mode = %self.mode, "debug signature requested outside debug mode");
                return Err(AuthError::DebugForbidden);
            }
            return self.issue_debug_signature(request, &secret, now);
        };

        debug!(
            key_id,
            %algorithm,
            timestamp = params.timestamp,
            nonce = params.nonce,
            "verifying request signature"
        );

        check_freshness(params.timestamp, now, self.lifetime_secs)?;

        let canonical = request.canonical_string();
        debug!(canonical, "built canonical string");

        engine::verify(&canonical, &secret, params.signature)?;

        if let Some(store) = &self.nonce_store {
            let expires_at = params.timestamp.saturating_add(self.lifetime_secs);
            store.check_and_insert(key_id, params.nonce, now, expires_at)?;
        }

        debug!(key_id, "request signature accepted");
        Ok(Outcome::Accepted {
            key_id: key_id.to_owned(),
        })
    }

    /// Sign the request on the caller's behalf with a fresh timestamp and nonce.
    ///
    /// The nonce comes from the thread-local generator and is only suitable for
    /// test tooling.
    fn issue_debug_signature(
        &self,
        request: &SigningRequest,
        secret: &SigningSecret<'_>,
        now: i64,
    ) -> Result<Outcome, AuthError> {
        let timestamp = now.to_string();
        let nonce = (rand::random::<u32>() % (DEBUG_NONCE_BOUND - 1) + 1).to_string();

        let mut signed = request.clone();
        signed.set_param(TIMESTAMP_PARAM, timestamp.clone());
        signed.set_param(NONCE_PARAM, nonce.clone());

        let canonical = signed.canonical_string();
        let signature = engine::generate(&canonical, secret)?;

        debug!(canonical, algorithm = %secret.algorithm(), "issued debug signature");
        Ok(Outcome::DebugIssued(IssuedSignature {
            timestamp,
            nonce,
            signature,
        }))
    }
}

/// Reject timestamps in the future or at least `lifetime_secs` old.
///
/// # Errors
///
/// Returns [`AuthError::SignatureExpired`] outside the window.
///
/// # Examples
///
/// ```
/// use apisign_auth::verifier::check_freshness;
///
/// assert!(check_freshness(1_000, 1_299, 300).is_ok());
/// assert!(check_freshness(1_000, 1_300, 300).is_err());
/// assert!(check_freshness(1_001, 1_000, 300).is_err());
/// ```
pub fn check_freshness(timestamp: i64, now: i64, lifetime_secs: i64) -> Result<(), AuthError> {
    if timestamp > now || now.saturating_sub(timestamp) >= lifetime_secs {
        debug!(timestamp, now, lifetime_secs, "signature outside lifetime window");
        return Err(AuthError::SignatureExpired);
    }
    Ok(())
}

fn required<'a>(request: &'a SigningRequest, name: &str) -> Result<&'a str, AuthError> {
    request
        .param(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::Validation(format!("{name} is required")))
}

fn required_integer(request: &SigningRequest, name: &str) -> Result<i64, AuthError> {
    required(request, name)?
        .parse::<i64>()
        .map_err(|_| AuthError::Validation(format!("{name} must be an integer")))
}

fn extract_public_params(request: &SigningRequest) -> Result<PublicParams<'_>, AuthError> {
    let timestamp = required_integer(request, TIMESTAMP_PARAM)?;
    let nonce = required_integer(request, NONCE_PARAM)?;
    if nonce == 0 {
        return Err(AuthError::Validation(format!("{NONCE_PARAM} is required")));
    }
    let signature = required(request, SIGNATURE_PARAM)?;

    Ok(PublicParams {
        timestamp,
        nonce,
        signature,
    })
}
