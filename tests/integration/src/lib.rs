//! Integration tests for apisign.
//!
//! These tests drive the public API end to end: a key file on disk, environment
//! configuration, HTTP request parts and the verifier, with no mocks in between.
//!
//! Run them with:
//! ```text
//! cargo test -p apisign-integration
//! ```

use std::io::Write;
use std::sync::{Arc, Once};

use apisign_auth::{SignatureAlgorithm, SigningRequest, StaticKeyRegistry, Verifier};
use apisign_core::ApiSignConfig;
use tempfile::NamedTempFile;

mod test_http;
mod test_key_file;
mod test_replay;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Fixed "current" time used by every scenario.
pub const NOW: i64 = 1_700_000_000;

/// Seed of the Ed25519 key held by the `abc123` fixture caller.
pub const ED25519_SEED: [u8; 32] = [7u8; 32];

/// Key file with one caller configured for every algorithm family and one
/// caller holding only a verifying key.
#[must_use]
pub fn key_file_json() -> String {
    let private_key = hex::encode(ED25519_SEED);
    let public_key = hex::encode(
        apisign_auth::registry::AsymmetricKey::from_hex(None, Some(&private_key))
            .expect("derive fixture public key")
            .verifying_key()
            .to_bytes(),
    );

    serde_json::json!({
        "callers": [
            {
                "key_id": "abc123",
                "hash_secret": "s3cr3t",
                "cipher_key": "0123456789abcdef0123456789abcdef",
                "private_key": private_key,
                "hmac_secret": "k3y"
            },
            {
                "key_id": "verify-only",
                "public_key": public_key
            }
        ]
    })
    .to_string()
}

/// Write the fixture key file to a temporary path.
#[must_use]
pub fn write_key_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp key file");
    file.write_all(key_file_json().as_bytes())
        .expect("write temp key file");
    file
}

/// Load configuration from `(name, value)` pairs, as if they were the
/// environment.
#[must_use]
pub fn config_from(vars: &[(&str, &str)]) -> ApiSignConfig {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    ApiSignConfig::from_lookup(|name| {
        vars.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    })
    .expect("valid test configuration")
}

/// Build a verifier the way a service would at startup: configuration from the
/// environment, registry from the configured key file.
#[must_use]
pub fn verifier_from(vars: &[(&str, &str)]) -> (Verifier, NamedTempFile) {
    init_tracing();

    let key_file = write_key_file();
    let path = key_file.path().to_string_lossy().into_owned();
    let mut vars = vars.to_vec();
    vars.push(("APISIGN_KEYS_FILE", &path));
    let config = config_from(&vars);

    let registry = StaticKeyRegistry::from_json_file(&config.keys_file).expect("load key file");
    (Verifier::from_config(&config, Arc::new(registry)), key_file)
}

/// Sign `request` for `abc123` with a fixed timestamp and nonce, returning the
/// request with `Signature` set.
#[must_use]
pub fn sign_as_abc123(
    mut request: SigningRequest,
    algorithm: SignatureAlgorithm,
    timestamp: i64,
    nonce: i64,
) -> SigningRequest {
    use apisign_auth::KeyRegistry;

    let registry = StaticKeyRegistry::from_json(&key_file_json()).expect("parse key file");
    let record = registry.lookup("abc123").expect("fixture caller");
    let secret = record.secret_for(algorithm).expect("fixture secret");

    request.set_param("KeyID", "abc123");
    request.set_param("Timestamp", timestamp.to_string());
    request.set_param("Nonce", nonce.to_string());
    let signature = apisign_auth::engine::generate(&request.canonical_string(), &secret)
        .expect("sign fixture request");
    request.set_param("Signature", signature);
    request
}
