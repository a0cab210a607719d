//! apisign - sign and verify API requests from the command line.
//!
//! # Usage
//!
//! ```text
//! apisign canonicalize --method GET --host api.example.com --path /v1/orders Nonce=42
//! apisign sign --key-id abc123 --algorithm hmac_sha256 --host api.example.com --path /v1/orders status=open
//! apisign verify --algorithm hmac_sha256 --host api.example.com --path /v1/orders KeyID=abc123 ...
//! ```
//!
//! `verify` with `debug=1` and `APISIGN_RUN_MODE=debug` prints an issued
//! `Timestamp`/`Nonce`/`Signature` triple instead of a verdict.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `APISIGN_RUN_MODE` | `release` | `debug` enables debug issuance |
//! | `APISIGN_SIGNATURE_LIFETIME` | `300` | Lifetime window in seconds |
//! | `APISIGN_REPLAY_PROTECTION` | `false` | Track nonces to reject replays |
//! | `APISIGN_NONCE_CAPACITY` | `100000` | Nonces tracked before purging |
//! | `APISIGN_KEYS_FILE` | `keys.json` | Key registry file (overridden by `--keys`) |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use apisign_auth::verifier::{KEY_ID_PARAM, NONCE_PARAM, TIMESTAMP_PARAM};
use apisign_auth::{
    KeyRegistry, Outcome, SignatureAlgorithm, SigningRequest, StaticKeyRegistry, Verifier, engine,
};
use apisign_core::ApiSignConfig;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "apisign", version, about = "Canonicalize, sign and verify API requests")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the canonical string for a request
    Canonicalize {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Sign a request and print the complete parameter set
    Sign {
        /// Key registry file (defaults to APISIGN_KEYS_FILE)
        #[arg(long)]
        keys: Option<PathBuf>,
        /// Caller to sign as
        #[arg(long)]
        key_id: String,
        /// Signature algorithm
        #[arg(long)]
        algorithm: SignatureAlgorithm,
        /// Unix timestamp to sign with (defaults to now)
        #[arg(long)]
        at: Option<i64>,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Verify a signed request
    Verify {
        /// Key registry file (defaults to APISIGN_KEYS_FILE)
        #[arg(long)]
        keys: Option<PathBuf>,
        /// Signature algorithm the endpoint expects
        #[arg(long)]
        algorithm: SignatureAlgorithm,
        /// Unix time to verify at (defaults to now)
        #[arg(long)]
        at: Option<i64>,
        #[command(flatten)]
        request: RequestArgs,
    },
}

/// The request being canonicalized, signed or verified.
#[derive(Debug, Args)]
struct RequestArgs {
    /// HTTP method
    #[arg(long, default_value = "GET")]
    method: String,
    /// Host, optionally with a port
    #[arg(long)]
    host: String,
    /// Matched route template, e.g. /v1/orders/:id
    #[arg(long)]
    path: String,
    /// Request parameters as KEY=VALUE
    #[arg(value_parser = parse_param)]
    params: Vec<(String, String)>,
}

impl RequestArgs {
    fn to_request(&self) -> SigningRequest {
        SigningRequest::new(
            self.method.as_str(),
            self.host.as_str(),
            self.path.as_str(),
            self.params.iter().cloned(),
        )
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
/// Logs go to stderr so command output stays on stdout.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn load_registry(keys: Option<PathBuf>, config: &ApiSignConfig) -> Result<StaticKeyRegistry> {
    let path = keys.unwrap_or_else(|| PathBuf::from(&config.keys_file));
    let registry = StaticKeyRegistry::from_json_file(&path)
        .with_context(|| format!("failed to load key registry from {}", path.display()))?;
    info!(path = %path.display(), callers = registry.len(), "loaded key registry");
    Ok(registry)
}

/// Sign `request` as `key_id`, returning every parameter the caller must send.
fn sign_request(
    registry: &dyn KeyRegistry,
    key_id: &str,
    algorithm: SignatureAlgorithm,
    mut request: SigningRequest,
    timestamp: i64,
    nonce: i64,
) -> Result<BTreeMap<String, String>> {
    request.set_param(KEY_ID_PARAM, key_id);
    request.set_param(TIMESTAMP_PARAM, timestamp.to_string());
    request.set_param(NONCE_PARAM, nonce.to_string());

    let record = registry.lookup(key_id)?;
    let secret = record.secret_for(algorithm)?;
    let canonical = request.canonical_string();
    debug!(canonical, %algorithm, "signing canonical string");
    let signature = engine::generate(&canonical, &secret)?;

    let mut params: BTreeMap<String, String> = request
        .params()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
    params.insert("Signature".to_owned(), signature);
    Ok(params)
}

/// Verify `request`, returning the line to print on success.
fn verify_request(
    verifier: &Verifier,
    algorithm: SignatureAlgorithm,
    request: &SigningRequest,
    now: i64,
) -> Result<String> {
    match verifier.verify_at(request, algorithm, now) {
        Ok(Outcome::Accepted { key_id }) => Ok(format!("accepted: KeyID={key_id}")),
        Ok(Outcome::DebugIssued(issued)) => {
            serde_json::to_string_pretty(&issued).context("failed to serialize issued signature")
        }
        Err(err) => bail!("request rejected [{}]: {err}", err.kind()),
    }
}

fn fresh_nonce() -> i64 {
    i64::from(rand::random::<u32>()).max(1)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ApiSignConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.log_level)?;

    match cli.command {
        Command::Canonicalize { request } => {
            println!("{}", request.to_request().canonical_string());
        }
        Command::Sign {
            keys,
            key_id,
            algorithm,
            at,
            request,
        } => {
            let registry = load_registry(keys, &config)?;
            let timestamp = at.unwrap_or_else(|| chrono::Utc::now().timestamp());
            let params = sign_request(
                &registry,
                &key_id,
                algorithm,
                request.to_request(),
                timestamp,
                fresh_nonce(),
            )?;
            println!(
                "{}",
                serde_json::to_string_pretty(&params).context("failed to serialize parameters")?
            );
        }
        Command::Verify {
            keys,
            algorithm,
            at,
            request,
        } => {
            let registry = load_registry(keys, &config)?;
            let verifier = Verifier::from_config(&config, Arc::new(registry));
            info!(mode = %config.run_mode, %algorithm, "verifying request");
            let now = at.unwrap_or_else(|| chrono::Utc::now().timestamp());
            println!("{}", verify_request(&verifier, algorithm, &request.to_request(), now)?);
        }
    }

    Ok(())
}
