//! Configuration and shared error types for apisign.
//!
//! This crate holds the process-level settings that drive request signature
//! verification: the deployment mode that gates debug signature issuance, the
//! signature lifetime window, and whether nonce replay tracking is enabled.

mod config;
mod error;

pub use config::{ApiSignConfig, DeploymentMode};
pub use error::{ApiSignError, ApiSignResult};
