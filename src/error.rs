//! Gateway Error Taxonomy
//!
//! Every failure the gateway can surface is a structured value in one of
//! two layers:
//!
//! - [`ProviderError`]: a classified failure from a single provider call.
//!   These are recovered locally during failover and only surfaced when
//!   no candidate remains.
//! - [`GatewayError`]: the caller-facing error returned by gateway
//!   operations. Validation and not-found errors surface immediately;
//!   provider failures are aggregated into
//!   [`GatewayError::AllProvidersFailed`] after the failover pass.

use thiserror::Error;

/// A classified failure from a single provider call.
///
/// Adapters never raise uncaught faults: every outcome of a provider
/// call is either a normalized response or one of these variants.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Authentication rejected (401/403, missing or invalid key)
    #[error("authentication failed")]
    Auth,

    /// Provider rate limit hit (429)
    #[error("rate limited{}", retry_after_ms.map(|ms| format!(", retry after {ms}ms")).unwrap_or_default())]
    RateLimited {
        /// Retry-After hint from the provider, if present
        retry_after_ms: Option<u64>,
    },

    /// The call exceeded its timeout and was abandoned
    #[error("request timed out")]
    Timeout,

    /// Provider-side failure (5xx or connection-level)
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code, 0 for connection-level failures
        status: u16,
        /// Provider-supplied error body or transport error text
        message: String,
    },

    /// Response arrived but could not be decoded into the normalized shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// A provider error attributed to the model whose adapter produced it.
///
/// `AllProvidersFailed` carries one of these per attempted candidate,
/// in attempt order.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{model_id}: {error}")]
pub struct AttemptError {
    /// Model whose dispatch failed
    pub model_id: String,
    /// The classified failure
    pub error: ProviderError,
}

/// Caller-facing errors from gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid input (duplicate model id, empty capability set, ...)
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced model id does not exist (or is disabled where an
    /// enabled model is required)
    #[error("model not found: {0}")]
    NotFound(String),

    /// The enabled set is empty; routing has nothing to rank
    #[error("no models available for routing")]
    NoModelsAvailable,

    /// A single provider call failed outside of a failover pass
    /// (explicit model override path)
    #[error("provider call to '{model_id}' failed: {source}")]
    Provider {
        /// Model whose dispatch failed
        model_id: String,
        /// The classified failure
        source: ProviderError,
    },

    /// Every candidate in the failover pass failed. Contains one entry
    /// per attempted candidate, in attempt order.
    #[error("all {} provider(s) failed: {}", .0.len(), format_attempts(.0))]
    AllProvidersFailed(Vec<AttemptError>),
}

fn format_attempts(attempts: &[AttemptError]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the config file failed
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file was not valid TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but violated a registry invariant
    #[error("invalid config: {0}")]
    Invalid(String),
}
