//! Credential Handling
//!
//! The gateway never owns raw credentials. It holds [`ApiKey`] references
//! captured at registry-load time and resolves them through a
//! [`CredentialStore`], which is the boundary to whatever vault the host
//! application uses. The store contract is deliberately minimal:
//! `get(provider_id) -> secret | none`.
//!
//! # Redaction
//!
//! `ApiKey` redacts itself in `Debug` and `Display` so keys cannot leak
//! through logs, error messages, or derived `Debug` output on the types
//! that embed it.

use std::fmt;

/// An opaque secret reference.
///
/// Wraps the raw key material and exposes it only through
/// [`ApiKey::expose`], which adapters call at request-build time.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap raw key material.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// An empty key, used for models whose credential has not resolved.
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Whether any key material is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Access the raw key material.
    ///
    /// Only adapters should call this, and only to build the
    /// authorization header of an outgoing request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "ApiKey(<unset>)")
        } else {
            write!(f, "ApiKey(<redacted>)")
        }
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

/// Boundary contract to the host's credential vault.
pub trait CredentialStore: Send + Sync {
    /// Look up the secret for a provider id. `None` when the vault has
    /// no entry; the model stays registered but disabled-by-default in
    /// the fallback config path.
    fn get(&self, provider_id: &str) -> Option<ApiKey>;
}

/// Credential store backed by environment variables.
///
/// Resolves `<PROVIDER_ID>_API_KEY` with the provider id uppercased,
/// e.g. `deepseek` -> `DEEPSEEK_API_KEY`.
#[derive(Clone, Debug, Default)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    /// Create an environment-backed store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn var_name(provider_id: &str) -> String {
        format!("{}_API_KEY", provider_id.to_uppercase().replace('-', "_"))
    }
}

impl CredentialStore for EnvCredentialStore {
    fn get(&self, provider_id: &str) -> Option<ApiKey> {
        std::env::var(Self::var_name(provider_id))
            .ok()
            .filter(|v| !v.is_empty())
            .map(ApiKey::new)
    }
}
