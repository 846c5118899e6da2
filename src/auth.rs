//! Caller identity resolution.
//!
//! Teledrop is a single-operator service.  Token issuance (login, JWT
//! refresh, API keys) lives outside the core; the core only needs to
//! know whether a request is the operator, a stranger with credentials,
//! or anonymous.  [`IdentityVerifier`] is the pluggable seam; the
//! default implementation compares a static bearer/cookie token in
//! constant time.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;

/// The resolved identity of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// Authenticated as the configured operator.  The operator owns
    /// every drop, including anonymously-created ones.
    Owner,
    /// Credentials were presented but do not resolve to the operator.
    Other,
    /// No credentials at all.
    Anonymous,
}

impl Caller {
    pub fn is_owner(&self) -> bool {
        matches!(self, Caller::Owner)
    }

    /// Whether the request carried any credentials, valid or not.
    pub fn presented_credentials(&self) -> bool {
        !matches!(self, Caller::Anonymous)
    }
}

/// Resolves request headers to a [`Caller`].
pub trait IdentityVerifier: Send + Sync + 'static {
    fn resolve(&self, headers: &HeaderMap) -> Caller;
}

/// Verifier comparing a configured operator token against the
/// `Authorization: Bearer` header or the session cookie.
pub struct StaticTokenVerifier {
    token: String,
    cookie_name: String,
}

impl StaticTokenVerifier {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self {
            token: cfg.operator_token.clone(),
            cookie_name: cfg.cookie_name.clone(),
        }
    }

    /// Pull the candidate token out of the request, if any.
    fn extract_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim());
            }
            // An Authorization header in any other shape still counts as
            // presented credentials.
            return Some(value);
        }

        headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .and_then(|cookies| {
                cookies.split(';').find_map(|pair| {
                    let (name, value) = pair.trim().split_once('=')?;
                    (name == self.cookie_name).then_some(value)
                })
            })
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn resolve(&self, headers: &HeaderMap) -> Caller {
        match self.extract_token(headers) {
            Some(candidate) if constant_time_eq(candidate, &self.token) => Caller::Owner,
            Some(_) => Caller::Other,
            None => Caller::Anonymous,
        }
    }
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}
