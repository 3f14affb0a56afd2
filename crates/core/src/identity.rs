//! Commit identity resolution.
//!
//! The fallback chain is local config, then environment
//! (`RELIC_USER_NAME` / `RELIC_USER_EMAIL`), then nothing. Commit assembly
//! validates identity before touching any content and reports every missing
//! field at once.

use chrono::Utc;
use tracing::debug;

use crate::config::RepoConfig;
use crate::errors::CommitError;
use crate::models::Signature;

/// Environment fallback for the author/committer name.
pub const ENV_USER_NAME: &str = "RELIC_USER_NAME";
/// Environment fallback for the author/committer email.
pub const ENV_USER_EMAIL: &str = "RELIC_USER_EMAIL";

/// Supplies the identity used for new commits.
pub trait IdentityProvider {
    fn user_name(&self) -> Option<String>;
    fn user_email(&self) -> Option<String>;
}

/// Identity from repository config with environment fallback.
pub struct ConfigIdentity<'a> {
    config: &'a RepoConfig,
}

impl<'a> ConfigIdentity<'a> {
    pub fn new(config: &'a RepoConfig) -> Self {
        Self { config }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl IdentityProvider for ConfigIdentity<'_> {
    fn user_name(&self) -> Option<String> {
        non_empty(self.config.user.name.clone())
            .or_else(|| non_empty(std::env::var(ENV_USER_NAME).ok()))
    }

    fn user_email(&self) -> Option<String> {
        non_empty(self.config.user.email.clone())
            .or_else(|| non_empty(std::env::var(ENV_USER_EMAIL).ok()))
    }
}

/// Resolve the full signature for a new commit, or fail fast with every
/// missing field named.
pub fn resolve_signature(provider: &dyn IdentityProvider) -> Result<Signature, CommitError> {
    let name = provider.user_name();
    let email = provider.user_email();

    let mut missing = Vec::new();
    if name.is_none() {
        missing.push("user.name".to_string());
    }
    if email.is_none() {
        missing.push("user.email".to_string());
    }
    if !missing.is_empty() {
        return Err(CommitError::MissingIdentity { fields: missing });
    }

    let signature = Signature {
        name: name.unwrap_or_default(),
        email: email.unwrap_or_default(),
        timestamp: Utc::now(),
    };
    debug!(identity = %signature, "resolved commit identity");
    Ok(signature)
}
