//! Broker credential resolution.
//!
//! Config YAML stores only env var **names**; at startup callers resolve
//! those names once via [`resolve_secrets`] and pass the result into broker
//! construction. `Debug` redacts every value — error messages and logs only
//! ever reference the env var name, never its contents.

use anyhow::{bail, Result};

#[derive(Clone)]
pub struct ResolvedSecrets {
    pub broker_api_key: Option<String>,
    pub broker_api_secret: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("broker_api_key", &self.broker_api_key.as_ref().map(|_| "<redacted>"))
            .field("broker_api_secret", &self.broker_api_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Resolve broker secrets from the named environment variables. In `LIVE`
/// mode both must be present; in any other mode missing keys are tolerated
/// (paper/observe runs do not touch a real broker).
pub fn resolve_secrets(
    api_key_env: &str,
    api_secret_env: &str,
    require: bool,
) -> Result<ResolvedSecrets> {
    let key = std::env::var(api_key_env).ok();
    let secret = std::env::var(api_secret_env).ok();

    if require && (key.is_none() || secret.is_none()) {
        bail!(
            "missing required broker credentials: {api_key_env} / {api_secret_env} must both be set"
        );
    }

    Ok(ResolvedSecrets {
        broker_api_key: key,
        broker_api_secret: secret,
    })
}
