//! OAuth 2.0 configuration

use chrono::Duration;
use confique::Config;

/// OAuth 2.0 configuration
#[derive(Debug, Config, Clone)]
pub struct OAuthConfig {
    /// Authorization code lifetime in seconds (default: 250)
    #[config(env = "THINGS_OAUTH_AUTH_CODE_TTL", default = 250)]
    pub auth_code_ttl: u64,

    /// Access token lifetime in seconds (default: 3600 = 1 hour)
    #[config(env = "THINGS_OAUTH_ACCESS_TOKEN_TTL", default = 3600)]
    pub access_token_ttl: u64,

    /// Accept token requests sent as GET with query parameters (default: true)
    #[config(env = "THINGS_OAUTH_ALLOW_GET_TOKEN", default = true)]
    pub allow_get_token: bool,

    /// Accept client_secret as a request parameter, not only via HTTP Basic
    /// (default: true)
    #[config(env = "THINGS_OAUTH_SECRET_IN_PARAMS", default = true)]
    pub secret_in_params: bool,
}

/// Longest accepted code or token lifetime in seconds (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

impl OAuthConfig {
    /// Reject lifetimes that cannot be added to a timestamp
    pub fn validate(&self) -> Result<(), String> {
        for (name, ttl) in [
            ("auth_code_ttl", self.auth_code_ttl),
            ("access_token_ttl", self.access_token_ttl),
        ] {
            if ttl > MAX_TTL_SECS {
                return Err(format!(
                    "oauth.{name} must be at most {MAX_TTL_SECS} seconds, got {ttl}"
                ));
            }
        }
        Ok(())
    }

    pub fn auth_code_lifetime(&self) -> Duration {
        lifetime(self.auth_code_ttl)
    }

    pub fn access_token_lifetime(&self) -> Duration {
        lifetime(self.access_token_ttl)
    }
}

// Saturates at MAX_TTL_SECS for configurations built without `validate`
fn lifetime(secs: u64) -> Duration {
    i64::try_from(secs.min(MAX_TTL_SECS))
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::zero())
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            auth_code_ttl: 250,
            access_token_ttl: 3600,
            allow_get_token: true,
            secret_in_params: true,
        }
    }
}
