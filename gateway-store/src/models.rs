use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Registry-assigned device identifier. `0` means "not assigned yet".
pub type DeviceId = u64;

/// A monitored device and the actions it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Device {
    /// Identifier assigned by the registry (0 before creation)
    #[serde(default)]
    pub id: DeviceId,
    /// Display name
    pub name: String,
    /// Free-form status, e.g. "active"
    pub status: String,
    /// Last numeric reading reported by the device
    #[serde(default)]
    pub reading: i64,
    /// Action names the device is willing to accept, in declaration order
    #[serde(default)]
    pub actions: Vec<String>,
}

impl Device {
    /// A new, unregistered device with no permitted actions.
    pub fn new(name: impl Into<String>, status: impl Into<String>, reading: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            status: status.into(),
            reading,
            actions: Vec::new(),
        }
    }

    /// Add permitted actions. Duplicates are dropped, first occurrence wins.
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for action in actions {
            let action = action.into();
            if !self.actions.contains(&action) {
                self.actions.push(action);
            }
        }
        self
    }

    /// Case-sensitive exact membership test against the whitelist.
    pub fn permits(&self, action: &str) -> bool {
        self.actions.iter().any(|allowed| allowed == action)
    }
}

/// A registered OAuth client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub secret: String,
    pub redirect_uri: String,
}

impl Client {
    pub fn new(
        id: impl Into<String>,
        secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

/// Authorization code issued by the authorize step, exchanged exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    /// Opaque state echoed back to the client
    pub state: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationGrant {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Access data looked up on every resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessCredential {
    /// The refresh token, if one was issued and is not empty.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|token| !token.is_empty())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whole seconds left before expiry, zero once expired.
    pub fn expires_in(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}
