use std::fmt;
use thiserror::Error;

/// The kind of record a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Device,
    AuthorizationCode,
    AccessToken,
    RefreshToken,
    Client,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Device => "device",
            Self::AuthorizationCode => "authorization code",
            Self::AccessToken => "access token",
            Self::RefreshToken => "refresh token",
            Self::Client => "client",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid device id {id}: allocated ids only go up to {high_water}")]
    Integrity { id: u64, high_water: u64 },

    #[error("{kind} '{key}' does not exist")]
    NotFound { kind: RecordKind, key: String },
}

impl StoreError {
    pub fn not_found(kind: RecordKind, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
