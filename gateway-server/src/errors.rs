use axum::response::IntoResponse;
use axum::Json;
use gateway_store::DeviceId;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Why a bearer credential was refused. Callers only ever see the fixed
/// reason; the underlying cause is logged where the rejection happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationFailure {
    /// No token, or a token the credential store does not know
    InvalidRequest,
    /// The credential's client is unknown or has no redirect URI
    UnauthorizedClient,
    /// The credential has expired
    InvalidGrant,
}

impl AuthorizationFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::InvalidGrant => "invalid_grant",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest | Self::InvalidGrant => StatusCode::UNAUTHORIZED,
            Self::UnauthorizedClient => StatusCode::FORBIDDEN,
        }
    }
}

/// Errors produced while serving a device resource request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("The bearer credential was rejected")]
    Unauthorized(AuthorizationFailure),

    #[error("device with ID {id} does not exist")]
    DeviceNotFound { id: DeviceId },

    #[error("No Devices")]
    NoDevices,

    #[error("'{0}' is not a valid device id")]
    InvalidDeviceId(String),

    #[error("Post not allowed in /devices endpoint, a device id is required")]
    TargetRequired,

    #[error("Action not allowed {action} for device {id}")]
    ActionNotAllowed { id: DeviceId, action: String },

    #[error("Malformed action request: {0}")]
    MalformedBody(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(failure) => failure.status_code(),
            Self::DeviceNotFound { .. } | Self::NoDevices => StatusCode::NOT_FOUND,
            Self::InvalidDeviceId(_) | Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::TargetRequired | Self::ActionNotAllowed { .. } => {
                StatusCode::METHOD_NOT_ALLOWED
            }
        }
    }

    /// Machine-readable error code placed in the `error` field
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(failure) => failure.code(),
            Self::DeviceNotFound { .. } => "not_found",
            Self::NoDevices => "no_devices",
            Self::InvalidDeviceId(_) | Self::MalformedBody(_) => "invalid_request",
            Self::TargetRequired | Self::ActionNotAllowed { .. } => "method_not_allowed",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();
        let mut body = json!({
            "error": self.error_code(),
            "error_description": self.to_string(),
        });
        match &self {
            Self::ActionNotAllowed { id, action } => {
                body["device_id"] = json!(id);
                body["action"] = json!(action);
            }
            Self::DeviceNotFound { id } => {
                body["device_id"] = json!(id);
            }
            _ => {}
        }
        (status_code, Json(body)).into_response()
    }
}
