//! OAuth 2.0 data models and request/response structures

use gateway_store::AccessCredential;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// OAuth 2.0 Authorization Request (Authorization Code Flow)
#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthorizationRequest {
    /// Response type - must be "code"
    #[serde(default)]
    pub response_type: String,
    /// Client identifier
    #[serde(default)]
    pub client_id: String,
    /// Redirect URI; the registered one is used when omitted
    #[serde(default)]
    pub redirect_uri: String,
    /// Requested scope
    pub scope: Option<String>,
    /// State parameter echoed back to the client
    pub state: Option<String>,
}

/// OAuth 2.0 Authorization Error, delivered as redirect query parameters
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizationError {
    /// Error code
    pub error: String,
    /// Human-readable error description
    pub error_description: Option<String>,
    /// State parameter (if provided in request)
    pub state: Option<String>,
}

/// OAuth 2.0 Token Request for the authorization_code and refresh_token grants.
/// Accepted as a form body or, when enabled, as GET query parameters.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// "authorization_code" or "refresh_token"
    #[serde(default)]
    pub grant_type: String,
    /// Client identifier, unless sent via HTTP Basic
    pub client_id: Option<String>,
    /// Client secret, unless sent via HTTP Basic
    pub client_secret: Option<String>,
    /// Authorization code (authorization_code grant)
    pub code: Option<String>,
    /// Redirect URI used in the authorization request (authorization_code grant)
    pub redirect_uri: Option<String>,
    /// Refresh token (refresh_token grant)
    pub refresh_token: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// The access token string
    pub access_token: String,
    /// Token type - always "Bearer"
    pub token_type: String,
    /// Token expiration in seconds
    pub expires_in: u64,
    /// Refresh token that can be exchanged for a new access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scope
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub scope: String,
}

impl TokenResponse {
    pub fn from_credential(credential: &AccessCredential, expires_in: u64) -> Self {
        Self {
            access_token: credential.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: credential.refresh_token().map(str::to_string),
            scope: credential.scope.clone(),
        }
    }
}

/// OAuth 2.0 Token Revocation Request (RFC 7009)
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevocationRequest {
    /// The access or refresh token to revoke
    #[serde(default)]
    pub token: String,
    /// Optional hint; both token kinds are looked up regardless
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Query of the demo application callback
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

/// Body returned by the demo application callback
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackResponse {
    /// The authorization code, URL-escaped
    pub auth_code: String,
    /// Ready-made token request exchanging the code
    pub token_url: String,
}

/// OAuth 2.0 Error Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OAuthError {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthError {
    fn new(error: &str, description: &str) -> Self {
        Self {
            error: error.to_string(),
            error_description: Some(description.to_string()),
        }
    }

    /// Create an invalid_request error
    pub fn invalid_request(description: &str) -> Self {
        Self::new("invalid_request", description)
    }

    /// Create an invalid_client error
    pub fn invalid_client(description: &str) -> Self {
        Self::new("invalid_client", description)
    }

    /// Create an invalid_grant error
    pub fn invalid_grant(description: &str) -> Self {
        Self::new("invalid_grant", description)
    }

    /// Create an unauthorized_client error
    pub fn unauthorized_client(description: &str) -> Self {
        Self::new("unauthorized_client", description)
    }

    /// Create an unsupported_grant_type error
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            "unsupported_grant_type",
            "Supported grant types: authorization_code, refresh_token",
        )
    }

    /// Create a server_error
    pub fn server_error(description: &str) -> Self {
        Self::new("server_error", description)
    }
}

impl AuthorizationError {
    fn new(error: &str, description: &str, state: Option<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: Some(description.to_string()),
            state,
        }
    }

    /// Create an unsupported_response_type error for authorization
    pub fn unsupported_response_type(state: Option<String>) -> Self {
        Self::new(
            "unsupported_response_type",
            "Only 'code' response type is supported",
            state,
        )
    }

    /// Create a server_error for authorization
    pub fn server_error(description: &str, state: Option<String>) -> Self {
        Self::new("server_error", description, state)
    }
}
