//! Resource authorization pipeline.
//!
//! Every device request goes through the same steps: extract the bearer
//! token, resolve it to an access credential, check the credential's client
//! binding and expiry, then serve the read or authorize the requested action
//! against the device whitelist. The first failing step ends the request.
//!
//! The pipeline only authorizes and acknowledges actions. It never changes
//! device state, and it never holds the credential store lock and the registry
//! lock at the same time.

use crate::clock::Clock;
use crate::errors::{AuthorizationFailure, GatewayError};
use crate::state::AppState;
use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_store::{AccessCredential, CredentialStore, Device, DeviceId, DeviceRegistry};
use http::header::AUTHORIZATION;
use http::HeaderMap;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// List devices or fetch one
    Read,
    /// Submit an action against a device
    Write,
}

/// Transport-independent shape of a device request
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub bearer: Option<String>,
    pub verb: Verb,
    /// Raw target identifier as it appeared in the request path
    pub target: Option<String>,
    pub body: Bytes,
}

impl ResourceRequest {
    /// Build a request from HTTP parts. The `Authorization: Bearer` header
    /// wins over the `access_token` query parameter.
    pub fn from_parts(
        headers: &HeaderMap,
        access_token: Option<String>,
        verb: Verb,
        target: Option<String>,
        body: Bytes,
    ) -> Self {
        let bearer =
            bearer_token(headers).or_else(|| access_token.filter(|token| !token.is_empty()));
        Self {
            bearer,
            verb,
            target,
            body,
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Body of an action submission
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActionRequest {
    /// Name of the action to perform, matched case-sensitively. A missing
    /// field reads as the empty action, which no device allows.
    #[serde(default, alias = "Action")]
    pub action: String,
}

/// Acknowledgement of an authorized action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActionAck {
    /// Identifier of the target device
    pub id: DeviceId,
    /// The action that was authorized
    pub action: String,
}

/// `{"data": ...}` wrapper around read results
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceResponse {
    Devices(Vec<Device>),
    Device(Device),
    Acknowledged(ActionAck),
}

impl IntoResponse for ResourceResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Devices(data) => Json(DataEnvelope { data }).into_response(),
            Self::Device(data) => Json(DataEnvelope { data }).into_response(),
            Self::Acknowledged(ack) => Json(ack).into_response(),
        }
    }
}

pub struct ResourcePipeline<'a> {
    credentials: &'a CredentialStore,
    registry: &'a DeviceRegistry,
    clock: &'a dyn Clock,
}

impl<'a> ResourcePipeline<'a> {
    pub fn new(
        credentials: &'a CredentialStore,
        registry: &'a DeviceRegistry,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            credentials,
            registry,
            clock,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(&state.credentials, &state.registry, state.clock.as_ref())
    }

    /// Run the whole pipeline for one request
    pub fn handle(&self, request: &ResourceRequest) -> Result<ResourceResponse, GatewayError> {
        let credential = self.authorize(request.bearer.as_deref())?;
        debug!(
            "Bearer credential accepted for client '{}'",
            credential.client_id
        );
        self.dispatch(request)
    }

    /// Validate a bearer token and return the credential it stands for
    pub fn authorize(&self, bearer: Option<&str>) -> Result<AccessCredential, GatewayError> {
        let Some(token) = bearer.filter(|token| !token.is_empty()) else {
            warn!("Resource request without bearer token");
            return Err(reject(AuthorizationFailure::InvalidRequest));
        };

        let credential = self.credentials.load_credential(token).map_err(|err| {
            if err.is_not_found() {
                warn!("Bearer token does not match any access credential");
            } else {
                error!("Access credential lookup failed: {err}");
            }
            reject(AuthorizationFailure::InvalidRequest)
        })?;

        match self.credentials.get_client(&credential.client_id) {
            Ok(client) if !client.redirect_uri.is_empty() => {}
            Ok(client) => {
                warn!("Client '{}' has no registered redirect URI", client.id);
                return Err(reject(AuthorizationFailure::UnauthorizedClient));
            }
            Err(err) => {
                warn!("Access credential bound to unusable client: {err}");
                return Err(reject(AuthorizationFailure::UnauthorizedClient));
            }
        }

        if credential.is_expired_at(self.clock.now()) {
            warn!(
                "Access credential for client '{}' expired at {}",
                credential.client_id, credential.expires_at
            );
            return Err(reject(AuthorizationFailure::InvalidGrant));
        }

        Ok(credential)
    }

    fn dispatch(&self, request: &ResourceRequest) -> Result<ResourceResponse, GatewayError> {
        let target = request
            .target
            .as_deref()
            .map(parse_device_id)
            .transpose()?;

        match (request.verb, target) {
            (Verb::Read, None) => {
                let devices = self.registry.list();
                if devices.is_empty() {
                    return Err(GatewayError::NoDevices);
                }
                Ok(ResourceResponse::Devices(devices))
            }
            (Verb::Read, Some(id)) => self.find(id).map(ResourceResponse::Device),
            (Verb::Write, None) => Err(GatewayError::TargetRequired),
            (Verb::Write, Some(id)) => {
                let device = self.find(id)?;
                let action = decode_action(&request.body)?;
                if !device.permits(&action) {
                    warn!("Action '{action}' is not whitelisted for device {id}");
                    return Err(GatewayError::ActionNotAllowed { id, action });
                }
                info!("Action '{action}' authorized for device {id}");
                Ok(ResourceResponse::Acknowledged(ActionAck { id, action }))
            }
        }
    }

    fn find(&self, id: DeviceId) -> Result<Device, GatewayError> {
        self.registry
            .find(id)
            .map_err(|_| GatewayError::DeviceNotFound { id })
    }
}

fn reject(failure: AuthorizationFailure) -> GatewayError {
    GatewayError::Unauthorized(failure)
}

fn parse_device_id(raw: &str) -> Result<DeviceId, GatewayError> {
    match raw.parse::<DeviceId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(GatewayError::InvalidDeviceId(raw.to_string())),
    }
}

fn decode_action(body: &[u8]) -> Result<String, GatewayError> {
    let malformed = |err: serde_json::Error| GatewayError::MalformedBody(err.to_string());
    // Serde reads a one-field struct from a sequence too; only objects are action bodies
    let object = serde_json::from_slice::<Map<String, Value>>(body).map_err(malformed)?;
    serde_json::from_value::<ActionRequest>(Value::Object(object))
        .map(|request| request.action)
        .map_err(malformed)
}
