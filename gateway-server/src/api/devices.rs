use crate::errors::GatewayError;
use crate::headers::presets;
use crate::openapi::DEVICES_TAG;
use crate::pipeline::{
    ActionAck, ActionRequest, ResourcePipeline, ResourceRequest, ResourceResponse, Verb,
};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use gateway_store::Device;
use serde::Deserialize;

/// Bearer token passed as a query parameter instead of a header
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AccessTokenQuery {
    access_token: Option<String>,
}

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices).post(submit_without_target))
        .route("/devices/{id}", get(get_device).post(submit_action))
}

fn run(state: &AppState, request: ResourceRequest) -> Response {
    let result: Result<ResourceResponse, GatewayError> =
        ResourcePipeline::from_state(state).handle(&request);
    let mut response = result.into_response();
    presets::private_short(0).apply(&mut response);
    response
}

#[utoipa::path(
    get,
    path = "/devices",
    tag = DEVICES_TAG,
    params(
        ("Authorization" = Option<String>, Header, description = "Bearer access token"),
        ("access_token" = Option<String>, Query, description = "Access token, when no header is sent"),
    ),
    responses(
        (status = 200, description = "All devices in id order, wrapped in {\"data\": [...]}", body = [Device]),
        (status = 401, description = "Missing, unknown or expired token"),
        (status = 403, description = "Token bound to an unusable client"),
        (status = 404, description = "The registry is empty")
    )
)]
pub(crate) async fn list_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AccessTokenQuery>,
) -> Response {
    let request =
        ResourceRequest::from_parts(&headers, query.access_token, Verb::Read, None, Bytes::new());
    run(&state, request)
}

#[utoipa::path(
    get,
    path = "/devices/{id}",
    tag = DEVICES_TAG,
    params(
        ("id" = u64, Path, description = "Device identifier"),
        ("Authorization" = Option<String>, Header, description = "Bearer access token"),
        ("access_token" = Option<String>, Query, description = "Access token, when no header is sent"),
    ),
    responses(
        (status = 200, description = "The device, wrapped in {\"data\": ...}", body = Device),
        (status = 400, description = "Malformed device id"),
        (status = 401, description = "Missing, unknown or expired token"),
        (status = 404, description = "No such device")
    )
)]
pub(crate) async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<AccessTokenQuery>,
) -> Response {
    let request = ResourceRequest::from_parts(
        &headers,
        query.access_token,
        Verb::Read,
        Some(id),
        Bytes::new(),
    );
    run(&state, request)
}

#[utoipa::path(
    post,
    path = "/devices",
    tag = DEVICES_TAG,
    request_body = ActionRequest,
    responses(
        (status = 401, description = "Missing, unknown or expired token"),
        (status = 405, description = "A device id is required to submit an action")
    )
)]
pub(crate) async fn submit_without_target(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AccessTokenQuery>,
    body: Bytes,
) -> Response {
    let request =
        ResourceRequest::from_parts(&headers, query.access_token, Verb::Write, None, body);
    run(&state, request)
}

#[utoipa::path(
    post,
    path = "/devices/{id}",
    tag = DEVICES_TAG,
    request_body = ActionRequest,
    params(
        ("id" = u64, Path, description = "Device identifier"),
        ("Authorization" = Option<String>, Header, description = "Bearer access token"),
    ),
    responses(
        (status = 200, description = "Action authorized", body = ActionAck),
        (status = 400, description = "Malformed device id or body"),
        (status = 401, description = "Missing, unknown or expired token"),
        (status = 404, description = "No such device"),
        (status = 405, description = "Action not whitelisted for the device")
    )
)]
pub(crate) async fn submit_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<AccessTokenQuery>,
    body: Bytes,
) -> Response {
    let request =
        ResourceRequest::from_parts(&headers, query.access_token, Verb::Write, Some(id), body);
    run(&state, request)
}
