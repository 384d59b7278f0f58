//! OAuth 2.0 endpoint handlers

use crate::api::oauth::{
    models::{
        AuthorizationError, AuthorizationRequest, CallbackQuery, CallbackResponse, OAuthError,
        RevocationRequest, TokenRequest, TokenResponse,
    },
    token_manager::{TokenError, TokenManager},
};
use crate::headers::presets;
use crate::openapi::OAUTH_TAG;
use crate::state::AppState;
use axum::{
    extract::{Form, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{error, info, warn};
use url::{form_urlencoded, Url};

/// OAuth 2.0 Authorization endpoint (RFC 6749 Section 4.1.1).
/// There is no login page; every valid request is approved.
#[utoipa::path(
    get,
    path = "/authorize",
    params(
        ("response_type" = String, Query, description = "Must be 'code'"),
        ("client_id" = String, Query, description = "Client identifier"),
        ("redirect_uri" = Option<String>, Query, description = "Redirect URI under the registered one"),
        ("scope" = Option<String>, Query, description = "Requested scope"),
        ("state" = Option<String>, Query, description = "State echoed back to the client")
    ),
    responses(
        (status = 303, description = "Redirect to redirect_uri with code or error"),
        (status = 400, description = "Unknown client or invalid redirect_uri", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn authorize(
    State(state): State<AppState>,
    Query(request): Query<AuthorizationRequest>,
) -> Response {
    info!(
        "OAuth authorization request from client_id: {}",
        request.client_id
    );

    let client = match state.credentials.get_client(&request.client_id) {
        Ok(client) => client,
        Err(e) => {
            warn!("Authorization request rejected: {e}");
            return error_response(
                StatusCode::BAD_REQUEST,
                OAuthError::unauthorized_client("Unknown client_id"),
            );
        }
    };

    let manager = TokenManager::from_state(&state);
    let redirect_uri = match manager.validate_redirect_uri(&client, &request.redirect_uri) {
        Ok(uri) => uri,
        Err(e) => {
            warn!("Authorization request rejected: {e}");
            return error_response(
                StatusCode::BAD_REQUEST,
                OAuthError::invalid_request(&e.to_string()),
            );
        }
    };

    if request.response_type != "code" {
        return redirect_with_error(
            &redirect_uri,
            AuthorizationError::unsupported_response_type(request.state),
        );
    }

    let scope = request.scope.as_deref().unwrap_or_default();
    let grant = match manager.issue_authorization_code(
        &client,
        &redirect_uri,
        scope,
        request.state.clone(),
    ) {
        Ok(grant) => grant,
        Err(e) => {
            error!("Error generating authorization code: {e}");
            return redirect_with_error(
                &redirect_uri,
                AuthorizationError::server_error(
                    "Failed to generate authorization code",
                    request.state,
                ),
            );
        }
    };

    let Ok(mut redirect_url) = Url::parse(&redirect_uri) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("Invalid redirect_uri"),
        );
    };
    redirect_url
        .query_pairs_mut()
        .append_pair("code", &grant.code);
    if let Some(state_val) = &grant.state {
        redirect_url.query_pairs_mut().append_pair("state", state_val);
    }

    Redirect::to(redirect_url.as_str()).into_response()
}

/// OAuth 2.0 Token endpoint, form body
#[utoipa::path(
    post,
    path = "/token",
    request_body(content = TokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Access token issued successfully", body = TokenResponse),
        (status = 400, description = "Invalid request or grant", body = OAuthError),
        (status = 401, description = "Invalid client credentials", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    handle_token_request(&state, &headers, request)
}

/// OAuth 2.0 Token endpoint, query parameters
#[utoipa::path(
    get,
    path = "/token",
    params(
        ("grant_type" = String, Query, description = "authorization_code or refresh_token"),
        ("client_id" = Option<String>, Query, description = "Client identifier"),
        ("client_secret" = Option<String>, Query, description = "Client secret"),
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("redirect_uri" = Option<String>, Query, description = "Redirect URI of the authorization request"),
        ("refresh_token" = Option<String>, Query, description = "Refresh token")
    ),
    responses(
        (status = 200, description = "Access token issued successfully", body = TokenResponse),
        (status = 400, description = "Invalid request or grant", body = OAuthError),
        (status = 401, description = "Invalid client credentials", body = OAuthError),
        (status = 405, description = "GET token requests are disabled", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn token_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(request): Query<TokenRequest>,
) -> Response {
    if !state.config.oauth.allow_get_token {
        warn!("GET token request refused");
        return error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            OAuthError::invalid_request("Token requests must use POST"),
        );
    }
    handle_token_request(&state, &headers, request)
}

fn handle_token_request(state: &AppState, headers: &HeaderMap, request: TokenRequest) -> Response {
    info!(
        "OAuth token request with grant_type: {}",
        request.grant_type
    );

    let manager = TokenManager::from_state(state);
    let client = match authenticate(
        state,
        &manager,
        headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    ) {
        Ok(client) => client,
        Err(response) => return response,
    };

    let result = match request.grant_type.as_str() {
        "authorization_code" => {
            let Some(code) = non_empty(request.code.as_deref()) else {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    OAuthError::invalid_request(
                        "code parameter is required for authorization_code grant",
                    ),
                );
            };
            manager.exchange_code(&client, code, request.redirect_uri.as_deref())
        }
        "refresh_token" => {
            let Some(refresh_token) = non_empty(request.refresh_token.as_deref()) else {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    OAuthError::invalid_request(
                        "refresh_token parameter is required for refresh_token grant",
                    ),
                );
            };
            manager.refresh(&client, refresh_token)
        }
        other => {
            warn!(
                "Unsupported grant type '{}' from client '{}'",
                other, client.id
            );
            return error_response(StatusCode::BAD_REQUEST, OAuthError::unsupported_grant_type());
        }
    };

    match result {
        Ok(credential) => {
            let expires_in = credential.expires_in(state.clock.now());
            let mut response =
                Json(TokenResponse::from_credential(&credential, expires_in)).into_response();
            presets::no_store().apply(&mut response);
            response
        }
        Err(e) => token_error_response(e),
    }
}

/// OAuth 2.0 Token Revocation endpoint (RFC 7009)
#[utoipa::path(
    post,
    path = "/revoke",
    request_body(content = RevocationRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token revoked, or it was unknown"),
        (status = 400, description = "Missing token", body = OAuthError),
        (status = 401, description = "Invalid client credentials", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<RevocationRequest>,
) -> Response {
    let manager = TokenManager::from_state(&state);
    let client = match authenticate(
        &state,
        &manager,
        &headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    ) {
        Ok(client) => client,
        Err(response) => return response,
    };

    if request.token.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("token parameter is required"),
        );
    }

    let revoked = manager.revoke(&client, &request.token);
    info!(
        "Revocation request from client '{}' (hint: {}), revoked: {}",
        client.id,
        request.token_type_hint.as_deref().unwrap_or("none"),
        revoked
    );

    let mut response = StatusCode::OK.into_response();
    presets::no_store().apply(&mut response);
    response
}

/// Demo application landing page with a login link
#[utoipa::path(
    get,
    path = "/app",
    responses((status = 200, description = "Login link", body = String, content_type = "text/html")),
    tag = OAUTH_TAG
)]
pub async fn app_home(State(state): State<AppState>) -> Html<String> {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", "code")
        .append_pair("client_id", &state.config.client.id)
        .append_pair("state", "xyz")
        .append_pair("scope", "everything")
        .append_pair("redirect_uri", &state.config.public_endpoint("appauth/code"))
        .finish();
    Html(format!(
        "<html><body><a href=\"/authorize?{}\">Login</a><br/></body></html>",
        query.replace('&', "&amp;")
    ))
}

/// Demo application callback: shows the code and a ready-made token request
#[utoipa::path(
    get,
    path = "/appauth/code",
    params(("code" = String, Query, description = "Authorization code")),
    responses(
        (status = 200, description = "Code received", body = CallbackResponse),
        (status = 400, description = "No code in the callback", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn app_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(code) = non_empty(query.code.as_deref()) else {
        error!("Application callback without code");
        return error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("code parameter is required"),
        );
    };

    let token_query = form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "authorization_code")
        .append_pair("client_id", &state.config.client.id)
        .append_pair("client_secret", &state.config.client.secret)
        .append_pair("state", "xyz")
        .append_pair("redirect_uri", &state.config.public_endpoint("appauth/code"))
        .append_pair("code", code)
        .finish();

    let response = CallbackResponse {
        auth_code: form_urlencoded::byte_serialize(code.as_bytes()).collect(),
        token_url: format!("/token?{token_query}"),
    };
    info!("Application callback received a code");
    Json(response).into_response()
}

/// Authenticate the calling client from HTTP Basic or, when allowed, from
/// request parameters
fn authenticate(
    state: &AppState,
    manager: &TokenManager,
    headers: &HeaderMap,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Result<gateway_store::Client, Response> {
    let credentials = basic_credentials(headers).or_else(|| {
        if !state.config.oauth.secret_in_params {
            return None;
        }
        let id = non_empty(client_id)?;
        Some((id.to_string(), client_secret.unwrap_or_default().to_string()))
    });

    let Some((id, secret)) = credentials else {
        warn!("Missing client credentials");
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            OAuthError::invalid_client("Client authentication required"),
        ));
    };

    manager
        .authenticate_client(&id, &secret)
        .map_err(token_error_response)
}

/// Decode `Authorization: Basic base64(id:secret)`
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn token_error_response(err: TokenError) -> Response {
    match err {
        TokenError::InvalidClient => error_response(
            StatusCode::UNAUTHORIZED,
            OAuthError::invalid_client(&err.to_string()),
        ),
        TokenError::CodeNotFound
        | TokenError::CodeExpired
        | TokenError::RefreshNotFound
        | TokenError::ClientMismatch
        | TokenError::RedirectUriMismatch => {
            warn!("Token request rejected: {err}");
            error_response(
                StatusCode::BAD_REQUEST,
                OAuthError::invalid_grant(&err.to_string()),
            )
        }
        TokenError::InvalidRedirectUri(_) => error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request(&err.to_string()),
        ),
        TokenError::TokenGeneration(_) => {
            error!("Token request failed: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                OAuthError::server_error("Failed to issue token"),
            )
        }
    }
}

/// Helper function to create error responses
fn error_response(status: StatusCode, error: OAuthError) -> Response {
    (status, Json(error)).into_response()
}

/// Helper function to redirect with authorization error
fn redirect_with_error(redirect_uri: &str, error: AuthorizationError) -> Response {
    match Url::parse(redirect_uri) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("error", &error.error)
                .append_pair(
                    "error_description",
                    error.error_description.as_deref().unwrap_or(""),
                );

            if let Some(state) = &error.state {
                url.query_pairs_mut().append_pair("state", state);
            }

            Redirect::to(url.as_str()).into_response()
        }
        Err(_) => error_response(
            StatusCode::BAD_REQUEST,
            OAuthError::invalid_request("Invalid redirect_uri"),
        ),
    }
}
