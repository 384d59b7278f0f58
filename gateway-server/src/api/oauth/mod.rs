//! OAuth 2.0 authorization server for the gateway's single provisioned client
//!
//! ## Supported OAuth 2.0 Flows
//! - Authorization Code Grant (RFC 6749 Section 4.1), auto-approved
//! - Refresh Token Grant with rotation (RFC 6749 Section 6)
//! - Token Revocation (RFC 7009)
//!
//! Codes and tokens live in the in-memory credential store. The `/app` and
//! `/appauth/code` routes are a small demo application driving the flow.

pub mod handlers;
pub mod models;
pub mod token_manager;

use crate::state::AppState;
use axum::routing::{get, post, Router};

/// Creates OAuth 2.0 routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/authorize", get(handlers::authorize))
        .route("/token", get(handlers::token_get).post(handlers::token))
        .route("/revoke", post(handlers::revoke))
        .route("/app", get(handlers::app_home))
        .route("/appauth/code", get(handlers::app_callback))
}
