pub(crate) mod devices;
pub(crate) mod health;
pub(crate) mod oauth;

use crate::state::AppState;
use axum::Router;

/// Combines all API routes into a single router. Device routes authorize
/// every request themselves, so no authentication layer wraps them.
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(oauth::router())
        .merge(devices::router())
}
