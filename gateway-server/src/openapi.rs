use crate::api;
use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const DEVICES_TAG: &str = "Devices API";
pub(crate) const OAUTH_TAG: &str = "OAuth 2.0";

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::devices::list_devices,
        api::devices::get_device,
        api::devices::submit_without_target,
        api::devices::submit_action,
        api::oauth::handlers::authorize,
        api::oauth::handlers::token,
        api::oauth::handlers::token_get,
        api::oauth::handlers::revoke,
        api::oauth::handlers::app_home,
        api::oauth::handlers::app_callback,
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = DEVICES_TAG, description = "Token-protected device access"),
        (name = OAUTH_TAG, description = "Authorization code and token endpoints"),
    ),
    info(
        title = "Things Gateway API",
        description = "Access-controlled device command gateway",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
