use crate::clock::FixedClock;
use crate::config::GatewayConfig;
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use url::{form_urlencoded, Url};

/// Test fixture driving the full router in-process.
///
/// The fixture builds the application from the test configuration with a
/// manually driven clock, so token expiry can be exercised without sleeping.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///     let token = fixture.access_token().await;
///
///     let response = fixture.get_with_bearer("/devices/1", &token).await;
///     response.assert_ok();
///
///     fixture.clock.advance(chrono::Duration::hours(2));
///     fixture
///         .get_with_bearer("/devices/1", &token)
///         .await
///         .assert_status(StatusCode::UNAUTHORIZED);
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration the application was built from
    pub config: GatewayConfig,
    /// Shared state behind the router
    pub state: AppState,
    /// Clock used for every expiry decision
    pub clock: Arc<FixedClock>,
}

impl TestFixture {
    /// Creates a fixture from the default test configuration
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Creates a fixture after letting the caller adjust the configuration
    pub async fn with_config(customize: impl FnOnce(&mut GatewayConfig)) -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let mut config = GatewayConfig::for_test();
        customize(&mut config);

        let clock = Arc::new(FixedClock::new(Utc::now()));
        let state = AppState::with_clock(config.clone(), clock.clone());
        let app = create_app(state.clone());

        Self {
            app,
            config,
            state,
            clock,
        }
    }

    /// Initializes the test logger. Only the first call in a process wins.
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Creates a request builder with a JSON content type and no credentials
    pub fn request_builder(&self, method: Method, uri: impl AsRef<str>) -> http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri.as_ref())
            .header(CONTENT_TYPE, "application/json")
    }

    /// Sends a GET request without credentials
    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a GET request and returns the raw response, for redirects and
    /// header assertions
    pub async fn get_raw(&self, uri: impl AsRef<str>) -> Response {
        let request = self
            .request_builder(Method::GET, uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send_raw(request).await
    }

    /// Sends a GET request with an `Authorization: Bearer` header
    pub async fn get_with_bearer(&self, uri: impl AsRef<str>, token: &str) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a POST request with a JSON body and an `Authorization: Bearer` header
    pub async fn post_with_bearer<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        token: &str,
        body: &T,
    ) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let request = self
            .request_builder(Method::POST, uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(json_body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a POST request with a form-encoded body
    pub async fn post_form(&self, uri: impl AsRef<str>, fields: &[(&str, &str)]) -> TestResponse {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.as_ref())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Runs the authorize endpoint for the provisioned client and returns the
    /// code from the redirect
    pub async fn authorization_code(&self) -> String {
        let response = self
            .get_raw(format!(
                "/authorize?response_type=code&client_id={}&state=xyz",
                self.config.client.id
            ))
            .await;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("Authorize did not redirect");
        let url = Url::parse(location).expect("Invalid redirect location");
        url.query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, code)| code.into_owned())
            .expect("No code in redirect")
    }

    /// Completes the authorization code flow and returns a fresh access token
    pub async fn access_token(&self) -> String {
        let code = self.authorization_code().await;
        let response = self
            .post_form(
                "/token",
                &[
                    ("grant_type", "authorization_code"),
                    ("client_id", self.config.client.id.as_str()),
                    ("client_secret", self.config.client.secret.as_str()),
                    ("code", code.as_str()),
                ],
            )
            .await;
        response.assert_ok();
        response.json["access_token"]
            .as_str()
            .expect("No access token in response")
            .to_string()
    }

    /// Sends a request and returns the raw response
    pub async fn send_raw(&self, request: Request<Body>) -> Response {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Sends a request and returns a TestResponse
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.send_raw(request).await;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        TestResponse { status, json }
    }
}

/// Response from a test request that provides convenient access to status and JSON body.
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response body as JSON (if present and valid JSON)
    pub json: Value,
}

impl TestResponse {
    /// Asserts that the response has the expected status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match the expected value.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    /// Asserts that the response status is OK (200).
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Converts the response body to the specified type.
    ///
    /// # Panics
    ///
    /// Panics if deserialization fails.
    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}
