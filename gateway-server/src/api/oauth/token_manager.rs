//! Authorization code and token lifecycle for OAuth 2.0

use crate::clock::Clock;
use crate::state::AppState;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use gateway_store::{
    AccessCredential, AuthorizationGrant, Client, CredentialStore, RecordKind, StoreError,
};
use log::{debug, info, warn};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors that can occur during token and authorization code operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Client authentication failed")]
    InvalidClient,
    #[error("Authorization code not found or already used")]
    CodeNotFound,
    #[error("Authorization code expired")]
    CodeExpired,
    #[error("Refresh token not found or already used")]
    RefreshNotFound,
    #[error("Grant was issued to another client")]
    ClientMismatch,
    #[error("Redirect URI mismatch")]
    RedirectUriMismatch,
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
}

/// Issues, exchanges, rotates and revokes credentials in the credential store
#[derive(Clone)]
pub struct TokenManager {
    credentials: Arc<CredentialStore>,
    clock: Arc<dyn Clock>,
    code_ttl: Duration,
    token_ttl: Duration,
}

impl TokenManager {
    pub fn new(
        credentials: Arc<CredentialStore>,
        clock: Arc<dyn Clock>,
        code_ttl: Duration,
        token_ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            clock,
            code_ttl,
            token_ttl,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.credentials.clone(),
            state.clock.clone(),
            state.config.oauth.auth_code_lifetime(),
            state.config.oauth.access_token_lifetime(),
        )
    }

    /// Look up a client and check its secret
    pub fn authenticate_client(&self, client_id: &str, secret: &str) -> Result<Client, TokenError> {
        let client = self.credentials.get_client(client_id).map_err(|err| {
            warn!("Client authentication failed: {err}");
            TokenError::InvalidClient
        })?;
        if client.secret != secret {
            warn!("Client authentication failed: bad secret for client '{client_id}'");
            return Err(TokenError::InvalidClient);
        }
        Ok(client)
    }

    /// Resolve the redirect URI of an authorization request. An empty request
    /// falls back to the registered URI; otherwise the requested URI must share
    /// the registered scheme, host and port and live under its path.
    pub fn validate_redirect_uri(
        &self,
        client: &Client,
        requested: &str,
    ) -> Result<String, TokenError> {
        if client.redirect_uri.is_empty() {
            return Err(TokenError::InvalidRedirectUri(
                "client has no registered redirect URI".to_string(),
            ));
        }
        if requested.is_empty() {
            return Ok(client.redirect_uri.clone());
        }

        let base = Url::parse(&client.redirect_uri)
            .map_err(|e| TokenError::InvalidRedirectUri(e.to_string()))?;
        let redirect =
            Url::parse(requested).map_err(|e| TokenError::InvalidRedirectUri(e.to_string()))?;

        if redirect.fragment().is_some() {
            return Err(TokenError::InvalidRedirectUri("fragment not allowed".to_string()));
        }
        let same_origin = base.scheme() == redirect.scheme()
            && base.host_str() == redirect.host_str()
            && base.port_or_known_default() == redirect.port_or_known_default();
        if !same_origin || !is_same_or_sub_path(base.path(), redirect.path()) {
            return Err(TokenError::RedirectUriMismatch);
        }
        Ok(requested.to_string())
    }

    /// Create and store a single-use authorization code
    pub fn issue_authorization_code(
        &self,
        client: &Client,
        redirect_uri: &str,
        scope: &str,
        state: Option<String>,
    ) -> Result<AuthorizationGrant, TokenError> {
        let now = self.clock.now();
        let grant = AuthorizationGrant {
            code: generate_secure_token()?,
            client_id: client.id.clone(),
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            state,
            issued_at: now,
            expires_at: now + self.code_ttl,
        };
        self.credentials.save_grant(grant.clone());

        debug!(
            "Generated authorization code for client '{}', expires in {}s",
            client.id,
            self.code_ttl.num_seconds()
        );
        Ok(grant)
    }

    /// Consume an authorization code and issue an access credential for it.
    /// The code is removed before any other check, so a failed exchange still
    /// burns it.
    pub fn exchange_code(
        &self,
        client: &Client,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<AccessCredential, TokenError> {
        let grant = self
            .credentials
            .remove_grant(code)
            .ok_or(TokenError::CodeNotFound)?;

        if grant.client_id != client.id {
            warn!(
                "Authorization code of client '{}' presented by client '{}'",
                grant.client_id, client.id
            );
            return Err(TokenError::ClientMismatch);
        }

        let redirect_uri = redirect_uri
            .filter(|uri| !uri.is_empty())
            .unwrap_or(&client.redirect_uri);
        if grant.redirect_uri != redirect_uri {
            return Err(TokenError::RedirectUriMismatch);
        }

        if grant.is_expired_at(self.clock.now()) {
            return Err(TokenError::CodeExpired);
        }

        let credential = self.issue_credential(&client.id, &grant.scope)?;
        info!("Exchanged authorization code for client '{}'", client.id);
        Ok(credential)
    }

    /// Rotate a refresh token: the old access credential and its binding are
    /// replaced by a new credential with a fresh refresh token.
    pub fn refresh(
        &self,
        client: &Client,
        refresh_token: &str,
    ) -> Result<AccessCredential, TokenError> {
        let previous = self
            .credentials
            .load_by_refresh(refresh_token)
            .map_err(|err| {
                debug!("Refresh token lookup failed: {err}");
                TokenError::RefreshNotFound
            })?;

        if previous.client_id != client.id {
            warn!(
                "Refresh token of client '{}' presented by client '{}'",
                previous.client_id, client.id
            );
            return Err(TokenError::ClientMismatch);
        }

        // A concurrent rotation of the same token loses here
        match self.credentials.remove_refresh(refresh_token) {
            Some(access_token) if access_token == previous.access_token => {}
            _ => return Err(TokenError::RefreshNotFound),
        }

        let credential = self.issue_credential(&client.id, &previous.scope)?;
        self.credentials.remove_credential(&previous.access_token);
        info!("Rotated refresh token for client '{}'", client.id);
        Ok(credential)
    }

    /// Revoke an access or refresh token owned by `client`. Returns whether
    /// anything was removed.
    pub fn revoke(&self, client: &Client, token: &str) -> bool {
        if let Ok(credential) = self.credentials.load_credential(token) {
            if credential.client_id != client.id {
                return false;
            }
            self.credentials.remove_credential(token);
            debug!("Revoked access token of client '{}'", client.id);
            return true;
        }

        match self.credentials.load_by_refresh(token) {
            Ok(credential) if credential.client_id == client.id => {
                self.credentials.remove_refresh(token);
                self.credentials.remove_credential(&credential.access_token);
                debug!("Revoked refresh token of client '{}'", client.id);
                true
            }
            // Binding whose access credential is already gone
            Err(StoreError::NotFound {
                kind: RecordKind::AccessToken,
                ..
            }) => self.credentials.remove_refresh(token).is_some(),
            _ => false,
        }
    }

    fn issue_credential(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<AccessCredential, TokenError> {
        let now = self.clock.now();
        let credential = AccessCredential {
            access_token: generate_secure_token()?,
            refresh_token: Some(generate_secure_token()?),
            client_id: client_id.to_string(),
            scope: scope.to_string(),
            issued_at: now,
            expires_at: now + self.token_ttl,
        };
        self.credentials.save_credential(credential.clone());
        Ok(credential)
    }
}

/// Generate a cryptographically secure random token: 32 random bytes,
/// base64url without padding
pub fn generate_secure_token() -> Result<String, TokenError> {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    let token = URL_SAFE_NO_PAD.encode(token_bytes);

    if token.is_empty() {
        return Err(TokenError::TokenGeneration("Generated empty token".to_string()));
    }
    Ok(token)
}

/// `path` equals `registered` or lies below it in the path hierarchy
fn is_same_or_sub_path(registered: &str, path: &str) -> bool {
    let registered = registered.trim_end_matches('/');
    path.trim_end_matches('/') == registered || path.starts_with(&format!("{registered}/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::Utc;

    const REDIRECT: &str = "http://localhost:14000/appauth";

    struct Harness {
        manager: TokenManager,
        credentials: Arc<CredentialStore>,
        clock: Arc<FixedClock>,
        client: Client,
    }

    fn harness() -> Harness {
        let client = Client::new("1234", "aabbccdd", REDIRECT);
        let credentials = Arc::new(CredentialStore::with_client(client.clone()));
        credentials.set_client(Client::new("other", "secret", REDIRECT));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let manager = TokenManager::new(
            credentials.clone(),
            clock.clone(),
            Duration::seconds(250),
            Duration::hours(1),
        );
        Harness {
            manager,
            credentials,
            clock,
            client,
        }
    }

    fn issue_code(h: &Harness) -> String {
        h.manager
            .issue_authorization_code(&h.client, REDIRECT, "everything", Some("xyz".to_string()))
            .expect("Failed to issue authorization code")
            .code
    }

    #[test]
    fn test_authenticate_client() {
        let h = harness();
        assert_eq!(h.manager.authenticate_client("1234", "aabbccdd"), Ok(h.client.clone()));
        assert_eq!(
            h.manager.authenticate_client("1234", "wrong"),
            Err(TokenError::InvalidClient)
        );
        assert_eq!(
            h.manager.authenticate_client("nobody", "aabbccdd"),
            Err(TokenError::InvalidClient)
        );
    }

    #[test]
    fn test_validate_redirect_uri() {
        let h = harness();
        let m = &h.manager;
        assert_eq!(m.validate_redirect_uri(&h.client, ""), Ok(REDIRECT.to_string()));
        assert_eq!(
            m.validate_redirect_uri(&h.client, "http://localhost:14000/appauth/code"),
            Ok("http://localhost:14000/appauth/code".to_string())
        );
        assert_eq!(
            m.validate_redirect_uri(&h.client, "http://evil.example/appauth"),
            Err(TokenError::RedirectUriMismatch)
        );
        assert_eq!(
            m.validate_redirect_uri(&h.client, "http://localhost:14000/other"),
            Err(TokenError::RedirectUriMismatch)
        );
        assert_eq!(
            m.validate_redirect_uri(&h.client, "http://localhost:14000/appauth-evil/steal"),
            Err(TokenError::RedirectUriMismatch)
        );
        assert_eq!(
            m.validate_redirect_uri(&h.client, "http://localhost:14000/appauthx"),
            Err(TokenError::RedirectUriMismatch)
        );
        assert_eq!(
            m.validate_redirect_uri(&h.client, "http://localhost:14000/appauth/"),
            Ok("http://localhost:14000/appauth/".to_string())
        );
        assert!(matches!(
            m.validate_redirect_uri(&h.client, "not a url"),
            Err(TokenError::InvalidRedirectUri(_))
        ));
        assert!(matches!(
            m.validate_redirect_uri(&h.client, "http://localhost:14000/appauth#frag"),
            Err(TokenError::InvalidRedirectUri(_))
        ));
    }

    #[test]
    fn test_exchange_code_issues_credential() {
        let h = harness();
        let code = issue_code(&h);

        let credential = h
            .manager
            .exchange_code(&h.client, &code, Some(REDIRECT))
            .expect("Failed to exchange code");

        assert_eq!(credential.client_id, "1234");
        assert_eq!(credential.scope, "everything");
        assert!(credential.refresh_token().is_some());
        assert_eq!(credential.expires_at - credential.issued_at, Duration::hours(1));
        assert_eq!(h.credentials.load_credential(&credential.access_token), Ok(credential));
    }

    #[test]
    fn test_code_is_single_use() {
        let h = harness();
        let code = issue_code(&h);
        assert!(h.manager.exchange_code(&h.client, &code, None).is_ok());
        assert_eq!(
            h.manager.exchange_code(&h.client, &code, None),
            Err(TokenError::CodeNotFound)
        );
    }

    #[test]
    fn test_failed_exchange_burns_code() {
        let h = harness();
        let code = issue_code(&h);
        assert_eq!(
            h.manager
                .exchange_code(&h.client, &code, Some("http://localhost:14000/appauth/x")),
            Err(TokenError::RedirectUriMismatch)
        );
        assert_eq!(
            h.manager.exchange_code(&h.client, &code, Some(REDIRECT)),
            Err(TokenError::CodeNotFound)
        );
    }

    #[test]
    fn test_exchange_by_other_client() {
        let h = harness();
        let code = issue_code(&h);
        let other = h.credentials.get_client("other").unwrap();
        assert_eq!(
            h.manager.exchange_code(&other, &code, None),
            Err(TokenError::ClientMismatch)
        );
    }

    #[test]
    fn test_expired_code() {
        let h = harness();
        let code = issue_code(&h);
        h.clock.advance(Duration::seconds(251));
        assert_eq!(
            h.manager.exchange_code(&h.client, &code, None),
            Err(TokenError::CodeExpired)
        );
    }

    #[test]
    fn test_refresh_rotates_tokens() {
        let h = harness();
        let code = issue_code(&h);
        let first = h.manager.exchange_code(&h.client, &code, None).unwrap();
        let first_refresh = first.refresh_token().unwrap().to_string();

        let second = h
            .manager
            .refresh(&h.client, &first_refresh)
            .expect("Failed to refresh");

        assert_ne!(second.access_token, first.access_token);
        assert_eq!(second.scope, first.scope);
        assert!(h.credentials.load_credential(&first.access_token).is_err());
        assert!(h.credentials.load_by_refresh(&first_refresh).is_err());
        assert_eq!(
            h.credentials
                .load_by_refresh(second.refresh_token().unwrap())
                .unwrap()
                .access_token,
            second.access_token
        );
        assert_eq!(
            h.manager.refresh(&h.client, &first_refresh),
            Err(TokenError::RefreshNotFound)
        );
        assert_eq!(h.credentials.credential_count(), 1);
    }

    #[test]
    fn test_refresh_by_other_client() {
        let h = harness();
        let code = issue_code(&h);
        let first = h.manager.exchange_code(&h.client, &code, None).unwrap();
        let other = h.credentials.get_client("other").unwrap();
        assert_eq!(
            h.manager.refresh(&other, first.refresh_token().unwrap()),
            Err(TokenError::ClientMismatch)
        );
        assert!(h.credentials.load_credential(&first.access_token).is_ok());
    }

    #[test]
    fn test_revoke() {
        let h = harness();
        let code = issue_code(&h);
        let credential = h.manager.exchange_code(&h.client, &code, None).unwrap();
        let other = h.credentials.get_client("other").unwrap();

        assert!(!h.manager.revoke(&other, &credential.access_token));
        assert!(h.manager.revoke(&h.client, &credential.access_token));
        assert!(h.credentials.load_credential(&credential.access_token).is_err());
        assert!(h
            .credentials
            .load_by_refresh(credential.refresh_token().unwrap())
            .is_err());
        assert!(!h.manager.revoke(&h.client, &credential.access_token));
    }

    #[test]
    fn test_revoke_refresh_token() {
        let h = harness();
        let code = issue_code(&h);
        let credential = h.manager.exchange_code(&h.client, &code, None).unwrap();

        assert!(h
            .manager
            .revoke(&h.client, credential.refresh_token().unwrap()));
        assert!(h.credentials.load_credential(&credential.access_token).is_err());
        assert_eq!(h.credentials.credential_count(), 0);
    }

    #[test]
    fn test_token_uniqueness() {
        let a = generate_secure_token().unwrap();
        let b = generate_secure_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains('='));
    }
}
