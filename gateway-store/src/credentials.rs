//! In-memory storage for OAuth clients, authorization codes, access tokens and
//! refresh-token bindings.
//!
//! The store is a plain key-value layer: it records expiry timestamps but never
//! reads a clock. Deciding whether a record is still usable is the caller's job.

use crate::error::{RecordKind, StoreError};
use crate::models::{AccessCredential, AuthorizationGrant, Client};
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    clients: HashMap<String, Client>,
    grants: HashMap<String, AuthorizationGrant>,
    access: HashMap<String, AccessCredential>,
    /// refresh token -> access token
    refresh: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: Mutex<Inner>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store provisioned with a single client.
    pub fn with_client(client: Client) -> Self {
        let store = Self::new();
        store.set_client(client);
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_client(&self, id: &str) -> Result<Client, StoreError> {
        debug!("GetClient: {id}");
        self.lock()
            .clients
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::Client, id))
    }

    pub fn set_client(&self, client: Client) {
        debug!("SetClient: {}", client.id);
        self.lock().clients.insert(client.id.clone(), client);
    }

    pub fn save_grant(&self, grant: AuthorizationGrant) {
        debug!("SaveGrant for client '{}'", grant.client_id);
        self.lock().grants.insert(grant.code.clone(), grant);
    }

    pub fn load_grant(&self, code: &str) -> Result<AuthorizationGrant, StoreError> {
        self.lock()
            .grants
            .get(code)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::AuthorizationCode, code))
    }

    /// Remove a grant, returning it if it was present.
    ///
    /// Token exchange uses the returned value to consume a code exactly once:
    /// of two concurrent exchanges only one gets `Some`.
    pub fn remove_grant(&self, code: &str) -> Option<AuthorizationGrant> {
        debug!("RemoveGrant");
        self.lock().grants.remove(code)
    }

    /// Save access data, binding its refresh token when it carries one.
    pub fn save_credential(&self, credential: AccessCredential) {
        debug!(
            "SaveCredential for client '{}', refresh token: {}",
            credential.client_id,
            credential.refresh_token().is_some()
        );
        let mut inner = self.lock();
        if let Some(refresh) = credential.refresh_token() {
            inner
                .refresh
                .insert(refresh.to_string(), credential.access_token.clone());
        }
        inner
            .access
            .insert(credential.access_token.clone(), credential);
    }

    pub fn load_credential(&self, token: &str) -> Result<AccessCredential, StoreError> {
        Self::lookup_access(&self.lock(), token)
    }

    fn lookup_access(inner: &Inner, token: &str) -> Result<AccessCredential, StoreError> {
        inner
            .access
            .get(token)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::AccessToken, token))
    }

    /// Remove access data together with the refresh binding that still points
    /// at it. Removing an unknown token is not an error.
    pub fn remove_credential(&self, token: &str) {
        debug!("RemoveCredential");
        let mut inner = self.lock();
        let Some(credential) = inner.access.remove(token) else {
            return;
        };
        if let Some(refresh) = credential.refresh_token() {
            if inner.refresh.get(refresh).map(String::as_str) == Some(token) {
                inner.refresh.remove(refresh);
            }
        }
    }

    /// Resolve a refresh token to the access data it renews.
    ///
    /// Fails with a refresh-token `NotFound` when the token is unknown, and
    /// with an access-token `NotFound` when the bound credential is gone.
    pub fn load_by_refresh(&self, refresh: &str) -> Result<AccessCredential, StoreError> {
        let inner = self.lock();
        let token = inner
            .refresh
            .get(refresh)
            .ok_or_else(|| StoreError::not_found(RecordKind::RefreshToken, refresh))?;
        Self::lookup_access(&inner, token)
    }

    /// Remove a refresh binding, returning the access token it pointed at.
    pub fn remove_refresh(&self, refresh: &str) -> Option<String> {
        debug!("RemoveRefresh");
        self.lock().refresh.remove(refresh)
    }

    pub fn credential_count(&self) -> usize {
        self.lock().access.len()
    }
}
