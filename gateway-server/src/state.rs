use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use gateway_store::{CredentialStore, DeviceRegistry};
use log::info;
use std::sync::Arc;

/// Shared application state, built once at startup and handed to every
/// handler through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<DeviceRegistry>,
    pub credentials: Arc<CredentialStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GatewayConfig, clock: Arc<dyn Clock>) -> Self {
        let registry = if config.seed_devices {
            DeviceRegistry::seeded()
        } else {
            DeviceRegistry::new()
        };
        info!(
            "Device registry ready with {} devices, client '{}' provisioned",
            registry.len(),
            config.client.id
        );

        let credentials = CredentialStore::with_client(config.client.to_client());

        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            credentials: Arc::new(credentials),
            clock,
        }
    }
}
