pub(crate) use crate::config::client::ClientConfig;
pub(crate) use crate::config::oauth::OAuthConfig;
use confique::Config;
use std::path::Path;

pub mod client;
pub mod oauth;

/// Main configuration structure for the gateway
#[derive(Debug, Config, Clone)]
pub struct GatewayConfig {
    /// The port the gateway will listen to (default: 14000)
    #[config(env = "THINGS_PORT", default = 14000)]
    pub port: u16,

    /// Externally reachable base URL, used to build callback and token URLs
    /// (default: http://localhost:14000)
    #[config(env = "THINGS_PUBLIC_URL", default = "http://localhost:14000")]
    pub public_url: String,

    /// Populate the device registry with the fixture devices (default: true)
    #[config(env = "THINGS_SEED_DEVICES", default = true)]
    pub seed_devices: bool,

    /// Statically provisioned OAuth client
    #[config(nested)]
    pub client: ClientConfig,

    /// OAuth 2.0 endpoint configuration
    #[config(nested)]
    pub oauth: OAuthConfig,
}

impl GatewayConfig {
    /// Load configuration from `THINGS_*` environment variables, falling back
    /// to the given TOML file (if it exists) and then to defaults.
    pub fn load(file: Option<&Path>) -> Result<Self, confique::Error> {
        let mut builder = Self::builder().env();
        if let Some(path) = file {
            builder = builder.file(path);
        }
        builder.load()
    }

    /// Load configuration, honouring `THINGS_CONFIG_FILE` when set
    pub fn new() -> Result<Self, String> {
        let file = std::env::var_os("THINGS_CONFIG_FILE");
        let config = Self::load(file.as_deref().map(Path::new)).map_err(|e| e.to_string())?;
        config.oauth.validate()?;
        Ok(config)
    }

    /// Join a path onto the public base URL
    pub fn public_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.public_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            port: 0, // Let the OS choose a port
            public_url: "http://localhost:14000".to_string(),
            seed_devices: true,
            client: ClientConfig::default(),
            oauth: OAuthConfig::default(),
        }
    }
}
