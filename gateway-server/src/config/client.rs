use confique::Config;
use gateway_store::Client;

/// The single OAuth client provisioned at startup
#[derive(Debug, Config, Clone)]
pub struct ClientConfig {
    /// Client identifier (default: 1234)
    #[config(env = "THINGS_CLIENT_ID", default = "1234")]
    pub id: String,

    /// Client secret (default: aabbccdd)
    #[config(env = "THINGS_CLIENT_SECRET", default = "aabbccdd")]
    pub secret: String,

    /// Registered redirect URI (default: http://localhost:14000/appauth)
    #[config(
        env = "THINGS_CLIENT_REDIRECT_URI",
        default = "http://localhost:14000/appauth"
    )]
    pub redirect_uri: String,
}

impl ClientConfig {
    pub fn to_client(&self) -> Client {
        Client::new(&self.id, &self.secret, &self.redirect_uri)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            id: "1234".to_string(),
            secret: "aabbccdd".to_string(),
            redirect_uri: "http://localhost:14000/appauth".to_string(),
        }
    }
}
