use config::{Config, ConfigError, Environment};
use dotenv::dotenv;
use serde::Deserialize;

pub const DEFAULT_GEOCODING_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub db_pool_size: u32,
    pub token_ttl_hours: i64,
    pub reset_token_ttl_minutes: i64,
    pub geocoding_url: String,
    pub geocoding_api_key: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok(); // Load .env file if present
        Self::from_env(Environment::default())
    }

    fn from_env(env: Environment) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("db_pool_size", 10)?
            .set_default("token_ttl_hours", 24)?
            .set_default("reset_token_ttl_minutes", 60)?
            .set_default("geocoding_url", DEFAULT_GEOCODING_URL)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("JWT_SECRET must not be empty".into()));
        }
        Ok(config)
    }

    pub fn geocoding_enabled(&self) -> bool {
        self.geocoding_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

// Secrets stay out of the startup log line.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_pool_size", &self.db_pool_size)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("reset_token_ttl_minutes", &self.reset_token_ttl_minutes)
            .field("geocoding_url", &self.geocoding_url)
            .field("geocoding_enabled", &self.geocoding_enabled())
            .finish_non_exhaustive()
    }
}
