use crate::components::geofence::{Bounds, EVENT_BOUNDS, MAP_BOUNDS};
use crate::components::session::store::TokenStoreKind;
use crate::error::{config_error, env_error, AppResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// Default token location when `TOKEN_STORE` is unset
pub const DEFAULT_TOKEN_FILE: &str = ".slug-events/token.json";

/// Default timezone for form input
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Optional region overrides
pub const BOUNDS_FILE: &str = "config/bounds.toml";

/// Main configuration structure for the client
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the events backend
    pub backend_url: Url,
    /// Where the session token is persisted
    pub token_store: TokenStoreKind,
    /// Timezone used to interpret wall-clock form input
    pub timezone: String,
    /// Local port the login helper listens on for the OAuth redirect
    pub login_callback_port: u16,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Path of the map page, used as the return path after re-login
    pub page_path: String,
    /// Region the map may show
    pub map_bounds: Bounds,
    /// Region new events may be placed in
    pub event_bounds: Bounds,
}

#[derive(Debug, Default, Deserialize)]
struct RegionsFile {
    map: Option<Bounds>,
    events: Option<Bounds>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let backend_url = env::var("BACKEND_URL").map_err(|_| env_error("BACKEND_URL"))?;
        let mut config = Self::for_backend(&backend_url)?;

        if let Ok(store) = env::var("TOKEN_STORE") {
            config.token_store = store.parse()?;
        }

        if let Ok(timezone) = env::var("TIMEZONE") {
            config.timezone = timezone;
        }

        if let Ok(port) = env::var("LOGIN_CALLBACK_PORT") {
            config.login_callback_port = port
                .parse::<u16>()
                .map_err(|_| env_error("Invalid LOGIN_CALLBACK_PORT format"))?;
        }

        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout
                .parse::<u64>()
                .map_err(|_| env_error("Invalid REQUEST_TIMEOUT_SECS format"))?;
        }

        if let Ok(path) = env::var("PAGE_PATH") {
            config.page_path = path;
        }

        // Region overrides are optional
        if Path::new(BOUNDS_FILE).exists() {
            config.apply_bounds_file(BOUNDS_FILE)?;
        }

        config.validate()?;
        info!("Configuration loaded for backend {}", config.backend_url);
        Ok(config)
    }

    /// Configuration with defaults for everything but the backend
    pub fn for_backend(backend_url: &str) -> AppResult<Self> {
        let backend_url = Url::parse(backend_url)?;

        Ok(Config {
            backend_url,
            token_store: TokenStoreKind::File(DEFAULT_TOKEN_FILE.into()),
            timezone: DEFAULT_TIMEZONE.to_string(),
            login_callback_port: 8765,
            request_timeout_secs: 15,
            page_path: "/map".to_string(),
            map_bounds: MAP_BOUNDS,
            event_bounds: EVENT_BOUNDS,
        })
    }

    /// Merge region overrides from a TOML file
    pub fn apply_bounds_file(&mut self, path: impl AsRef<Path>) -> AppResult<()> {
        let content = fs::read_to_string(path.as_ref())?;
        let regions: RegionsFile = toml::from_str(&content)?;

        if let Some(map) = regions.map {
            debug!("Overriding map bounds: {:?}", map);
            self.map_bounds = map;
        }
        if let Some(events) = regions.events {
            debug!("Overriding event bounds: {:?}", events);
            self.event_bounds = events;
        }

        Ok(())
    }

    /// Check values that cannot be rejected while parsing
    pub fn validate(&self) -> AppResult<()> {
        self.tz()?;
        self.map_bounds.validate()?;
        self.event_bounds.validate()?;

        if !self.page_path.starts_with('/') {
            return Err(config_error("PAGE_PATH must start with '/'"));
        }

        Ok(())
    }

    /// Parsed timezone
    pub fn tz(&self) -> AppResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Unknown timezone: {}", self.timezone)))
    }
}
