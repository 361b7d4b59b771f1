use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use fw_roster::LeapDayPolicy;
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::prelude::deserialize_vec_from_string_or_vec;

/// Application configuration loaded from multiple sources.
///
/// Configuration is loaded in priority order (lowest to highest):
/// 1. Struct defaults
/// 2. config.yaml file (if exists)
/// 3. Environment variables with FW_ prefix (always wins)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub swagger: SwaggerConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database host.
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Database port.
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database name.
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Database user (required — no compiled-in default).
    #[serde(default)]
    pub user: String,

    /// Database password (required — no compiled-in default).
    #[serde(default)]
    pub password: String,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Optional custom migrations directory path.
    pub migrations_dir: Option<String>,
}

impl DatabaseConfig {
    /// Assemble a `PostgreSQL` connection URL from individual fields.
    #[must_use]
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP server bind address.
    #[serde(default = "default_host")]
    pub host: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter (debug, info, warn, error) or a full `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests.
    /// Use `"*"` to allow any origin (not recommended for production).
    /// Accepts either an array or comma-separated string.
    #[serde(
        default = "default_allowed_origins",
        deserialize_with = "deserialize_origins"
    )]
    pub allowed_origins: Vec<String>,
}

/// Deserialize origins from comma-separated string or array, filtering empty values.
fn deserialize_origins<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let origins: Vec<String> = deserialize_vec_from_string_or_vec(deserializer)?;
    Ok(origins.into_iter().filter(|s| !s.is_empty()).collect())
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SwaggerConfig {
    /// Enable Swagger UI at /swagger-ui.
    /// Enable in development via `FW_SWAGGER__ENABLED=true`
    #[serde(default)]
    pub enabled: bool,
}

/// Defaults for the birthday views.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// Upcoming-birthday window in days (inclusive).
    #[serde(default = "default_upcoming_window_days")]
    pub upcoming_window_days: i64,

    /// Maximum number of upcoming birthdays returned when the caller gives no limit.
    #[serde(default = "default_upcoming_limit")]
    pub upcoming_limit: usize,

    /// Where February 29 birthdays land in non-leap years.
    #[serde(default)]
    pub leap_day_policy: LeapDayPolicy,
}

/// Outbound notification gateways. Unset endpoints run in log-only mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
    /// URL accepting `{tokens, title, body}` multicast push requests.
    pub push_endpoint: Option<String>,

    /// Bearer key sent to the push gateway.
    pub push_api_key: Option<String>,

    /// URL accepting `{to, subject, message}` email requests.
    pub email_endpoint: Option<String>,

    /// Per-request timeout for gateway calls.
    #[serde(default = "default_notify_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Media CDN upload signing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub url_endpoint: Option<String>,

    /// Lifetime of signed upload parameters in seconds.
    #[serde(default = "default_media_token_ttl_secs")]
    pub token_ttl_secs: i64,
}

impl MediaConfig {
    /// Media signing is available only when both keys and the endpoint are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        [&self.public_key, &self.private_key, &self.url_endpoint]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

// These functions cannot be const because serde uses function pointers for defaults
#[allow(clippy::missing_const_for_fn)]
fn default_max_connections() -> u32 {
    10
}

#[allow(clippy::missing_const_for_fn)]
fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "fellowship".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_allowed_origins() -> Vec<String> {
    vec![]
}

#[allow(clippy::missing_const_for_fn)]
fn default_upcoming_window_days() -> i64 {
    30
}

#[allow(clippy::missing_const_for_fn)]
fn default_upcoming_limit() -> usize {
    5
}

#[allow(clippy::missing_const_for_fn)]
fn default_notify_timeout_secs() -> u64 {
    10
}

#[allow(clippy::missing_const_for_fn)]
fn default_media_token_ttl_secs() -> i64 {
    1800
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            upcoming_window_days: default_upcoming_window_days(),
            upcoming_limit: default_upcoming_limit(),
            leap_day_policy: LeapDayPolicy::default(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            push_endpoint: None,
            push_api_key: None,
            email_endpoint: None,
            request_timeout_secs: default_notify_timeout_secs(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            private_key: None,
            url_endpoint: None,
            token_ttl_secs: default_media_token_ttl_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                host: default_db_host(),
                port: default_db_port(),
                name: default_db_name(),
                user: String::new(),
                password: String::new(),
                max_connections: default_max_connections(),
                migrations_dir: None,
            },
            server: ServerConfig {
                port: default_port(),
                host: default_host(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
            },
            cors: CorsConfig::default(),
            swagger: SwaggerConfig::default(),
            calendar: CalendarConfig::default(),
            notifications: NotificationsConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl Config {
    /// Load configuration from defaults, `config.yaml` and `FW_` environment variables.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config.yaml")
    }

    /// Load configuration with a custom YAML file path.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load_from(yaml_path: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(yaml_path))
            .merge(Env::prefixed("FW_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.user.is_empty() {
            return Err(ConfigError::Validation(
                "database.user is required. Set FW_DATABASE__USER environment variable or configure in config.yaml.".into(),
            ));
        }

        if self.database.password.is_empty() {
            return Err(ConfigError::Validation(
                "database.password is required. Set FW_DATABASE__PASSWORD environment variable or configure in config.yaml.".into(),
            ));
        }

        if self.database.port == 0 {
            return Err(ConfigError::Validation(
                "database.port cannot be 0".into(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections cannot be 0".into(),
            ));
        }

        for origin in &self.cors.allowed_origins {
            if origin != "*" && !is_http_url(origin) {
                return Err(ConfigError::Validation(format!(
                    "cors.allowed_origins contains invalid origin '{origin}'. Must be '*' or start with http:// or https://"
                )));
            }
        }

        if self.calendar.upcoming_window_days < 0 {
            return Err(ConfigError::Validation(
                "calendar.upcoming_window_days cannot be negative".into(),
            ));
        }

        if self.calendar.upcoming_limit == 0 {
            return Err(ConfigError::Validation(
                "calendar.upcoming_limit must be at least 1".into(),
            ));
        }

        for (name, endpoint) in [
            ("notifications.push_endpoint", &self.notifications.push_endpoint),
            ("notifications.email_endpoint", &self.notifications.email_endpoint),
            ("media.url_endpoint", &self.media.url_endpoint),
        ] {
            if let Some(url) = endpoint {
                if !is_http_url(url) {
                    return Err(ConfigError::Validation(format!(
                        "{name} must start with http:// or https://, got: '{url}'"
                    )));
                }
            }
        }

        if self.notifications.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "notifications.request_timeout_secs cannot be 0".into(),
            ));
        }

        if self.media.is_configured() && !(1..=3600).contains(&self.media.token_ttl_secs) {
            return Err(ConfigError::Validation(format!(
                "media.token_ttl_secs must be between 1 and 3600, got: {}",
                self.media.token_ttl_secs
            )));
        }

        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
