//! Configuration management for the valet server

use chrono::NaiveTime;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Minimum byte length of the token signing secret
pub const MIN_JWT_SECRET_BYTES: usize = 32;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection string, e.g. `sqlite://data/valet.db?mode=rwc`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: u64,
    /// PIN given to the seeded manager account
    pub manager_pin: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
    pub smtp_from_name: Option<String>,
    pub smtp_use_tls: bool,
    /// Recipient of the daily report
    pub manager_email: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HotelConfig {
    /// IANA timezone used for every local rendering and day boundary
    pub timezone: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    /// Records whose arrival is older than this many days are purged; 0 disables purging
    pub days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    pub dir: String,
    pub max_image_mb: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub origins: Vec<String>,
    /// Also accept `http(s)://localhost[:port]` origins
    pub allow_localhost: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Requests per minute and client address under `/api`; 0 disables the limit
    pub per_minute: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CronConfig {
    /// Shared secret expected in the `x-cron-key` header; empty disables the trigger endpoint
    pub secret: String,
    pub enable_local: bool,
    /// Local wall-clock time of the daily run (HH:MM)
    pub run_at: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub hotel: HotelConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Environment variables with prefix VALET_, e.g. VALET_EMAIL__SMTP_HOST
            .add_source(
                Environment::with_prefix("VALET")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.origins")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("auth.jwt_secret", env::var("AUTH_SECRET").ok())?
            .set_override_option("hotel.timezone", env::var("HOTEL_TZ").ok())?
            .set_override_option("email.manager_email", env::var("MANAGER_EMAIL").ok())?
            .set_override_option("cron.secret", env::var("CRON_SECRET").ok())?
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.as_bytes().len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::Message(format!(
                "auth.jwt_secret must be at least {} bytes long",
                MIN_JWT_SECRET_BYTES
            )));
        }
        self.hotel.tz()?;
        self.cron.run_at_time()?;
        if self.uploads.max_image_mb <= 0.0 {
            return Err(ConfigError::Message("uploads.max_image_mb must be positive".to_string()));
        }
        Ok(())
    }
}

impl HotelConfig {
    /// Parsed hotel timezone
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Message(format!("Unknown hotel timezone: {}", self.timezone)))
    }
}

impl UploadsConfig {
    /// Maximum accepted photo size in bytes
    pub fn max_image_bytes(&self) -> usize {
        (self.max_image_mb * 1024.0 * 1024.0) as usize
    }
}

impl CronConfig {
    pub fn run_at_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.run_at, "%H:%M")
            .map_err(|_| ConfigError::Message(format!("cron.run_at must be HH:MM, got {}", self.run_at)))
    }
}

impl EmailConfig {
    /// Whether the daily report can be mailed at all
    pub fn is_configured(&self) -> bool {
        !self.smtp_host.is_empty() && !self.manager_email.is_empty()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/valet.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: "valet@localhost".to_string(),
            smtp_from_name: Some("Valet".to_string()),
            smtp_use_tls: true,
            manager_email: String::new(),
        }
    }
}

impl Default for HotelConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { days: 30 }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            max_image_mb: 1.5,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: Vec::new(),
            allow_localhost: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { per_minute: 60 }
    }
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            enable_local: true,
            run_at: "23:59".to_string(),
        }
    }
}
