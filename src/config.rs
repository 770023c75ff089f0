use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    pub smtp: SmtpConfig,
    pub telegram: TelegramConfig,
    /// Origin allowed to call the API from a browser. Permissive when unset.
    pub cors_allowed_origin: Option<String>,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

/// Dispatch engine tuning
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound for a single channel sender call
    pub send_timeout: Duration,
}

/// SMTP settings for the email channel
#[derive(Debug, Clone, Default)]
pub struct SmtpConfig {
    /// Email delivery fails with a configuration error while this is unset
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
}

/// Telegram Bot API settings for the chat channel
#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            database: DatabaseConfig::from_env()?,
            dispatch: DispatchConfig::from_env(),
            smtp: SmtpConfig::from_env(),
            telegram: TelegramConfig::from_env(),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .ok()
                .filter(|v| !v.is_empty()),
        })
    }
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            url,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
            acquire_timeout: Duration::from_secs(
                env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            ),
            idle_timeout: Duration::from_secs(
                env::var("DATABASE_IDLE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .unwrap_or(600),
            ),
            max_lifetime: Duration::from_secs(
                env::var("DATABASE_MAX_LIFETIME_SECS")
                    .unwrap_or_else(|_| "1800".to_string())
                    .parse()
                    .unwrap_or(1800),
            ),
        })
    }
}

impl DispatchConfig {
    /// Load dispatch configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            send_timeout: Duration::from_secs(
                env::var("DISPATCH_SEND_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            ),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl SmtpConfig {
    /// Load SMTP configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            host: env::var("SMTP_HOST").ok().filter(|v| !v.is_empty()),
            port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .unwrap_or(587),
            username: env::var("SMTP_USERNAME").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            from_address: env::var("SMTP_FROM")
                .unwrap_or_else(|_| "notifications@localhost".to_string()),
        }
    }
}

impl TelegramConfig {
    /// Load Telegram configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            bot_token: env::var("TELEGRAM_BOT_TOKEN").ok().filter(|v| !v.is_empty()),
            api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    MissingDatabaseUrl,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "PORT must be a valid number"),
            ConfigError::MissingDatabaseUrl => {
                write!(f, "DATABASE_URL environment variable is required")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
