use std::env;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Centrifugo (real-time broker) HTTP API configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub api_url: String,
    pub api_key: String,
    pub channel: String,
    pub timeout_secs: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid LOG_FORMAT: {}. Must be one of: pretty, json", s)),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    pub log_level: String,
    pub log_format: LogFormat,
    pub grpc_port: u16,
    pub environment: String,
    pub migrations_path: String,
    pub seed_demo_data: bool,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env_parse::<u32>("DATABASE_MAX_CONNECTIONS").unwrap_or(10);
        let acquire_timeout_secs = env_parse::<u64>("DATABASE_ACQUIRE_TIMEOUT_SECS").unwrap_or(30);
        let idle_timeout_secs = env_parse::<u64>("DATABASE_IDLE_TIMEOUT_SECS").unwrap_or(600); // 10 minutes
        let max_lifetime_secs = env_parse::<u64>("DATABASE_MAX_LIFETIME_SECS").unwrap_or(1800); // 30 minutes
        let test_before_acquire = env_parse::<bool>("DATABASE_TEST_BEFORE_ACQUIRE").unwrap_or(true);

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/sport".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl BrokerConfig {
    /// Create broker config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let api_url = env::var("CENTRIFUGO_API_URL").unwrap_or(defaults.api_url);
        let api_key = env::var("CENTRIFUGO_API_KEY").unwrap_or(defaults.api_key);
        let channel = env::var("CENTRIFUGO_CHANNEL").unwrap_or(defaults.channel);
        let timeout_secs = env_parse::<u64>("CENTRIFUGO_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs);

        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(format!("Invalid CENTRIFUGO_API_URL: {}", api_url));
        }

        if channel.trim().is_empty() {
            return Err("CENTRIFUGO_CHANNEL must not be empty".to_string());
        }

        if timeout_secs == 0 {
            return Err("CENTRIFUGO_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            channel,
            timeout_secs,
        })
    }

    /// Get publish timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            api_key: String::new(),
            channel: "odds_updates".to_string(),
            timeout_secs: 5,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let broker = BrokerConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("LOG_FORMAT") {
            Ok(s) => LogFormat::from_str(&s)?,
            Err(_) => LogFormat::Pretty,
        };

        let grpc_port = env_parse::<u16>("GRPC_PORT").unwrap_or(50051);

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let migrations_path =
            env::var("MIGRATIONS_PATH").unwrap_or_else(|_| "./migrations".to_string());

        let seed_demo_data = env_parse::<bool>("SEED_DEMO_DATA").unwrap_or(false);

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        Ok(Self {
            database,
            broker,
            log_level: log_level.to_lowercase(),
            log_format,
            grpc_port,
            environment: environment.to_lowercase(),
            migrations_path,
            seed_demo_data,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            broker: BrokerConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            grpc_port: 50051,
            environment: "development".to_string(),
            migrations_path: "./migrations".to_string(),
            seed_demo_data: false,
        }
    }
}
