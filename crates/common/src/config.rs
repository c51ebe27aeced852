use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Build database URL from configuration
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Same as [`url`](Self::url) with the password masked, for logging
    pub fn redacted_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            username: "serviceuser".to_string(),
            password: "servicepassword".to_string(),
            database: "servicedb".to_string(),
            max_connections: 10,
        }
    }
}

/// Kafka feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub consumer_group: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "orders".to_string(),
            consumer_group: "order-service".to_string(),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub addr: SocketAddr,
    /// Directory served under `/dashboard`
    pub static_dir: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub http: HttpConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            kafka: KafkaConfig::default(),
            http: HttpConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let db = &mut config.database;
        set_string(&lookup, "POSTGRES_HOST", &mut db.host);
        set_parsed(&lookup, "POSTGRES_PORT", &mut db.port)?;
        set_string(&lookup, "POSTGRES_DB", &mut db.database);
        set_string(&lookup, "POSTGRES_SERVICE_USER", &mut db.username);
        set_string(&lookup, "POSTGRES_SERVICE_PASSWORD", &mut db.password);
        set_parsed(&lookup, "DB_MAX_CONNECTIONS", &mut db.max_connections)?;

        let kafka = &mut config.kafka;
        set_string(&lookup, "KAFKA_BROKERS", &mut kafka.brokers);
        set_string(&lookup, "KAFKA_TOPIC", &mut kafka.topic);
        set_string(&lookup, "CONSUMER_GROUP", &mut kafka.consumer_group);

        set_parsed(&lookup, "HTTP_ADDR", &mut config.http.addr)?;
        set_parsed(&lookup, "STATIC_DIR", &mut config.http.static_dir)?;
        set_string(&lookup, "RUST_LOG", &mut config.log_level);

        Ok(config)
    }
}

fn set_string<F>(lookup: &F, key: &'static str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        *target = value;
    }
}

fn set_parsed<F, T>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = lookup(key) {
        *target = value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        })?;
    }
    Ok(())
}
