//! Service configuration
//!
//! Every key has a default. Values come from an optional
//! `database-logger.{toml,yaml,json}` file, then from environment variables
//! (`MQTT_HOST`, `DB_PORT`, ...), later sources winning.

use config::{Config, ConfigError, Environment, File};
use mqtt_bridge::BrokerConfig;
use serde::Deserialize;
use std::time::Duration;
use storage::DatabaseConfig;

/// Base name of the optional configuration file
pub const CONFIG_FILE: &str = "database-logger";

/// Flat key/value settings of the service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: String,
    pub mqtt_password: String,
    pub mqtt_client_id: String,
    pub mqtt_keep_alive_secs: u64,
    /// Prefix of the subscribed topics
    pub topic_namespace: String,

    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    /// Fixed pause between database connection attempts
    pub db_retry_delay_secs: u64,

    /// `trace`, `debug`, `info`, `warn` or `error`
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_username: "user1".to_string(),
            mqtt_password: "pass1".to_string(),
            mqtt_client_id: "database_logger_service".to_string(),
            mqtt_keep_alive_secs: 60,
            topic_namespace: "lab/room1".to_string(),
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_name: "iot_final_project".to_string(),
            db_user: "postgres".to_string(),
            db_password: "1".to_string(),
            db_retry_delay_secs: 5,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load from the optional config file and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::default())
            .build()?;
        Self::from_config(config)
    }

    /// Deserialize from an already built configuration
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }

    /// Broker settings for the MQTT bridge
    pub fn broker(&self) -> BrokerConfig {
        BrokerConfig {
            host: self.mqtt_host.clone(),
            port: self.mqtt_port,
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
            client_id: self.mqtt_client_id.clone(),
            keep_alive: Duration::from_secs(self.mqtt_keep_alive_secs),
            namespace: self.topic_namespace.clone(),
            ..Default::default()
        }
    }

    /// Connection settings for the database
    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            host: self.db_host.clone(),
            port: self.db_port,
            name: self.db_name.clone(),
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            retry_delay: Duration::from_secs(self.db_retry_delay_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_gives_defaults() {
        let config = Config::builder().build().unwrap();
        let settings = Settings::from_config(config).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_overrides_applied() {
        let config = Config::builder()
            .set_override("db_port", "6543")
            .unwrap()
            .set_override("topic_namespace", "home/kitchen")
            .unwrap()
            .set_override("db_retry_delay_secs", 2)
            .unwrap()
            .build()
            .unwrap();
        let settings = Settings::from_config(config).unwrap();

        assert_eq!(settings.db_port, 6543);
        assert_eq!(settings.topic_namespace, "home/kitchen");
        assert_eq!(settings.mqtt_port, 1883);
        assert_eq!(settings.database().retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_projection_into_component_configs() {
        let settings = Settings {
            mqtt_host: "broker".to_string(),
            mqtt_keep_alive_secs: 30,
            db_name: "lab".to_string(),
            ..Default::default()
        };

        let broker = settings.broker();
        assert_eq!(broker.host, "broker");
        assert_eq!(broker.keep_alive, Duration::from_secs(30));
        assert_eq!(broker.namespace, "lab/room1");
        assert_eq!(broker.client_id, "database_logger_service");

        let database = settings.database();
        assert_eq!(database.name, "lab");
        assert_eq!(database.user, "postgres");
        assert_eq!(database.retry_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let config = Config::builder()
            .set_override("mqtt_port", "not-a-port")
            .unwrap()
            .build()
            .unwrap();
        assert!(Settings::from_config(config).is_err());
    }
}
