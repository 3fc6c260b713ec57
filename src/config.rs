use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;

// ---------------------------------------------------------------------------
// DatabaseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Constant delay between connection attempts.
    pub retry_delay: Duration,
    /// Apply the bundled migrations after connecting.
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

// ---------------------------------------------------------------------------
// MqttConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    /// Wildcard subscription covering every device topic, e.g. `iots6/#`.
    pub topic: String,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Pause between polls after a connection error; rumqttc reconnects on the next poll.
    pub reconnect_delay: Duration,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub mqtt: MqttConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// mutate the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(lookup);

        let database = DatabaseConfig {
            name: env.optional("POSTGRES_DB", "iotdb"),
            user: env.optional("POSTGRES_USER", "iotuser"),
            password: env.optional("POSTGRES_PASSWORD", "iotpass"),
            host: env.optional("POSTGRES_HOST", "timescaledb"),
            port: env
                .optional("POSTGRES_PORT", "5432")
                .parse()
                .context("POSTGRES_PORT must be a valid port number")?,
            retry_delay: Duration::from_secs(
                env.optional("DB_RETRY_DELAY_SECS", "5")
                    .parse()
                    .context("DB_RETRY_DELAY_SECS must be a positive integer")?,
            ),
            run_migrations: parse_bool(&env.optional("RUN_MIGRATIONS", "true"))
                .context("RUN_MIGRATIONS must be true or false")?,
        };

        let mqtt = MqttConfig {
            broker: env.optional("MQTT_BROKER", "localhost"),
            port: env
                .optional("MQTT_PORT", "1883")
                .parse()
                .context("MQTT_PORT must be a valid port number")?,
            topic: env.optional("MQTT_TOPIC", "iots6/#"),
            client_id: env
                .get("MQTT_CLIENT_ID")
                .map(|id| id.trim().to_owned())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("iot-ingest-{}", std::process::id())),
            keep_alive: Duration::from_secs(
                env.optional("MQTT_KEEP_ALIVE_SECS", "60")
                    .parse()
                    .context("MQTT_KEEP_ALIVE_SECS must be a positive integer")?,
            ),
            reconnect_delay: Duration::from_secs(
                env.optional("MQTT_RECONNECT_DELAY_SECS", "1")
                    .parse()
                    .context("MQTT_RECONNECT_DELAY_SECS must be a positive integer")?,
            ),
        };

        Ok(Self { database, mqtt })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }
}

/// Accepts the usual spellings of a boolean flag, case-insensitively.
fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("invalid boolean: {other:?}")),
    }
}
