// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process configuration, read once from the environment at startup.
//! Every other part of the server treats [`ServerConfig`] as immutable
//! for the life of the process.

use anyhow::Context;
use derive_builder::Builder;

/// Default bind address if `MAESTRA_HTTP_ADDR` isn't set.
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Default MQTT broker port if `MQTT_PORT` isn't set.
const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ServerConfig {
    pub database_url: String,
    pub nats_url: String,
    pub mqtt_broker: String,
    #[builder(default = "DEFAULT_MQTT_PORT")]
    pub mqtt_port: u16,
    pub redis_url: String,
    #[builder(default = "DEFAULT_HTTP_ADDR.to_string()")]
    pub http_addr: String,
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error naming the missing variable if `DATABASE_URL`,
    /// `NATS_URL`, `MQTT_BROKER`, or `REDIS_URL` aren't set. `MQTT_PORT`
    /// and `MAESTRA_HTTP_ADDR` fall back to their defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let mqtt_port = match std::env::var("MQTT_PORT") {
            Ok(raw) => raw.parse().context("MQTT_PORT is not a valid port number")?,
            Err(_) => DEFAULT_MQTT_PORT,
        };
        let http_addr = std::env::var("MAESTRA_HTTP_ADDR").unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string());

        ServerConfigBuilder::default()
            .database_url(require_env("DATABASE_URL")?)
            .nats_url(require_env("NATS_URL")?)
            .mqtt_broker(require_env("MQTT_BROKER")?)
            .mqtt_port(mqtt_port)
            .redis_url(require_env("REDIS_URL")?)
            .http_addr(http_addr)
            .build()
            .context("incomplete server configuration")
    }
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("environment variable {name} is required"))
}
