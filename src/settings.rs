//! Runtime configuration.
//!
//! Settings are layered: an optional TOML file first, then environment
//! variables prefixed with `AVAIL_`, using `__` to separate nested keys.
//!
//! ```toml
//! log_level = "info"
//!
//! [broker]
//! kind = "nats"
//! url = "nats://127.0.0.1:4222"
//!
//! [topics]
//! inbound = "HawkularMetricData"
//! outbound = "HawkularAvailData"
//!
//! [publish]
//! encoding = "json"
//! skip_empty = false
//!
//! [delivery]
//! concurrency = 4
//! ```
//!
//! ```bash
//! AVAIL_TOPICS__OUTBOUND=AvailStaging avail-creator run --config avail.toml
//! ```

use std::path::Path;

use anyhow::Result;
use avail_adapters::Encoding;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Top-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Default log filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub broker: BrokerSettings,

    #[serde(default)]
    pub topics: TopicSettings,

    #[serde(default)]
    pub publish: PublishSettings,

    #[serde(default)]
    pub delivery: DeliverySettings,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Which message bus to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    #[default]
    Nats,
    Rabbitmq,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerSettings {
    #[serde(default)]
    pub kind: BrokerKind,

    /// Broker URL; each adapter has its own default.
    pub url: Option<String>,

    /// Topic exchange (RabbitMQ only).
    pub exchange: Option<String>,

    /// Credentials file (NATS only).
    pub credentials_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicSettings {
    /// Topic carrying raw metric batches.
    #[serde(default = "default_inbound_topic")]
    pub inbound: String,

    /// Topic receiving availability batches. Empty means not configured.
    #[serde(default = "default_outbound_topic")]
    pub outbound: Option<String>,
}

impl TopicSettings {
    /// The outbound destination, if one is configured.
    pub fn outbound_destination(&self) -> Option<&str> {
        self.outbound.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            inbound: default_inbound_topic(),
            outbound: default_outbound_topic(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishSettings {
    #[serde(default)]
    pub encoding: Encoding,

    /// Do not publish batches without any status-code record.
    #[serde(default)]
    pub skip_empty: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliverySettings {
    /// Maximum number of invocations in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_inbound_topic() -> String {
    "HawkularMetricData".to_string()
}

fn default_outbound_topic() -> Option<String> {
    Some("HawkularAvailData".to_string())
}

fn default_concurrency() -> usize {
    1
}

impl Settings {
    /// Load settings from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("AVAIL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.topics.inbound.trim().is_empty() {
            anyhow::bail!("topics.inbound must not be empty");
        }
        if self.delivery.concurrency == 0 {
            anyhow::bail!("delivery.concurrency must be at least 1");
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            broker: BrokerSettings::default(),
            topics: TopicSettings::default(),
            publish: PublishSettings::default(),
            delivery: DeliverySettings::default(),
        }
    }
}
