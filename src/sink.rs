use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::SinkConfig;

/// Per-channel liveness record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckRecord {
    pub rover_id: String,
    pub rpi_id: String,
    /// Channel the record is about
    pub device_id: String,
    /// `"1"` when live, `"0"` when dead
    pub check_status: String,
    pub check_value: String,
    pub date_time: String,
    pub location_x: String,
    pub location_y: String,
    pub location_z: String,
    pub remarks: String,
}

/// Success summary, sent once when every channel is live.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub activity_id: String,
    pub rover_id: String,
    pub activity_type: String,
    pub description: String,
    pub location_x: String,
    pub location_y: String,
    pub location_z: String,
    pub created_at: String,
}

/// Failure summary, sent once when at least one channel is dead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub activity_id: String,
    pub activity_type: String,
    pub error_code: String,
    pub rover_id: String,
    pub error_message: String,
    pub location_x: String,
    pub location_y: String,
    pub location_z: String,
    pub created_at: String,
}

/// Receiver of monitor records.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn health_check(&self, record: &HealthCheckRecord) -> anyhow::Result<()>;

    async fn activity(&self, record: &ActivityRecord) -> anyhow::Result<()>;

    async fn error(&self, record: &ErrorRecord) -> anyhow::Result<()>;
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for Arc<S> {
    async fn health_check(&self, record: &HealthCheckRecord) -> anyhow::Result<()> {
        (**self).health_check(record).await
    }

    async fn activity(&self, record: &ActivityRecord) -> anyhow::Result<()> {
        (**self).activity(record).await
    }

    async fn error(&self, record: &ErrorRecord) -> anyhow::Result<()> {
        (**self).error(record).await
    }
}

/// Sink posting JSON records to three HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    config: SinkConfig,
}

impl HttpSink {
    pub fn new(config: SinkConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    #[instrument(skip(self, body))]
    async fn post<T: Serialize + Sync>(&self, url: &str, body: &T) -> anyhow::Result<()> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("sink answered with status {status}");
        }

        info!("record accepted with status {status}");
        Ok(())
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn health_check(&self, record: &HealthCheckRecord) -> anyhow::Result<()> {
        self.post(&self.config.health_check_url, record).await
    }

    async fn activity(&self, record: &ActivityRecord) -> anyhow::Result<()> {
        self.post(&self.config.activity_url, record).await
    }

    async fn error(&self, record: &ErrorRecord) -> anyhow::Result<()> {
        self.post(&self.config.error_url, record).await
    }
}
