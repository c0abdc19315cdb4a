use crate::{
    alert::Alert,
    config::Source as SourceConfig,
    metrics::{
        Status,
        external::{alert_source_timer, record_alert_source_failure, record_alert_source_request},
    },
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};

/// Failure to retrieve the alert collection
#[derive(Debug, thiserror::Error)]
pub enum AlertFetchFailure {
    #[error("alert source request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("alert source returned HTTP {0}")]
    Status(StatusCode),

    #[error("alert source returned malformed alerts: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read alert fixture {path}: {source}")]
    Fixture {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Anything that can hand over the current alert collection
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn fetch_alerts(&self) -> Result<Vec<Alert>, AlertFetchFailure>;
}

/// Build the source described by the config
pub fn from_config(config: &SourceConfig) -> anyhow::Result<Box<dyn AlertSource>> {
    match &config.fixture {
        Some(path) => {
            tracing::info!("Serving alerts from fixture {}", path.display());
            Ok(Box::new(FixtureAlertSource::from_file(path)))
        }
        None => Ok(Box::new(HttpAlertSource::new(config.clone())?)),
    }
}

pub struct HttpAlertSource {
    config: SourceConfig,
    client: reqwest::Client,
}

impl HttpAlertSource {
    /// Create a new HTTP alert source
    pub fn new(config: SourceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, client })
    }

    async fn request(&self) -> Result<Vec<Alert>, AlertFetchFailure> {
        let mut request = self
            .client
            .get(format!("{}/alerts", self.config.url.trim_end_matches('/')));

        if !self.config.token.is_empty() {
            request = request.bearer_auth(&self.config.token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(AlertFetchFailure::Status(response.status()));
        }

        let body = response.text().await?;
        let alerts: Vec<Alert> = serde_json::from_str(&body)?;

        Ok(alerts)
    }
}

#[async_trait]
impl AlertSource for HttpAlertSource {
    #[tracing::instrument(skip(self))]
    async fn fetch_alerts(&self) -> Result<Vec<Alert>, AlertFetchFailure> {
        tracing::debug!("Fetching alerts from {}", self.config.url);
        let _timer = alert_source_timer();

        match self.request().await {
            Ok(alerts) => {
                record_alert_source_request(Status::Success);
                Ok(alerts)
            }
            Err(e) => {
                record_alert_source_request(Status::Failure);
                record_alert_source_failure();
                Err(e)
            }
        }
    }
}

/// Serves a fixed alert list, either held in memory or re-read from a JSON file on each fetch
pub enum FixtureAlertSource {
    Static(Vec<Alert>),
    File(PathBuf),
}

impl FixtureAlertSource {
    pub fn new(alerts: Vec<Alert>) -> Self {
        FixtureAlertSource::Static(alerts)
    }

    pub fn from_file(path: &Path) -> Self {
        FixtureAlertSource::File(path.to_path_buf())
    }
}

#[async_trait]
impl AlertSource for FixtureAlertSource {
    async fn fetch_alerts(&self) -> Result<Vec<Alert>, AlertFetchFailure> {
        match self {
            FixtureAlertSource::Static(alerts) => Ok(alerts.clone()),
            FixtureAlertSource::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|source| {
                    AlertFetchFailure::Fixture {
                        path: path.clone(),
                        source,
                    }
                })?;

                Ok(serde_json::from_str(&content)?)
            }
        }
    }
}
