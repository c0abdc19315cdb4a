use anyhow::Result;
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

impl Config {
    /// Override the refresh interval from the command line
    pub fn with_interval(mut self, interval: Option<u64>) -> Self {
        if let Some(interval) = interval {
            self.feed.refresh_interval = interval;
        }
        self
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: Source,
    pub http: Http,
    #[serde(default)]
    pub feed: Feed,
}

#[derive(Debug, Clone)]
pub struct Source {
    pub url: String,
    pub token: String,
    pub insecure: bool,
    pub fixture: Option<PathBuf>,
    /// Upper bound on a single request to the alert source
    pub timeout: Duration,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            insecure: false,
            fixture: None,
            timeout: Duration::from_secs(default_source_timeout()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Http {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Feed {
    /// Seconds between scheduled refreshes
    #[serde(rename = "refreshInterval", default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Keep dismissals across refreshes for alerts whose id survives
    #[serde(rename = "preserveDismissed", default = "default_preserve_dismissed")]
    pub preserve_dismissed: bool,
}

impl Feed {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            preserve_dismissed: default_preserve_dismissed(),
        }
    }
}

fn default_source_timeout() -> u64 {
    30
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_preserve_dismissed() -> bool {
    true
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        tracing::info!("Loading config from file");

        let config = std::fs::read_to_string(path)?;
        let config: Config = serde_norway::from_str(&config)?;

        if config.feed.refresh_interval == 0 {
            anyhow::bail!("feed.refreshInterval must be greater than zero");
        }

        Ok(config)
    }
}

impl Source {
    /// Create a new Source instance, resolving token from environment variable if needed
    pub fn new(
        url: Option<String>,
        token: Option<String>,
        token_from: Option<String>,
        insecure: bool,
        fixture: Option<PathBuf>,
        timeout: Option<u64>,
    ) -> anyhow::Result<Self> {
        let token = match (token, token_from) {
            (Some(token), _) => token,
            (None, Some(var)) => std::env::var(&var)
                .map_err(|e| anyhow::anyhow!("Failed to read token from ${}: {}", var, e))?,
            (None, None) => String::new(),
        };

        let url = match (url, &fixture) {
            (Some(url), _) => url,
            (None, Some(_)) => String::new(),
            (None, None) => anyhow::bail!("source.url is required unless source.fixture is set"),
        };

        let timeout = timeout.unwrap_or_else(default_source_timeout);
        if timeout == 0 {
            anyhow::bail!("source.timeout must be greater than zero");
        }

        Ok(Self {
            url,
            token,
            insecure,
            fixture,
            timeout: Duration::from_secs(timeout),
        })
    }
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct SourceRaw {
            url: Option<String>,
            token: Option<String>,
            #[serde(rename = "tokenFrom")]
            token_from: Option<String>,
            #[serde(default)]
            insecure: Option<bool>,
            fixture: Option<PathBuf>,
            timeout: Option<u64>,
        }

        let raw = SourceRaw::deserialize(deserializer)?;
        Source::new(
            raw.url,
            raw.token,
            raw.token_from,
            raw.insecure.unwrap_or(false),
            raw.fixture,
            raw.timeout,
        )
        .map_err(serde::de::Error::custom)
    }
}
