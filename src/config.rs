use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::retry::RetryPolicy;
use crate::session::SessionOptions;
use crate::site::SiteRules;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub user_agent: String,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,

    /// Book documents live directly here; the cache lives in `cache/`.
    pub data_dir: PathBuf,

    pub search_timeout_secs: u64,
    pub index_timeout_secs: u64,
    pub content_timeout_secs: u64,
    pub launch_timeout_secs: u64,
    pub settle_delay_ms: u64,
    /// Upper bound on waiting for an index or body marker element.
    pub marker_wait_ms: u64,
    pub post_ready_delay_ms: u64,
    pub ready_poll_interval_ms: u64,

    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub cache_ttl_secs: u64,
    pub fetch_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://www.pilishuwu.com".to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headless: true,
            chrome_executable: None,
            data_dir: PathBuf::from("."),
            search_timeout_secs: 60,
            index_timeout_secs: 60,
            content_timeout_secs: 30,
            launch_timeout_secs: 30,
            settle_delay_ms: 2000,
            marker_wait_ms: 10_000,
            post_ready_delay_ms: 500,
            ready_poll_interval_ms: 250,
            max_attempts: 3,
            backoff_secs: 5,
            cache_ttl_secs: 86_400,
            fetch_concurrency: 1,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies `NOVELSHELF_*` overrides on top of the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("NOVELSHELF_BASE_URL") {
            config.base_url = v;
        }
        if let Some(v) = var("NOVELSHELF_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = var("NOVELSHELF_HEADLESS") {
            config.headless = parse_bool(&v).context("NOVELSHELF_HEADLESS")?;
        }
        if let Some(v) = var("NOVELSHELF_CHROME") {
            config.chrome_executable = Some(PathBuf::from(v));
        }
        if let Some(v) = var("NOVELSHELF_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("NOVELSHELF_MAX_ATTEMPTS") {
            config.max_attempts = parse_number(&v, "NOVELSHELF_MAX_ATTEMPTS")?;
        }
        if let Some(v) = var("NOVELSHELF_BACKOFF_SECS") {
            config.backoff_secs = parse_number(&v, "NOVELSHELF_BACKOFF_SECS")?;
        }
        if let Some(v) = var("NOVELSHELF_CACHE_TTL_SECS") {
            config.cache_ttl_secs = parse_number(&v, "NOVELSHELF_CACHE_TTL_SECS")?;
        }
        if let Some(v) = var("NOVELSHELF_SETTLE_DELAY_MS") {
            config.settle_delay_ms = parse_number(&v, "NOVELSHELF_SETTLE_DELAY_MS")?;
        }
        if let Some(v) = var("NOVELSHELF_MARKER_WAIT_MS") {
            config.marker_wait_ms = parse_number(&v, "NOVELSHELF_MARKER_WAIT_MS")?;
        }
        if let Some(v) = var("NOVELSHELF_FETCH_CONCURRENCY") {
            config.fetch_concurrency = parse_number(&v, "NOVELSHELF_FETCH_CONCURRENCY")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid base url: {}", self.base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("base url must be http/https: {url}");
        }
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be > 0");
        }
        if self.fetch_concurrency == 0 {
            anyhow::bail!("fetch_concurrency must be > 0");
        }
        Ok(())
    }

    pub fn books_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            user_agent: self.user_agent.clone(),
            headless: self.headless,
            chrome_executable: self.chrome_executable.clone(),
            launch_timeout: Duration::from_secs(self.launch_timeout_secs),
            post_ready_delay: Duration::from_millis(self.post_ready_delay_ms),
            poll_interval: Duration::from_millis(self.ready_poll_interval_ms.max(10)),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_secs(self.backoff_secs),
        }
    }

    pub fn site_rules(&self) -> anyhow::Result<SiteRules> {
        let base_url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid base url: {}", self.base_url))?;
        Ok(SiteRules::pilishuwu(
            base_url,
            Duration::from_millis(self.settle_delay_ms),
            Duration::from_millis(self.marker_wait_ms),
        ))
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            search: Duration::from_secs(self.search_timeout_secs),
            index: Duration::from_secs(self.index_timeout_secs),
            content: Duration::from_secs(self.content_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Per-page bound covering navigation, readiness and extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub search: Duration,
    pub index: Duration,
    pub content: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Config::default().timeouts()
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}

fn parse_number<T>(raw: &str, key: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("invalid {key}={raw:?}"))
}
