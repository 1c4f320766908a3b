//! Automated page sessions.
//!
//! A [`SessionLauncher`] opens one [`PageSession`] per fetch attempt. The
//! session navigates, waits for the asynchronously rendered content to be
//! ready, and hands the rendered HTML to an extraction [`Schema`].
//! [`PageSession::close`] consumes the session, so it can run at most once.

pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;
use crate::schema::{Record, Schema};

/// When a rendered page counts as ready for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyCondition {
    /// Poll for a marker element for up to `max_wait`. A marker that never
    /// shows up is not a failure: the page may legitimately be empty, and
    /// extraction decides what is missing.
    Marker { selector: String, max_wait: Duration },
    /// Fixed settle delay for pages without a reliable DOM marker. Trades
    /// latency on fast renders for misses on slow ones.
    Settle(Duration),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub user_agent: String,
    pub headless: bool,
    pub chrome_executable: Option<std::path::PathBuf>,
    pub launch_timeout: Duration,
    /// Extra wait after a selector appears, absorbing residual rendering.
    pub post_ready_delay: Duration,
    pub poll_interval: Duration,
}

#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), FetchError>;

    async fn wait_ready(
        &mut self,
        condition: &ReadyCondition,
        timeout: Duration,
    ) -> Result<(), FetchError>;

    async fn html(&mut self) -> Result<String, FetchError>;

    async fn extract(&mut self, schema: &Schema) -> Result<Vec<Record>, FetchError> {
        let html = self.html().await?;
        schema.extract(&html)
    }

    /// Releases every automation resource held by the session.
    async fn close(self: Box<Self>);
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError>;
}
