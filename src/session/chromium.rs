use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt as _;
use tokio::task::JoinHandle;
use url::Url;

use super::{PageSession, ReadyCondition, SessionLauncher, SessionOptions};
use crate::error::FetchError;

/// Launches a dedicated Chromium process for every session.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    options: SessionOptions,
}

impl ChromiumLauncher {
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> Result<BrowserConfig, FetchError> {
        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .arg(format!("--user-agent={}", self.options.user_agent))
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|err| FetchError::launch(format!("browser config: {err}")))
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError> {
        let config = self.browser_config()?;
        let timeout = self.options.launch_timeout;

        let (mut browser, mut handler) = tokio::time::timeout(timeout, Browser::launch(config))
            .await
            .map_err(|_| FetchError::launch(format!("timed out after {}ms", timeout.as_millis())))?
            .map_err(FetchError::launch)?;

        let handler_task = tokio::spawn(async move {
            drain_handler(&mut handler).await;
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                shutdown(&mut browser, handler_task).await;
                return Err(FetchError::launch(format!("open page: {err}")));
            }
        };

        tracing::debug!(headless = self.options.headless, "browser session opened");
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            current_url: None,
            post_ready_delay: self.options.post_ready_delay,
            poll_interval: self.options.poll_interval,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    current_url: Option<Url>,
    post_ready_delay: Duration,
    poll_interval: Duration,
}

impl ChromiumSession {
    fn url_label(&self) -> String {
        self.current_url
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_else(|| "about:blank".to_owned())
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), FetchError> {
        self.current_url = Some(url.clone());
        match tokio::time::timeout(timeout, self.page.goto(url.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(FetchError::navigation(url, err)),
            Err(_) => Err(FetchError::timed_out(url, "navigation", timeout)),
        }
    }

    async fn wait_ready(
        &mut self,
        condition: &ReadyCondition,
        timeout: Duration,
    ) -> Result<(), FetchError> {
        match condition {
            ReadyCondition::Settle(delay) => {
                tokio::time::sleep((*delay).min(timeout)).await;
            }
            ReadyCondition::Marker { selector, max_wait } => {
                let page = &self.page;
                let poll_interval = self.poll_interval;
                let poll = async {
                    while page.find_element(selector.as_str()).await.is_err() {
                        tokio::time::sleep(poll_interval).await;
                    }
                };
                if tokio::time::timeout((*max_wait).min(timeout), poll).await.is_err() {
                    tracing::debug!(
                        url = %self.url_label(),
                        selector = selector.as_str(),
                        "ready marker absent; extracting anyway"
                    );
                    return Ok(());
                }
                tokio::time::sleep(self.post_ready_delay).await;
            }
        }
        Ok(())
    }

    async fn html(&mut self) -> Result<String, FetchError> {
        self.page
            .content()
            .await
            .map_err(|err| FetchError::navigation(self.url_label(), format!("read page content: {err}")))
    }

    async fn close(self: Box<Self>) {
        let Self {
            mut browser,
            page,
            handler_task,
            ..
        } = *self;
        if let Err(err) = page.close().await {
            tracing::debug!(?err, "close page failed");
        }
        shutdown(&mut browser, handler_task).await;
        tracing::debug!("browser session closed");
    }
}

/// Polls the CDP event stream until it ends. Per-message errors (for
/// example events the protocol types cannot decode) are logged and the
/// stream keeps being driven; page commands stall without it.
async fn drain_handler<S, E>(handler: &mut S) -> usize
where
    S: futures::Stream<Item = Result<(), E>> + Unpin,
    E: std::fmt::Debug,
{
    let mut errors = 0;
    while let Some(event) = handler.next().await {
        if let Err(err) = event {
            errors += 1;
            tracing::debug!(?err, "cdp handler error");
        }
    }
    errors
}

async fn shutdown(browser: &mut Browser, handler_task: JoinHandle<()>) {
    if let Err(err) = browser.close().await {
        tracing::warn!(?err, "close browser failed");
    }
    if let Err(err) = browser.wait().await {
        tracing::warn!(?err, "wait for browser exit failed");
    }
    handler_task.abort();
}
