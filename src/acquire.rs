//! Acquisition flows: search, chapter index, chapter content.
//!
//! Nothing here persists books; callers decide what goes into the
//! [`crate::store::BookStore`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use futures::StreamExt as _;
use url::Url;

use crate::cache::ContentCache;
use crate::config::{Config, Timeouts};
use crate::error::FetchError;
use crate::formats::{BookRecord, BookStub, ChapterRef};
use crate::retry::{PageFetch, RetryController, RetryPolicy};
use crate::schema::Record;
use crate::session::chromium::ChromiumLauncher;
use crate::session::{PageSession, SessionLauncher};
use crate::site::{PageRules, SiteRules, menu_url_for};

pub struct Acquirer {
    launcher: Arc<dyn SessionLauncher>,
    site: SiteRules,
    cache: ContentCache,
    retry: RetryController,
    timeouts: Timeouts,
    concurrency: usize,
}

impl Acquirer {
    pub fn new(launcher: Arc<dyn SessionLauncher>, site: SiteRules, cache: ContentCache) -> Self {
        Self {
            launcher,
            site,
            cache,
            retry: RetryController::new(RetryPolicy::default()),
            timeouts: Timeouts::default(),
            concurrency: 1,
        }
    }

    /// Chromium-backed acquirer with an initialised cache directory.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let cache = ContentCache::new(config.cache_dir(), config.cache_ttl());
        cache.init().await.context("init content cache")?;
        let launcher = Arc::new(ChromiumLauncher::new(config.session_options()));
        Ok(Self::new(launcher, config.site_rules()?, cache)
            .with_retry_policy(config.retry_policy())
            .with_timeouts(config.timeouts())
            .with_concurrency(config.fetch_concurrency))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryController::new(policy);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn site(&self) -> &SiteRules {
        &self.site
    }

    /// Single attempt. `None` means the search page could not be fetched;
    /// `Some(vec![])` means it had no results.
    pub async fn search(&self, keyword: &str) -> Option<Vec<BookStub>> {
        if keyword.trim().is_empty() {
            tracing::debug!("empty search keyword");
            return Some(Vec::new());
        }

        let url = match self.site.search_url(keyword) {
            Ok(url) => url,
            Err(err) => {
                tracing::error!(error = %err, "build search url failed");
                return None;
            }
        };
        tracing::info!(%url, keyword, "searching");

        let request = PageRequest {
            url,
            site: &self.site,
            rules: &self.site.search,
            timeout: self.timeouts.search,
            parse: |site, records| Ok(site.parse_search(records)),
        };
        match RetryController::new(RetryPolicy::once())
            .run(self.launcher.as_ref(), &request)
            .await
        {
            Ok(stubs) => {
                tracing::info!(keyword, count = stubs.len(), "search finished");
                Some(stubs)
            }
            Err(err) => {
                tracing::error!(keyword, error = %err, "search failed");
                None
            }
        }
    }

    /// Retried. An empty index is a valid result and is not retried.
    pub async fn fetch_chapters(&self, menu_url: &str) -> Option<Vec<ChapterRef>> {
        let url = parse_url(menu_url)?;
        tracing::info!(%url, "fetching chapter index");

        let request = PageRequest {
            url,
            site: &self.site,
            rules: &self.site.chapter_index,
            timeout: self.timeouts.index,
            parse: SiteRules::parse_chapter_index,
        };
        match self.retry.run(self.launcher.as_ref(), &request).await {
            Ok(chapters) => {
                tracing::info!(menu_url, count = chapters.len(), "chapter index fetched");
                Some(chapters)
            }
            Err(err) => {
                tracing::error!(menu_url, error = %err, "chapter index unavailable");
                None
            }
        }
    }

    /// Cache first unless `force_refresh`; a fetched body is written back to
    /// the cache before it is returned.
    pub async fn get_content(&self, url: &str, force_refresh: bool) -> Option<String> {
        if !force_refresh {
            if let Some(content) = self.cache.get(url).await {
                tracing::info!(url, "chapter content served from cache");
                return Some(content);
            }
        }

        let parsed = parse_url(url)?;
        tracing::info!(url, force_refresh, "fetching chapter content");
        let request = PageRequest {
            url: parsed,
            site: &self.site,
            rules: &self.site.chapter_body,
            timeout: self.timeouts.content,
            parse: SiteRules::parse_chapter_body,
        };
        let content = match self.retry.run(self.launcher.as_ref(), &request).await {
            Ok(content) => content,
            Err(err) => {
                tracing::error!(url, error = %err, "chapter content unavailable");
                return None;
            }
        };

        if let Err(err) = self.cache.put(url, &content).await {
            tracing::warn!(url, error = %format!("{err:#}"), "cache write failed");
        }
        Some(content)
    }

    /// One result per url, in order.
    pub async fn get_contents(&self, urls: &[String], force_refresh: bool) -> Vec<Option<String>> {
        let mut out = Vec::with_capacity(urls.len());
        for url in urls {
            out.push(self.get_content(url, force_refresh).await);
        }
        out
    }

    /// Search and attach each hit's chapter index. Up to `concurrency` books
    /// are indexed at once, each in its own sessions; output keeps search
    /// order. A book whose index could not be fetched has no chapters.
    pub async fn search_books(&self, keyword: &str) -> Option<Vec<BookRecord>> {
        let stubs = self.search(keyword).await?;
        let books = futures::stream::iter(stubs)
            .map(|stub| async move {
                let menu_url = menu_url_for(&stub.url);
                let chapters = self.fetch_chapters(&menu_url).await;
                if chapters.is_none() {
                    tracing::warn!(book_id = %stub.id, "book has no chapter index");
                }
                stub.into_record(chapters.unwrap_or_default())
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;
        Some(books)
    }
}

fn parse_url(raw: &str) -> Option<Url> {
    match Url::parse(raw.trim()) {
        Ok(url) => Some(url),
        Err(err) => {
            tracing::error!(url = raw, ?err, "invalid url");
            None
        }
    }
}

/// Navigate, wait, extract and parse, all within one deadline.
struct PageRequest<'a, T> {
    url: Url,
    site: &'a SiteRules,
    rules: &'a PageRules,
    timeout: Duration,
    parse: fn(&SiteRules, &[Record]) -> Result<T, FetchError>,
}

#[async_trait]
impl<'a, T: Send + 'static> PageFetch for PageRequest<'a, T> {
    type Output = T;

    async fn fetch(&self, session: &mut dyn PageSession) -> Result<T, FetchError> {
        let work = async {
            session.navigate(&self.url, self.timeout).await?;
            session.wait_ready(&self.rules.ready, self.timeout).await?;
            session.extract(&self.rules.schema).await
        };
        let records = tokio::time::timeout(self.timeout, work)
            .await
            .unwrap_or_else(|_| Err(FetchError::timed_out(&self.url, "page fetch", self.timeout)))?;
        (self.parse)(self.site, &records)
    }
}
