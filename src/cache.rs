//! TTL-bounded chapter content cache, one JSON document per URL.
//!
//! Expiry is checked only on read. Stale documents stay on disk and are
//! overwritten by the next successful fetch of the same URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use sha2::Digest as _;
use tokio::fs;
use url::Url;

use crate::document;
use crate::formats::CacheEntry;

pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ContentCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the cache directory. Safe to call repeatedly.
    pub async fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create cache dir: {}", self.dir.display()))
    }

    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(url)))
    }

    pub async fn get(&self, url: &str) -> Option<String> {
        self.get_at(url, chrono::Utc::now().timestamp()).await
    }

    async fn get_at(&self, url: &str, now: i64) -> Option<String> {
        let path = self.entry_path(url);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), ?err, "read cache entry failed; treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(path = %path.display(), ?err, "corrupt cache entry; treating as miss");
                return None;
            }
        };

        if normalize_url(&entry.url) != normalize_url(url) {
            tracing::warn!(
                path = %path.display(),
                stored = %entry.url,
                requested = url,
                "cache entry belongs to another url; treating as miss"
            );
            return None;
        }

        let age = now.saturating_sub(entry.timestamp);
        if age < 0 || age as u64 >= self.ttl.as_secs() {
            tracing::debug!(url, age, "cache entry expired");
            return None;
        }

        Some(entry.content)
    }

    /// Overwrites any previous entry for the URL.
    pub async fn put(&self, url: &str, content: &str) -> anyhow::Result<()> {
        let entry = CacheEntry {
            url: url.to_owned(),
            content: content.to_owned(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        let path = self.entry_path(url);
        let target = path.clone();
        tokio::task::spawn_blocking(move || document::write_json_atomic(&target, &entry))
            .await
            .context("join cache writer")?
            .with_context(|| format!("write cache entry: {}", path.display()))
    }
}

/// Fragment dropped; scheme and host case folded by the URL parser.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_owned(),
    }
}

pub fn cache_key(url: &str) -> String {
    let digest = sha2::Sha256::digest(normalize_url(url).as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.pilishuwu.com/1/4545/read/1699599.html";

    async fn cache() -> (tempfile::TempDir, ContentCache) {
        let temp = tempfile::TempDir::new().unwrap();
        let cache = ContentCache::new(temp.path().join("cache"), DEFAULT_TTL);
        cache.init().await.unwrap();
        (temp, cache)
    }

    async fn write_entry(cache: &ContentCache, url: &str, content: &str, timestamp: i64) {
        let entry = CacheEntry {
            url: url.to_owned(),
            content: content.to_owned(),
            timestamp,
        };
        fs::write(cache.entry_path(url), serde_json::to_vec(&entry).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn put_then_get_returns_content() {
        let (_temp, cache) = cache().await;
        assert_eq!(cache.get(URL).await, None);

        cache.put(URL, "chapter text").await.unwrap();

        assert_eq!(cache.get(URL).await.as_deref(), Some("chapter text"));
        let stored: CacheEntry =
            serde_json::from_slice(&std::fs::read(cache.entry_path(URL)).unwrap()).unwrap();
        assert_eq!(stored.url, URL);
        let now = chrono::Utc::now().timestamp();
        assert!((now - stored.timestamp).abs() <= 2);
    }

    #[tokio::test]
    async fn entry_expires_at_ttl_but_stays_on_disk() {
        let (_temp, cache) = cache().await;
        let now = chrono::Utc::now().timestamp();

        write_entry(&cache, URL, "fresh", now - 86_399).await;
        assert_eq!(cache.get_at(URL, now).await.as_deref(), Some("fresh"));

        write_entry(&cache, URL, "stale", now - 86_400).await;
        assert_eq!(cache.get_at(URL, now).await, None);
        assert!(cache.entry_path(URL).exists());
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let (_temp, cache) = cache().await;
        fs::write(cache.entry_path(URL), b"{not json").await.unwrap();
        assert_eq!(cache.get(URL).await, None);

        cache.put(URL, "recovered").await.unwrap();
        assert_eq!(cache.get(URL).await.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn put_overwrites_previous_entry() {
        let (_temp, cache) = cache().await;
        cache.put(URL, "v1").await.unwrap();
        cache.put(URL, "v2").await.unwrap();
        assert_eq!(cache.get(URL).await.as_deref(), Some("v2"));

        let files = std::fs::read_dir(cache.dir()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let (_temp, cache) = cache().await;
        cache.put(URL, "kept").await.unwrap();
        cache.init().await.unwrap();
        assert_eq!(cache.get(URL).await.as_deref(), Some("kept"));
    }

    #[test]
    fn key_ignores_fragment_and_host_case() {
        assert_eq!(cache_key(URL), cache_key(&format!("{URL}#top")));
        assert_eq!(
            cache_key(URL),
            cache_key("https://WWW.PILISHUWU.COM/1/4545/read/1699599.html")
        );
        assert_ne!(cache_key(URL), cache_key("https://www.pilishuwu.com/1/4545/read/2.html"));
        assert_eq!(cache_key(URL).len(), 64);
    }
}
