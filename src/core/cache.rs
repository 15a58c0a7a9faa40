use crate::core::storage::{ensure_directory, write_text};
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

pub const NS_TITLE: &str = "title_analysis";
pub const NS_THUMBNAIL: &str = "thumbnail_analysis";
pub const NS_PATTERNS: &str = "patterns";
pub const NS_TOPICS: &str = "topics";

/// Every namespace the crate writes to.
pub const NAMESPACES: [&str; 4] = [NS_TITLE, NS_THUMBNAIL, NS_PATTERNS, NS_TOPICS];

const ENTRY_SUFFIX: &str = ".txt";

/// Resolves a user-supplied namespace name to one of [`NAMESPACES`].
pub fn namespace(raw: &str) -> Result<&'static str> {
    let trimmed = raw.trim();
    NAMESPACES
        .iter()
        .find(|ns| **ns == trimmed)
        .copied()
        .ok_or_else(|| {
            Error::custom(format!(
                "Unknown cache namespace '{trimmed}'; expected one of: {}",
                NAMESPACES.join(", ")
            ))
        })
}

/// Key/blob storage behind [`ResponseCache`].
pub trait CacheStore {
    fn load(&self, namespace: &str, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    fn store(&self, namespace: &str, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Stores each entry as `<root>/<namespace>/<key>.txt`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{key}{ENTRY_SUFFIX}"))
    }

    /// Number of entries per namespace directory.
    pub async fn entry_counts(&self) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        if !fs::try_exists(&self.root).await? {
            return Ok(counts);
        }

        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let namespace = entry.file_name().to_string_lossy().into_owned();
            counts.insert(namespace, count_entries(&entry.path()).await?);
        }

        Ok(counts)
    }

    /// Deletes the entries of every known namespace, or of one. Returns how many were removed.
    pub async fn clear(&self, only: Option<&str>) -> Result<usize> {
        let namespaces = match only {
            Some(raw) => vec![namespace(raw)?],
            None => NAMESPACES.to_vec(),
        };

        let mut removed = 0;
        for ns in namespaces {
            let dir_path = self.root.join(ns);
            if !fs::try_exists(&dir_path).await? {
                continue;
            }
            let mut dir = fs::read_dir(&dir_path).await?;
            while let Some(entry) = dir.next_entry().await? {
                let path = entry.path();
                if is_entry(&path) {
                    fs::remove_file(&path).await?;
                    removed += 1;
                }
            }
            tracing::info!(namespace = ns, "cache namespace cleared");
        }

        Ok(removed)
    }
}

fn is_entry(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.ends_with(ENTRY_SUFFIX))
}

async fn count_entries(dir: &Path) -> Result<usize> {
    let mut count = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if is_entry(&entry.path()) {
            count += 1;
        }
    }
    Ok(count)
}

impl CacheStore for FileStore {
    async fn load(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(namespace, key);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        ensure_directory(&self.root.join(namespace)).await?;
        write_text(&self.entry_path(namespace, key), value).await
    }
}

/// In-process store, handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    async fn load(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::custom("cache lock poisoned"))?;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn store(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::custom("cache lock poisoned"))?;
        entries.insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}

impl<S: CacheStore + Sync + ?Sized> CacheStore for &S {
    async fn load(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        (**self).load(namespace, key).await
    }

    async fn store(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        (**self).store(namespace, key, value).await
    }
}

/// Stable SHA-256 hex digest of the identifying strings of a call.
pub fn cache_key(key_material: &[&str]) -> String {
    let joined = key_material.join("\x00");
    format!("{:x}", Sha256::digest(joined.as_bytes()))
}

pub struct ResponseCache<S> {
    store: S,
}

impl<S: CacheStore> ResponseCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the stored text for `key_material`, or runs `compute` and stores its result.
    ///
    /// `compute` is never invoked on a hit. Its errors are returned as-is and leave
    /// no entry behind. An unreadable or empty entry is recomputed and overwritten.
    pub async fn get_or_compute<F, Fut>(
        &self,
        namespace: &str,
        key_material: &[&str],
        compute: F,
    ) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let key = cache_key(key_material);

        match self.store.load(namespace, &key).await {
            Ok(Some(hit)) if !hit.is_empty() => {
                tracing::debug!(namespace, key = %key, "cache hit");
                return Ok(hit);
            }
            Ok(_) => tracing::debug!(namespace, key = %key, "cache miss"),
            Err(e) => {
                tracing::warn!(namespace, key = %key, error = %e, "unreadable cache entry, recomputing")
            }
        }

        let value = compute().await?;

        if let Err(e) = self.store.store(namespace, &key, &value).await {
            tracing::warn!(namespace, key = %key, error = %e, "failed to persist cache entry");
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn keys_are_stable_and_distinct() {
        assert_eq!(cache_key(&["a", "b"]), cache_key(&["a", "b"]));
        assert_ne!(cache_key(&["a", "b"]), cache_key(&["ab"]));
        assert_eq!(cache_key(&["title"]).len(), 64);
    }

    #[tokio::test]
    async fn computes_once_per_key() {
        let cache = ResponseCache::new(MemoryStore::new());
        let calls = Cell::new(0);
        let counter = &calls;

        let compute = || async move {
            counter.set(counter.get() + 1);
            Ok::<_, Error>("analysis".to_string())
        };

        let first = cache.get_or_compute(NS_TITLE, &["How I"], compute).await.unwrap();
        let second = cache.get_or_compute(NS_TITLE, &["How I"], compute).await.unwrap();

        assert_eq!(first, "analysis");
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn namespaces_do_not_collide() {
        let cache = ResponseCache::new(MemoryStore::new());

        cache
            .get_or_compute(NS_TITLE, &["x"], || async { Ok::<_, Error>("title".to_string()) })
            .await
            .unwrap();
        let other = cache
            .get_or_compute(NS_THUMBNAIL, &["x"], || async { Ok::<_, Error>("thumb".to_string()) })
            .await
            .unwrap();

        assert_eq!(other, "thumb");
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = ResponseCache::new(MemoryStore::new());
        let calls = Cell::new(0);
        let counter = &calls;

        let failed = cache
            .get_or_compute(NS_TITLE, &["t"], || async move {
                counter.set(counter.get() + 1);
                Err::<String, _>(Error::custom("service unavailable"))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.store().is_empty());

        let retried = cache
            .get_or_compute(NS_TITLE, &["t"], || async move {
                counter.set(counter.get() + 1);
                Ok::<_, Error>("recovered".to_string())
            })
            .await
            .unwrap();

        assert_eq!(retried, "recovered");
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let first = ResponseCache::new(FileStore::new(dir.path()));
        first
            .get_or_compute(NS_PATTERNS, &["all analyses"], || async { Ok::<_, Error>("report".to_string()) })
            .await
            .unwrap();

        let second = ResponseCache::new(FileStore::new(dir.path()));
        let value = second
            .get_or_compute(NS_PATTERNS, &["all analyses"], || async {
                Err::<String, _>(Error::custom("must not be called"))
            })
            .await
            .unwrap();

        assert_eq!(value, "report");
        assert_eq!(second.store().entry_counts().await.unwrap()[NS_PATTERNS], 1);
    }

    #[tokio::test]
    async fn corrupt_entry_is_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let key = cache_key(&["title"]);
        std::fs::create_dir_all(dir.path().join(NS_TITLE)).unwrap();
        std::fs::write(store.entry_path(NS_TITLE, &key), [0xff, 0xfe, 0x00]).unwrap();

        let cache = ResponseCache::new(store);
        let value = cache
            .get_or_compute(NS_TITLE, &["title"], || async { Ok::<_, Error>("fresh".to_string()) })
            .await
            .unwrap();

        assert_eq!(value, "fresh");
        assert_eq!(cache.store().load(NS_TITLE, &key).await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn clear_removes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.store(NS_TITLE, "a", "1").await.unwrap();
        store.store(NS_TITLE, "b", "2").await.unwrap();
        store.store(NS_TOPICS, "c", "3").await.unwrap();

        assert_eq!(store.clear(Some(NS_TITLE)).await.unwrap(), 2);
        assert_eq!(store.entry_counts().await.unwrap()[NS_TOPICS], 1);
        assert_eq!(store.clear(None).await.unwrap(), 1);
        assert_eq!(store.clear(Some(NS_PATTERNS)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_rejects_unknown_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, "x").unwrap();
        let store = FileStore::new(dir.path().join("cache"));

        assert!(store.clear(Some("..")).await.is_err());
        assert!(store.clear(Some("missing")).await.is_err());
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn clear_leaves_foreign_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.store(NS_PATTERNS, "p", "1").await.unwrap();
        std::fs::create_dir_all(dir.path().join("notes")).unwrap();
        std::fs::write(dir.path().join("notes").join("todo.txt"), "keep").unwrap();

        assert_eq!(store.clear(None).await.unwrap(), 1);
        assert!(dir.path().join("notes").join("todo.txt").exists());
    }

    #[test]
    fn namespace_names_resolve() {
        assert_eq!(namespace(" topics ").unwrap(), NS_TOPICS);
        assert_eq!(namespace("thumbnail_analysis").unwrap(), NS_THUMBNAIL);
        assert!(namespace("Topics").is_err());
        assert!(namespace("").is_err());
    }
}
