//! In-process narrative index cache.
//!
//! Entries are keyed by what identifies a document's content: path,
//! modification time, size and the page limit used to extract it. At most
//! one build runs per key; concurrent callers await the same shared future.
//! Failed builds are dropped so the next request tries again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use futures::future::{BoxFuture, FutureExt, Shared};
use narrative::geometry::sanitize_page;
use narrative::{Extraction, ExtractionConfig, LopdfSource, NarrativeError, PageRuns, RunSource};

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub size: u64,
    pub max_pages: usize,
}

impl CacheKey {
    pub fn for_path(path: &Path, max_pages: usize) -> std::result::Result<Self, NarrativeError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| NarrativeError::Unavailable(format!("{}: {e}", path.display())))?;
        if !metadata.is_file() {
            return Err(NarrativeError::Unavailable(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            modified: metadata.modified().ok(),
            size: metadata.len(),
            max_pages,
        })
    }
}

/// A built document: its index, report and profile, plus the sanitized
/// runs the forward probe reads from.
#[derive(Debug)]
pub struct Document {
    pub path: PathBuf,
    pub extraction: Extraction,
    pub pages: Vec<PageRuns>,
}

impl Document {
    pub fn build(path: PathBuf, pages: Vec<PageRuns>, config: &ExtractionConfig) -> Self {
        let pages: Vec<PageRuns> = pages.into_iter().map(sanitize_page).collect();
        let extraction = narrative::extract_pages(pages.clone(), config);
        Self {
            path,
            extraction,
            pages,
        }
    }

    pub fn page(&self, page: usize) -> Option<&PageRuns> {
        page.checked_sub(1).and_then(|i| self.pages.get(i))
    }
}

type BuildResult = std::result::Result<Arc<Document>, Arc<NarrativeError>>;
type BuildFuture = Shared<BoxFuture<'static, BuildResult>>;

/// Reads and extracts a document. Runs on the blocking pool.
pub type Loader =
    Arc<dyn Fn(&Path, &ExtractionConfig) -> std::result::Result<Document, NarrativeError> + Send + Sync>;

/// Read a PDF from disk through lopdf.
pub fn load_pdf(path: &Path, config: &ExtractionConfig) -> std::result::Result<Document, NarrativeError> {
    let bytes = std::fs::read(path)?;
    let source = LopdfSource::from_bytes(&bytes)?;
    let pages = source.all_pages(config.max_pages);
    Ok(Document::build(path.to_path_buf(), pages, config))
}

pub struct IndexCache {
    config: ExtractionConfig,
    loader: Loader,
    ready: Mutex<HashMap<CacheKey, Arc<Document>>>,
    pending: Mutex<HashMap<CacheKey, BuildFuture>>,
}

impl IndexCache {
    pub fn new(config: ExtractionConfig) -> Self {
        Self::with_loader(config, Arc::new(load_pdf))
    }

    pub fn with_loader(config: ExtractionConfig, loader: Loader) -> Self {
        Self {
            config,
            loader,
            ready: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// The document at `path`, built at most once per content identity.
    pub async fn get(&self, path: &Path) -> Result<Arc<Document>> {
        let key = CacheKey::for_path(path, self.config.max_pages)?;

        if let Some(document) = self.lock_ready().get(&key) {
            log::debug!("cache hit: {}", path.display());
            return Ok(document.clone());
        }

        let future = {
            let mut pending = self.lock_pending();
            // A build may have finished since the first look.
            if let Some(document) = self.lock_ready().get(&key) {
                log::debug!("cache hit: {}", path.display());
                return Ok(document.clone());
            }
            match pending.get(&key) {
                Some(future) => {
                    log::debug!("cache wait: {} is already building", path.display());
                    future.clone()
                }
                None => {
                    log::debug!("cache miss: building {}", path.display());
                    let future = self.spawn_build(key.path.clone()).shared();
                    pending.insert(key.clone(), future.clone());
                    future
                }
            }
        };

        let result = future.await;
        match result {
            Ok(document) => {
                self.publish(&key, document.clone());
                self.lock_pending().remove(&key);
                Ok(document)
            }
            Err(e) => {
                self.lock_pending().remove(&key);
                Err(eyre!(Error::Cache(e.to_string())))
            }
        }
    }

    /// Store a finished build and drop older versions of the same file.
    fn publish(&self, key: &CacheKey, document: Arc<Document>) {
        let mut ready = self.lock_ready();
        ready.insert(key.clone(), document);
        ready.retain(|k, _| k.path != key.path || (k.modified == key.modified && k.size == key.size));
    }

    /// Drop every entry for `path`.
    pub fn evict(&self, path: &Path) {
        self.lock_ready().retain(|key, _| key.path != path);
    }

    pub fn len(&self) -> usize {
        self.lock_ready().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn_build(&self, path: PathBuf) -> BoxFuture<'static, BuildResult> {
        let loader = self.loader.clone();
        let config = self.config.clone();
        async move {
            let handle = tokio::task::spawn_blocking(move || loader(&path, &config));
            match handle.await {
                Ok(Ok(document)) => Ok(Arc::new(document)),
                Ok(Err(e)) => Err(Arc::new(e)),
                Err(e) => Err(Arc::new(NarrativeError::Unavailable(e.to_string()))),
            }
        }
        .boxed()
    }

    fn lock_ready(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<Document>>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, BuildFuture>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use narrative::GeometricTextRun;

    fn make_pages() -> Vec<PageRuns> {
        vec![PageRuns::new(
            1,
            600.0,
            800.0,
            vec![GeometricTextRun::new("Cached narrative text", 72.0, 200.0, 105.0, 10.0)],
        )]
    }

    fn make_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    /// A loader that counts its calls and takes a moment to finish.
    fn make_counting_loader(calls: Arc<AtomicUsize>) -> Loader {
        Arc::new(move |path: &Path, config: &ExtractionConfig| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(Document::build(path.to_path_buf(), make_pages(), config))
        })
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_build() {
        let file = make_file("pdf");
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = IndexCache::with_loader(ExtractionConfig::default(), make_counting_loader(calls.clone()));

        let (a, b, c) = tokio::join!(
            cache.get(file.path()),
            cache.get(file.path()),
            cache.get(file.path())
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
        assert_eq!(a.extraction.index.full_text, "Cached narrative text");
        assert_eq!(a.extraction.profile.body_font_size, 10.0);

        cache.get(file.path()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_not_cached() {
        let file = make_file("pdf");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let loader: Loader = Arc::new(move |path: &Path, config: &ExtractionConfig| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(NarrativeError::Encrypted)
            } else {
                Ok(Document::build(path.to_path_buf(), make_pages(), config))
            }
        });
        let cache = IndexCache::with_loader(ExtractionConfig::default(), loader);

        let err = cache.get(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("encrypted"));
        assert!(cache.is_empty());

        assert!(cache.get(file.path()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_changed_file_is_rebuilt() {
        let mut file = make_file("pdf");
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = IndexCache::with_loader(ExtractionConfig::default(), make_counting_loader(calls.clone()));

        cache.get(file.path()).await.unwrap();
        write!(file, " grown").unwrap();
        file.flush().unwrap();
        cache.get(file.path()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.evict(file.path());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_changed_file_replaces_stale_entry() {
        let mut file = make_file("pdf");
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = IndexCache::with_loader(ExtractionConfig::default(), make_counting_loader(calls.clone()));

        cache.get(file.path()).await.unwrap();
        for extra in [" one", " two"] {
            write!(file, "{extra}").unwrap();
            file.flush().unwrap();
            cache.get(file.path()).await.unwrap();
            assert_eq!(cache.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let other = make_file("other");
        cache.get(other.path()).await.unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let cache = IndexCache::new(ExtractionConfig::default());
        let err = cache.get(Path::new("/nonexistent/paper.pdf")).await.unwrap_err();
        assert!(err.to_string().starts_with("Document unavailable"));
    }

    #[test]
    fn test_page_limit_is_part_of_the_key() {
        let file = make_file("pdf");
        let short = CacheKey::for_path(file.path(), 10).unwrap();
        let long = CacheKey::for_path(file.path(), 500).unwrap();
        assert_ne!(short, long);
        assert_eq!(short.size, 3);
    }
}
