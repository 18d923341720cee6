use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use fs2::FileExt;

use super::document::Document;
use super::models::MaterialPrice;
use crate::errors::{StoreError, TrackerError};

/// Async-safe handle to the JSON store.
///
/// Every call runs a complete load → closure → save cycle on tokio's
/// blocking pool while holding both a process-wide mutex and an advisory
/// lock on `<data file>.lock`, so two requests can never interleave their
/// read-modify-write cycles or reuse an ID.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<JsonStore>>,
}

impl StoreHandle {
    pub fn new(store: JsonStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run a read-only closure against a freshly loaded document.
    pub async fn read<F, R>(&self, f: F) -> Result<R, TrackerError>
    where
        F: FnOnce(&Document) -> Result<R, TrackerError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || -> Result<R, TrackerError> {
            let guard = store.lock().map_err(|_| StoreError::LockPoisoned)?;
            let _file_lock = guard.lock_file(false)?;
            let doc = guard.load()?;
            f(&doc)
        })
        .await
        .map_err(|e| StoreError::TaskPanicked(e.to_string()))?
    }

    /// Run a mutating closure and persist the document if it succeeds.
    /// Nothing is written when the closure returns an error.
    pub async fn write<F, R>(&self, f: F) -> Result<R, TrackerError>
    where
        F: FnOnce(&mut Document) -> Result<R, TrackerError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || -> Result<R, TrackerError> {
            let guard = store.lock().map_err(|_| StoreError::LockPoisoned)?;
            let _file_lock = guard.lock_file(true)?;
            let mut doc = guard.load()?;
            let result = f(&mut doc)?;
            guard.save(&doc)?;
            Ok(result)
        })
        .await
        .map_err(|e| StoreError::TaskPanicked(e.to_string()))?
    }
}

/// Whole-document JSON persistence.
pub struct JsonStore {
    path: PathBuf,
    default_prices: Vec<MaterialPrice>,
}

/// Advisory file lock released on drop.
struct FileLock(File);

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>, default_prices: Vec<MaterialPrice>) -> Self {
        Self {
            path: path.into(),
            default_prices,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_prices(&self) -> &[MaterialPrice] {
        &self.default_prices
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn lock_file(&self, exclusive: bool) -> Result<FileLock, StoreError> {
        self.ensure_parent()?;
        let lock_path = self.sibling(".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StoreError::Lock {
                path: lock_path.clone(),
                source,
            })?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|source| StoreError::Lock {
            path: lock_path,
            source,
        })?;
        Ok(FileLock(file))
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Load the document. A missing file yields a fresh document; a file
    /// that is not valid JSON is moved aside to `<file>.corrupt-<timestamp>`
    /// and also yields a fresh document. Valid JSON that does not fit the
    /// document layout is an error and the file is left alone.
    pub fn load(&self) -> Result<Document, StoreError> {
        match self.read_document() {
            Err(StoreError::Corrupt { source, .. }) => {
                let quarantine = self.quarantine()?;
                tracing::error!(
                    path = %self.path.display(),
                    moved_to = %quarantine.display(),
                    error = %source,
                    "Data file is corrupt; moved it aside and starting from an empty document"
                );
                Ok(Document::new(&self.default_prices))
            }
            other => other,
        }
    }

    /// Read the document under a shared file lock without ever moving or
    /// rewriting the data file.
    pub fn snapshot(&self) -> Result<Document, StoreError> {
        if !self.path.exists() {
            return Ok(Document::new(&self.default_prices));
        }
        let _file_lock = self.lock_file(false)?;
        self.read_document()
    }

    fn read_document(&self) -> Result<Document, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Document::new(&self.default_prices));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        let mut doc: Document =
            serde_json::from_value(value).map_err(|source| StoreError::Schema {
                path: self.path.clone(),
                source,
            })?;
        if doc.backfill(&self.default_prices) {
            tracing::debug!(path = %self.path.display(), "Backfilled document from older schema");
        }
        Ok(doc)
    }

    fn quarantine(&self) -> Result<PathBuf, StoreError> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let target = self.sibling(&format!(".corrupt-{}", stamp));
        fs::rename(&self.path, &target).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(target)
    }

    /// Write the document to `<file>.tmp`, then rename it over the data file.
    pub fn save(&self, doc: &Document) -> Result<(), StoreError> {
        self.ensure_parent()?;
        let json = serde_json::to_string_pretty(doc).map_err(StoreError::Serialize)?;
        let tmp = self.sibling(".tmp");
        fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

/// Read the seed price list. A missing or malformed file logs a warning and
/// yields an empty list.
pub fn load_default_prices(path: &Path) -> Vec<MaterialPrice> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Default material prices not found, starting with empty prices");
            return Vec::new();
        }
    };
    match serde_json::from_str(&content) {
        Ok(prices) => prices,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Default material prices are malformed, starting with empty prices");
            Vec::new()
        }
    }
}
