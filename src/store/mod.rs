//! File-backed persistence for biographies and annotations.
//!
//! Layout under the data directory:
//!
//! ```text
//! Biographies/{id}.json            - biography metadata
//! Biographies/{id}.pdf             - rendered document
//! Biographies/{id}_thumbnail.png   - thumbnail
//! annotations/current_session.json - latest annotation set
//! ```
//!
//! Reads go through an in-memory cache valid for [`CACHE_TTL`]; every
//! mutating call invalidates the relevant cache before returning, so a
//! reader never observes a stale list after a write it performed itself.
//! Metadata is always written after the files it points at, and via a
//! temp-file rename, so a listing never sees a half-published record.

mod cache;

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;

use crate::config::Settings;
use crate::models::{upsert_annotation, Annotation, Biography};
use cache::CacheEntry;

/// How long a cached listing stays valid.
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// Filename of the current annotation session.
const ANNOTATION_SESSION_FILE: &str = "current_session.json";

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("biography '{0}' not found")]
    NotFound(String),
    #[error("failed to encode record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache invariant violated: {0}")]
    CacheConsistency(String),
}

/// Durable, cached persistence for biography artifacts and annotations.
pub struct ContentStore {
    biographies_dir: PathBuf,
    annotations_dir: PathBuf,
    cache_ttl: Duration,
    biography_cache: Mutex<Option<CacheEntry<Vec<Biography>>>>,
    annotation_cache: Mutex<Option<CacheEntry<Vec<Annotation>>>>,
}

impl ContentStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            biographies_dir: settings.biographies_dir.clone(),
            annotations_dir: settings.annotations_dir.clone(),
            cache_ttl: CACHE_TTL,
            biography_cache: Mutex::new(None),
            annotation_cache: Mutex::new(None),
        }
    }

    /// Override the cache TTL; used by tests to exercise expiry.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Path of the metadata record for `id`.
    pub fn metadata_path(&self, id: &str) -> PathBuf {
        self.biographies_dir.join(format!("{}.json", id))
    }

    /// Path of the rendered document for `id`.
    pub fn document_path(&self, id: &str) -> PathBuf {
        self.biographies_dir.join(format!("{}.pdf", id))
    }

    /// Path of the thumbnail for `id`.
    pub fn thumbnail_path(&self, id: &str) -> PathBuf {
        self.biographies_dir.join(format!("{}_thumbnail.png", id))
    }

    fn annotations_path(&self) -> PathBuf {
        self.annotations_dir.join(ANNOTATION_SESSION_FILE)
    }

    fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, StoreError> {
        m.lock()
            .map_err(|e| StoreError::CacheConsistency(format!("{} lock poisoned: {}", what, e)))
    }

    /// Write the rendered document bytes for `id`, returning the path.
    ///
    /// Callers must write document and thumbnail before publishing the
    /// metadata record that points at them.
    pub fn save_document(&self, id: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.biographies_dir)?;
        let path = self.document_path(id);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Write the thumbnail bytes (encoded PNG) for `id`, returning the path.
    pub fn save_thumbnail(&self, id: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.biographies_dir)?;
        let path = self.thumbnail_path(id);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Publish the metadata record. This is the last step of a save; once
    /// it returns, the biography is visible to listings.
    pub fn save_biography(&self, biography: &Biography) -> Result<(), StoreError> {
        fs::create_dir_all(&self.biographies_dir)?;
        let json = serde_json::to_string_pretty(biography)?;

        // Rename makes the publish atomic; a concurrent listing sees the
        // old record or the new one, never a partial file.
        let final_path = self.metadata_path(&biography.id);
        let tmp_path = self.biographies_dir.join(format!("{}.json.tmp", biography.id));
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &final_path)?;

        self.invalidate_biographies()?;
        tracing::debug!("Saved biography {}", biography.id);
        Ok(())
    }

    /// List stored biographies, newest first.
    ///
    /// Serves the cache while fresh; otherwise re-scans the directory.
    /// Records that fail to parse are skipped and logged rather than
    /// failing the whole listing.
    pub fn list_biographies(&self) -> Result<Vec<Biography>, StoreError> {
        let mut guard = Self::lock(&self.biography_cache, "biography cache")?;
        if let Some(list) = guard.as_ref().and_then(|e| e.fresh(self.cache_ttl)) {
            return Ok(list.clone());
        }

        let list = self.scan_biographies()?;
        *guard = Some(CacheEntry::new(list.clone()));
        Ok(list)
    }

    fn scan_biographies(&self) -> Result<Vec<Biography>, StoreError> {
        let entries = match fs::read_dir(&self.biographies_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut list = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Skipping unreadable record {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<Biography>(&contents) {
                Ok(bio) => list.push(bio),
                Err(e) => {
                    tracing::warn!("Skipping unparseable record {}: {}", path.display(), e);
                }
            }
        }

        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    /// Remove the document, thumbnail, and metadata for `id`.
    /// Files that are already gone are not errors.
    pub fn delete_biography(&self, id: &str) -> Result<(), StoreError> {
        for path in [
            self.document_path(id),
            self.thumbnail_path(id),
            self.metadata_path(id),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.invalidate_biographies()?;
        tracing::debug!("Deleted biography {}", id);
        Ok(())
    }

    /// Load one record by id, bypassing the cache.
    pub fn get_biography(&self, id: &str) -> Result<Biography, StoreError> {
        let path = self.metadata_path(id);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Change the title of a stored biography.
    pub fn rename_biography(&self, id: &str, new_title: &str) -> Result<Biography, StoreError> {
        let mut bio = self.get_biography(id)?;
        bio.title = new_title.to_string();
        bio.touch();
        self.save_biography(&bio)?;
        Ok(bio)
    }

    /// Replace the thumbnail of a stored biography with `png_bytes`.
    pub fn update_cover(&self, id: &str, png_bytes: &[u8]) -> Result<Biography, StoreError> {
        let mut bio = self.get_biography(id)?;
        let path = self.save_thumbnail(id, png_bytes)?;
        bio.thumbnail_path = Some(path);
        bio.touch();
        self.save_biography(&bio)?;
        Ok(bio)
    }

    /// Merge an annotation set into the stored session, keyed by image id.
    pub fn save_annotations(&self, set: &[Annotation]) -> Result<(), StoreError> {
        let mut current = self.read_annotation_file()?;
        for annotation in set {
            upsert_annotation(&mut current, annotation.clone());
        }

        fs::create_dir_all(&self.annotations_dir)?;
        let json = serde_json::to_string_pretty(&current)?;
        fs::write(self.annotations_path(), json)?;

        let mut guard = Self::lock(&self.annotation_cache, "annotation cache")?;
        *guard = None;
        Ok(())
    }

    /// Load the current annotation session. Missing session means empty.
    pub fn load_annotations(&self) -> Result<Vec<Annotation>, StoreError> {
        let mut guard = Self::lock(&self.annotation_cache, "annotation cache")?;
        if let Some(list) = guard.as_ref().and_then(|e| e.fresh(self.cache_ttl)) {
            return Ok(list.clone());
        }

        let list = self.read_annotation_file()?;
        *guard = Some(CacheEntry::new(list.clone()));
        Ok(list)
    }

    fn read_annotation_file(&self) -> Result<Vec<Annotation>, StoreError> {
        let contents = match fs::read_to_string(self.annotations_path()) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&contents) {
            Ok(list) => Ok(list),
            Err(e) => {
                tracing::warn!("Discarding unparseable annotation session: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Delete every stored biography and the annotation session.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        for dir in [&self.biographies_dir, &self.annotations_dir] {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let path = entry?.path();
                if path.is_file() {
                    fs::remove_file(&path)?;
                }
            }
        }
        self.invalidate_biographies()?;
        let mut guard = Self::lock(&self.annotation_cache, "annotation cache")?;
        *guard = None;
        tracing::info!("Cleared all stored content");
        Ok(())
    }

    fn invalidate_biographies(&self) -> Result<(), StoreError> {
        let mut guard = Self::lock(&self.biography_cache, "biography cache")?;
        *guard = None;
        Ok(())
    }
}
