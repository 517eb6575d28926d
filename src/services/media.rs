use crate::core::photo::{MediaType, Photo};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Library not found: {path}")]
    LibraryNotFound { path: String },

    #[error("Invalid cursor: {cursor}")]
    InvalidCursor { cursor: String },

    #[error("Failed to delete {count} photo(s): {message}")]
    DeleteFailed { count: usize, message: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoPage {
    pub items: Vec<Photo>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// A photo library that can be paged through newest first and mutated in bulk.
pub trait MediaSource: Send + Sync {
    fn list_photos(&self, page_size: usize, cursor: Option<&str>) -> Result<PhotoPage, MediaError>;

    /// Irreversibly removes the photos. Ids that no longer exist are ignored.
    fn bulk_delete(&self, photo_ids: &[String]) -> Result<(), MediaError>;

    /// Best effort: 0 when the file cannot be inspected.
    fn file_size(&self, uri: &str) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRecord {
    pub timestamp: String,
    pub removed: Vec<String>,
    pub action: String, // "moved" or "deleted"
}

/// Reads the deletion log, skipping malformed lines.
pub fn read_history(history_file: &Path) -> Result<Vec<DeletionRecord>, MediaError> {
    if !history_file.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(history_file)?);
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DeletionRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => log::warn!("Skipping malformed history entry {}: {}", i, err),
        }
    }
    Ok(records)
}

#[derive(Debug, Clone)]
struct LibraryEntry {
    id: String,
    path: PathBuf,
    created_ms: i64,
}

impl LibraryEntry {
    fn cursor(&self) -> String {
        format!("{}:{}", self.created_ms, self.id)
    }

    /// Listing order: newest first, ties broken by id.
    fn comes_after(&self, created_ms: i64, id: &str) -> bool {
        self.created_ms < created_ms || (self.created_ms == created_ms && self.id.as_str() > id)
    }
}

/// Media source backed by a directory tree of image files.
pub struct FsMediaSource {
    root: PathBuf,
    state_dir: PathBuf,
    trash_dir: Option<PathBuf>,
    history_file: PathBuf,
    supported_formats: Vec<String>,
}

impl FsMediaSource {
    /// `root` and `state_dir` are resolved to absolute paths so the state dir is
    /// recognised inside the library however it was spelled.
    pub fn new(root: PathBuf, state_dir: PathBuf, supported_formats: Vec<String>) -> Self {
        let root = resolve(&root);
        let state_dir = resolve(&state_dir);
        let history_file = state_dir.join("history.jsonl");
        Self {
            root,
            state_dir,
            trash_dir: None,
            history_file,
            supported_formats: supported_formats
                .into_iter()
                .map(|f| f.to_lowercase())
                .collect(),
        }
    }

    /// Deleted files are moved into `trash_dir` instead of being removed.
    pub fn with_trash(mut self, trash_dir: PathBuf) -> Self {
        self.trash_dir = Some(resolve(&trash_dir));
        self
    }

    pub fn history_file(&self) -> &Path {
        &self.history_file
    }

    pub fn photo_id(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let hash = blake3::hash(relative.to_string_lossy().as_bytes());
        hash.to_hex()[..16].to_string()
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.supported_formats.contains(&ext.to_lowercase()))
    }

    fn is_skipped_dir(&self, entry: &walkdir::DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let path = entry.path();
        hidden
            || path.starts_with(&self.state_dir)
            || self.trash_dir.as_deref().is_some_and(|trash| path.starts_with(trash))
    }

    fn scan(&self) -> Result<Vec<LibraryEntry>, MediaError> {
        if !self.root.is_dir() {
            return Err(MediaError::LibraryNotFound {
                path: self.root.display().to_string(),
            });
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| !self.is_skipped_dir(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Walk error: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.is_supported(entry.path()) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::warn!("Cannot read metadata for {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            entries.push(LibraryEntry {
                id: self.photo_id(entry.path()),
                path: entry.path().to_path_buf(),
                created_ms: epoch_ms(created),
            });
        }

        entries.sort_by(|a, b| b.created_ms.cmp(&a.created_ms).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    fn to_photo(&self, entry: &LibraryEntry) -> Option<Photo> {
        let (width, height) = match image::image_dimensions(&entry.path) {
            Ok(dimensions) => dimensions,
            Err(e) => {
                log::warn!("Skipping unreadable image {}: {}", entry.path.display(), e);
                return None;
            }
        };
        let filename = entry
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let uri = entry.path.to_string_lossy().into_owned();

        Some(Photo {
            id: entry.id.clone(),
            file_size: self.file_size(&uri),
            uri,
            filename,
            width,
            height,
            creation_time: entry.created_ms,
            media_type: MediaType::Photo,
            duration: None,
        })
    }

    fn remove_file(&self, entry: &LibraryEntry) -> std::io::Result<()> {
        let Some(trash_dir) = &self.trash_dir else {
            return fs::remove_file(&entry.path);
        };

        fs::create_dir_all(trash_dir)?;
        let file_name = entry
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.id.clone());
        let mut dest = trash_dir.join(&file_name);
        if dest.exists() {
            dest = trash_dir.join(format!("{}_{}", Uuid::new_v4().simple(), file_name));
        }
        fs::rename(&entry.path, &dest)
    }

    fn append_history(&self, removed: Vec<String>) -> Result<(), MediaError> {
        if let Some(parent) = self.history_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_file)?;

        let record = DeletionRecord {
            timestamp: Utc::now().to_rfc3339(),
            removed,
            action: if self.trash_dir.is_some() { "moved" } else { "deleted" }.to_string(),
        };
        writeln!(out, "{}", serde_json::to_string(&record)?)?;
        Ok(())
    }
}

/// Canonical form of `path`. Components that do not exist yet are appended to the
/// canonical form of their nearest existing ancestor.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => resolve(parent).join(name),
        _ => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

fn epoch_ms(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or_default()
}

fn parse_cursor(cursor: &str) -> Result<(i64, &str), MediaError> {
    let invalid = || MediaError::InvalidCursor {
        cursor: cursor.to_string(),
    };
    let (created, id) = cursor.split_once(':').ok_or_else(invalid)?;
    let created = created.parse::<i64>().map_err(|_| invalid())?;
    Ok((created, id))
}

impl MediaSource for FsMediaSource {
    fn list_photos(&self, page_size: usize, cursor: Option<&str>) -> Result<PhotoPage, MediaError> {
        let entries = self.scan()?;
        let start = match cursor {
            Some(cursor) => {
                let (created, id) = parse_cursor(cursor)?;
                entries
                    .iter()
                    .position(|e| e.comes_after(created, id))
                    .unwrap_or(entries.len())
            }
            None => 0,
        };

        let mut items = Vec::with_capacity(page_size);
        let mut last_examined = None;
        for entry in &entries[start..] {
            if items.len() == page_size {
                break;
            }
            last_examined = Some(entry);
            if let Some(photo) = self.to_photo(entry) {
                items.push(photo);
            }
        }

        let consumed = last_examined.map_or(start, |last| {
            entries
                .iter()
                .position(|e| e.id == last.id)
                .map_or(start, |i| i + 1)
        });

        Ok(PhotoPage {
            items,
            next_cursor: last_examined.map(LibraryEntry::cursor),
            has_more: consumed < entries.len(),
        })
    }

    fn bulk_delete(&self, photo_ids: &[String]) -> Result<(), MediaError> {
        if photo_ids.is_empty() {
            return Ok(());
        }

        let by_id: HashMap<String, LibraryEntry> = self
            .scan()?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        let mut removed = Vec::new();
        let mut failures = Vec::new();
        for id in photo_ids {
            let Some(entry) = by_id.get(id) else {
                log::debug!("Photo {} is already gone", id);
                continue;
            };
            match self.remove_file(entry) {
                Ok(()) => removed.push(entry.path.to_string_lossy().into_owned()),
                Err(e) => failures.push(format!("{}: {}", entry.path.display(), e)),
            }
        }

        if !removed.is_empty() {
            log::info!("Removed {} photo(s) from {}", removed.len(), self.root.display());
            self.append_history(removed)?;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MediaError::DeleteFailed {
                count: failures.len(),
                message: failures.join("; "),
            })
        }
    }

    fn file_size(&self, uri: &str) -> u64 {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        match fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                log::warn!("Error getting file size for {}: {}", path, e);
                0
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory library that can be told to fail its next deletes.
    #[derive(Default)]
    pub struct FakeMedia {
        pub photos: Mutex<Vec<Photo>>,
        pub deleted: Mutex<HashSet<String>>,
        pub delete_calls: AtomicUsize,
        pub failures_left: AtomicUsize,
    }

    impl FakeMedia {
        pub fn with_photos(photos: Vec<Photo>) -> Self {
            Self {
                photos: Mutex::new(photos),
                ..Default::default()
            }
        }

        pub fn fail_next(&self, times: usize) {
            self.failures_left.store(times, Ordering::SeqCst);
        }

        pub fn deleted_ids(&self) -> HashSet<String> {
            self.deleted.lock().unwrap().clone()
        }
    }

    impl MediaSource for FakeMedia {
        fn list_photos(&self, page_size: usize, cursor: Option<&str>) -> Result<PhotoPage, MediaError> {
            let photos = self.photos.lock().unwrap();
            let deleted = self.deleted.lock().unwrap();
            let live: Vec<&Photo> = photos.iter().filter(|p| !deleted.contains(&p.id)).collect();
            let start = match cursor {
                Some(cursor) => cursor.parse::<usize>().map_err(|_| MediaError::InvalidCursor {
                    cursor: cursor.to_string(),
                })?,
                None => 0,
            };
            let end = (start + page_size).min(live.len());
            Ok(PhotoPage {
                items: live[start.min(end)..end].iter().map(|p| (*p).clone()).collect(),
                next_cursor: Some(end.to_string()),
                has_more: end < live.len(),
            })
        }

        fn bulk_delete(&self, photo_ids: &[String]) -> Result<(), MediaError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(MediaError::DeleteFailed {
                    count: photo_ids.len(),
                    message: "device busy".to_string(),
                });
            }
            self.deleted.lock().unwrap().extend(photo_ids.iter().cloned());
            Ok(())
        }

        fn file_size(&self, uri: &str) -> u64 {
            self.photos
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.uri == uri)
                .map_or(0, |p| p.file_size)
        }
    }
}
