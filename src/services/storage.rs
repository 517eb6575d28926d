use crate::core::achievements::Achievement;
use crate::core::photo::{GalleryStats, SessionStats};
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Persistence of opaque JSON values under string keys.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// All keys live in a single JSON object on disk, rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let values = if path.exists() {
            let contents = fs::read_to_string(path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

mod keys {
    pub const LAST_PHOTO_ID: &str = "swipecull.last_photo_id";
    pub const STATS: &str = "swipecull.stats";
    pub const ACHIEVEMENTS: &str = "swipecull.achievements";
    pub const SESSIONS: &str = "swipecull.sessions";
    pub const STREAK: &str = "swipecull.streak";
    pub const LAST_SESSION_DATE: &str = "swipecull.last_session_date";
    pub const FAVORITES: &str = "swipecull.favorites";

    pub const ALL: [&str; 7] = [
        LAST_PHOTO_ID,
        STATS,
        ACHIEVEMENTS,
        SESSIONS,
        STREAK,
        LAST_SESSION_DATE,
        FAVORITES,
    ];
}

pub const DEFAULT_SESSION_HISTORY_LIMIT: usize = 30;

/// Next streak value given the last active day.
pub fn advance_streak(last_active: Option<NaiveDate>, current_streak: u32, today: NaiveDate) -> u32 {
    let Some(last_active) = last_active else {
        return 1;
    };
    match (today - last_active).num_days() {
        0 => current_streak.max(1),
        1 => current_streak + 1,
        _ => 1,
    }
}

/// Typed access to everything the app persists. Failures are logged and read as absent.
#[derive(Clone)]
pub struct Storage {
    kv: Arc<dyn KeyValueStore>,
    session_history_limit: usize,
}

impl Storage {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            session_history_limit: DEFAULT_SESSION_HISTORY_LIMIT,
        }
    }

    pub fn with_session_history_limit(mut self, limit: usize) -> Self {
        self.session_history_limit = limit;
        self
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.kv.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Failed to read {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Discarding unreadable value for {}: {}", key, e);
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(StorageError::from)
            .and_then(|json| self.kv.set(key, &json));
        if let Err(e) = result {
            log::warn!("Failed to save {}: {}", key, e);
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.kv.remove(key) {
            log::warn!("Failed to clear {}: {}", key, e);
        }
    }

    // Resume
    pub fn save_last_photo_id(&self, photo_id: &str) {
        self.write(keys::LAST_PHOTO_ID, photo_id);
    }

    pub fn last_photo_id(&self) -> Option<String> {
        self.read(keys::LAST_PHOTO_ID)
    }

    pub fn clear_last_photo_id(&self) {
        self.remove(keys::LAST_PHOTO_ID);
    }

    // Stats
    pub fn save_stats(&self, stats: &GalleryStats) {
        self.write(keys::STATS, stats);
    }

    pub fn stats(&self) -> Option<GalleryStats> {
        self.read(keys::STATS)
    }

    // Achievements
    pub fn save_achievements(&self, achievements: &[Achievement]) {
        self.write(keys::ACHIEVEMENTS, achievements);
    }

    pub fn achievements(&self) -> Option<Vec<Achievement>> {
        self.read(keys::ACHIEVEMENTS)
    }

    // Sessions
    pub fn save_sessions(&self, sessions: &[SessionStats]) {
        let start = sessions.len().saturating_sub(self.session_history_limit);
        self.write(keys::SESSIONS, &sessions[start..]);
    }

    pub fn sessions(&self) -> Vec<SessionStats> {
        self.read(keys::SESSIONS).unwrap_or_default()
    }

    pub fn add_session(&self, session: SessionStats) {
        let mut sessions = self.sessions();
        sessions.push(session);
        self.save_sessions(&sessions);
    }

    // Streak
    pub fn current_streak(&self) -> u32 {
        self.read(keys::STREAK).unwrap_or(0)
    }

    pub fn last_session_date(&self) -> Option<NaiveDate> {
        self.read(keys::LAST_SESSION_DATE)
    }

    /// Records activity on `today` and returns the resulting streak.
    pub fn update_streak(&self, today: NaiveDate) -> u32 {
        let last = self.last_session_date();
        let streak = advance_streak(last, self.current_streak(), today);
        if last != Some(today) {
            self.write(keys::LAST_SESSION_DATE, &today);
        }
        self.write(keys::STREAK, &streak);
        streak
    }

    // Favorites
    pub fn save_favorites(&self, favorite_ids: &[String]) {
        self.write(keys::FAVORITES, favorite_ids);
    }

    pub fn favorites(&self) -> Vec<String> {
        self.read(keys::FAVORITES).unwrap_or_default()
    }

    pub fn clear_all(&self) {
        for key in keys::ALL {
            self.remove(key);
        }
    }
}
