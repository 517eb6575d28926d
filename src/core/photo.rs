use serde::{Deserialize, Serialize};

pub const BYTES_PER_MB: u64 = 1024 * 1024;
pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

// Photo models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub uri: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    /// Epoch milliseconds.
    pub creation_time: i64,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub media_type: MediaType,
    /// Seconds, videos only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Photo {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Photo,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoDecision {
    Keep,
    Delete,
}

impl PhotoDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoDecision::Keep => "keep",
            PhotoDecision::Delete => "delete",
        }
    }
}

impl From<String> for PhotoDecision {
    fn from(s: String) -> Self {
        match s.as_str() {
            "delete" | "remove" => PhotoDecision::Delete,
            _ => PhotoDecision::Keep,
        }
    }
}

impl From<PhotoDecision> for String {
    fn from(decision: PhotoDecision) -> Self {
        decision.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    #[default]
    Undetermined,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoHistoryItem {
    pub photo_id: String,
    pub decision: PhotoDecision,
    pub timestamp: i64,
}

// Stats models
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GalleryStats {
    pub total_photos: usize,
    pub processed: usize,
    pub to_delete: usize,
    pub to_keep: usize,
    /// Bytes pending deletion.
    pub storage_to_free: u64,
    /// Consecutive active days.
    pub current_streak: u32,
    pub total_sessions: u32,
    pub lifetime_deleted: u64,
    /// Bytes.
    pub lifetime_freed: u64,
}

/// Partial stats update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsPatch {
    pub total_photos: Option<usize>,
    pub processed: Option<usize>,
    pub to_delete: Option<usize>,
    pub to_keep: Option<usize>,
    pub storage_to_free: Option<u64>,
    pub current_streak: Option<u32>,
    pub total_sessions: Option<u32>,
    pub lifetime_deleted: Option<u64>,
    pub lifetime_freed: Option<u64>,
}

impl StatsPatch {
    pub fn streak(current_streak: u32) -> Self {
        Self {
            current_streak: Some(current_streak),
            ..Default::default()
        }
    }

    /// Patch that carries only the counters that outlive a review pass.
    pub fn lifetime(stats: &GalleryStats) -> Self {
        Self {
            current_streak: Some(stats.current_streak),
            total_sessions: Some(stats.total_sessions),
            lifetime_deleted: Some(stats.lifetime_deleted),
            lifetime_freed: Some(stats.lifetime_freed),
            ..Default::default()
        }
    }

    pub fn apply_to(&self, stats: &mut GalleryStats) {
        if let Some(v) = self.total_photos {
            stats.total_photos = v;
        }
        if let Some(v) = self.processed {
            stats.processed = v;
        }
        if let Some(v) = self.to_delete {
            stats.to_delete = v;
        }
        if let Some(v) = self.to_keep {
            stats.to_keep = v;
        }
        if let Some(v) = self.storage_to_free {
            stats.storage_to_free = v;
        }
        if let Some(v) = self.current_streak {
            stats.current_streak = v;
        }
        if let Some(v) = self.total_sessions {
            stats.total_sessions = v;
        }
        if let Some(v) = self.lifetime_deleted {
            stats.lifetime_deleted = v;
        }
        if let Some(v) = self.lifetime_freed {
            stats.lifetime_freed = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: String,
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub photos_reviewed: u32,
    pub photos_deleted: u32,
    pub photos_kept: u32,
    /// Bytes.
    pub storage_freed: u64,
}

impl SessionStats {
    pub fn start(now: i64) -> Self {
        Self {
            session_id: format!("session_{}", now),
            start_time: now,
            ..Default::default()
        }
    }
}
