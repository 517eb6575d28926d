use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::services::deletion::RetryPolicy;

pub const STATE_DIR_NAME: &str = ".swipecull";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Photos requested per page.
    pub page_size: usize,
    /// Fetch the next page once this many photos remain ahead of the cursor.
    pub preload_threshold: usize,
    pub analysis_chunk_size: usize,
    /// Yield to the runtime after this many analysis chunks.
    pub analysis_yield_every: usize,
    pub delete_retry_attempts: u32,
    pub delete_retry_backoff_ms: u64,
    pub session_history_limit: usize,
    /// Move deleted photos into `<state dir>/trash` instead of removing them.
    pub use_trash: bool,
    pub supported_formats: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            preload_threshold: 5,
            analysis_chunk_size: 10,
            analysis_yield_every: 5,
            delete_retry_attempts: 3,
            delete_retry_backoff_ms: 250,
            session_history_limit: 30,
            use_trash: true,
            supported_formats: ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl AppConfig {
    pub fn default_state_dir(library: &Path) -> PathBuf {
        library.join(STATE_DIR_NAME)
    }

    /// Reads `<state_dir>/config.json`; a missing file yields the defaults.
    pub fn load(state_dir: &Path) -> Result<Self, ConfigError> {
        let path = state_dir.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Like `load`, but writes the defaults out on first run so they can be edited.
    pub fn load_or_create(state_dir: &Path) -> Result<Self, ConfigError> {
        if state_dir.join(CONFIG_FILE).exists() {
            return Self::load(state_dir);
        }
        let config = Self::default();
        config.save(state_dir)?;
        log::info!("Wrote default config to {}", state_dir.join(CONFIG_FILE).display());
        Ok(config)
    }

    pub fn save(&self, state_dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(state_dir)?;
        let path = state_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.delete_retry_attempts,
            backoff: Duration::from_millis(self.delete_retry_backoff_ms),
        }
    }

    pub fn trash_dir(state_dir: &Path) -> PathBuf {
        state_dir.join("trash")
    }
}
