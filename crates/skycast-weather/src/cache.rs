//! Last-result cache: the single most recently displayed weather snapshot.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use skycast_core::Config;
use std::path::{Path, PathBuf};

use crate::types::{WeatherError, WeatherSnapshot};

/// Snapshots older than this are still shown but flagged as stale.
const STALE_AFTER_MINUTES: i64 = 30;

/// Stores and retrieves the most recently displayed snapshot.
pub trait WeatherCache: Send + Sync {
    /// The saved snapshot, if any. Unreadable data counts as absent.
    fn load(&self) -> Option<WeatherSnapshot>;

    fn save(&self, weather: &WeatherSnapshot) -> Result<(), WeatherError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    saved_at: DateTime<Utc>,
    weather: WeatherSnapshot,
}

/// JSON file cache, one snapshot per file.
#[derive(Debug, Clone)]
pub struct FileWeatherCache {
    cache_path: PathBuf,
}

impl FileWeatherCache {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_path())
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    /// When the stored snapshot was written.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.read_envelope().map(|e| e.saved_at)
    }

    /// True when the stored snapshot is older than the staleness threshold.
    pub fn is_stale(&self) -> bool {
        self.saved_at()
            .map(|at| Utc::now() - at > Duration::minutes(STALE_AFTER_MINUTES))
            .unwrap_or(true)
    }

    fn read_envelope(&self) -> Option<CacheEnvelope> {
        let contents = match std::fs::read_to_string(&self.cache_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read weather cache {}: {}", self.cache_path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::warn!("Ignoring corrupt weather cache {}: {}", self.cache_path.display(), e);
                None
            }
        }
    }
}

impl WeatherCache for FileWeatherCache {
    fn load(&self) -> Option<WeatherSnapshot> {
        let envelope = self.read_envelope()?;
        tracing::debug!("Loaded cached weather saved at {}", envelope.saved_at);
        Some(envelope.weather)
    }

    fn save(&self, weather: &WeatherSnapshot) -> Result<(), WeatherError> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WeatherError::Cache(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let envelope = CacheEnvelope {
            saved_at: Utc::now(),
            weather: weather.clone(),
        };
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| WeatherError::Cache(format!("Failed to serialize weather: {}", e)))?;

        // Write-then-rename so a crash never leaves a half-written file behind.
        let tmp_path = self.cache_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .and_then(|()| std::fs::rename(&tmp_path, &self.cache_path))
            .map_err(|e| {
                WeatherError::Cache(format!("Failed to write {}: {}", self.cache_path.display(), e))
            })?;

        tracing::debug!("Saved weather for '{}' to cache", weather.display_name);
        Ok(())
    }
}

/// In-process cache; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryWeatherCache {
    data: Mutex<Option<WeatherSnapshot>>,
}

impl MemoryWeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(weather: WeatherSnapshot) -> Self {
        Self {
            data: Mutex::new(Some(weather)),
        }
    }
}

impl WeatherCache for MemoryWeatherCache {
    fn load(&self) -> Option<WeatherSnapshot> {
        self.data.lock().clone()
    }

    fn save(&self, weather: &WeatherSnapshot) -> Result<(), WeatherError> {
        *self.data.lock() = Some(weather.clone());
        Ok(())
    }
}
