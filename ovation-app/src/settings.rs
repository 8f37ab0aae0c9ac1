//! Host settings (JSON file in the app data directory).
//!
//! Read-only: the host never writes settings back, and nothing about a
//! session outlives it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ovation_core::{
    threshold::{DEFAULT_BASE_LEVEL_DB, DEFAULT_SCALING_FACTOR, DEFAULT_VENUE_VOLUME_M3},
    CaptureConfig, SessionConfig, ThresholdModel,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_input_device: Option<String>,
    pub occupancy: u32,
    pub venue_volume_m3: f64,
    pub base_level_db: f64,
    pub scaling_factor: f64,
    pub cycle_interval_ms: u64,
    pub block_size: usize,
    pub display_floor_db: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preferred_input_device: None,
            occupancy: 0,
            venue_volume_m3: DEFAULT_VENUE_VOLUME_M3,
            base_level_db: DEFAULT_BASE_LEVEL_DB,
            scaling_factor: DEFAULT_SCALING_FACTOR,
            cycle_interval_ms: 16,
            block_size: 2048,
            display_floor_db: -60.0,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        if !self.venue_volume_m3.is_finite() || self.venue_volume_m3 <= 0.0 {
            self.venue_volume_m3 = defaults.venue_volume_m3;
        }
        if !self.base_level_db.is_finite() {
            self.base_level_db = defaults.base_level_db;
        }
        if !self.scaling_factor.is_finite() || self.scaling_factor < 0.0 {
            self.scaling_factor = defaults.scaling_factor;
        }
        self.cycle_interval_ms = self.cycle_interval_ms.clamp(1, 1000);
        self.block_size = self.block_size.clamp(32, 32_768);
        if !self.display_floor_db.is_finite() {
            self.display_floor_db = defaults.display_floor_db;
        }
        self.display_floor_db = self.display_floor_db.clamp(-160.0, -1.0);
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    pub fn threshold_model(&self) -> ovation_core::error::Result<ThresholdModel> {
        ThresholdModel::new(self.venue_volume_m3, self.base_level_db, self.scaling_factor)
    }

    pub fn session_config(&self) -> ovation_core::error::Result<SessionConfig> {
        Ok(SessionConfig {
            cycle_interval: Duration::from_millis(self.cycle_interval_ms),
            threshold: self.threshold_model()?,
        })
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            block_size: self.block_size,
            preferred_device: self.preferred_input_device.clone(),
            ..CaptureConfig::default()
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os("OVATION_SETTINGS") {
        return PathBuf::from(path);
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("Ovation")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".config")
            })
            .join("ovation")
            .join("settings.json")
    }
}

/// Load settings, falling back to defaults when the file is missing or invalid.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => parse_settings(&raw).unwrap_or_else(|e| {
            warn!(path = ?path, "ignoring invalid settings file: {e}");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

fn parse_settings(raw: &str) -> serde_json::Result<AppSettings> {
    serde_json::from_str::<AppSettings>(raw)
}
