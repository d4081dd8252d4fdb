// SPDX-License-Identifier: MPL-2.0

use crate::config::{APP_ID, DEFAULT_API_BASE, DEFAULT_LOG_FILTER, MAX_POSTS_TO_REQUEST};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent reader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub api_base: String,
    pub access_token: Option<String>,
    /// Current user, used to record them as a liker on optimistic likes
    pub user_id: Option<i64>,
    /// Posts requested per feed page
    pub page_size: u32,
    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: None,
            user_id: None,
            page_size: MAX_POSTS_TO_REQUEST,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ReaderSettings {
    /// Get the settings file path (~/.config/io.github.sethcottle.ReaderSync/settings.json)
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::settings_path().ok_or("Could not determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {e}"))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {e}"))?;

        Ok(())
    }

    /// Page size clamped to what the API accepts
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_POSTS_TO_REQUEST)
    }
}
