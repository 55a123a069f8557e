use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use komanav_render::ViewerConfig;

// ---------------------------------------------------------------------------
// Application preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPreferences {
    /// Navigation timing, tap zones, padding and render settings.
    #[serde(default)]
    pub viewer: ViewerConfig,
    /// Where `export` writes panels. When empty, an `exports/` folder next to the executable is used.
    #[serde(default)]
    pub export_dir: String,
    /// File extensions treated as page images, compared case-insensitively.
    #[serde(default = "default_page_extensions")]
    pub page_extensions: Vec<String>,
    /// Delay between replayed taps, in milliseconds.
    #[serde(default = "default_replay_interval_ms")]
    pub replay_interval_ms: u64,
}

fn default_page_extensions() -> Vec<String> {
    vec!["png".into(), "jpg".into(), "jpeg".into()]
}
fn default_replay_interval_ms() -> u64 {
    250
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            viewer: ViewerConfig::default(),
            export_dir: String::new(),
            page_extensions: default_page_extensions(),
            replay_interval_ms: default_replay_interval_ms(),
        }
    }
}

impl AppPreferences {
    /// Load preferences from `path`, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(json) => match serde_json::from_str::<AppPreferences>(&json) {
                    Ok(prefs) => {
                        info!("Loaded preferences from {}", path.display());
                        return prefs;
                    }
                    Err(e) => {
                        error!("Failed to parse preferences: {e}");
                    }
                },
                Err(e) => {
                    error!("Failed to read preferences file: {e}");
                }
            }
        } else {
            debug!("No preferences file at {}", path.display());
        }
        Self::default()
    }

    /// Persist preferences to `path`.
    pub fn save(&self, path: &Path) -> bool {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory: {e}");
                return false;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, &json) {
                    error!("Failed to write preferences: {e}");
                    false
                } else {
                    debug!("Saved preferences to {}", path.display());
                    true
                }
            }
            Err(e) => {
                error!("Failed to serialize preferences: {e}");
                false
            }
        }
    }

    /// Resolved export directory.
    pub fn export_directory(&self) -> PathBuf {
        if self.export_dir.is_empty() {
            crate::app_dir::exports_directory()
        } else {
            PathBuf::from(&self.export_dir)
        }
    }
}
