//! Directory where the executable lives. Used for preferences and exported panels
//! so that data is stored next to the app when run as a standalone exe.

use std::path::PathBuf;

/// Directory containing the running executable. Falls back to current directory if unavailable.
pub fn exe_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Default directory for exported panel images.
pub fn exports_directory() -> PathBuf {
    exe_directory().join("exports")
}

/// Default preferences file.
pub fn preferences_path() -> PathBuf {
    exe_directory().join("komanav.json")
}
