use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::personality::PersonalityConfig;

/// Per-backend settings from `[backends.<id>]`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BackendOverride {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Personality used when `--personality` is not given.
    pub default_personality: Option<String>,
    /// Start new sessions in encrypted (never persisted) mode.
    pub encrypted: Option<bool>,
    /// Where session records are written instead of the platform data dir.
    pub sessions_dir: Option<PathBuf>,
    /// Keyed by backend id (e.g., "gemini", "lmstudio")
    #[serde(default)]
    pub backends: HashMap<String, BackendOverride>,
    /// User-defined personalities; an entry with a built-in id replaces it
    #[serde(default)]
    pub personalities: Vec<PersonalityConfig>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/obsidian/config.toml` → `~/.config/obsidian/config.toml`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn backend(&self, id: &str) -> Option<&BackendOverride> {
        self.backends
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(id))
            .map(|(_, settings)| settings)
    }

    pub fn starts_encrypted(&self) -> bool {
        self.encrypted.unwrap_or(false)
    }
}
