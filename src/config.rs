//! Settings and application paths
//!
//! Persistent controller settings (JSON via serde) plus platform path
//! resolution for the settings file itself.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::session::metadata::DEFAULT_FRAME_RATE;

/// How sessions obtain their media engine instance.
///
/// `Shared` matches a module-level singleton: one engine per process, created
/// on first use, never torn down until process exit. `PerSession` gives every
/// session its own instance and is the escape hatch when concurrent loads
/// must not interleave on one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineMode {
    Shared,
    PerSession,
}

/// Controller settings (persistent via JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fallback frame rate when the probe reports none or an unusable rate
    pub default_frame_rate: f64,
    /// Engine sharing mode (see [`EngineMode`])
    pub engine_mode: EngineMode,
    /// Decode every fetched frame during load instead of on first seek
    pub predecode: bool,
    /// Target width for extracted frames (None = native size)
    pub extract_scale_width: Option<u32>,
    /// Capacity of the decoded-image LRU cache, in frames
    pub decoded_cache_frames: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_frame_rate: DEFAULT_FRAME_RATE,
            engine_mode: EngineMode::Shared,
            predecode: false,
            extract_scale_width: None,
            decoded_cache_frames: 256,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Save settings to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))
    }
}

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from host or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Create PathConfig from an explicit directory and environment variables
    ///
    /// Priority: explicit dir → ENV var (FRAMEDECK_CONFIG_DIR) → None (use defaults)
    pub fn from_env(explicit_dir: Option<PathBuf>) -> Self {
        let config_dir = explicit_dir.or_else(|| {
            std::env::var("FRAMEDECK_CONFIG_DIR")
                .ok()
                .map(PathBuf::from)
        });

        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. Explicit directory from the host
/// 2. FRAMEDECK_CONFIG_DIR environment variable
/// 3. Platform-specific config directory from dirs-next (default)
///
/// Platform paths:
/// - Linux: ~/.config/framedeck/{name}
/// - macOS: ~/Library/Application Support/framedeck/{name}
/// - Windows: %APPDATA%\framedeck\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Ensure that the configuration directory exists
///
/// Creates it if missing. Returns error if creation fails.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }

    Ok(())
}

/// Get the configuration directory
fn get_config_dir(config: &PathConfig) -> PathBuf {
    // Priority 1: Custom directory from host or ENV
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    // Priority 2: Platform-specific config directory
    if let Some(dir) = dirs_next::config_dir() {
        return dir.join("framedeck");
    }

    // Fallback: "." if everything else fails
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };

        let path = config_file("framedeck.json", &config);
        assert_eq!(path, PathBuf::from("/custom/framedeck.json"));
    }

    #[test]
    fn test_config_file_uses_platform_defaults() {
        let config = PathConfig { config_dir: None };

        let path = config_file("framedeck.json", &config);
        assert!(path.to_string_lossy().contains("framedeck"));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.default_frame_rate, 30.0);
        assert_eq!(settings.engine_mode, EngineMode::Shared);
        assert!(!settings.predecode);
        assert_eq!(settings.extract_scale_width, None);
        assert_eq!(settings.decoded_cache_frames, 256);
    }

    #[test]
    fn test_settings_roundtrip() {
        let dir = std::env::temp_dir().join("framedeck_test_settings");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("framedeck.json");

        let settings = Settings {
            default_frame_rate: 25.0,
            engine_mode: EngineMode::PerSession,
            predecode: true,
            extract_scale_width: Some(640),
            decoded_cache_frames: 16,
        };
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.default_frame_rate, 25.0);
        assert_eq!(loaded.engine_mode, EngineMode::PerSession);
        assert!(loaded.predecode);
        assert_eq!(loaded.extract_scale_width, Some(640));
        assert_eq!(loaded.decoded_cache_frames, 16);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_settings_partial_json_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"predecode": true}"#).unwrap();

        assert!(settings.predecode);
        assert_eq!(settings.default_frame_rate, 30.0);
        assert_eq!(settings.engine_mode, EngineMode::Shared);
    }
}
