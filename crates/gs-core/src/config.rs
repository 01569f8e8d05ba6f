//! Configuration system for the GS plugin
//!
//! Options are a flat string-keyed map, the same shape the host frontend
//! hands over: every value is stored as a string and read back as a string,
//! an integer or a boolean (non-zero integer).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Host option selecting between the software and hardware renderers
pub const RENDERER_OPTION: &str = "renderer_option";

/// Default option values. Anything not listed reads as `""` / `0`.
const DEFAULTS: &[(&str, &str)] = &[
    ("accurate_blending_unit", "1"),
    ("accurate_date", "1"),
    ("AspectRatio", "1"),
    ("autoflush_sw", "1"),
    ("clut_load_before_draw", "0"),
    ("crc_hack_level", "-1"),
    ("CrcHacksExclusions", ""),
    ("dithering_ps2", "2"),
    ("extrathreads", "2"),
    ("extrathreads_height", "4"),
    ("filter", "2"),
    ("force_texture_clear", "0"),
    ("fxaa", "0"),
    ("interlace", "7"),
    ("large_framebuffer", "0"),
    ("linear_present", "1"),
    ("MaxAnisotropy", "0"),
    ("mipmap", "1"),
    ("paltex", "0"),
    ("Renderer", "-1"),
    (RENDERER_OPTION, "Auto"),
    ("upscale_multiplier", "1"),
    ("UserHacks", "0"),
    ("UserHacks_AutoFlush", "0"),
    ("UserHacks_HalfPixelOffset", "0"),
    ("UserHacks_SkipDraw", "0"),
    ("UserHacks_SkipDraw_Offset", "0"),
    ("UserHacks_TextureInsideRt", "0"),
    ("UserHacks_WildHack", "0"),
    ("wrap_gs_mem", "0"),
];

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GsConfig {
    options: BTreeMap<String, String>,
}

impl Default for GsConfig {
    fn default() -> Self {
        let options = DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { options }
    }
}

impl GsConfig {
    /// Get an option as a string
    pub fn get_s(&self, key: &str) -> &str {
        self.options.get(key).map(String::as_str).unwrap_or("")
    }

    /// Get an option as an integer. Unparsable values read as 0.
    pub fn get_i(&self, key: &str) -> i32 {
        let value = self.get_s(key).trim();
        if value.is_empty() {
            return 0;
        }
        match value.parse::<i32>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("Option {} has non-integer value {:?}, using 0", key, value);
                0
            }
        }
    }

    /// Get an option as a boolean (non-zero integer)
    pub fn get_b(&self, key: &str) -> bool {
        self.get_i(key) != 0
    }

    /// Set an option from a string
    pub fn set(&mut self, key: &str, value: &str) {
        tracing::debug!("Config: {} = {:?}", key, value);
        self.options.insert(key.to_string(), value.to_string());
    }

    /// Set an option from an integer
    pub fn set_i(&mut self, key: &str, value: i32) {
        self.set(key, &value.to_string());
    }

    /// Set an option from a boolean
    pub fn set_b(&mut self, key: &str, value: bool) {
        self.set_i(key, value as i32);
    }

    /// Get a strictly validated integer option
    pub fn try_get_i(&self, key: &str) -> Result<i32, ConfigError> {
        let value = self.get_s(key);
        value.trim().parse::<i32>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Iterate over all options in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse configuration from TOML text, layering it over the defaults
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let parsed: GsConfig = toml::from_str(text)?;
        let mut config = Self::default();
        config.options.extend(parsed.options);
        Ok(config)
    }

    /// Serialize configuration to TOML text
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from file, or fall back to defaults if it doesn't exist
    pub fn load(path: &Path) -> Result<Self, crate::GsError> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&content)?)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), crate::GsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Get the default path of the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gsx")
            .join("gs.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GsConfig::default();
        assert_eq!(config.get_i("extrathreads"), 2);
        assert_eq!(config.get_i("upscale_multiplier"), 1);
        assert_eq!(config.get_i("crc_hack_level"), -1);
        assert_eq!(config.get_s(RENDERER_OPTION), "Auto");
        assert!(config.get_b("mipmap"));
        assert!(!config.get_b("UserHacks"));
    }

    #[test]
    fn test_unknown_keys() {
        let config = GsConfig::default();
        assert_eq!(config.get_s("does_not_exist"), "");
        assert_eq!(config.get_i("does_not_exist"), 0);
        assert!(!config.get_b("does_not_exist"));
    }

    #[test]
    fn test_set_and_get() {
        let mut config = GsConfig::default();
        config.set_i("upscale_multiplier", 3);
        assert_eq!(config.get_s("upscale_multiplier"), "3");
        config.set("extrathreads", "garbage");
        assert_eq!(config.get_i("extrathreads"), 0);
        assert!(config.try_get_i("extrathreads").is_err());
        config.set_b("fxaa", true);
        assert_eq!(config.get_i("fxaa"), 1);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = GsConfig::default();
        config.set(RENDERER_OPTION, "Software");
        let text = config.to_toml().unwrap();
        let parsed = GsConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed = GsConfig::from_toml("[options]\nupscale_multiplier = \"4\"\n").unwrap();
        assert_eq!(parsed.get_i("upscale_multiplier"), 4);
        assert_eq!(parsed.get_i("extrathreads"), 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gs.toml");
        let mut config = GsConfig::default();
        config.set_i("extrathreads", 6);
        config.save(&path).unwrap();

        let loaded = GsConfig::load(&path).unwrap();
        assert_eq!(loaded.get_i("extrathreads"), 6);
    }
}
