use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn, error};

use crate::backend::{BlendMode, SamplerMode};
use crate::config::{DEFAULT_ATLAS_SIZE, DEFAULT_INITIAL_SPRITE_CAPACITY};

/// User-specific settings applied to every batcher the CLI creates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Quads a batcher holds before its geometry buffers double
    #[serde(default = "default_initial_sprite_capacity")]
    pub initial_sprite_capacity: usize,

    /// Width and height of the first atlas surface
    #[serde(default = "default_initial_atlas_size")]
    pub initial_atlas_size: u32,

    /// Blend mode: "alpha_blend", "additive", "opaque" or "non_premultiplied"
    #[serde(default = "default_blend_mode")]
    pub blend_mode: String,

    /// Sampler: "point_clamp", "point_wrap", "linear_clamp" or "linear_wrap"
    #[serde(default = "default_sampler_mode")]
    pub sampler_mode: String,
}

fn default_initial_sprite_capacity() -> usize {
    DEFAULT_INITIAL_SPRITE_CAPACITY
}

fn default_initial_atlas_size() -> u32 {
    DEFAULT_ATLAS_SIZE
}

fn default_blend_mode() -> String {
    "alpha_blend".to_string()
}

fn default_sampler_mode() -> String {
    "point_clamp".to_string()
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            initial_sprite_capacity: DEFAULT_INITIAL_SPRITE_CAPACITY,
            initial_atlas_size: DEFAULT_ATLAS_SIZE,
            blend_mode: default_blend_mode(),
            sampler_mode: default_sampler_mode(),
        }
    }
}

impl UserSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/atlas_batcher/settings.yaml
    /// On Linux: ~/.config/atlas_batcher/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\atlas_batcher\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        config_dir.join("atlas_batcher").join("settings.yaml")
    }

    /// Load settings from the YAML file
    /// If custom_path is provided, uses that path; otherwise uses the default settings path
    pub fn load(custom_path: Option<&str>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p);
                PathBuf::from(p)
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => {
                match serde_yaml::from_str::<UserSettings>(&contents) {
                    Ok(settings) => {
                        info!("Loaded settings from {:?}", path);
                        debug!("Settings: capacity={}, atlas_size={}, blend={}, sampler={}",
                            settings.initial_sprite_capacity, settings.initial_atlas_size,
                            settings.blend_mode, settings.sampler_mode);
                        settings
                    }
                    Err(e) => {
                        error!("Failed to parse settings file at {:?}: {}", path, e);
                        warn!("Using default settings");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    /// Save settings to the default path while preserving comments
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        // If file exists, try to preserve comments by doing in-place value updates
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => {
                    let updated = self.update_yaml_values(&contents);
                    fs::write(path, updated)
                        .map_err(|e| format!("Failed to write settings file: {}", e))?;
                    info!("Saved settings to {:?} (comments preserved)", path);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to read existing settings file for comment preservation: {}", e);
                    // Fall through to create new file
                }
            }
        }

        let yaml = self.to_yaml_with_comments();
        fs::write(path, yaml)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Update YAML values while preserving existing comments and structure
    fn update_yaml_values(&self, yaml_content: &str) -> String {
        let mut result = yaml_content.to_string();

        result = Self::replace_yaml_value(&result, "initial_sprite_capacity", &self.initial_sprite_capacity.to_string());
        result = Self::replace_yaml_value(&result, "initial_atlas_size", &self.initial_atlas_size.to_string());
        result = Self::replace_yaml_value(&result, "blend_mode", &format!("\"{}\"", self.blend_mode));
        result = Self::replace_yaml_value(&result, "sampler_mode", &format!("\"{}\"", self.sampler_mode));

        result
    }

    /// Replace a YAML key's value while preserving the rest of the line
    fn replace_yaml_value(yaml: &str, key: &str, new_value: &str) -> String {
        let pattern = format!(r"(?m)^(\s*{}\s*:\s*).*$", regex::escape(key));
        let replacement = format!("${{1}}{}", new_value);

        match regex::Regex::new(&pattern) {
            Ok(re) => re.replace_all(yaml, replacement.as_str()).to_string(),
            Err(e) => {
                warn!("Failed to create regex for key '{}': {}", key, e);
                yaml.to_string()
            }
        }
    }

    /// Generate YAML content with comments for new files
    fn to_yaml_with_comments(&self) -> String {
        format!(
            r#"# atlas_batcher settings
# Values here override the built-in defaults; command line flags override both.

# Quads a batcher can hold before its vertex and index buffers double
initial_sprite_capacity: {}

# Width and height in pixels of the first atlas; the atlas doubles when full
initial_atlas_size: {}

# Blend mode for the batched draw
# - "alpha_blend": premultiplied alpha
# - "non_premultiplied": straight alpha
# - "additive", "opaque"
blend_mode: "{}"

# Atlas sampler: "point_clamp", "point_wrap", "linear_clamp" or "linear_wrap"
sampler_mode: "{}"
"#,
            self.initial_sprite_capacity,
            self.initial_atlas_size,
            self.blend_mode,
            self.sampler_mode
        )
    }

    /// Convert blend_mode string to BlendMode enum
    pub fn get_blend_mode(&self) -> BlendMode {
        BlendMode::from_name(&self.blend_mode).unwrap_or_else(|| {
            warn!("Unknown blend mode '{}', defaulting to alpha_blend", self.blend_mode);
            BlendMode::default()
        })
    }

    /// Convert sampler_mode string to SamplerMode enum
    pub fn get_sampler_mode(&self) -> SamplerMode {
        SamplerMode::from_name(&self.sampler_mode).unwrap_or_else(|| {
            warn!("Unknown sampler mode '{}', defaulting to point_clamp", self.sampler_mode);
            SamplerMode::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: UserSettings = serde_yaml::from_str("initial_atlas_size: 1024\n").unwrap();

        assert_eq!(settings.initial_atlas_size, 1024);
        assert_eq!(settings.initial_sprite_capacity, DEFAULT_INITIAL_SPRITE_CAPACITY);
        assert_eq!(settings.get_blend_mode(), BlendMode::AlphaBlend);
    }

    #[test]
    fn test_unknown_names_fall_back() {
        let settings = UserSettings {
            blend_mode: "glow".to_string(),
            sampler_mode: "LINEAR_WRAP".to_string(),
            ..UserSettings::default()
        };

        assert_eq!(settings.get_blend_mode(), BlendMode::AlphaBlend);
        assert_eq!(settings.get_sampler_mode(), SamplerMode::LinearWrap);
    }

    #[test]
    fn test_update_keeps_comments() {
        let settings = UserSettings { initial_atlas_size: 2048, ..UserSettings::default() };
        let yaml = "# keep me\ninitial_atlas_size: 512\nblend_mode: \"opaque\" \n";

        let updated = settings.update_yaml_values(yaml);

        assert!(updated.starts_with("# keep me\n"));
        assert!(updated.contains("initial_atlas_size: 2048"));
        assert!(updated.contains("blend_mode: \"alpha_blend\""));
    }

    #[test]
    fn test_generated_yaml_round_trips() {
        let settings = UserSettings { sampler_mode: "linear_clamp".to_string(), ..UserSettings::default() };

        let parsed: UserSettings = serde_yaml::from_str(&settings.to_yaml_with_comments()).unwrap();

        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("atlas_batcher_settings_{}", std::process::id()))
            .join("settings.yaml");
        let settings = UserSettings { initial_sprite_capacity: 7, ..UserSettings::default() };

        settings.save_to(&path).unwrap();
        let loaded = UserSettings::load(path.to_str());

        assert_eq!(loaded, settings);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
