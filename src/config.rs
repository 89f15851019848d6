use crate::backend::RenderState;
use crate::error::{BatcherError, Result};
use crate::settings::UserSettings;

// Default values for configuration
// These serve as fallback values and can be used for "reset to defaults" functionality
pub const DEFAULT_INITIAL_SPRITE_CAPACITY: usize = 42;
pub const DEFAULT_ATLAS_SIZE: u32 = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatcherConfig {
    pub initial_sprite_capacity: usize, // Quads the geometry buffers hold before the first doubling
    pub initial_atlas_size: u32,        // Width and height of the first atlas surface
    pub render_state: RenderState,      // State used by submits that do not override it
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            initial_sprite_capacity: DEFAULT_INITIAL_SPRITE_CAPACITY,
            initial_atlas_size: DEFAULT_ATLAS_SIZE,
            render_state: RenderState::default(),
        }
    }
}

impl BatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_sprite_capacity == 0 {
            return Err(BatcherError::config("initial sprite capacity must be at least 1"));
        }
        if self.initial_atlas_size == 0 {
            return Err(BatcherError::config("initial atlas size must be at least 1"));
        }
        Ok(())
    }
}

impl From<&UserSettings> for BatcherConfig {
    fn from(settings: &UserSettings) -> Self {
        Self {
            initial_sprite_capacity: settings.initial_sprite_capacity,
            initial_atlas_size: settings.initial_atlas_size,
            render_state: RenderState {
                blend: settings.get_blend_mode(),
                sampler: settings.get_sampler_mode(),
                ..RenderState::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero() {
        assert!(BatcherConfig::default().validate().is_ok());

        let config = BatcherConfig { initial_sprite_capacity: 0, ..BatcherConfig::default() };
        assert!(matches!(config.validate(), Err(BatcherError::InvalidConfig(_))));

        let config = BatcherConfig { initial_atlas_size: 0, ..BatcherConfig::default() };
        assert!(config.validate().is_err());
    }
}
