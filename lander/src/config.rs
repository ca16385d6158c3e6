//! Mission configuration.
//!
//! All knobs live in one serde-serializable [`LanderConfig`] so a run can be
//! reproduced from a single JSON file kept in [`ConfigStorage`].

use gnc::{AutopilotConfig, ControllerMode, GuidanceConfig};
use serde::{Deserialize, Serialize};
use shared::camera_model::CameraModel;
use shared::config_storage::{ConfigError, ConfigStorage};
use vision::VisionConfig;

use crate::LanderError;

/// Name under which [`LanderConfig`] is stored
pub const CONFIG_NAME: &str = "lander_config";

/// Timers and actuation limits of the control unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlUnitConfig {
    /// Seconds between guidance evaluations
    pub guidance_period: f64,
    /// Impulse per unit of commanded acceleration (N s per m/s^2)
    pub boost_strength: f64,
    /// Largest impulse applied by a single boost
    pub max_boost: f64,
    /// Guidance reads only the estimated site and rotation
    pub use_estimate_only: bool,
    pub asteroid_scale: i32,
    pub mode: ControllerMode,
}

impl Default for ControlUnitConfig {
    fn default() -> Self {
        Self {
            guidance_period: 1.0,
            boost_strength: 1.0,
            max_boost: 2.0,
            use_estimate_only: false,
            asteroid_scale: 1,
            mode: ControllerMode::Gnc,
        }
    }
}

impl ControlUnitConfig {
    pub fn validate(&self) -> Result<(), LanderError> {
        if !(self.guidance_period > 0.0) {
            return Err(LanderError::InvalidConfig(format!(
                "guidance_period must be positive, got {}",
                self.guidance_period
            )));
        }
        if self.boost_strength < 0.0 || self.max_boost < 0.0 {
            return Err(LanderError::InvalidConfig(
                "boost_strength and max_boost must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything needed to build a control unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanderConfig {
    pub control: ControlUnitConfig,
    pub vision: VisionConfig,
    pub guidance: GuidanceConfig,
    pub autopilot: AutopilotConfig,
    pub camera: CameraModel,
}

impl LanderConfig {
    /// Load from storage, falling back to defaults when nothing is saved.
    pub fn load(storage: &ConfigStorage) -> Result<Self, ConfigError> {
        storage.get_or_default(CONFIG_NAME)
    }

    pub fn save(&self, storage: &ConfigStorage) -> Result<std::path::PathBuf, ConfigError> {
        storage.save(CONFIG_NAME, self)
    }
}
