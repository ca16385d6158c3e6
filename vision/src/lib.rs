//! Vision-based angular-velocity estimation for a rotating asteroid.
//!
//! Consecutive nadir frames are reduced to keypoints and descriptors, matched,
//! related by a planar homography and decomposed into camera motions. Each
//! decomposed pair contributes one angular-velocity sample; once enough
//! samples are collected they are aggregated into a single-axis estimate.

pub mod aggregation;
pub mod estimator;
pub mod features;
pub mod motion;

use lander_math::RansacConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use aggregation::{aggregate_samples, AngularSample};
pub use estimator::{FrameGeometry, VisionEstimator};
pub use features::{detect_and_describe, Descriptor, DetectorConfig, FeatureSet, Keypoint};
pub use motion::{candidate_angular_velocity, select_angular_velocity, MotionContext};

#[derive(Error, Debug)]
pub enum VisionError {
    /// A previous frame is still being processed
    #[error("vision estimator busy with a previous frame")]
    Contention,
    #[error("vision worker is not running")]
    WorkerStopped,
    #[error("failed to spawn vision worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("invalid vision config: {0}")]
    InvalidConfig(String),
}

/// Tuning for the estimator and its feature pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Measured samples collected before the estimate is published
    pub target_samples: usize,
    /// Best matches kept per frame pair
    pub max_matches: usize,
    /// Pairs with fewer cross-checked matches are discarded
    pub min_matches: usize,
    /// Seconds between captures
    pub imaging_period: f64,
    /// Smallest on-axis image displacement treated as translation, in pixels
    pub translation_threshold_px: f64,
    /// Smallest roll angle treated as rotation, in radians
    pub min_roll_angle: f64,
    pub ransac_iterations: usize,
    /// Inlier reprojection threshold in pixels
    pub ransac_threshold_px: f64,
    pub ransac_min_inliers: usize,
    pub ransac_seed: u64,
    pub detector: DetectorConfig,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            target_samples: 6,
            max_matches: 60,
            min_matches: 12,
            imaging_period: 2.0,
            translation_threshold_px: 0.5,
            min_roll_angle: 1e-4,
            ransac_iterations: 500,
            ransac_threshold_px: 2.0,
            ransac_min_inliers: 8,
            ransac_seed: 0x5eed,
            detector: DetectorConfig::default(),
        }
    }
}

impl VisionConfig {
    pub fn validate(&self) -> Result<(), VisionError> {
        if self.target_samples == 0 {
            return Err(VisionError::InvalidConfig(
                "target_samples must be at least 1".to_string(),
            ));
        }
        if self.min_matches < 4 {
            return Err(VisionError::InvalidConfig(format!(
                "min_matches must be at least 4 for a homography, got {}",
                self.min_matches
            )));
        }
        if self.max_matches < self.min_matches {
            return Err(VisionError::InvalidConfig(format!(
                "max_matches ({}) below min_matches ({})",
                self.max_matches, self.min_matches
            )));
        }
        if !(self.imaging_period > 0.0) {
            return Err(VisionError::InvalidConfig(format!(
                "imaging_period must be positive, got {}",
                self.imaging_period
            )));
        }
        Ok(())
    }

    pub fn ransac_config(&self) -> RansacConfig {
        RansacConfig {
            max_iterations: self.ransac_iterations,
            inlier_threshold: self.ransac_threshold_px,
            min_inliers: self.ransac_min_inliers.max(4),
            seed: self.ransac_seed,
        }
    }
}
