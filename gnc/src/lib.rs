//! GNC - lander Guidance, Navigation & Control
//!
//! Two-phase guidance for landing on a rotating asteroid:
//! PreApproach (station keeping until the landing site rotates into a
//! descent window) -> Descent (ZEM-ZEV optimal intercept).
//!
//! A simple proportional-derivative autopilot is provided as an alternative
//! controller.

pub mod autopilot;
pub mod guidance;
pub mod projection;
pub mod zem_zev;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use autopilot::{AutopilotConfig, SimpleAutopilot};
pub use guidance::{GuidanceConfig, GuidanceController, GuidancePhase};
pub use projection::{calculate_vectors_at_time, ProjectedSite};
pub use zem_zev::{zem_zev_acceleration, TimeToGo};

/// Errors raised by the guidance controllers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GncError {
    #[error("Lander transform is singular and cannot be inverted")]
    SingularTransform,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Which controller produces thrust commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControllerMode {
    /// Two-phase guidance with ZEM-ZEV descent
    #[default]
    Gnc,
    /// Proportional-derivative station keeping only
    Autopilot,
}

/// Express a world-frame vector in the lander's body frame.
pub(crate) fn world_to_body(
    transform: &nalgebra::Matrix4<f64>,
    world: &nalgebra::Vector3<f64>,
) -> Result<nalgebra::Vector3<f64>, GncError> {
    let inverse = transform.try_inverse().ok_or(GncError::SingularTransform)?;
    Ok(inverse.transform_vector(world))
}
