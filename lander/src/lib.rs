//! Lander control unit and a headless asteroid descent simulation.
//!
//! [`LanderControlUnit`] is the per-tick orchestrator: it keeps the imaging
//! and guidance timers, feeds captured frames to the vision estimator, runs
//! the guidance controller and drains the impulse queue into the physics
//! world. The [`sim`] module provides reference collaborators (a rotating
//! spherical asteroid and a ray-traced nadir camera) and [`mission`] ties
//! them together for end-to-end runs.

pub mod config;
pub mod control_unit;
pub mod mission;
pub mod sim;

use thiserror::Error;

pub use config::{ControlUnitConfig, LanderConfig};
pub use control_unit::LanderControlUnit;
pub use mission::{Mission, MissionSummary};

#[derive(Error, Debug)]
pub enum LanderError {
    #[error("Collaborator failure: {0}")]
    Collaborator(#[from] shared::collaborators::CollaboratorError),

    #[error("Guidance failure: {0}")]
    Guidance(#[from] gnc::GncError),

    #[error("Vision failure: {0}")]
    Vision(#[from] vision::VisionError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
