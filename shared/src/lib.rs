//! Shared components for the lander GNC and vision modules
//!
//! Holds the plain value types that cross crate boundaries (navigation state,
//! boost commands), the narrow collaborator interfaces the control unit is
//! built against, and the ambient utilities (telemetry, configuration storage,
//! frame dumps).

pub mod boost;
pub mod camera_model;
pub mod collaborators;
#[cfg(feature = "config-storage")]
pub mod config_storage;
#[cfg(feature = "frame-writer")]
pub mod frame_writer;
pub mod navigation;
pub mod telemetry;
pub mod test_util;

pub use boost::{ImpulseQueue, LanderBoostCommand};
pub use camera_model::{CameraModel, ImageSize};
pub use collaborators::{
    CapturedFrame, ChannelFrameSource, CollaboratorError, FrameSource, LanderBodyState,
    PhysicsWorld, Renderer, SurfaceSite,
};
pub use navigation::NavigationState;
pub use telemetry::{
    telemetry_line, FileTelemetrySink, LogChannel, MemoryTelemetrySink, TelemetrySink,
};
