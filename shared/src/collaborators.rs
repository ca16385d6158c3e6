//! Narrow interfaces to the systems the control unit drives but does not own.
//!
//! The control unit is built against these traits only: a physics world it can
//! query and push impulses into, a renderer it can ask for offscreen captures,
//! and a frame source the captured images arrive through.

use crossbeam_channel::{Receiver, TryRecvError};
use nalgebra::{Matrix4, Vector3};
use ndarray::Array2;
use thiserror::Error;

/// Failure reported by an external collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("Physics query failed: {0}")]
    Physics(String),

    #[error("Renderer failed: {0}")]
    Renderer(String),

    #[error("Frame source disconnected")]
    FrameSourceDisconnected,
}

/// Rigid-body state of the lander as reported by physics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanderBodyState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    /// Body-to-world transform
    pub transform: Matrix4<f64>,
}

/// Landing site position and outward surface normal in world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSite {
    pub position: Vector3<f64>,
    pub up: Vector3<f64>,
}

/// A rendered camera image
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Monotonic capture counter
    pub sequence: u64,
    /// Simulation time at capture
    pub timestamp: f64,
    pub image: Array2<u16>,
}

/// Queries and impulses against the physics world.
///
/// The world frame is centred on the asteroid's centre of mass.
pub trait PhysicsWorld {
    /// Monotonic simulation time in seconds
    fn timestamp(&self) -> f64;

    /// First surface hit along `direction` within `max_range`, if any
    fn ray_cast(
        &self,
        origin: &Vector3<f64>,
        direction: &Vector3<f64>,
        max_range: f64,
    ) -> Result<Option<Vector3<f64>>, CollaboratorError>;

    fn lander_state(&self) -> Result<LanderBodyState, CollaboratorError>;

    /// Gravitational acceleration at a world point
    fn gravity_at(&self, point: &Vector3<f64>) -> Result<Vector3<f64>, CollaboratorError>;

    /// Current ground-truth landing site
    fn landing_site(&self) -> Result<SurfaceSite, CollaboratorError>;

    /// Ground-truth asteroid angular velocity
    fn asteroid_angular_velocity(&self) -> Result<Vector3<f64>, CollaboratorError>;

    /// Apply a linear impulse (world frame) to the lander
    fn apply_impulse(&mut self, impulse: &Vector3<f64>) -> Result<(), CollaboratorError>;

    /// Apply an angular impulse (world frame) to the lander
    fn apply_torque_impulse(&mut self, torque: &Vector3<f64>) -> Result<(), CollaboratorError>;
}

/// Renderer capable of offscreen captures.
///
/// Requests are fire-and-forget; the finished frame shows up later on a
/// [`FrameSource`].
pub trait Renderer {
    fn request_offscreen_capture(&mut self) -> Result<(), CollaboratorError>;
}

/// FIFO of completed captures
pub trait FrameSource {
    /// Next completed frame, or `None` if nothing is waiting
    fn poll_frame(&mut self) -> Result<Option<CapturedFrame>, CollaboratorError>;
}

/// Frame source fed through a crossbeam channel
#[derive(Debug, Clone)]
pub struct ChannelFrameSource {
    receiver: Receiver<CapturedFrame>,
}

impl ChannelFrameSource {
    pub fn new(receiver: Receiver<CapturedFrame>) -> Self {
        Self { receiver }
    }
}

impl FrameSource for ChannelFrameSource {
    fn poll_frame(&mut self) -> Result<Option<CapturedFrame>, CollaboratorError> {
        match self.receiver.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(CollaboratorError::FrameSourceDisconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> CapturedFrame {
        CapturedFrame {
            sequence,
            timestamp: sequence as f64,
            image: Array2::zeros((4, 4)),
        }
    }

    #[test]
    fn test_channel_frame_source_is_fifo() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut source = ChannelFrameSource::new(rx);

        assert!(source.poll_frame().unwrap().is_none());
        tx.send(frame(1)).unwrap();
        tx.send(frame(2)).unwrap();

        assert_eq!(source.poll_frame().unwrap().unwrap().sequence, 1);
        assert_eq!(source.poll_frame().unwrap().unwrap().sequence, 2);
        assert!(source.poll_frame().unwrap().is_none());
    }

    #[test]
    fn test_channel_frame_source_reports_disconnect() {
        let (tx, rx) = crossbeam_channel::unbounded::<CapturedFrame>();
        let mut source = ChannelFrameSource::new(rx);
        drop(tx);
        assert_eq!(
            source.poll_frame().unwrap_err(),
            CollaboratorError::FrameSourceDisconnected
        );
    }
}
