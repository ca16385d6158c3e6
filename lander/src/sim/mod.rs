//! Headless reference collaborators for running the control unit without a
//! game engine.

pub mod camera;
pub mod world;

pub use camera::{CaptureTrigger, SurfaceTexture, SyntheticNadirCamera};
pub use world::{SphereAsteroidWorld, Touchdown, WorldConfig};
