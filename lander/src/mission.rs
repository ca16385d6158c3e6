//! Fixed-step mission driver over the headless reference collaborators.

use std::sync::Arc;
use std::time::Duration;

use gnc::GuidancePhase;
use nalgebra::Vector3;
use shared::collaborators::{ChannelFrameSource, PhysicsWorld};
use shared::telemetry::TelemetrySink;

use crate::config::LanderConfig;
use crate::control_unit::LanderControlUnit;
use crate::sim::{CaptureTrigger, SphereAsteroidWorld, SyntheticNadirCamera, Touchdown, WorldConfig};
use crate::LanderError;

/// Longest wait for the vision worker in lock-step mode
const VISION_WAIT: Duration = Duration::from_secs(60);

pub type SimControlUnit = LanderControlUnit<SphereAsteroidWorld, CaptureTrigger, ChannelFrameSource>;

/// Outcome of a mission run
#[derive(Debug, Clone, PartialEq)]
pub struct MissionSummary {
    /// Simulated seconds
    pub elapsed: f64,
    pub phase: GuidancePhase,
    pub touchdown: Option<Touchdown>,
    pub angular_velocity_estimate: Option<Vector3<f64>>,
    pub angular_velocity_truth: Vector3<f64>,
    pub measured_samples: usize,
}

pub struct Mission {
    unit: SimControlUnit,
    camera: SyntheticNadirCamera,
    physics_dt: f64,
    /// Wait for the vision worker after every tick so results do not depend
    /// on host speed
    lockstep_vision: bool,
}

impl Mission {
    pub fn new(
        config: &LanderConfig,
        world: WorldConfig,
        physics_dt: f64,
        texture_seed: u64,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, LanderError> {
        if !(physics_dt > 0.0) {
            return Err(LanderError::InvalidConfig(format!(
                "physics_dt must be positive, got {physics_dt}"
            )));
        }
        let (camera, trigger, frames) = SyntheticNadirCamera::new(
            config.camera.clone(),
            config.control.asteroid_scale,
            texture_seed,
        );
        let unit = LanderControlUnit::new(
            config,
            SphereAsteroidWorld::new(world),
            trigger,
            frames,
            telemetry,
        )?;

        Ok(Self {
            unit,
            camera,
            physics_dt,
            lockstep_vision: true,
        })
    }

    /// Let the vision worker run freely alongside the simulation
    pub fn set_lockstep_vision(&mut self, lockstep: bool) {
        self.lockstep_vision = lockstep;
    }

    pub fn unit(&self) -> &SimControlUnit {
        &self.unit
    }

    pub fn unit_mut(&mut self) -> &mut SimControlUnit {
        &mut self.unit
    }

    pub fn world(&self) -> &SphereAsteroidWorld {
        self.unit.physics()
    }

    pub fn is_finished(&self) -> bool {
        self.world().has_collided()
    }

    /// Advance physics, the control unit and the camera by one step.
    ///
    /// Returns `false` once the lander is on the surface.
    pub fn step(&mut self) -> Result<bool, LanderError> {
        if self.is_finished() {
            return Ok(false);
        }

        self.unit.physics_mut().step(self.physics_dt);
        if self.is_finished() {
            self.unit.set_guidance_enabled(false);
            self.unit.set_imaging_enabled(false);
            self.unit.impulse_queue().clear();
            return Ok(false);
        }

        self.unit.on_simulation_tick(self.physics_dt)?;
        self.camera.service_requests(self.unit.physics())?;

        // The estimator ignores frames once its estimate is final
        if self.unit.imaging_enabled() && !self.unit.estimator().is_active() {
            self.unit.set_imaging_enabled(false);
        }

        if self.lockstep_vision && !self.unit.estimator().wait_until_idle(VISION_WAIT) {
            log::warn!("Vision worker still busy after {VISION_WAIT:?}");
        }
        Ok(true)
    }

    /// Step until touchdown or until `duration` simulated seconds have passed.
    pub fn run(&mut self, duration: f64) -> Result<MissionSummary, LanderError> {
        let start = self.world().timestamp();
        while self.world().timestamp() - start < duration {
            if !self.step()? {
                break;
            }
        }
        self.summary()
    }

    pub fn summary(&self) -> Result<MissionSummary, LanderError> {
        Ok(MissionSummary {
            elapsed: self.world().timestamp(),
            phase: self.unit.guidance().phase(),
            touchdown: self.world().touchdown().copied(),
            angular_velocity_estimate: self.unit.estimator().final_estimate(),
            angular_velocity_truth: self.world().asteroid_angular_velocity()?,
            measured_samples: self.unit.estimator().measured_sample_count(),
        })
    }
}
