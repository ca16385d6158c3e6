//! Per-tick orchestration of imaging, vision, guidance and actuation.
//!
//! The control unit is driven from the simulation thread. Each tick it
//! forwards completed captures to the vision estimator, runs the imaging and
//! guidance timers, and applies at most one queued boost to the physics world.
//! Vision work happens on the estimator's own worker thread; the estimate is
//! picked up at the guidance synchronization point.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use gnc::{ControllerMode, GuidanceController, SimpleAutopilot};
use nalgebra::Vector3;
use shared::boost::{ImpulseQueue, LanderBoostCommand};
use shared::collaborators::{CapturedFrame, FrameSource, PhysicsWorld, Renderer};
use shared::frame_writer::save_frame_png;
use shared::navigation::NavigationState;
use shared::telemetry::{telemetry_line, LogChannel, TelemetrySink};
use vision::{FrameGeometry, VisionError, VisionEstimator};

use crate::config::{ControlUnitConfig, LanderConfig};
use crate::LanderError;

/// Slack absorbing round-off when summing tick durations
const TIMER_EPSILON: f64 = 1e-9;

/// Accumulates elapsed time and fires once per period
#[derive(Debug, Clone, Copy)]
struct PeriodicTimer {
    period: f64,
    elapsed: f64,
}

impl PeriodicTimer {
    fn new(period: f64) -> Self {
        Self {
            period,
            elapsed: 0.0,
        }
    }

    fn tick(&mut self, dt: f64) -> bool {
        self.elapsed += dt;
        if self.elapsed + TIMER_EPSILON >= self.period {
            self.elapsed -= self.period;
            true
        } else {
            false
        }
    }
}

pub struct LanderControlUnit<P, R, F> {
    physics: P,
    renderer: R,
    frames: F,
    config: ControlUnitConfig,
    nav: NavigationState,
    guidance: GuidanceController,
    autopilot: SimpleAutopilot,
    estimator: VisionEstimator,
    impulses: ImpulseQueue,
    telemetry: Arc<dyn TelemetrySink>,
    /// Geometry of requested captures whose frames have not arrived yet
    pending_geometry: VecDeque<FrameGeometry>,
    imaging_timer: PeriodicTimer,
    guidance_timer: PeriodicTimer,
    imaging_enabled: bool,
    guidance_enabled: bool,
    /// Simulation time at which the site estimate was seeded
    site_seeded_at: Option<f64>,
    estimate_frozen: bool,
    frame_dump_dir: Option<PathBuf>,
}

impl<P, R, F> LanderControlUnit<P, R, F>
where
    P: PhysicsWorld,
    R: Renderer,
    F: FrameSource,
{
    /// Build the controllers and start the vision worker.
    ///
    /// Writes the run parameters to the parameters channel.
    pub fn new(
        config: &LanderConfig,
        physics: P,
        renderer: R,
        frames: F,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, LanderError> {
        config.control.validate()?;
        let guidance = GuidanceController::new(config.guidance.clone(), telemetry.clone())?;
        let estimator = VisionEstimator::new(
            config.vision.clone(),
            config.camera.clone(),
            telemetry.clone(),
        )?;

        let nav = NavigationState {
            use_estimate_only: config.control.use_estimate_only,
            asteroid_scale: config.control.asteroid_scale,
            timestamp: physics.timestamp(),
            ..Default::default()
        };
        log_parameters(telemetry.as_ref(), &nav, config);

        Ok(Self {
            physics,
            renderer,
            frames,
            config: config.control.clone(),
            nav,
            guidance,
            autopilot: SimpleAutopilot::new(config.autopilot.clone()),
            estimator,
            impulses: ImpulseQueue::new(),
            telemetry,
            pending_geometry: VecDeque::new(),
            imaging_timer: PeriodicTimer::new(config.vision.imaging_period),
            guidance_timer: PeriodicTimer::new(config.control.guidance_period),
            imaging_enabled: true,
            guidance_enabled: true,
            site_seeded_at: None,
            estimate_frozen: false,
            frame_dump_dir: None,
        })
    }

    /// Advance the control unit by one simulation step of `dt` seconds.
    ///
    /// # Errors
    /// Collaborator and guidance failures are returned; vision contention is
    /// logged and absorbed.
    pub fn on_simulation_tick(&mut self, dt: f64) -> Result<(), LanderError> {
        self.forward_frames()?;

        if self.imaging_enabled && self.imaging_timer.tick(dt) {
            self.request_capture()?;
        }
        if self.guidance_enabled && self.guidance_timer.tick(dt) {
            self.guidance_step()?;
        }

        self.apply_next_impulse()
    }

    /// Queue a manual boost; thread-safe through [`Self::impulse_queue`] as well
    pub fn enqueue_impulse(&self, duration_unused: f64, x: f64, y: f64, z: f64, is_torque: bool) {
        self.impulses.enqueue(duration_unused, x, y, z, is_torque);
    }

    /// Handle to the impulse queue for other threads
    pub fn impulse_queue(&self) -> ImpulseQueue {
        self.impulses.clone()
    }

    pub fn set_guidance_enabled(&mut self, enabled: bool) {
        if self.guidance_enabled != enabled {
            log::info!("Guidance {}", if enabled { "enabled" } else { "disabled" });
        }
        self.guidance_enabled = enabled;
    }

    pub fn set_imaging_enabled(&mut self, enabled: bool) {
        if self.imaging_enabled != enabled {
            log::info!("Imaging {}", if enabled { "enabled" } else { "disabled" });
        }
        self.imaging_enabled = enabled;
    }

    pub fn guidance_enabled(&self) -> bool {
        self.guidance_enabled
    }

    pub fn imaging_enabled(&self) -> bool {
        self.imaging_enabled
    }

    /// Write every frame forwarded to vision as a PNG in `dir`
    pub fn enable_frame_dumps(&mut self, dir: PathBuf) {
        self.frame_dump_dir = Some(dir);
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.nav
    }

    pub fn guidance(&self) -> &GuidanceController {
        &self.guidance
    }

    pub fn estimator(&self) -> &VisionEstimator {
        &self.estimator
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Submit every waiting frame together with its capture geometry.
    fn forward_frames(&mut self) -> Result<(), LanderError> {
        while let Some(frame) = self.frames.poll_frame()? {
            let Some(geometry) = self.pending_geometry.pop_front() else {
                log::warn!("Frame {} arrived without a capture request", frame.sequence);
                continue;
            };
            self.dump_frame(&frame);

            let sequence = frame.sequence;
            match self.estimator.on_frame_available(frame, geometry) {
                Ok(()) => {}
                Err(VisionError::Contention) => {
                    log::warn!("Vision busy, frame {sequence} dropped");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn dump_frame(&self, frame: &CapturedFrame) {
        let Some(dir) = &self.frame_dump_dir else {
            return;
        };
        let path = dir.join(format!("frame_{:05}.png", frame.sequence));
        if let Err(e) = save_frame_png(&frame.image, &path) {
            log::warn!("Failed to dump frame to {}: {e}", path.display());
        }
    }

    /// Measure the geometry under the optical axis and request a capture.
    fn request_capture(&mut self) -> Result<(), LanderError> {
        let state = self.physics.lander_state()?;
        let range = state.position.norm();
        if range == 0.0 {
            log::warn!("Lander at the asteroid centre, skipping capture");
            return Ok(());
        }
        let direction = -state.position / range;

        let Some(surface) = self.physics.ray_cast(&state.position, &direction, range)? else {
            log::warn!("No surface under the optical axis, skipping capture");
            return Ok(());
        };
        let geometry = FrameGeometry {
            altitude: (surface - state.position).norm(),
            radius: surface.norm(),
            asteroid_scale: self.config.asteroid_scale,
        };

        self.renderer.request_offscreen_capture()?;
        self.nav.altitude = geometry.altitude;
        self.nav.radius_at_optical_center = geometry.radius;
        self.pending_geometry.push_back(geometry);
        log::debug!(
            "Capture requested at altitude {:.2}, radius {:.2}",
            geometry.altitude,
            geometry.radius
        );
        Ok(())
    }

    /// Refresh navigation, synchronize the vision estimate and run the controller.
    fn guidance_step(&mut self) -> Result<(), LanderError> {
        self.refresh_navigation()?;
        self.synchronize_estimate();

        let step = self.config.guidance_period;
        let thrust = match self.config.mode {
            ControllerMode::Gnc => self.guidance.compute_thrust(step, &self.nav)?,
            ControllerMode::Autopilot => self.autopilot.compute_thrust(&self.nav)?,
        };
        self.impulses.push(LanderBoostCommand::linear(thrust));
        Ok(())
    }

    fn refresh_navigation(&mut self) -> Result<(), LanderError> {
        let state = self.physics.lander_state()?;
        let site = self.physics.landing_site()?;

        self.nav.timestamp = self.physics.timestamp();
        self.nav.gravity_vector = self.physics.gravity_at(&state.position)?;
        self.nav.lander_position = state.position;
        self.nav.lander_velocity = state.velocity;
        self.nav.lander_transform = state.transform;
        self.nav.landing_site_position = site.position;
        self.nav.landing_site_up = site.up;
        self.nav.angular_velocity_truth = self.physics.asteroid_angular_velocity()?;
        Ok(())
    }

    /// Seed, freeze and propagate the estimated landing site.
    ///
    /// The site estimate is seeded from the first measurement. Once vision
    /// publishes its estimate the rate is frozen and the seed is caught up by
    /// the rotation accumulated since seeding; afterwards it advances by one
    /// guidance period per step.
    fn synchronize_estimate(&mut self) {
        let now = self.nav.timestamp;
        let Some(seeded_at) = self.site_seeded_at else {
            self.nav.seed_site_estimate();
            self.site_seeded_at = Some(now);
            return;
        };

        if self.estimate_frozen {
            self.nav.propagate_site_estimate(self.config.guidance_period);
            return;
        }

        if let Some(omega) = self.estimator.final_estimate() {
            self.nav.angular_velocity_estimate = omega;
            self.nav.estimation_complete = true;
            self.nav.propagate_site_estimate(now - seeded_at);
            self.estimate_frozen = true;
            log_estimate(self.telemetry.as_ref(), now, &omega, &self.nav.angular_velocity_truth);
        }
    }

    /// Pop one command and apply it to the physics world.
    fn apply_next_impulse(&mut self) -> Result<(), LanderError> {
        let Some(command) = self.impulses.pop() else {
            return Ok(());
        };

        if command.is_torque {
            // Reaction-wheel actuation is not modelled
            log::debug!("Ignoring torque command {:?}", command.vector);
            return Ok(());
        }

        let Some(impulse) = boost_impulse(&self.config, &self.nav, &command.vector) else {
            return Ok(());
        };
        self.physics.apply_impulse(&impulse)?;
        Ok(())
    }
}

/// World-frame impulse for a body-frame boost vector.
///
/// The magnitude is `boost_strength * |vector|` clamped to `max_boost`;
/// `None` for a zero command.
pub(crate) fn boost_impulse(
    config: &ControlUnitConfig,
    nav: &NavigationState,
    vector: &Vector3<f64>,
) -> Option<Vector3<f64>> {
    let norm = vector.norm();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    let magnitude = (config.boost_strength * norm).min(config.max_boost);
    Some(nav.body_rotation() * (vector / norm) * magnitude)
}

fn log_parameters(telemetry: &dyn TelemetrySink, nav: &NavigationState, config: &LanderConfig) {
    let values = [
        config.control.guidance_period,
        config.vision.imaging_period,
        config.control.boost_strength,
        config.control.max_boost,
        if config.control.use_estimate_only { 1.0 } else { 0.0 },
        config.control.asteroid_scale as f64,
        config.guidance.flight_time,
        config.guidance.look_ahead_time,
        config.guidance.alignment_threshold_deg,
        config.vision.target_samples as f64,
    ];
    telemetry.append(LogChannel::Parameters, &telemetry_line(nav.timestamp, &values));
}

fn log_estimate(
    telemetry: &dyn TelemetrySink,
    timestamp: f64,
    estimate: &Vector3<f64>,
    truth: &Vector3<f64>,
) {
    log::info!(
        "Rotation estimate frozen at t={timestamp:.2}: ({:.6}, {:.6}, {:.6}), truth ({:.6}, {:.6}, {:.6})",
        estimate.x,
        estimate.y,
        estimate.z,
        truth.x,
        truth.y,
        truth.z
    );
    telemetry.append(
        LogChannel::Parameters,
        &telemetry_line(timestamp, &[estimate.x, estimate.y, estimate.z, truth.x, truth.y, truth.z]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    #[test]
    fn test_timer_tolerates_round_off() {
        let mut timer = PeriodicTimer::new(1.0);
        let fired = (0..10).filter(|_| timer.tick(0.1)).count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_timer_fires_once_per_period() {
        let mut timer = PeriodicTimer::new(1.0);
        let fired: Vec<bool> = (0..8).map(|_| timer.tick(0.25)).collect();
        assert_eq!(
            fired,
            vec![false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_boost_clamped_to_cap() {
        let config = ControlUnitConfig {
            boost_strength: 3.0,
            max_boost: 2.0,
            ..Default::default()
        };
        let nav = NavigationState::default();
        let impulse = boost_impulse(&config, &nav, &Vector3::new(0.0, 4.0, 0.0)).unwrap();
        assert_relative_eq!(impulse, Vector3::new(0.0, 2.0, 0.0));

        let small = boost_impulse(&config, &nav, &Vector3::new(0.1, 0.0, 0.0)).unwrap();
        assert_relative_eq!(small, Vector3::new(0.3, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_boost_rotated_into_world() {
        let config = ControlUnitConfig::default();
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        let nav = NavigationState {
            lander_transform: rotation.to_homogeneous(),
            ..Default::default()
        };
        let impulse = boost_impulse(&config, &nav, &Vector3::new(1.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(impulse, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_boost_ignored() {
        let nav = NavigationState::default();
        assert!(boost_impulse(&ControlUnitConfig::default(), &nav, &Vector3::zeros()).is_none());
    }
}
