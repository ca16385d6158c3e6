//! Two-phase guidance controller.
//!
//! Processes control steps through phases: PreApproach -> Descent.
//! PreApproach holds the lander in place and, once the rotation estimate is
//! final, waits for the landing site to rotate underneath it. Descent flies
//! the ZEM-ZEV law toward the landing site's predicted arrival state.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use shared::navigation::NavigationState;
use shared::telemetry::{telemetry_line, LogChannel, TelemetrySink};
use std::sync::Arc;

use crate::projection::calculate_vectors_at_time;
use crate::zem_zev::{zem_zev_acceleration, TimeToGo};
use crate::{world_to_body, GncError};

/// Guidance phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuidancePhase {
    /// Station keeping until the descent window opens
    PreApproach,
    /// Powered descent; no further transitions
    Descent,
}

/// Configuration for the guidance controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceConfig {
    /// Total descent flight time `tf` in seconds
    pub flight_time: f64,
    /// How far ahead the landing site is projected for the alignment test
    pub look_ahead_time: f64,
    /// Maximum angle between the projected site normal and the
    /// site-to-lander line for descent to begin, in degrees
    pub alignment_threshold_deg: f64,
    /// Fraction of the current velocity cancelled per step while station keeping
    pub station_keeping_gain: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            flight_time: 60.0,
            look_ahead_time: 60.0,
            alignment_threshold_deg: 5.0,
            station_keeping_gain: 1.0,
        }
    }
}

impl GuidanceConfig {
    pub fn validate(&self) -> Result<(), GncError> {
        if !(self.flight_time > 0.0) {
            return Err(GncError::InvalidConfig(format!(
                "flight_time must be positive, got {}",
                self.flight_time
            )));
        }
        if self.look_ahead_time < 0.0 {
            return Err(GncError::InvalidConfig(format!(
                "look_ahead_time must not be negative, got {}",
                self.look_ahead_time
            )));
        }
        if !(self.alignment_threshold_deg > 0.0) {
            return Err(GncError::InvalidConfig(format!(
                "alignment_threshold_deg must be positive, got {}",
                self.alignment_threshold_deg
            )));
        }
        Ok(())
    }
}

/// Angle in radians between `future_up` and the line from the projected site
/// to the lander.
///
/// Zero when the lander sits directly above the site along its normal.
pub fn approach_angle(
    lander_position: &Vector3<f64>,
    future_site_position: &Vector3<f64>,
    future_up: &Vector3<f64>,
) -> f64 {
    let line = lander_position - future_site_position;
    if line.norm() == 0.0 || future_up.norm() == 0.0 {
        return 0.0;
    }
    future_up.angle(&line)
}

/// Main guidance state machine
pub struct GuidanceController {
    phase: GuidancePhase,
    config: GuidanceConfig,
    time_to_go: TimeToGo,
    telemetry: Arc<dyn TelemetrySink>,
}

impl GuidanceController {
    /// Create a controller in the PreApproach phase
    pub fn new(config: GuidanceConfig, telemetry: Arc<dyn TelemetrySink>) -> Result<Self, GncError> {
        config.validate()?;
        Ok(Self {
            phase: GuidancePhase::PreApproach,
            time_to_go: TimeToGo::new(config.flight_time),
            config,
            telemetry,
        })
    }

    pub fn phase(&self) -> GuidancePhase {
        self.phase
    }

    pub fn time_to_go(&self) -> &TimeToGo {
        &self.time_to_go
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    /// Compute the body-frame thrust command for one control step.
    ///
    /// # Arguments
    /// * `control_step` - Seconds between guidance evaluations
    /// * `nav` - Current navigation snapshot
    ///
    /// # Errors
    /// * `GncError::SingularTransform` - If the lander transform cannot be inverted
    pub fn compute_thrust(
        &mut self,
        control_step: f64,
        nav: &NavigationState,
    ) -> Result<Vector3<f64>, GncError> {
        let thrust = match self.phase {
            GuidancePhase::PreApproach => {
                let thrust = self.station_keeping(nav)?;
                if nav.estimation_complete && self.check_approach_aligned(nav) {
                    log::info!(
                        "Landing site aligned at t={:.2}, entering Descent (tf = {})",
                        nav.timestamp,
                        self.config.flight_time
                    );
                    self.time_to_go.reset();
                    self.phase = GuidancePhase::Descent;
                }
                thrust
            }
            GuidancePhase::Descent => self.descent(control_step, nav)?,
        };

        let phase_code = match self.phase {
            GuidancePhase::PreApproach => 0.0,
            GuidancePhase::Descent => 1.0,
        };
        self.telemetry.append(
            LogChannel::Thrust,
            &telemetry_line(nav.timestamp, &[phase_code, thrust.x, thrust.y, thrust.z]),
        );

        Ok(thrust)
    }

    /// Cancel the current velocity, expressed in the body frame
    fn station_keeping(&self, nav: &NavigationState) -> Result<Vector3<f64>, GncError> {
        let world = -nav.lander_velocity * self.config.station_keeping_gain;
        world_to_body(&nav.lander_transform, &world)
    }

    /// Test whether the projected landing site lies under the lander.
    ///
    /// Logs the projection on the pre-approach channel.
    pub fn check_approach_aligned(&self, nav: &NavigationState) -> bool {
        let view = nav.guidance_view();
        let future = calculate_vectors_at_time(
            &view.position,
            &view.up,
            &view.angular_velocity,
            self.config.look_ahead_time,
        );
        let angle = approach_angle(&nav.lander_position, &future.position, &future.up);

        self.telemetry.append(
            LogChannel::PreApproach,
            &telemetry_line(
                nav.timestamp,
                &[
                    future.position.x,
                    future.position.y,
                    future.position.z,
                    future.up.x,
                    future.up.y,
                    future.up.z,
                    angle.to_degrees(),
                ],
            ),
        );

        angle < self.config.alignment_threshold_deg.to_radians()
    }

    fn descent(
        &mut self,
        control_step: f64,
        nav: &NavigationState,
    ) -> Result<Vector3<f64>, GncError> {
        let view = nav.guidance_view();
        let tgo = self.time_to_go.tgo();
        let target = calculate_vectors_at_time(&view.position, &view.up, &view.angular_velocity, tgo);

        let accel = zem_zev_acceleration(
            &target.position,
            &target.velocity,
            &nav.lander_position,
            &nav.lander_velocity,
            &nav.gravity_vector,
            tgo,
        );
        log::debug!("Descent tgo={tgo:.2} accel={accel:?}");

        self.time_to_go.advance(control_step);
        world_to_body(&nav.lander_transform, &accel)
    }
}
