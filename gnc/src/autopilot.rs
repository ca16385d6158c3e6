//! Simple station-keeping autopilot.
//!
//! Holds the lander at the position it occupied when the autopilot first ran,
//! using a proportional term on position error, a damping term on velocity,
//! and feed-forward gravity compensation. It has no notion of a landing site.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use shared::navigation::NavigationState;

use crate::{world_to_body, GncError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutopilotConfig {
    /// Acceleration per metre of position error (1/s^2)
    pub position_gain: f64,
    /// Acceleration per m/s of velocity (1/s)
    pub velocity_gain: f64,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            position_gain: 0.02,
            velocity_gain: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimpleAutopilot {
    config: AutopilotConfig,
    hold_position: Option<Vector3<f64>>,
}

impl SimpleAutopilot {
    pub fn new(config: AutopilotConfig) -> Self {
        Self {
            config,
            hold_position: None,
        }
    }

    /// Position being held, once captured
    pub fn hold_position(&self) -> Option<Vector3<f64>> {
        self.hold_position
    }

    /// Body-frame acceleration command holding the captured position.
    pub fn compute_thrust(&mut self, nav: &NavigationState) -> Result<Vector3<f64>, GncError> {
        let hold = *self.hold_position.get_or_insert_with(|| {
            log::info!("Autopilot holding position {:?}", nav.lander_position);
            nav.lander_position
        });

        let accel = (hold - nav.lander_position) * self.config.position_gain
            - nav.lander_velocity * self.config.velocity_gain
            - nav.gravity_vector;

        world_to_body(&nav.lander_transform, &accel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_call_captures_hold_and_cancels_gravity() {
        let mut autopilot = SimpleAutopilot::new(AutopilotConfig::default());
        let nav = NavigationState {
            lander_position: Vector3::new(0.0, 0.0, 700.0),
            gravity_vector: Vector3::new(0.0, 0.0, -0.02),
            ..Default::default()
        };
        let thrust = autopilot.compute_thrust(&nav).unwrap();
        assert_eq!(autopilot.hold_position(), Some(nav.lander_position));
        assert_relative_eq!(thrust, Vector3::new(0.0, 0.0, 0.02), epsilon = 1e-15);
    }

    #[test]
    fn test_drift_is_pushed_back() {
        let config = AutopilotConfig {
            position_gain: 0.1,
            velocity_gain: 1.0,
        };
        let mut autopilot = SimpleAutopilot::new(config);
        let mut nav = NavigationState {
            lander_position: Vector3::new(0.0, 0.0, 700.0),
            ..Default::default()
        };
        autopilot.compute_thrust(&nav).unwrap();

        nav.lander_position = Vector3::new(10.0, 0.0, 700.0);
        nav.lander_velocity = Vector3::new(1.0, 0.0, 0.0);
        let thrust = autopilot.compute_thrust(&nav).unwrap();
        assert_relative_eq!(thrust, Vector3::new(-2.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_closed_loop_converges() {
        let mut autopilot = SimpleAutopilot::new(AutopilotConfig::default());
        let g = Vector3::new(0.0, 0.0, -0.05);
        let mut nav = NavigationState {
            lander_position: Vector3::new(0.0, 0.0, 700.0),
            lander_velocity: Vector3::zeros(),
            gravity_vector: g,
            ..Default::default()
        };
        autopilot.compute_thrust(&nav).unwrap();
        nav.lander_velocity = Vector3::new(0.5, -0.3, 0.2);

        let dt = 0.1;
        for _ in 0..3000 {
            let a = autopilot.compute_thrust(&nav).unwrap() + g;
            nav.lander_velocity += a * dt;
            nav.lander_position += nav.lander_velocity * dt;
        }
        assert_relative_eq!(nav.lander_position, Vector3::new(0.0, 0.0, 700.0), epsilon = 1e-3);
    }
}
