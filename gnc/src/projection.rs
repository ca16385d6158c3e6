//! Forward projection of the landing site on a rotating body.

use nalgebra::{Rotation3, Vector3};

/// Landing site state at a future time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedSite {
    pub position: Vector3<f64>,
    pub up: Vector3<f64>,
    /// Finite-difference velocity over the following second
    pub velocity: Vector3<f64>,
}

fn rotate(position: &Vector3<f64>, up: &Vector3<f64>, omega: &Vector3<f64>, t: f64) -> (Vector3<f64>, Vector3<f64>) {
    let rotation = Rotation3::from_scaled_axis(omega * t);
    (rotation * position, rotation * up)
}

/// Project the landing site `time` seconds ahead.
///
/// The body rotates about its centre (the world origin) at `angular_velocity`.
/// The projected velocity is the difference between the projections at
/// `time + 1` and `time`, not the closed-form tangential velocity. With zero
/// angular velocity the inputs are returned unchanged with zero velocity.
pub fn calculate_vectors_at_time(
    position: &Vector3<f64>,
    up: &Vector3<f64>,
    angular_velocity: &Vector3<f64>,
    time: f64,
) -> ProjectedSite {
    if angular_velocity.norm() == 0.0 {
        return ProjectedSite {
            position: *position,
            up: *up,
            velocity: Vector3::zeros(),
        };
    }

    let (future_position, future_up) = rotate(position, up, angular_velocity, time);
    let (next_position, _) = rotate(position, up, angular_velocity, time + 1.0);

    ProjectedSite {
        position: future_position,
        up: future_up,
        velocity: next_position - future_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_zero_rotation_returns_raw_vectors() {
        let position = Vector3::new(10.0, -3.0, 250.0);
        let up = Vector3::new(0.0, 0.0, 1.0);
        for time in [0.0, 1.0, 37.5, 1e4] {
            let projected = calculate_vectors_at_time(&position, &up, &Vector3::zeros(), time);
            assert_eq!(projected.position, position);
            assert_eq!(projected.up, up);
            assert_eq!(projected.velocity, Vector3::zeros());
        }
    }

    #[test]
    fn test_half_turn_about_z() {
        let omega = Vector3::new(0.0, 0.0, PI / 10.0);
        let projected =
            calculate_vectors_at_time(&Vector3::new(100.0, 0.0, 0.0), &Vector3::x(), &omega, 10.0);
        assert_relative_eq!(projected.position, Vector3::new(-100.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(projected.up, -Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_is_one_second_difference() {
        let omega = Vector3::new(0.0, 0.01, 0.0);
        let position = Vector3::new(0.0, 0.0, 500.0);
        let projected = calculate_vectors_at_time(&position, &Vector3::z(), &omega, 5.0);
        let later = calculate_vectors_at_time(&position, &Vector3::z(), &omega, 6.0);
        assert_relative_eq!(projected.velocity, later.position - projected.position, epsilon = 1e-12);
        // Close to the tangential speed |w| r for a small step
        assert_relative_eq!(projected.velocity.norm(), 5.0, epsilon = 1e-3);
    }

    #[test]
    fn test_radius_preserved() {
        let omega = Vector3::new(0.003, -0.02, 0.011);
        let position = Vector3::new(120.0, 40.0, -300.0);
        let projected = calculate_vectors_at_time(&position, &position.normalize(), &omega, 123.0);
        assert_relative_eq!(projected.position.norm(), position.norm(), epsilon = 1e-9);
        assert_relative_eq!(projected.up, projected.position.normalize(), epsilon = 1e-12);
    }
}
