//! Conversion of homography candidates into angular-velocity samples.
//!
//! A synthetic point on the optical axis at the average altitude of the two
//! frames is moved separately by each candidate's rotation and translation.
//! Candidates that put either image of it on the far side of the plane or
//! deeper than it started are rejected. The translated point alone decides
//! whether the motion reads as an in-plane translation of the surface
//! (rotation about a screen axis); otherwise only a roll about the optical
//! axis counts.

use lander_math::HomographyCandidate;
use nalgebra::{Vector2, Vector3};
use shared::camera_model::CameraModel;

use crate::VisionConfig;

/// Relative round-off allowed on the ground point depth
const DEPTH_EPSILON: f64 = 1e-9;

/// Geometry shared by the two frames of a pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionContext {
    /// Average altitude above the surface along the optical axis
    pub altitude: f64,
    /// Average distance from the asteroid centre to the imaged surface point
    pub radius: f64,
    pub asteroid_scale: i32,
    /// Seconds between the two frames
    pub period: f64,
}

/// Angular velocity implied by one candidate, `None` if the candidate is
/// rejected or implies no motion.
pub fn candidate_angular_velocity(
    candidate: &HomographyCandidate,
    camera: &CameraModel,
    context: &MotionContext,
    config: &VisionConfig,
) -> Option<Vector3<f64>> {
    let ground_point = Vector3::new(0.0, 0.0, context.altitude);
    let max_depth = context.altitude * (1.0 + DEPTH_EPSILON);

    // Plane distance of the ground point; the flipped-normal twin lands on the far side
    let plane_distance = candidate.normal.dot(&ground_point);
    if plane_distance <= 0.0 {
        return None;
    }

    let rotated = candidate.rotation * ground_point;
    let translated = ground_point + candidate.translation * plane_distance;
    for point in [&rotated, &translated] {
        if point.z < 0.0 || point.z > max_depth {
            return None;
        }
    }

    let pixel = camera.project(&translated, context.asteroid_scale)?;
    let displacement: Vector2<f64> = pixel - camera.principal_point();

    let omega = if displacement.norm() > config.translation_threshold_px {
        let world_per_pixel = camera.world_per_pixel(context.altitude, context.asteroid_scale);
        let to_rate = world_per_pixel / context.radius / context.period;
        if displacement.x.abs() >= displacement.y.abs() {
            Vector3::new(0.0, displacement.x * to_rate, 0.0)
        } else {
            // Image rows grow downward
            Vector3::new(-displacement.y * to_rate, 0.0, 0.0)
        }
    } else {
        let axis_angle = candidate.rotation.scaled_axis();
        let dominant = axis_angle.iamax();
        if dominant == 2 && axis_angle.z.abs() > config.min_roll_angle {
            Vector3::new(0.0, 0.0, axis_angle.z / context.period)
        } else {
            Vector3::zeros()
        }
    };

    if omega == Vector3::zeros() || !omega.iter().all(|v| v.is_finite()) {
        None
    } else {
        Some(omega)
    }
}

/// First surviving candidate's angular velocity; every survivor is logged.
pub fn select_angular_velocity(
    candidates: &[HomographyCandidate],
    camera: &CameraModel,
    context: &MotionContext,
    config: &VisionConfig,
) -> Option<Vector3<f64>> {
    let survivors: Vec<Vector3<f64>> = candidates
        .iter()
        .filter_map(|c| candidate_angular_velocity(c, camera, context, config))
        .collect();

    if survivors.len() > 1 {
        for (i, omega) in survivors.iter().enumerate() {
            log::debug!(
                "Candidate {i}: omega = ({:.6}, {:.6}, {:.6})",
                omega.x,
                omega.y,
                omega.z
            );
        }
        log::info!("{} plausible candidates, keeping the first", survivors.len());
    }

    survivors.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn context() -> MotionContext {
        MotionContext {
            altitude: 200.0,
            radius: 1000.0,
            asteroid_scale: 1,
            period: 2.0,
        }
    }

    fn candidate(rotation: Rotation3<f64>, t: Vector3<f64>, normal: Vector3<f64>) -> HomographyCandidate {
        HomographyCandidate {
            rotation,
            translation: t / context().altitude,
            normal,
        }
    }

    #[test]
    fn test_horizontal_translation_maps_to_y_rate() {
        let camera = CameraModel::default();
        let ctx = context();
        let shift = 4.0;
        let c = candidate(Rotation3::identity(), Vector3::new(shift, 0.0, 0.0), Vector3::z());

        let omega = candidate_angular_velocity(&c, &camera, &ctx, &VisionConfig::default()).unwrap();
        assert_relative_eq!(omega, Vector3::new(0.0, shift / ctx.radius / ctx.period, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_vertical_translation_maps_to_negative_x_rate() {
        let camera = CameraModel::default();
        let ctx = context();
        let shift = 3.0;
        let c = candidate(Rotation3::identity(), Vector3::new(0.0, shift, 0.0), Vector3::z());

        let omega = candidate_angular_velocity(&c, &camera, &ctx, &VisionConfig::default()).unwrap();
        assert_relative_eq!(omega, Vector3::new(-shift / ctx.radius / ctx.period, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_roll_maps_to_z_rate() {
        let camera = CameraModel::default();
        let ctx = context();
        let angle = 0.02;
        let c = candidate(
            Rotation3::from_axis_angle(&Vector3::z_axis(), angle),
            Vector3::zeros(),
            Vector3::z(),
        );

        let omega = candidate_angular_velocity(&c, &camera, &ctx, &VisionConfig::default()).unwrap();
        assert_relative_eq!(omega, Vector3::new(0.0, 0.0, angle / ctx.period), epsilon = 1e-12);
    }

    #[test]
    fn test_screen_axis_rotation_without_translation_is_discarded() {
        let camera = CameraModel::default();
        let ctx = context();
        let config = VisionConfig::default();
        for axis in [Vector3::y_axis(), Vector3::x_axis()] {
            let c = candidate(Rotation3::from_axis_angle(&axis, 0.01), Vector3::zeros(), Vector3::z());
            assert!(candidate_angular_velocity(&c, &camera, &ctx, &config).is_none());
        }
    }

    #[test]
    fn test_rotation_does_not_bias_translation_rate() {
        let camera = CameraModel::default();
        let ctx = context();
        let shift = 4.0;
        let c = candidate(
            Rotation3::from_axis_angle(&Vector3::y_axis(), 0.01),
            Vector3::new(shift, 0.0, 0.0),
            Vector3::z(),
        );

        let omega = candidate_angular_velocity(&c, &camera, &ctx, &VisionConfig::default()).unwrap();
        assert_relative_eq!(omega, Vector3::new(0.0, shift / ctx.radius / ctx.period, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_identity_motion_is_discarded() {
        let c = candidate(Rotation3::identity(), Vector3::zeros(), Vector3::z());
        let omega = candidate_angular_velocity(&c, &CameraModel::default(), &context(), &VisionConfig::default());
        assert!(omega.is_none());
    }

    #[test]
    fn test_far_side_normal_rejected() {
        let c = candidate(Rotation3::identity(), Vector3::new(-4.0, 0.0, 0.0), -Vector3::z());
        let omega = candidate_angular_velocity(&c, &CameraModel::default(), &context(), &VisionConfig::default());
        assert!(omega.is_none());
    }

    #[test]
    fn test_receding_translation_rejected() {
        let config = VisionConfig::default();
        for depth in [50.0, 6.0, 0.01] {
            let c = candidate(Rotation3::identity(), Vector3::new(4.0, 0.0, depth), Vector3::z());
            let omega = candidate_angular_velocity(&c, &CameraModel::default(), &context(), &config);
            assert!(omega.is_none(), "accepted a ground point receding by {depth}");
        }
    }

    #[test]
    fn test_approaching_translation_kept() {
        let c = candidate(Rotation3::identity(), Vector3::new(4.0, 0.0, -6.0), Vector3::z());
        let omega = candidate_angular_velocity(&c, &CameraModel::default(), &context(), &VisionConfig::default());
        assert!(omega.is_some_and(|w| w.y > 0.0));
    }

    #[test]
    fn test_behind_or_receding_always_rejected() {
        let camera = CameraModel::default();
        let ctx = context();
        let config = VisionConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let ground_point = Vector3::new(0.0, 0.0, ctx.altitude);

        let mut tested = 0;
        while tested < 200 {
            let axis = Vector3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            let angle = rng.random_range(0.0..std::f64::consts::PI);
            let rotation = Rotation3::new(axis.normalize() * angle);
            let t = Vector3::new(
                rng.random_range(-500.0..500.0),
                rng.random_range(-500.0..500.0),
                rng.random_range(-500.0..500.0),
            );
            let normal = Vector3::new(
                rng.random_range(-0.3..0.3),
                rng.random_range(-0.3..0.3),
                rng.random_range(0.5..1.0),
            )
            .normalize();
            let c = candidate(rotation, t, normal);

            let d = normal.dot(&ground_point);
            let rotated = rotation * ground_point;
            let translated = ground_point + c.translation * d;
            let in_front = |z: f64| (0.0..=ctx.altitude).contains(&z);
            if in_front(rotated.z) && in_front(translated.z) {
                continue;
            }
            tested += 1;
            assert!(
                candidate_angular_velocity(&c, &camera, &ctx, &config).is_none(),
                "accepted candidate with rotated z {} translated z {}",
                rotated.z,
                translated.z
            );
        }
    }

    #[test]
    fn test_first_survivor_wins() {
        let camera = CameraModel::default();
        let ctx = context();
        let candidates = vec![
            candidate(Rotation3::identity(), Vector3::zeros(), Vector3::z()),
            candidate(Rotation3::identity(), Vector3::new(0.0, 2.0, 0.0), Vector3::z()),
            candidate(Rotation3::identity(), Vector3::new(5.0, 0.0, 0.0), Vector3::z()),
        ];
        let omega = select_angular_velocity(&candidates, &camera, &ctx, &VisionConfig::default()).unwrap();
        assert!(omega.x < 0.0);
        assert_eq!(omega.y, 0.0);
    }

    #[test]
    fn test_no_survivor() {
        let candidates = vec![candidate(Rotation3::identity(), Vector3::zeros(), -Vector3::z())];
        let omega = select_angular_velocity(&candidates, &CameraModel::default(), &context(), &VisionConfig::default());
        assert!(omega.is_none());
    }
}
