use super::*;
use approx::assert_relative_eq;
use nalgebra::Rotation3;
use rand::Rng;

fn intrinsics() -> Matrix3<f64> {
    Matrix3::new(443.4, 0.0, 256.0, 0.0, 443.4, 256.0, 0.0, 0.0, 1.0)
}

fn project(h: &Matrix3<f64>, p: &Vector2<f64>) -> Vector2<f64> {
    let q = h * Vector3::new(p.x, p.y, 1.0);
    Vector2::new(q.x / q.z, q.y / q.z)
}

/// Pixel homography induced by a plane `n.X = d` under the motion `(R, t)`
fn plane_homography(
    rotation: &Rotation3<f64>,
    t: &Vector3<f64>,
    normal: &Vector3<f64>,
    distance: f64,
) -> Matrix3<f64> {
    let k = intrinsics();
    let h_cal = rotation.matrix() + t * normal.transpose() / distance;
    k * h_cal * k.try_inverse().unwrap()
}

fn grid_points() -> Vec<Vector2<f64>> {
    let mut points = Vec::new();
    for y in 0..8 {
        for x in 0..8 {
            points.push(Vector2::new(40.0 + 60.0 * x as f64, 30.0 + 62.0 * y as f64));
        }
    }
    points
}

#[test]
fn test_dlt_recovers_known_homography() {
    let h_true = plane_homography(
        &Rotation3::from_euler_angles(0.01, -0.02, 0.04),
        &Vector3::new(0.3, -0.1, 0.05),
        &Vector3::z(),
        20.0,
    );
    let src = grid_points();
    let dst: Vec<_> = src.iter().map(|p| project(&h_true, p)).collect();

    let h = estimate_homography(&src, &dst).unwrap();
    for (s, d) in src.iter().zip(&dst) {
        assert!(transfer_error(&h, s, d) < 1e-6);
    }
    assert_relative_eq!(h, h_true / h_true[(2, 2)], epsilon = 1e-6);
}

#[test]
fn test_ransac_rejects_outliers() {
    let h_true = plane_homography(
        &Rotation3::from_euler_angles(0.0, 0.0, 0.08),
        &Vector3::new(-0.2, 0.4, 0.0),
        &Vector3::z(),
        15.0,
    );
    let src = grid_points();
    let mut dst: Vec<_> = src.iter().map(|p| project(&h_true, p)).collect();

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut outliers = Vec::new();
    for i in (0..dst.len()).step_by(5) {
        dst[i] += Vector2::new(rng.random_range(25.0..80.0), rng.random_range(-80.0..-25.0));
        outliers.push(i);
    }

    let result = find_homography_ransac(&src, &dst, &RansacConfig::default()).unwrap();

    assert_eq!(result.inlier_count, src.len() - outliers.len());
    for i in outliers {
        assert!(!result.inliers[i], "outlier {i} accepted");
    }
    assert_relative_eq!(
        result.homography,
        h_true / h_true[(2, 2)],
        epsilon = 1e-6
    );
}

#[test]
fn test_ransac_argument_errors() {
    let pts = grid_points();
    assert!(matches!(
        find_homography_ransac(&pts[..3], &pts[..3], &RansacConfig::default()),
        Err(HomographyError::ArgumentError(_))
    ));
    assert!(matches!(
        find_homography_ransac(&pts[..10], &pts[..9], &RansacConfig::default()),
        Err(HomographyError::ArgumentError(_))
    ));
}

#[test]
fn test_ransac_no_consensus() {
    let src = grid_points();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let dst: Vec<_> = src
        .iter()
        .map(|_| Vector2::new(rng.random_range(0.0..512.0), rng.random_range(0.0..512.0)))
        .collect();
    let config = RansacConfig {
        min_inliers: 40,
        max_iterations: 50,
        ..Default::default()
    };
    assert!(matches!(
        find_homography_ransac(&src, &dst, &config),
        Err(HomographyError::NoConsensus(40))
    ));
}

#[test]
fn test_decomposition_contains_true_motion() {
    let rotation = Rotation3::from_euler_angles(0.03, -0.02, 0.05);
    let t = Vector3::new(0.4, -0.2, 0.1);
    let normal = Vector3::new(0.1, -0.05, 1.0).normalize();
    let distance = 10.0;

    let h = plane_homography(&rotation, &t, &normal, distance) * 2.5;
    let candidates = decompose_homography(&h, &intrinsics()).unwrap();
    assert_eq!(candidates.len(), 4);

    let found = candidates.iter().any(|c| {
        c.rotation.angle_to(&rotation) < 1e-6
            && (c.translation - t / distance).norm() < 1e-6
            && (c.normal - normal).norm() < 1e-6
    });
    assert!(found, "true motion missing from {candidates:?}");
}

#[test]
fn test_decomposition_pure_rotation() {
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.1);
    let k = intrinsics();
    let h = k * rotation.matrix() * k.try_inverse().unwrap();

    let candidates = decompose_homography(&h, &k).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_relative_eq!(candidates[0].rotation.angle_to(&rotation), 0.0, epsilon = 1e-6);
    assert_relative_eq!(candidates[0].translation.norm(), 0.0);
}

#[test]
fn test_decomposed_candidates_reproduce_homography() {
    let rotation = Rotation3::from_euler_angles(-0.04, 0.01, 0.02);
    let t = Vector3::new(-0.3, 0.25, -0.05);
    let normal = Vector3::z();
    let k = intrinsics();
    let h = plane_homography(&rotation, &t, &normal, 8.0);
    let h_cal = k.try_inverse().unwrap() * h * k;

    for c in decompose_homography(&h, &k).unwrap() {
        let rebuilt = c.rotation.matrix() + c.translation * c.normal.transpose();
        assert_relative_eq!(
            rebuilt / rebuilt.norm(),
            h_cal / h_cal.norm(),
            epsilon = 1e-6
        );
    }
}
