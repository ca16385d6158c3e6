//! Normalized direct linear transform.
//!
//! Points are conditioned (centroid at the origin, mean distance sqrt(2))
//! before solving `A h = 0`, then the solution is mapped back to pixel space.

use nalgebra::{Matrix3, SMatrix, Vector2};

use super::HomographyError;

/// Computes the conditioning transform for a point set.
pub(super) fn normalization_transform(
    points: &[Vector2<f64>],
) -> Result<Matrix3<f64>, HomographyError> {
    if points.is_empty() {
        return Err(HomographyError::ArgumentError(
            "cannot normalize empty point set".to_string(),
        ));
    }

    let mut centroid = Vector2::zeros();
    for p in points {
        centroid += p;
    }
    centroid /= points.len() as f64;

    let mean_dist = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / points.len() as f64;
    if mean_dist < 1e-12 {
        return Err(HomographyError::Degenerate(
            "all points coincide".to_string(),
        ));
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    Ok(Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    ))
}

fn apply(t: &Matrix3<f64>, p: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(
        t[(0, 0)] * p.x + t[(0, 1)] * p.y + t[(0, 2)],
        t[(1, 0)] * p.x + t[(1, 1)] * p.y + t[(1, 2)],
    )
}

/// Least-squares homography from four or more correspondences.
///
/// # Arguments
/// * `src` - Points in the first image
/// * `dst` - Corresponding points in the second image
///
/// # Returns
/// * `Result<Matrix3<f64>, HomographyError>` - `H` with `dst ~ H src`, scaled so `h33 == 1`
///   unless `h33` vanishes, in which case it is scaled to unit Frobenius norm
///
/// # Errors
/// * `HomographyError::ArgumentError` - If lengths differ or fewer than 4 points are given
/// * `HomographyError::Degenerate` - If the points are coincident or collinear
pub fn estimate_homography(
    src: &[Vector2<f64>],
    dst: &[Vector2<f64>],
) -> Result<Matrix3<f64>, HomographyError> {
    if src.len() != dst.len() || src.len() < 4 {
        return Err(HomographyError::ArgumentError(format!(
            "need at least 4 matched points, got {} and {}",
            src.len(),
            dst.len()
        )));
    }

    let t_src = normalization_transform(src)?;
    let t_dst = normalization_transform(dst)?;

    // Accumulate A^T A directly; only the null vector of A is needed.
    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (s, d) in src.iter().zip(dst) {
        let s = apply(&t_src, s);
        let d = apply(&t_dst, d);
        let rows = [
            [-s.x, -s.y, -1.0, 0.0, 0.0, 0.0, d.x * s.x, d.x * s.y, d.x],
            [0.0, 0.0, 0.0, -s.x, -s.y, -1.0, d.y * s.x, d.y * s.y, d.y],
        ];
        for row in rows.iter() {
            for i in 0..9 {
                for j in 0..9 {
                    ata[(i, j)] += row[i] * row[j];
                }
            }
        }
    }

    let eig = ata.symmetric_eigen();
    let mut order: Vec<usize> = (0..9).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));

    // A second vanishing eigenvalue means the solution is not unique
    let scale = eig.eigenvalues.iter().map(|v| v.abs()).fold(0.0, f64::max);
    if eig.eigenvalues[order[1]].abs() <= 1e-10 * scale.max(1.0) {
        return Err(HomographyError::Degenerate(
            "correspondences do not constrain a unique homography".to_string(),
        ));
    }

    let h = eig.eigenvectors.column(order[0]);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse().ok_or(HomographyError::Singular)?;
    let mut homography = t_dst_inv * h_norm * t_src;

    let h33 = homography[(2, 2)];
    if h33.abs() > 1e-12 {
        homography /= h33;
    } else {
        homography /= homography.norm();
    }

    Ok(homography)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalization_centers_points() {
        let points = vec![
            Vector2::new(10.0, 10.0),
            Vector2::new(20.0, 10.0),
            Vector2::new(20.0, 20.0),
            Vector2::new(10.0, 20.0),
        ];
        let t = normalization_transform(&points).unwrap();
        let mapped: Vec<_> = points.iter().map(|p| apply(&t, p)).collect();

        let centroid = mapped.iter().fold(Vector2::zeros(), |acc, p| acc + p) / 4.0;
        assert_relative_eq!(centroid, Vector2::zeros(), epsilon = 1e-12);

        let mean_dist = mapped.iter().map(|p| p.norm()).sum::<f64>() / 4.0;
        assert_relative_eq!(mean_dist, std::f64::consts::SQRT_2, epsilon = 1e-12);
    }

    #[test]
    fn test_normalization_rejects_coincident_points() {
        let points = vec![Vector2::new(3.0, 4.0); 5];
        assert!(matches!(
            normalization_transform(&points),
            Err(HomographyError::Degenerate(_))
        ));
    }

    #[test]
    fn test_identity_from_unit_square() {
        let pts = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
        ];
        let h = estimate_homography(&pts, &pts).unwrap();
        assert_relative_eq!(h, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn test_collinear_points_rejected() {
        let src: Vec<_> = (0..5).map(|i| Vector2::new(i as f64, 2.0 * i as f64)).collect();
        let dst = src.clone();
        assert!(estimate_homography(&src, &dst).is_err());
    }
}
