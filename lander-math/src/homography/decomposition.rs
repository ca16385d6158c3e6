//! Homography decomposition into candidate camera motions.
//!
//! For a plane with unit normal `n` at distance `d` from the first camera,
//! the calibrated homography is `H = R + (t/d) n^T`. Up to four
//! `(R, t/d, n)` triples reproduce the same `H`; all of them are returned and
//! the caller picks the physically meaningful one.

use nalgebra::{Matrix3, Rotation3, Vector3};

use super::HomographyError;

/// One motion hypothesis recovered from a homography
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyCandidate {
    /// Rotation taking first-camera coordinates into the second camera
    pub rotation: Rotation3<f64>,
    /// Translation scaled by the inverse plane distance (`t / d`)
    pub translation: Vector3<f64>,
    /// Plane normal in first-camera coordinates
    pub normal: Vector3<f64>,
}

fn columns(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Matrix3<f64> {
    Matrix3::from_columns(&[a, b, c])
}

/// Decompose a pixel-space homography given the camera intrinsics.
///
/// The homography is first brought into calibrated coordinates
/// (`K^-1 H K`), scaled so its middle singular value is one and its
/// determinant is positive. A homography with equal extreme singular values
/// is a pure rotation and yields a single candidate with zero translation.
///
/// # Arguments
/// * `homography` - Pixel-space homography with `x2 ~ H x1`
/// * `intrinsics` - Camera matrix `K`
///
/// # Returns
/// * `Result<Vec<HomographyCandidate>, HomographyError>` - One or four candidates
///
/// # Errors
/// * `HomographyError::Singular` - If `K` or `H` is singular
pub fn decompose_homography(
    homography: &Matrix3<f64>,
    intrinsics: &Matrix3<f64>,
) -> Result<Vec<HomographyCandidate>, HomographyError> {
    let k_inv = intrinsics.try_inverse().ok_or(HomographyError::Singular)?;
    let mut h = k_inv * homography * intrinsics;

    let mut sv: Vec<f64> = h.singular_values().iter().copied().collect();
    sv.sort_by(|a, b| b.total_cmp(a));
    if sv[1] < 1e-12 {
        return Err(HomographyError::Singular);
    }
    h /= sv[1];
    if h.determinant() < 0.0 {
        h = -h;
    }

    // Eigen-decomposition of H^T H gives the right singular vectors sorted by hand
    let hth = h.transpose() * h;
    let eig = hth.symmetric_eigen();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let s1 = eig.eigenvalues[order[0]];
    let s3 = eig.eigenvalues[order[2]];
    let v1: Vector3<f64> = eig.eigenvectors.column(order[0]).into_owned();
    let v2: Vector3<f64> = eig.eigenvectors.column(order[1]).into_owned();
    let v3: Vector3<f64> = eig.eigenvectors.column(order[2]).into_owned();

    if (s1 - s3).abs() < 1e-9 {
        return Ok(vec![HomographyCandidate {
            rotation: Rotation3::from_matrix(&h),
            translation: Vector3::zeros(),
            normal: Vector3::z(),
        }]);
    }

    let denom = (s1 - s3).sqrt();
    let a = (1.0 - s3).max(0.0).sqrt();
    let b = (s1 - 1.0).max(0.0).sqrt();
    let u1 = (a * v1 + b * v3) / denom;
    let u2 = (a * v1 - b * v3) / denom;

    let mut candidates = Vec::with_capacity(4);
    for u in [u1, u2] {
        let hv2 = h * v2;
        let hu = h * u;
        let big_u = columns(v2, u, v2.cross(&u));
        let big_w = columns(hv2, hu, hv2.cross(&hu));

        let r = big_w * big_u.transpose();
        let normal = v2.cross(&u);
        let translation = (h - r) * normal;
        let rotation = Rotation3::from_matrix(&r);

        candidates.push(HomographyCandidate {
            rotation,
            translation,
            normal,
        });
        candidates.push(HomographyCandidate {
            rotation,
            translation: -translation,
            normal: -normal,
        });
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn intrinsics() -> Matrix3<f64> {
        Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn test_identity_is_pure_rotation() {
        let candidates = decompose_homography(&Matrix3::identity(), &intrinsics()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_relative_eq!(candidates[0].rotation.angle(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(candidates[0].translation.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_intrinsics_rejected() {
        let k = Matrix3::zeros();
        assert_eq!(
            decompose_homography(&Matrix3::identity(), &k),
            Err(HomographyError::Singular)
        );
    }
}
