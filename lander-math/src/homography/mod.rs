//! Planar homography estimation between two views of a surface
//!
//! A homography `H` maps homogeneous pixel coordinates of one image onto the
//! other (`x2 ~ H x1`). It is estimated with the normalized direct linear
//! transform, wrapped in RANSAC to survive outlier correspondences, and can be
//! decomposed into candidate camera motions.

mod decomposition;
mod dlt;

use nalgebra::{Matrix3, Vector2, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

pub use decomposition::{decompose_homography, HomographyCandidate};
pub use dlt::estimate_homography;

/// Errors that can occur during homography operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HomographyError {
    #[error("Invalid argument: {0}")]
    ArgumentError(String),

    #[error("Degenerate point configuration: {0}")]
    Degenerate(String),

    #[error("Matrix is singular and cannot be inverted")]
    Singular,

    #[error("No model reached the minimum number of inliers ({0})")]
    NoConsensus(usize),
}

/// Parameters for robust homography fitting
#[derive(Debug, Clone, PartialEq)]
pub struct RansacConfig {
    /// Number of random minimal samples to try
    pub max_iterations: usize,
    /// Maximum transfer error in pixels for a correspondence to count as an inlier
    pub inlier_threshold: f64,
    /// Minimum inlier count for the consensus model to be accepted
    pub min_inliers: usize,
    /// Seed for the sampling RNG so runs are reproducible
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            inlier_threshold: 3.0,
            min_inliers: 4,
            seed: 0x1a5d_e7,
        }
    }
}

/// Result of RANSAC homography fitting
#[derive(Debug, Clone)]
pub struct RansacResult {
    /// Homography refit on all inliers, normalized so `h33 == 1` when possible
    pub homography: Matrix3<f64>,
    /// Inlier mask aligned with the input correspondences
    pub inliers: Vec<bool>,
    /// Number of inliers in the mask
    pub inlier_count: usize,
}

/// Transfer error of a single correspondence under `h`.
///
/// Returns `f64::INFINITY` if the point maps to infinity.
pub fn transfer_error(h: &Matrix3<f64>, src: &Vector2<f64>, dst: &Vector2<f64>) -> f64 {
    let p = h * Vector3::new(src.x, src.y, 1.0);
    if p.z.abs() < 1e-12 {
        return f64::INFINITY;
    }
    let projected = Vector2::new(p.x / p.z, p.y / p.z);
    (projected - dst).norm()
}

/// Robustly estimate the homography mapping `src` onto `dst`.
///
/// # Arguments
/// * `src` - Pixel positions in the first image
/// * `dst` - Matching pixel positions in the second image (same length as `src`)
/// * `config` - RANSAC parameters
///
/// # Returns
/// * `Result<RansacResult, HomographyError>` - Refit homography and the inlier mask
///
/// # Errors
/// * `HomographyError::ArgumentError` - If the inputs differ in length or hold fewer than 4 points
/// * `HomographyError::NoConsensus` - If no minimal sample reaches `config.min_inliers`
pub fn find_homography_ransac(
    src: &[Vector2<f64>],
    dst: &[Vector2<f64>],
    config: &RansacConfig,
) -> Result<RansacResult, HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::ArgumentError(format!(
            "point sets differ in length: {} vs {}",
            src.len(),
            dst.len()
        )));
    }
    if src.len() < 4 {
        return Err(HomographyError::ArgumentError(format!(
            "at least 4 correspondences required, got {}",
            src.len()
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let n = src.len();
    let mut best_mask: Vec<bool> = Vec::new();
    let mut best_count = 0usize;

    for _ in 0..config.max_iterations {
        let sample = rand::seq::index::sample(&mut rng, n, 4);
        let sample_src: Vec<_> = sample.iter().map(|i| src[i]).collect();
        let sample_dst: Vec<_> = sample.iter().map(|i| dst[i]).collect();

        // Collinear samples fail here and are simply skipped
        let Ok(h) = estimate_homography(&sample_src, &sample_dst) else {
            continue;
        };

        let mask: Vec<bool> = src
            .iter()
            .zip(dst)
            .map(|(s, d)| transfer_error(&h, s, d) < config.inlier_threshold)
            .collect();
        let count = mask.iter().filter(|&&m| m).count();

        if count > best_count {
            best_count = count;
            best_mask = mask;
            if best_count == n {
                break;
            }
        }
    }

    if best_count < config.min_inliers.max(4) {
        return Err(HomographyError::NoConsensus(config.min_inliers.max(4)));
    }

    let (inlier_src, inlier_dst): (Vec<_>, Vec<_>) = src
        .iter()
        .zip(dst)
        .zip(&best_mask)
        .filter(|(_, &keep)| keep)
        .map(|((s, d), _)| (*s, *d))
        .unzip();

    let homography = estimate_homography(&inlier_src, &inlier_dst)?;
    log::debug!("RANSAC homography: {best_count}/{n} inliers");

    Ok(RansacResult {
        homography,
        inliers: best_mask,
        inlier_count: best_count,
    })
}

#[cfg(test)]
mod tests;
