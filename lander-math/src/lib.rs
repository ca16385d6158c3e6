//! Geometry kernels shared by the lander vision pipeline.
//!
//! - [`homography`]: planar homography estimation and motion decomposition
//! - [`matching`]: one-to-one descriptor matching

pub mod homography;
pub mod matching;

pub use homography::{
    decompose_homography, estimate_homography, find_homography_ransac, HomographyCandidate,
    HomographyError, RansacConfig, RansacResult,
};
pub use matching::{cross_check_match, keep_best_matches, DescriptorMatch};
