//! Scale-invariant keypoints and gradient-histogram descriptors.
//!
//! Keypoints are local extrema of a difference-of-Gaussians scale space,
//! refined to sub-pixel accuracy and filtered for contrast and edge response.
//! Each keypoint gets a dominant gradient orientation and a 4x4x8 orientation
//! histogram descriptor relative to it.

mod descriptor;
mod scale_space;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use descriptor::{describe, dominant_orientation};
use scale_space::{build_pyramid, Octave};

/// Descriptor length: 4x4 spatial cells with 8 orientation bins each
pub const DESCRIPTOR_LEN: usize = 128;

pub type Descriptor = [f32; DESCRIPTOR_LEN];

/// Parameters for keypoint detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Maximum number of octaves (halvings of the image)
    pub octaves: usize,
    /// DoG levels searched per octave
    pub scales_per_octave: usize,
    /// Blur of the first level of each octave, in octave pixels
    pub base_sigma: f64,
    /// Minimum |DoG| response on images normalized to [0, 1]
    pub contrast_threshold: f32,
    /// Maximum ratio of principal curvatures; larger values keep more edge-like points
    pub edge_ratio: f32,
    /// Keep only the strongest responses
    pub max_keypoints: usize,
    /// Pixels near the octave border that are never searched
    pub border: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            octaves: 3,
            scales_per_octave: 3,
            base_sigma: 1.6,
            contrast_threshold: 0.01,
            edge_ratio: 10.0,
            max_keypoints: 400,
            border: 8,
        }
    }
}

/// A detected keypoint
#[derive(Debug, Clone, PartialEq)]
pub struct Keypoint {
    /// Column in full-resolution pixels
    pub x: f64,
    /// Row in full-resolution pixels
    pub y: f64,
    /// Characteristic scale in full-resolution pixels
    pub sigma: f64,
    /// Dominant gradient direction in radians
    pub orientation: f64,
    /// Absolute DoG response
    pub response: f32,
    octave: usize,
    level: usize,
}

/// Keypoints and their descriptors, index-aligned
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Convert a raw frame to `f32` scaled so its brightest pixel is 1.
fn normalize_frame(frame: &Array2<u16>) -> Array2<f32> {
    let max = frame.iter().copied().max().unwrap_or(0).max(1) as f32;
    frame.mapv(|v| v as f32 / max)
}

fn is_extremum(octave: &Octave, level: usize, y: usize, x: usize) -> bool {
    let v = octave.dogs[level][[y, x]];
    let mut is_max = true;
    let mut is_min = true;
    for dog in &octave.dogs[level - 1..=level + 1] {
        for yy in y - 1..=y + 1 {
            for xx in x - 1..=x + 1 {
                if std::ptr::eq(dog, &octave.dogs[level]) && yy == y && xx == x {
                    continue;
                }
                let n = dog[[yy, xx]];
                is_max &= v > n;
                is_min &= v < n;
                if !is_max && !is_min {
                    return false;
                }
            }
        }
    }
    true
}

/// Sub-pixel offset and edge test from the 2-D Hessian of one DoG level.
///
/// Returns `None` for edge-like responses.
fn refine(dog: &Array2<f32>, y: usize, x: usize, edge_ratio: f32) -> Option<(f64, f64)> {
    let c = dog[[y, x]];
    let dxx = dog[[y, x + 1]] + dog[[y, x - 1]] - 2.0 * c;
    let dyy = dog[[y + 1, x]] + dog[[y - 1, x]] - 2.0 * c;
    let dxy = (dog[[y + 1, x + 1]] - dog[[y - 1, x + 1]] - dog[[y + 1, x - 1]]
        + dog[[y - 1, x - 1]])
        / 4.0;

    let trace = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    if det <= 0.0 || trace * trace / det >= (edge_ratio + 1.0).powi(2) / edge_ratio {
        return None;
    }

    let gx = (dog[[y, x + 1]] - dog[[y, x - 1]]) / 2.0;
    let gy = (dog[[y + 1, x]] - dog[[y - 1, x]]) / 2.0;
    let ox = -(dyy * gx - dxy * gy) / det;
    let oy = -(dxx * gy - dxy * gx) / det;

    if ox.abs() > 1.0 || oy.abs() > 1.0 {
        return Some((0.0, 0.0));
    }
    Some((ox as f64, oy as f64))
}

struct Candidate {
    keypoint: Keypoint,
    octave_x: f64,
    octave_y: f64,
}

fn find_extrema(pyramid: &[Octave], config: &DetectorConfig) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let b = config.border.max(1);

    for (o, octave) in pyramid.iter().enumerate() {
        let (h, w) = octave.dogs[0].dim();
        for level in 1..octave.dogs.len() - 1 {
            let dog = &octave.dogs[level];
            for y in b..h - b {
                for x in b..w - b {
                    let v = dog[[y, x]];
                    if v.abs() < config.contrast_threshold || !is_extremum(octave, level, y, x) {
                        continue;
                    }
                    let Some((ox, oy)) = refine(dog, y, x, config.edge_ratio) else {
                        continue;
                    };

                    let octave_x = x as f64 + ox;
                    let octave_y = y as f64 + oy;
                    candidates.push(Candidate {
                        keypoint: Keypoint {
                            x: octave_x * octave.scale,
                            y: octave_y * octave.scale,
                            sigma: octave.sigmas[level] * octave.scale,
                            orientation: 0.0,
                            response: v.abs(),
                            octave: o,
                            level,
                        },
                        octave_x,
                        octave_y,
                    });
                }
            }
        }
    }

    candidates
}

/// Detect keypoints and compute their descriptors.
///
/// Orientation assignment and descriptor extraction run in parallel across
/// keypoints. The result is ordered by descending response.
pub fn detect_and_describe(frame: &Array2<u16>, config: &DetectorConfig) -> FeatureSet {
    let image = normalize_frame(frame);
    let pyramid = build_pyramid(&image, config);

    let mut candidates = find_extrema(&pyramid, config);
    candidates.sort_by(|a, b| b.keypoint.response.total_cmp(&a.keypoint.response));
    candidates.truncate(config.max_keypoints);

    let (keypoints, descriptors): (Vec<Keypoint>, Vec<Descriptor>) = candidates
        .into_par_iter()
        .map(|c| {
            let octave = &pyramid[c.keypoint.octave];
            let gaussian = &octave.gaussians[c.keypoint.level];
            let octave_sigma = octave.sigmas[c.keypoint.level];

            let orientation = dominant_orientation(gaussian, c.octave_x, c.octave_y, octave_sigma);
            let descriptor = describe(gaussian, c.octave_x, c.octave_y, octave_sigma, orientation);
            (
                Keypoint {
                    orientation,
                    ..c.keypoint
                },
                descriptor,
            )
        })
        .unzip();

    log::debug!("Detected {} keypoints", keypoints.len());
    FeatureSet {
        keypoints,
        descriptors,
    }
}
