//! Orientation assignment and 128-bin gradient histogram descriptors.

use std::f64::consts::{PI, TAU};

use ndarray::Array2;

use super::{Descriptor, DESCRIPTOR_LEN};

const ORIENTATION_BINS: usize = 36;
const DESCRIPTOR_CELLS: usize = 4;
const DESCRIPTOR_BINS: usize = 8;
/// Width of one descriptor cell in units of keypoint sigma
const CELL_WIDTH_SIGMAS: f64 = 3.0;
const CLIP: f32 = 0.2;

/// Central-difference gradient magnitude and angle, `None` at the border
fn gradient(img: &Array2<f32>, y: isize, x: isize) -> Option<(f64, f64)> {
    let (h, w) = img.dim();
    if y < 1 || x < 1 || y >= h as isize - 1 || x >= w as isize - 1 {
        return None;
    }
    let (y, x) = (y as usize, x as usize);
    let dx = (img[[y, x + 1]] - img[[y, x - 1]]) as f64;
    let dy = (img[[y + 1, x]] - img[[y - 1, x]]) as f64;
    Some(((dx * dx + dy * dy).sqrt(), dy.atan2(dx)))
}

/// Peak of a smoothed 36-bin histogram of gradient directions around the
/// keypoint, refined with a parabola through the neighbouring bins.
pub(super) fn dominant_orientation(img: &Array2<f32>, x: f64, y: f64, sigma: f64) -> f64 {
    let weight_sigma = 1.5 * sigma;
    let radius = (3.0 * weight_sigma).round() as isize;
    let (cx, cy) = (x.round() as isize, y.round() as isize);
    let mut hist = [0.0f64; ORIENTATION_BINS];

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let Some((mag, angle)) = gradient(img, cy + dy, cx + dx) else {
                continue;
            };
            let weight = (-((dx * dx + dy * dy) as f64) / (2.0 * weight_sigma * weight_sigma)).exp();
            let bin = ((angle.rem_euclid(TAU) / TAU) * ORIENTATION_BINS as f64) as usize
                % ORIENTATION_BINS;
            hist[bin] += weight * mag;
        }
    }

    let mut smoothed = [0.0f64; ORIENTATION_BINS];
    for (i, s) in smoothed.iter_mut().enumerate() {
        let prev = hist[(i + ORIENTATION_BINS - 1) % ORIENTATION_BINS];
        let next = hist[(i + 1) % ORIENTATION_BINS];
        *s = 0.25 * prev + 0.5 * hist[i] + 0.25 * next;
    }

    let (peak, &peak_value) = smoothed
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .unwrap_or((0, &0.0));
    if peak_value <= 0.0 {
        return 0.0;
    }

    let left = smoothed[(peak + ORIENTATION_BINS - 1) % ORIENTATION_BINS];
    let right = smoothed[(peak + 1) % ORIENTATION_BINS];
    let denom = left - 2.0 * peak_value + right;
    let offset = if denom.abs() > f64::EPSILON {
        0.5 * (left - right) / denom
    } else {
        0.0
    };

    let angle = (peak as f64 + 0.5 + offset) * TAU / ORIENTATION_BINS as f64;
    // Wrap to (-pi, pi]
    if angle > PI {
        angle - TAU
    } else {
        angle
    }
}

/// 4x4 grid of 8-bin orientation histograms in the keypoint's rotated frame,
/// with trilinear soft binning, clipped at 0.2 and normalized to unit length.
pub(super) fn describe(img: &Array2<f32>, x: f64, y: f64, sigma: f64, orientation: f64) -> Descriptor {
    let mut hist = [0.0f32; DESCRIPTOR_LEN];
    let cell = CELL_WIDTH_SIGMAS * sigma;
    let half = DESCRIPTOR_CELLS as f64 / 2.0;
    let radius = (cell * (half + 0.5) * std::f64::consts::SQRT_2).ceil() as isize;
    let (cos_o, sin_o) = (orientation.cos(), orientation.sin());
    let (cx, cy) = (x.round() as isize, y.round() as isize);
    let weight_sigma = half * cell;

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            // Offset from the sub-pixel centre, rotated into the keypoint frame
            let ox = (cx + dx) as f64 - x;
            let oy = (cy + dy) as f64 - y;
            let rx = (cos_o * ox + sin_o * oy) / cell;
            let ry = (-sin_o * ox + cos_o * oy) / cell;

            // Continuous cell coordinates with cell centres at integers
            let cell_x = rx + half - 0.5;
            let cell_y = ry + half - 0.5;
            if cell_x <= -1.0
                || cell_y <= -1.0
                || cell_x >= DESCRIPTOR_CELLS as f64
                || cell_y >= DESCRIPTOR_CELLS as f64
            {
                continue;
            }

            let Some((mag, angle)) = gradient(img, cy + dy, cx + dx) else {
                continue;
            };
            let weight = (-(rx * rx + ry * ry) * cell * cell / (2.0 * weight_sigma * weight_sigma)).exp();
            let rel = (angle - orientation).rem_euclid(TAU) / TAU * DESCRIPTOR_BINS as f64;

            accumulate(&mut hist, cell_x, cell_y, rel, (weight * mag) as f32);
        }
    }

    normalize(&mut hist);
    for v in hist.iter_mut() {
        *v = v.min(CLIP);
    }
    normalize(&mut hist);
    hist
}

/// Distribute `value` over the eight neighbouring (row, col, orientation) bins
fn accumulate(hist: &mut Descriptor, cell_x: f64, cell_y: f64, orient: f64, value: f32) {
    let (x0, y0, o0) = (cell_x.floor(), cell_y.floor(), orient.floor());
    let (fx, fy, fo) = ((cell_x - x0) as f32, (cell_y - y0) as f32, (orient - o0) as f32);

    for (iy, wy) in [(y0 as isize, 1.0 - fy), (y0 as isize + 1, fy)] {
        if iy < 0 || iy >= DESCRIPTOR_CELLS as isize {
            continue;
        }
        for (ix, wx) in [(x0 as isize, 1.0 - fx), (x0 as isize + 1, fx)] {
            if ix < 0 || ix >= DESCRIPTOR_CELLS as isize {
                continue;
            }
            for (io, wo) in [(o0 as usize, 1.0 - fo), (o0 as usize + 1, fo)] {
                let io = io % DESCRIPTOR_BINS;
                let idx = (iy as usize * DESCRIPTOR_CELLS + ix as usize) * DESCRIPTOR_BINS + io;
                hist[idx] += value * wy * wx * wo;
            }
        }
    }
}

fn normalize(hist: &mut Descriptor) {
    let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in hist.iter_mut() {
            *v /= norm;
        }
    }
}
