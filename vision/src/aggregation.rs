//! Majority-vote aggregation of per-pair angular-velocity samples.

use nalgebra::Vector3;

/// Outcome of decomposing one frame pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AngularSample {
    Measured(Vector3<f64>),
    /// No candidate survived filtering; ignored by aggregation
    NoSolution,
}

impl AngularSample {
    pub fn measured(&self) -> Option<&Vector3<f64>> {
        match self {
            AngularSample::Measured(v) => Some(v),
            AngularSample::NoSolution => None,
        }
    }
}

/// Collapse samples into a single-axis estimate.
///
/// Every measured sample votes with the sign of its dominant component on
/// that component's axis. The axis with the most positive votes competes with
/// the axis with the most negative votes; the larger group wins (positive on a
/// tie) and the estimate is the average of its dominant components. Returns
/// `None` when there is no measured, non-zero sample.
pub fn aggregate_samples(samples: &[AngularSample]) -> Option<Vector3<f64>> {
    let mut pos_count = [0usize; 3];
    let mut neg_count = [0usize; 3];
    let mut pos_sum = [0.0f64; 3];
    let mut neg_sum = [0.0f64; 3];

    for v in samples.iter().filter_map(AngularSample::measured) {
        let axis = v.iamax();
        let value = v[axis];
        if value > 0.0 {
            pos_count[axis] += 1;
            pos_sum[axis] += value;
        } else if value < 0.0 {
            neg_count[axis] += 1;
            neg_sum[axis] += value;
        }
    }

    let argmax = |counts: &[usize; 3]| {
        (0..3)
            .max_by_key(|&i| (counts[i], std::cmp::Reverse(i)))
            .unwrap_or(0)
    };
    let ip = argmax(&pos_count);
    let ineg = argmax(&neg_count);

    let mut estimate = Vector3::zeros();
    if pos_count[ip] == 0 && neg_count[ineg] == 0 {
        return None;
    }
    if pos_count[ip] >= neg_count[ineg] {
        estimate[ip] = pos_sum[ip] / pos_count[ip] as f64;
    } else {
        estimate[ineg] = neg_sum[ineg] / neg_count[ineg] as f64;
    }
    Some(estimate)
}
