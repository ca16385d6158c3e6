//! Zero-Effort-Miss / Zero-Effort-Velocity guidance law and time-to-go
//! bookkeeping.

use nalgebra::Vector3;

/// Elapsed time, total flight time and time-to-go for the descent.
///
/// When `tgo` would become non-positive the clock restarts with the
/// configured flight time, so the law keeps re-targeting instead of dividing
/// by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeToGo {
    t: f64,
    tf: f64,
    tgo: f64,
    configured_tf: f64,
}

impl TimeToGo {
    pub fn new(flight_time: f64) -> Self {
        Self {
            t: 0.0,
            tf: flight_time,
            tgo: flight_time,
            configured_tf: flight_time,
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.t
    }

    pub fn flight_time(&self) -> f64 {
        self.tf
    }

    pub fn tgo(&self) -> f64 {
        self.tgo
    }

    /// Advance the clock by one control step
    pub fn advance(&mut self, step: f64) {
        self.t += step;
        self.tgo = self.tf - self.t;
        if self.tgo <= 0.0 {
            log::info!("Time-to-go expired, re-targeting with tf = {}", self.configured_tf);
            self.reset();
        }
    }

    /// Restart with the configured flight time
    pub fn reset(&mut self) {
        self.t = 0.0;
        self.tf = self.configured_tf;
        self.tgo = self.configured_tf;
    }
}

/// Predicted miss at arrival if no further control is applied
pub fn zero_effort_miss(
    rf: &Vector3<f64>,
    r: &Vector3<f64>,
    v: &Vector3<f64>,
    g: &Vector3<f64>,
    tgo: f64,
) -> Vector3<f64> {
    rf - (r + v * tgo + 0.5 * g * tgo * tgo)
}

/// Predicted velocity error at arrival if no further control is applied
pub fn zero_effort_velocity(
    vf: &Vector3<f64>,
    v: &Vector3<f64>,
    g: &Vector3<f64>,
    tgo: f64,
) -> Vector3<f64> {
    vf - (v + g * tgo)
}

/// Commanded inertial acceleration `a = 6/tgo^2 ZEM - 2/tgo ZEV`.
///
/// # Arguments
/// * `rf`, `vf` - Target position and velocity at arrival
/// * `r`, `v` - Current position and velocity
/// * `g` - Gravitational acceleration, assumed constant over `tgo`
/// * `tgo` - Time-to-go, must be positive
pub fn zem_zev_acceleration(
    rf: &Vector3<f64>,
    vf: &Vector3<f64>,
    r: &Vector3<f64>,
    v: &Vector3<f64>,
    g: &Vector3<f64>,
    tgo: f64,
) -> Vector3<f64> {
    let zem = zero_effort_miss(rf, r, v, g, tgo);
    let zev = zero_effort_velocity(vf, v, g, tgo);
    zem * (6.0 / (tgo * tgo)) - zev * (2.0 / tgo)
}
