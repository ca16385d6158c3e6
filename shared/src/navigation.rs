//! Navigation state shared between the control unit, guidance and vision.
//!
//! The control unit owns one [`NavigationState`] for the whole mission. It
//! writes the measurement fields, publishes the vision estimate at the
//! guidance synchronization point, and lends the struct to the guidance
//! controller for the duration of a control step.

use nalgebra::{Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Landing-site and rotation quantities the guidance law is allowed to use
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteView {
    pub position: Vector3<f64>,
    pub up: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
}

/// Per-mission navigation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    /// Simulation time of the last measurement refresh, used to label telemetry
    pub timestamp: f64,
    pub lander_position: Vector3<f64>,
    pub lander_velocity: Vector3<f64>,
    /// Body-to-world transform of the lander
    pub lander_transform: Matrix4<f64>,
    /// Local gravitational acceleration at the lander
    pub gravity_vector: Vector3<f64>,

    /// Ground-truth landing site, refreshed every guidance step
    pub landing_site_position: Vector3<f64>,
    pub landing_site_up: Vector3<f64>,
    /// Landing site propagated with the estimated rotation only
    pub landing_site_position_estimate: Vector3<f64>,
    pub landing_site_up_estimate: Vector3<f64>,

    pub angular_velocity_truth: Vector3<f64>,
    pub angular_velocity_estimate: Vector3<f64>,

    /// Guidance must read only the `*_estimate` fields when set
    pub use_estimate_only: bool,
    /// Set once vision has published its final angular-velocity estimate
    pub estimation_complete: bool,

    /// Distance from the lander to the surface along the optical axis
    pub altitude: f64,
    /// Distance from the asteroid centre to the surface point under the optical axis
    pub radius_at_optical_center: f64,
    /// Scene scale factor; narrows the camera field of view
    pub asteroid_scale: i32,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            lander_position: Vector3::zeros(),
            lander_velocity: Vector3::zeros(),
            lander_transform: Matrix4::identity(),
            gravity_vector: Vector3::zeros(),
            landing_site_position: Vector3::zeros(),
            landing_site_up: Vector3::z(),
            landing_site_position_estimate: Vector3::zeros(),
            landing_site_up_estimate: Vector3::z(),
            angular_velocity_truth: Vector3::zeros(),
            angular_velocity_estimate: Vector3::zeros(),
            use_estimate_only: false,
            estimation_complete: false,
            altitude: 0.0,
            radius_at_optical_center: 0.0,
            asteroid_scale: 1,
        }
    }
}

impl NavigationState {
    /// Site and rotation the guidance law should act on.
    ///
    /// Selects the estimate fields when `use_estimate_only` is set and the
    /// ground-truth fields otherwise.
    pub fn guidance_view(&self) -> SiteView {
        if self.use_estimate_only {
            SiteView {
                position: self.landing_site_position_estimate,
                up: self.landing_site_up_estimate,
                angular_velocity: self.angular_velocity_estimate,
            }
        } else {
            SiteView {
                position: self.landing_site_position,
                up: self.landing_site_up,
                angular_velocity: self.angular_velocity_truth,
            }
        }
    }

    /// Rotation part of the lander transform
    pub fn body_rotation(&self) -> Rotation3<f64> {
        let m = self.lander_transform.fixed_view::<3, 3>(0, 0).into_owned();
        Rotation3::from_matrix(&m)
    }

    /// Seed the site estimate from a measurement of the true site.
    pub fn seed_site_estimate(&mut self) {
        self.landing_site_position_estimate = self.landing_site_position;
        self.landing_site_up_estimate = self.landing_site_up;
    }

    /// Rotate the site estimate forward by `dt` seconds of estimated rotation.
    pub fn propagate_site_estimate(&mut self, dt: f64) {
        let omega = self.angular_velocity_estimate;
        if omega.norm() == 0.0 {
            return;
        }
        let step = Rotation3::from_scaled_axis(omega * dt);
        self.landing_site_position_estimate = step * self.landing_site_position_estimate;
        self.landing_site_up_estimate = step * self.landing_site_up_estimate;
    }
}
