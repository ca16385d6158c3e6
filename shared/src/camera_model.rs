//! Pinhole model of the lander's nadir camera.
//!
//! Camera coordinates: x to the right of the image, y down the image, z along
//! the optical axis. The field of view narrows as the asteroid scale grows so
//! that the surface keeps roughly the same footprint on the sensor.

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: usize,
    pub height: usize,
}

impl ImageSize {
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// ndarray shape `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub size: ImageSize,
    /// Horizontal field of view at asteroid scale 1, in degrees
    pub base_fov_deg: f64,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            size: ImageSize::from_width_height(256, 256),
            base_fov_deg: 60.0,
        }
    }
}

impl CameraModel {
    /// Horizontal field of view in radians for the given asteroid scale
    pub fn fov_rad(&self, asteroid_scale: i32) -> f64 {
        let scale = asteroid_scale.max(1) as f64;
        (self.base_fov_deg / scale).to_radians()
    }

    /// Focal length in pixels
    pub fn focal_length_px(&self, asteroid_scale: i32) -> f64 {
        (self.size.width as f64 / 2.0) / (self.fov_rad(asteroid_scale) / 2.0).tan()
    }

    /// Principal point at the image centre
    pub fn principal_point(&self) -> Vector2<f64> {
        Vector2::new(self.size.width as f64 / 2.0, self.size.height as f64 / 2.0)
    }

    /// Intrinsic matrix `K`
    pub fn intrinsics(&self, asteroid_scale: i32) -> Matrix3<f64> {
        let f = self.focal_length_px(asteroid_scale);
        let c = self.principal_point();
        Matrix3::new(f, 0.0, c.x, 0.0, f, c.y, 0.0, 0.0, 1.0)
    }

    /// Ground distance covered by one pixel at the image centre
    pub fn world_per_pixel(&self, altitude: f64, asteroid_scale: i32) -> f64 {
        2.0 * altitude * (self.fov_rad(asteroid_scale) / 2.0).tan() / self.size.width as f64
    }

    /// Pixel position of a camera-frame point, `None` behind the camera
    pub fn project(&self, point: &Vector3<f64>, asteroid_scale: i32) -> Option<Vector2<f64>> {
        if point.z <= 0.0 {
            return None;
        }
        let f = self.focal_length_px(asteroid_scale);
        let c = self.principal_point();
        Some(Vector2::new(
            f * point.x / point.z + c.x,
            f * point.y / point.z + c.y,
        ))
    }

    /// Unit ray through a pixel, in camera coordinates
    pub fn pixel_ray(&self, pixel: &Vector2<f64>, asteroid_scale: i32) -> Vector3<f64> {
        let f = self.focal_length_px(asteroid_scale);
        let c = self.principal_point();
        Vector3::new((pixel.x - c.x) / f, (pixel.y - c.y) / f, 1.0).normalize()
    }
}
