//! Ray-traced nadir camera looking at the asteroid.
//!
//! Capture requests arrive through a [`CaptureTrigger`] (the control unit's
//! [`Renderer`]); the camera renders them when serviced and pushes the frames
//! into a channel read by a [`ChannelFrameSource`].
//!
//! The camera looks from the lander toward the asteroid centre. Image x is
//! `z_cam x y_world` and image y completes the right-handed frame, so from
//! the default hover point below the -z pole the image axes are -x and -y.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use nalgebra::{Vector2, Vector3};
use ndarray::{Array2, Zip};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shared::camera_model::CameraModel;
use shared::collaborators::{
    CapturedFrame, ChannelFrameSource, CollaboratorError, PhysicsWorld, Renderer,
};

use super::world::{ray_sphere, SphereAsteroidWorld};

const BACKGROUND: u16 = 0;
const DARK_LEVEL: f64 = 4000.0;
const BRIGHT_LEVEL: f64 = 56000.0;

/// Seeded 3-D value noise
#[derive(Debug, Clone)]
pub struct ValueNoise {
    permutation: Vec<usize>,
    values: Vec<f64>,
}

impl ValueNoise {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut permutation: Vec<usize> = (0..256).collect();
        permutation.shuffle(&mut rng);
        let values = (0..256).map(|_| rng.random_range(0.0..1.0)).collect();
        Self {
            permutation,
            values,
        }
    }

    fn lattice(&self, x: i64, y: i64, z: i64) -> f64 {
        let p = &self.permutation;
        let h = p[(p[(p[(x & 255) as usize] + (y & 255) as usize) & 255] + (z & 255) as usize) & 255];
        self.values[h]
    }

    /// Smoothly interpolated noise in [0, 1)
    pub fn sample(&self, point: &Vector3<f64>) -> f64 {
        let base = point.map(f64::floor);
        let frac = point - base;
        let s = frac.map(|t| t * t * (3.0 - 2.0 * t));
        let (x, y, z) = (base.x as i64, base.y as i64, base.z as i64);

        let mut acc = 0.0;
        for (dz, wz) in [(0, 1.0 - s.z), (1, s.z)] {
            for (dy, wy) in [(0, 1.0 - s.y), (1, s.y)] {
                for (dx, wx) in [(0, 1.0 - s.x), (1, s.x)] {
                    acc += wx * wy * wz * self.lattice(x + dx, y + dy, z + dz);
                }
            }
        }
        acc
    }
}

/// Albedo of the asteroid surface in body coordinates
#[derive(Debug, Clone)]
pub struct SurfaceTexture {
    noise: ValueNoise,
    /// Feature sizes of the summed octaves, in metres
    wavelengths: Vec<f64>,
}

impl SurfaceTexture {
    pub fn new(seed: u64) -> Self {
        Self {
            noise: ValueNoise::new(seed),
            wavelengths: vec![12.0, 5.0, 2.5],
        }
    }

    /// Albedo in [0, 1]
    pub fn albedo(&self, body_point: &Vector3<f64>) -> f64 {
        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for (i, wavelength) in self.wavelengths.iter().enumerate() {
            let weight = 0.6f64.powi(i as i32);
            total += weight * self.noise.sample(&(body_point / *wavelength));
            weight_sum += weight;
        }
        total / weight_sum
    }
}

/// Camera axes in world coordinates for a camera at `position` looking at the origin
pub fn nadir_axes(position: &Vector3<f64>) -> Option<[Vector3<f64>; 3]> {
    let range = position.norm();
    if range == 0.0 {
        return None;
    }
    let forward = -position / range;
    let reference = if forward.cross(&Vector3::y()).norm() > 1e-6 {
        Vector3::y()
    } else {
        Vector3::x()
    };
    let right = forward.cross(&reference).normalize();
    let down = forward.cross(&right);
    Some([right, down, forward])
}

/// Requests captures from a [`SyntheticNadirCamera`]
#[derive(Debug, Clone)]
pub struct CaptureTrigger {
    requests: Sender<()>,
}

impl Renderer for CaptureTrigger {
    fn request_offscreen_capture(&mut self) -> Result<(), CollaboratorError> {
        self.requests
            .send(())
            .map_err(|_| CollaboratorError::Renderer("camera is gone".to_string()))
    }
}

pub struct SyntheticNadirCamera {
    model: CameraModel,
    asteroid_scale: i32,
    texture: SurfaceTexture,
    requests: Receiver<()>,
    frames: Sender<CapturedFrame>,
    sequence: u64,
}

impl SyntheticNadirCamera {
    /// Create a camera with its capture trigger and frame source.
    pub fn new(
        model: CameraModel,
        asteroid_scale: i32,
        texture_seed: u64,
    ) -> (Self, CaptureTrigger, ChannelFrameSource) {
        let (request_tx, request_rx) = unbounded();
        let (frame_tx, frame_rx) = unbounded();
        let camera = Self {
            model,
            asteroid_scale,
            texture: SurfaceTexture::new(texture_seed),
            requests: request_rx,
            frames: frame_tx,
            sequence: 0,
        };
        (
            camera,
            CaptureTrigger {
                requests: request_tx,
            },
            ChannelFrameSource::new(frame_rx),
        )
    }

    pub fn model(&self) -> &CameraModel {
        &self.model
    }

    /// Render one frame for every pending request.
    ///
    /// Returns the number of frames produced.
    pub fn service_requests(&mut self, world: &SphereAsteroidWorld) -> Result<usize, CollaboratorError> {
        let mut rendered = 0;
        loop {
            match self.requests.try_recv() {
                Ok(()) => {}
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
            let frame = CapturedFrame {
                sequence: self.sequence,
                timestamp: world.timestamp(),
                image: self.render(world),
            };
            self.sequence += 1;
            self.frames
                .send(frame)
                .map_err(|_| CollaboratorError::FrameSourceDisconnected)?;
            rendered += 1;
        }
        Ok(rendered)
    }

    /// Ray-trace the asteroid as seen from the lander's current position.
    pub fn render(&self, world: &SphereAsteroidWorld) -> Array2<u16> {
        let mut image = Array2::from_elem(self.model.size.shape(), BACKGROUND);
        let position = world.lander_position();
        let Some([right, down, forward]) = nadir_axes(&position) else {
            return image;
        };
        let to_body = world.asteroid_rotation().inverse();
        let radius = world.config().radius;
        let (model, texture, scale) = (&self.model, &self.texture, self.asteroid_scale);

        Zip::indexed(&mut image).par_for_each(|(row, col), pixel| {
            let ray = model.pixel_ray(&Vector2::new(col as f64, row as f64), scale);
            let direction = right * ray.x + down * ray.y + forward * ray.z;
            if let Some(t) = ray_sphere(&position, &direction, radius) {
                let body_point = to_body * (position + direction * t);
                let albedo = texture.albedo(&body_point);
                *pixel = (DARK_LEVEL + (BRIGHT_LEVEL - DARK_LEVEL) * albedo) as u16;
            }
        });

        image
    }
}
