//! Rotating spherical asteroid with a point-mass lander.

use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use shared::collaborators::{CollaboratorError, LanderBodyState, PhysicsWorld, SurfaceSite};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Asteroid radius in metres
    pub radius: f64,
    /// Gravitational parameter GM in m^3/s^2
    pub gm: f64,
    /// Constant asteroid spin in world coordinates, rad/s
    pub angular_velocity: Vector3<f64>,
    pub lander_mass: f64,
    /// Initial lander position in world coordinates
    pub lander_position: Vector3<f64>,
    /// Landing site in the asteroid body frame (projected onto the surface)
    pub landing_site_body: Vector3<f64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let radius = 500.0;
        let site_angle = 45f64.to_radians();
        Self {
            radius,
            gm: 70.0,
            angular_velocity: Vector3::new(0.0, 0.002, 0.0),
            lander_mass: 1.0,
            // Hovering 200 m above the -z pole, looking at the centre
            lander_position: Vector3::new(0.0, 0.0, -(radius + 200.0)),
            // Upstream of the pole; the spin carries it under the lander
            landing_site_body: Vector3::new(site_angle.sin(), 0.0, -site_angle.cos()) * radius,
        }
    }
}

/// Headless physics world implementing [`PhysicsWorld`].
///
/// The asteroid centre sits at the world origin and spins at a constant rate.
/// The lander is a point mass under inverse-square gravity, integrated with
/// semi-implicit Euler. Reaching the surface ends the flight.
#[derive(Debug, Clone)]
pub struct SphereAsteroidWorld {
    config: WorldConfig,
    time: f64,
    asteroid_rotation: Rotation3<f64>,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    attitude: UnitQuaternion<f64>,
    body_rate: Vector3<f64>,
    landing_site_body: Vector3<f64>,
    touchdown: Option<Touchdown>,
}

/// Lander state when it reached the surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touchdown {
    pub time: f64,
    pub position: Vector3<f64>,
    /// Velocity relative to the rotating surface
    pub relative_velocity: Vector3<f64>,
    /// Surface distance to the landing site
    pub site_distance: f64,
}

impl SphereAsteroidWorld {
    pub fn new(config: WorldConfig) -> Self {
        let landing_site_body = config.landing_site_body.normalize() * config.radius;
        Self {
            time: 0.0,
            asteroid_rotation: Rotation3::identity(),
            position: config.lander_position,
            velocity: Vector3::zeros(),
            attitude: UnitQuaternion::identity(),
            body_rate: Vector3::zeros(),
            landing_site_body,
            touchdown: None,
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Body-to-world rotation of the asteroid
    pub fn asteroid_rotation(&self) -> &Rotation3<f64> {
        &self.asteroid_rotation
    }

    pub fn lander_position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn touchdown(&self) -> Option<&Touchdown> {
        self.touchdown.as_ref()
    }

    pub fn has_collided(&self) -> bool {
        self.touchdown.is_some()
    }

    fn gravity(&self, point: &Vector3<f64>) -> Vector3<f64> {
        let r = point.norm();
        if r == 0.0 {
            return Vector3::zeros();
        }
        -point * (self.config.gm / (r * r * r))
    }

    fn site_world(&self) -> Vector3<f64> {
        self.asteroid_rotation * self.landing_site_body
    }

    /// Advance the world by `dt` seconds. Does nothing after touchdown.
    pub fn step(&mut self, dt: f64) {
        if self.touchdown.is_some() {
            return;
        }

        self.velocity += self.gravity(&self.position) * dt;
        self.position += self.velocity * dt;
        self.attitude = UnitQuaternion::from_scaled_axis(self.body_rate * dt) * self.attitude;
        self.time += dt;
        self.asteroid_rotation = Rotation3::from_scaled_axis(self.config.angular_velocity * self.time);

        let r = self.position.norm();
        if r <= self.config.radius {
            let surface = self.position / r * self.config.radius;
            let surface_velocity = self.config.angular_velocity.cross(&surface);
            let site = self.site_world();
            let site_distance = self.config.radius * surface.normalize().angle(&site.normalize());
            let touchdown = Touchdown {
                time: self.time,
                position: surface,
                relative_velocity: self.velocity - surface_velocity,
                site_distance,
            };
            log::info!(
                "Touchdown at t={:.2}: relative speed {:.3} m/s, {:.2} m from the site",
                touchdown.time,
                touchdown.relative_velocity.norm(),
                touchdown.site_distance
            );
            self.position = surface;
            self.velocity = surface_velocity;
            self.touchdown = Some(touchdown);
        }
    }
}

impl PhysicsWorld for SphereAsteroidWorld {
    fn timestamp(&self) -> f64 {
        self.time
    }

    fn ray_cast(
        &self,
        origin: &Vector3<f64>,
        direction: &Vector3<f64>,
        max_range: f64,
    ) -> Result<Option<Vector3<f64>>, CollaboratorError> {
        let norm = direction.norm();
        if norm == 0.0 {
            return Err(CollaboratorError::Physics("ray direction is zero".to_string()));
        }
        Ok(ray_sphere(origin, &(direction / norm), self.config.radius)
            .filter(|&t| t <= max_range)
            .map(|t| origin + direction / norm * t))
    }

    fn lander_state(&self) -> Result<LanderBodyState, CollaboratorError> {
        let transform = Isometry3::from_parts(Translation3::from(self.position), self.attitude);
        Ok(LanderBodyState {
            position: self.position,
            velocity: self.velocity,
            transform: transform.to_homogeneous(),
        })
    }

    fn gravity_at(&self, point: &Vector3<f64>) -> Result<Vector3<f64>, CollaboratorError> {
        Ok(self.gravity(point))
    }

    fn landing_site(&self) -> Result<SurfaceSite, CollaboratorError> {
        let position = self.site_world();
        Ok(SurfaceSite {
            position,
            up: position.normalize(),
        })
    }

    fn asteroid_angular_velocity(&self) -> Result<Vector3<f64>, CollaboratorError> {
        Ok(self.config.angular_velocity)
    }

    fn apply_impulse(&mut self, impulse: &Vector3<f64>) -> Result<(), CollaboratorError> {
        if !impulse.iter().all(|v| v.is_finite()) {
            return Err(CollaboratorError::Physics(format!("non-finite impulse {impulse:?}")));
        }
        self.velocity += impulse / self.config.lander_mass;
        Ok(())
    }

    fn apply_torque_impulse(&mut self, torque: &Vector3<f64>) -> Result<(), CollaboratorError> {
        // Unit moment of inertia
        self.body_rate += torque;
        Ok(())
    }
}

/// Smallest non-negative distance along a unit ray to a sphere at the origin
pub(crate) fn ray_sphere(origin: &Vector3<f64>, direction: &Vector3<f64>, radius: f64) -> Option<f64> {
    let b = origin.dot(direction);
    let c = origin.norm_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sqrt = disc.sqrt();
    let near = -b - sqrt;
    let far = -b + sqrt;
    if near >= 0.0 {
        Some(near)
    } else if far >= 0.0 {
        Some(far)
    } else {
        None
    }
}
