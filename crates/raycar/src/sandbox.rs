//! Minimal flat-ground rigid body.
//!
//! A single chassis over an infinite plane, with gravity and damping. Used by
//! the headless tuner and by tests; no collision beyond keeping the chassis
//! box above the plane.

use glam::{Quat, Vec3};

use crate::{
    backend::{ChassisPose, ChassisVelocity, MassProperties, RayHit, VehicleBackend},
    error::BackendError,
    params::VehicleParams,
};

/// Standard gravity (m/s²).
pub const GRAVITY: f32 = 9.81;

/// A chassis rigid body over a horizontal plane.
#[derive(Clone, Debug)]
pub struct FlatGround {
    /// Chassis pose.
    pub pose: ChassisPose,
    /// Chassis velocity.
    pub velocity: ChassisVelocity,
    /// Chassis mass properties.
    pub mass: MassProperties,
    /// Chassis half extents, for ground penetration.
    pub half_extents: Vec3,
    /// Height of the plane.
    pub ground_height: f32,
    /// Gravity magnitude.
    pub gravity: f32,
    /// Linear damping coefficient.
    pub linear_damping: f32,
    /// Angular damping coefficient.
    pub angular_damping: f32,
    /// Make every chassis query fail.
    pub fail_chassis: bool,
    /// Make rays cast from this origin fail.
    pub fail_rays_from: Option<Vec3>,
}

impl FlatGround {
    /// A chassis shaped by `params`, resting at `position`.
    pub fn for_vehicle(params: &VehicleParams, position: Vec3) -> Self {
        Self {
            pose: ChassisPose {
                position,
                rotation: Quat::IDENTITY,
            },
            velocity: ChassisVelocity::default(),
            mass: MassProperties::solid_box(params.chassis_mass, params.chassis_half_extents),
            half_extents: params.chassis_half_extents,
            ground_height: 0.0,
            gravity: GRAVITY,
            linear_damping: params.linear_damping,
            angular_damping: params.angular_damping,
            fail_chassis: false,
            fail_rays_from: None,
        }
    }

    /// Advance the body by `dt` seconds.
    pub fn integrate(&mut self, dt: f32) {
        self.velocity.linear.y -= self.gravity * dt;
        self.velocity.linear *= (-self.linear_damping * dt).exp();
        self.velocity.angular *= (-self.angular_damping * dt).exp();

        self.pose.position += self.velocity.linear * dt;
        let spin = Quat::from_scaled_axis(self.velocity.angular * dt);
        self.pose.rotation = (spin * self.pose.rotation).normalize();

        self.resolve_penetration();
    }

    /// Push the chassis box out of the plane.
    fn resolve_penetration(&mut self) {
        let h = self.half_extents;
        let lowest = [-1.0, 1.0]
            .into_iter()
            .flat_map(|x| [-1.0, 1.0].into_iter().map(move |y| (x, y)))
            .flat_map(|(x, y)| [-1.0, 1.0].into_iter().map(move |z| Vec3::new(x, y, z)))
            .map(|corner| self.pose.transform_point(corner * h).y)
            .fold(f32::MAX, f32::min);

        let depth = self.ground_height - lowest;
        if depth > 0.0 {
            self.pose.position.y += depth;
            if self.velocity.linear.y < 0.0 {
                self.velocity.linear.y = 0.0;
            }
        }
    }
}

impl VehicleBackend for FlatGround {
    fn chassis_pose(&self) -> Result<ChassisPose, BackendError> {
        if self.fail_chassis {
            return Err(BackendError::new("chassis removed"));
        }
        Ok(self.pose)
    }

    fn chassis_velocity(&self) -> Result<ChassisVelocity, BackendError> {
        if self.fail_chassis {
            return Err(BackendError::new("chassis removed"));
        }
        Ok(self.velocity)
    }

    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Result<Option<RayHit>, BackendError> {
        if let Some(failing) = self.fail_rays_from
            && failing.abs_diff_eq(origin, 1e-4)
        {
            return Err(BackendError::new("ray query rejected"));
        }

        let direction = direction.normalize_or_zero();
        if direction.y >= -1e-6 {
            return Ok(None);
        }
        let distance = ((origin.y - self.ground_height) / -direction.y).max(0.0);
        if distance > max_distance {
            return Ok(None);
        }
        Ok(Some(RayHit {
            distance,
            point: origin + direction * distance,
            normal: Vec3::Y,
        }))
    }

    fn apply_impulse(&mut self, impulse: Vec3, point: Vec3) {
        let delta = self.mass.impulse_response(&self.pose, impulse, point);
        self.velocity.linear += delta.linear;
        self.velocity.angular += delta.angular;
    }
}
