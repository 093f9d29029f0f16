//! The seam between the vehicle model and a rigid-body engine.

use glam::{Mat3, Quat, Vec3};

use crate::error::BackendError;

/// Pose of the chassis rigid body (center of mass).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChassisPose {
    /// World position.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quat,
}

impl Default for ChassisPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl ChassisPose {
    /// Local up (+Y) in world space.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Local forward (-Z) in world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Local right (+X) in world space.
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Transform a chassis-space point to world space.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }
}

/// Velocity of the chassis rigid body.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChassisVelocity {
    /// Linear velocity in m/s.
    pub linear: Vec3,
    /// Angular velocity in rad/s, world frame.
    pub angular: Vec3,
}

impl ChassisVelocity {
    /// Velocity of a world-space point rigidly attached to the chassis.
    pub fn at_point(&self, pose: &ChassisPose, point: Vec3) -> Vec3 {
        self.linear + self.angular.cross(point - pose.position)
    }
}

/// Result of a wheel ray cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin.
    pub distance: f32,
    /// World-space hit point.
    pub point: Vec3,
    /// Surface normal at the hit.
    pub normal: Vec3,
}

/// What the vehicle controller needs from a physics engine.
///
/// Queries may fail per call; the controller keeps its previous state for
/// the affected wheel and carries on.
pub trait VehicleBackend {
    /// Current chassis pose.
    fn chassis_pose(&self) -> Result<ChassisPose, BackendError>;

    /// Current chassis velocity.
    fn chassis_velocity(&self) -> Result<ChassisVelocity, BackendError>;

    /// Cast a ray that ignores the chassis itself.
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Result<Option<RayHit>, BackendError>;

    /// Apply an impulse at a world-space point on the chassis.
    fn apply_impulse(&mut self, impulse: Vec3, point: Vec3);
}

/// Box moment of inertia (diagonal, body frame).
pub fn box_inertia(mass: f32, half_extents: Vec3) -> Vec3 {
    let size = half_extents * 2.0;
    let sq = size * size;
    Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0)
}

/// Rigid-body mass properties used to turn impulses into velocity changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MassProperties {
    /// Mass in kg.
    pub mass: f32,
    /// Principal moments of inertia in the body frame.
    pub inertia: Vec3,
}

impl MassProperties {
    /// Mass properties of a solid box.
    pub fn solid_box(mass: f32, half_extents: Vec3) -> Self {
        Self {
            mass,
            inertia: box_inertia(mass, half_extents),
        }
    }

    /// Velocity change from an impulse applied at `point`.
    pub fn impulse_response(
        &self,
        pose: &ChassisPose,
        impulse: Vec3,
        point: Vec3,
    ) -> ChassisVelocity {
        let inv_mass = 1.0 / self.mass.max(0.1);
        let torque_impulse = (point - pose.position).cross(impulse);
        ChassisVelocity {
            linear: impulse * inv_mass,
            angular: self.inverse_world_inertia(pose.rotation) * torque_impulse,
        }
    }

    /// Inverse inertia tensor rotated into world space.
    pub fn inverse_world_inertia(&self, rotation: Quat) -> Mat3 {
        let inv = Vec3::new(
            1.0 / self.inertia.x.max(0.1),
            1.0 / self.inertia.y.max(0.1),
            1.0 / self.inertia.z.max(0.1),
        );
        let r = Mat3::from_quat(rotation);
        r * Mat3::from_diagonal(inv) * r.transpose()
    }
}
