//! [`VehicleBackend`] over Avian's spatial query pipeline.
//!
//! The backend works on a copy of the chassis state. Impulses are folded into
//! the copied velocity as velocity changes, and [`AvianBackend::velocity`] is
//! written back to the body after the controller step.

use avian3d::prelude::*;
use bevy::prelude::*;
use raycar::{
    BackendError, ChassisPose, ChassisVelocity, RayHit, VehicleBackend, backend::MassProperties,
};

use super::GameLayer;

/// One chassis, borrowed from the ECS for a single step.
pub struct AvianBackend<'a> {
    pipeline: &'a SpatialQueryPipeline,
    filter: SpatialQueryFilter,
    pose: ChassisPose,
    velocity: ChassisVelocity,
    mass: MassProperties,
}

impl<'a> AvianBackend<'a> {
    /// Wrap a chassis body. Rays ignore the chassis and hit only ground.
    pub fn new(
        pipeline: &'a SpatialQueryPipeline,
        chassis: Entity,
        position: &Position,
        rotation: &Rotation,
        linear: &LinearVelocity,
        angular: &AngularVelocity,
        mass: MassProperties,
    ) -> Self {
        Self {
            pipeline,
            filter: SpatialQueryFilter::default()
                .with_excluded_entities([chassis])
                .with_mask([GameLayer::Ground]),
            pose: ChassisPose {
                position: position.0,
                rotation: rotation.0,
            },
            velocity: ChassisVelocity {
                linear: linear.0,
                angular: angular.0,
            },
            mass,
        }
    }

    /// Velocity after every applied impulse.
    pub fn velocity(&self) -> ChassisVelocity {
        self.velocity
    }

    /// Pose the step ran against.
    pub fn pose(&self) -> ChassisPose {
        self.pose
    }
}

impl VehicleBackend for AvianBackend<'_> {
    fn chassis_pose(&self) -> Result<ChassisPose, BackendError> {
        if !self.pose.position.is_finite() || !self.pose.rotation.is_finite() {
            return Err(BackendError::new(format!(
                "non-finite chassis pose {:?}",
                self.pose
            )));
        }
        Ok(self.pose)
    }

    fn chassis_velocity(&self) -> Result<ChassisVelocity, BackendError> {
        if !self.velocity.linear.is_finite() || !self.velocity.angular.is_finite() {
            return Err(BackendError::new("non-finite chassis velocity"));
        }
        Ok(self.velocity)
    }

    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Result<Option<RayHit>, BackendError> {
        let direction = Dir3::new(direction).map_err(BackendError::new)?;
        Ok(self
            .pipeline
            .cast_ray(origin, direction, max_distance, true, &self.filter)
            .map(|hit| RayHit {
                distance: hit.distance,
                point: origin + direction * hit.distance,
                normal: hit.normal,
            }))
    }

    fn apply_impulse(&mut self, impulse: Vec3, point: Vec3) {
        let delta = self.mass.impulse_response(&self.pose, impulse, point);
        self.velocity.linear += delta.linear;
        self.velocity.angular += delta.angular;
    }
}
