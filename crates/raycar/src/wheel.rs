//! Raycast wheel and suspension model.
//!
//! Each wheel casts a ray along chassis-down from its mount, turns the hit
//! into spring compression, and produces suspension and tire impulses for the
//! chassis. Spin and steering are tracked for rendering only.

use std::f32::consts::TAU;

use glam::{Quat, Vec3};

use crate::{
    backend::{ChassisPose, ChassisVelocity, RayHit, VehicleBackend},
    error::BackendError,
    params::VehicleParams,
};

/// Brake values are impulses per step at this rate.
pub const BRAKE_REFERENCE_RATE: f32 = 60.0;

/// Per-step spin decay for a wheel in the air.
pub const AIRBORNE_SPIN_DECAY: f32 = 0.98;

/// Spin given to a stopped airborne wheel per unit throttle (rad/s).
///
/// Only a wheel whose spin is exactly zero is reseeded; a wheel that is
/// already turning keeps decaying by [`AIRBORNE_SPIN_DECAY`] under throttle.
pub const AIRBORNE_THROTTLE_SPIN: f32 = 5.0;

/// Compression (as a fraction of rest length) above which a wheel counts as loaded.
pub const GROUNDED_COMPRESSION: f32 = 0.01;

/// Suspension force (N) above which a wheel counts as loaded.
pub const GROUNDED_FORCE: f32 = 1.0;

/// Slip contributed by a held handbrake on a rear wheel.
const HANDBRAKE_SLIP: f32 = 0.7;

/// Slip contributed by near-full throttle.
const HEAVY_THROTTLE_SLIP: f32 = 0.2;

/// Throttle magnitude treated as near-full.
const HEAVY_THROTTLE: f32 = 0.8;

/// Angle magnitude past which the accumulated spin is wrapped.
const ROTATION_WRAP: f32 = TAU * 1024.0;

/// Where the tire touches the ground.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelContact {
    /// World-space contact point.
    pub point: Vec3,
    /// Ground normal.
    pub normal: Vec3,
}

/// Per-wheel drive inputs for one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelDrive {
    /// Throttle in `[-1, 1]`, used for slip and airborne spin.
    pub throttle: f32,
    /// Service brake in `[0, 1]`.
    pub brake: f32,
    /// Whether the handbrake acts on this wheel.
    pub handbrake: bool,
}

/// State of one wheel, mutated every step.
#[derive(Clone, Debug, PartialEq)]
pub struct WheelState {
    /// Mount point in chassis space.
    pub connection_point: Vec3,
    /// Wheel radius.
    pub radius: f32,
    /// Whether the wheel steers.
    pub is_front: bool,
    /// Steering angle about chassis up; positive turns left.
    pub steering_angle: f32,
    /// Accumulated spin angle (visual).
    pub rotation_angle: f32,
    /// Spin rate in rad/s; positive rolls forward.
    pub rotation_speed: f32,
    /// Whether the tire is loaded this step.
    pub is_grounded: bool,
    /// Distance from mount to hub along chassis-down.
    pub suspension_length: f32,
    /// Spring compression in `[0, 1]`.
    pub compression: f32,
    /// Spring force in N.
    pub suspension_force: f32,
    /// Engine force in N for this step.
    pub engine_force: f32,
    /// Brake force limit in N for this step.
    pub brake_force: f32,
    /// Tire slip factor in `[0, 1)`.
    pub slip_factor: f32,
    /// Contact with the ground, if the ray hit.
    pub contact: Option<WheelContact>,
    /// Hub position for rendering.
    pub world_position: Vec3,
    /// Hub rotation for rendering.
    pub world_rotation: Quat,
}

impl WheelState {
    /// A wheel at rest, fully extended.
    pub fn new(connection_point: Vec3, is_front: bool, params: &VehicleParams) -> Self {
        Self {
            connection_point,
            radius: params.wheel_radius,
            is_front,
            steering_angle: 0.0,
            rotation_angle: 0.0,
            rotation_speed: 0.0,
            is_grounded: false,
            suspension_length: params.suspension_rest_length,
            compression: 0.0,
            suspension_force: 0.0,
            engine_force: 0.0,
            brake_force: 0.0,
            slip_factor: 0.0,
            contact: None,
            world_position: connection_point,
            world_rotation: Quat::IDENTITY,
        }
    }

    /// Cast this wheel's ray and update contact and suspension force.
    ///
    /// On failure the state is left untouched.
    pub fn update_suspension(
        &mut self,
        backend: &impl VehicleBackend,
        pose: &ChassisPose,
        velocity: &ChassisVelocity,
        params: &VehicleParams,
    ) -> Result<(), BackendError> {
        let origin = pose.transform_point(self.connection_point);
        let down = -pose.up();
        let hit = backend.cast_ray(origin, down, params.ray_length())?;

        match hit {
            Some(hit) => self.apply_hit(&hit, pose, velocity, params),
            None => {
                self.contact = None;
                self.suspension_length = params.suspension_rest_length;
                self.compression = 0.0;
                self.suspension_force = 0.0;
                self.is_grounded = false;
            }
        }
        Ok(())
    }

    fn apply_hit(
        &mut self,
        hit: &RayHit,
        pose: &ChassisPose,
        velocity: &ChassisVelocity,
        params: &VehicleParams,
    ) {
        let rest = params.suspension_rest_length;
        let length = (hit.distance - self.radius).max(0.0);
        let compression = ((rest - length) / rest).clamp(0.0, 1.0);

        // Positive when the mount approaches the ground.
        let up = pose.up();
        let closing_speed = -velocity.at_point(pose, hit.point).dot(up);

        self.contact = Some(WheelContact {
            point: hit.point,
            normal: hit.normal,
        });
        self.suspension_length = length;
        self.compression = compression;
        self.suspension_force = suspension_force(params, compression, closing_speed);
        self.is_grounded = compression > GROUNDED_COMPRESSION || self.suspension_force > GROUNDED_FORCE;
    }

    /// Impulse and application point for the spring this step.
    pub fn suspension_impulse(&self, dt: f32) -> Option<(Vec3, Vec3)> {
        let contact = self.contact.filter(|_| self.is_grounded)?;
        Some((contact.normal * self.suspension_force * dt, contact.point))
    }

    /// World-space forward and side directions of the tire in the ground plane.
    fn tire_axes(&self, pose: &ChassisPose, normal: Vec3) -> (Vec3, Vec3) {
        let steer = pose.rotation * Quat::from_rotation_y(self.steering_angle);
        let forward = steer * Vec3::NEG_Z;
        let forward = (forward - normal * forward.dot(normal)).normalize_or_zero();
        let side = forward.cross(normal).normalize_or_zero();
        (forward, side)
    }

    /// Velocity of the contact patch split into (longitudinal, lateral).
    pub fn contact_velocity(&self, pose: &ChassisPose, velocity: &ChassisVelocity) -> (f32, f32) {
        let Some(contact) = self.contact else {
            // Airborne: use the hub's motion in the chassis frame.
            let hub = pose.transform_point(self.connection_point);
            let v = velocity.at_point(pose, hub);
            return (v.dot(pose.forward()), v.dot(pose.right()));
        };
        let (forward, side) = self.tire_axes(pose, contact.normal);
        let v = velocity.at_point(pose, contact.point);
        (v.dot(forward), v.dot(side))
    }

    /// Update the slip factor from contact velocity and driver inputs.
    pub fn update_slip(&mut self, longitudinal: f32, lateral: f32, drive: &WheelDrive) {
        self.slip_factor = slip_factor(longitudinal, lateral, drive, self.is_front);
    }

    /// Tire friction impulse and application point.
    ///
    /// Combines engine, brake and lateral grip, clamped to the friction
    /// circle `friction_slip * (1 - slip_factor) * load`.
    pub fn friction_impulse(
        &self,
        pose: &ChassisPose,
        velocity: &ChassisVelocity,
        params: &VehicleParams,
        dt: f32,
    ) -> Option<(Vec3, Vec3)> {
        let contact = self.contact.filter(|_| self.is_grounded)?;
        let (forward, side) = self.tire_axes(pose, contact.normal);
        let v = velocity.at_point(pose, contact.point);
        let v_long = v.dot(forward);
        let v_lat = v.dot(side);

        // Share of the chassis each tire is responsible for stopping.
        #[allow(clippy::cast_precision_loss)]
        let effective_mass = params.chassis_mass / crate::params::WHEEL_COUNT as f32;
        let stopping_force = effective_mass / dt;

        let lateral = -v_lat * stopping_force;
        let braking = -(v_long * stopping_force).clamp(-self.brake_force, self.brake_force);
        let longitudinal = self.engine_force + braking;

        let grip = params.friction_slip * (1.0 - self.slip_factor) * self.suspension_force;
        let mut force = Vec3::new(longitudinal, lateral, 0.0);
        let magnitude = force.length();
        if magnitude > grip && magnitude > 0.0 {
            force *= grip / magnitude;
        }
        let world_force = forward * force.x + side * force.y;

        // Raise the application point toward the center of mass to limit roll.
        let up = pose.up();
        let rel = contact.point - pose.position;
        let rel_up = rel.dot(up);
        let point = contact.point - up * rel_up * (1.0 - params.roll_influence);

        Some((world_force * dt, point))
    }

    /// Integrate the visual spin.
    pub fn update_rotation(
        &mut self,
        longitudinal: f32,
        chassis_angular_local: Vec3,
        drive: &WheelDrive,
        dt: f32,
    ) {
        if self.is_grounded {
            let slip = visual_slip(self.slip_factor, drive.brake);
            self.rotation_speed =
                longitudinal / self.radius * (1.0 - slip) - chassis_angular_local.x;
        } else {
            self.rotation_speed *= AIRBORNE_SPIN_DECAY;
            // Throttle kicks a stopped wheel; decay alone never reaches zero.
            if self.rotation_speed == 0.0 {
                self.rotation_speed = drive.throttle * AIRBORNE_THROTTLE_SPIN;
            }
        }

        self.rotation_angle += self.rotation_speed * dt;
        if self.rotation_angle.abs() > ROTATION_WRAP {
            self.rotation_angle = self.rotation_angle.rem_euclid(TAU);
        }
    }

    /// Recompute the hub transform for rendering.
    pub fn update_visual(&mut self, pose: &ChassisPose) {
        let mount = pose.transform_point(self.connection_point);
        self.world_position = mount - pose.up() * self.suspension_length;
        // Rolling forward (-Z) is a negative rotation about +X.
        self.world_rotation = pose.rotation
            * Quat::from_rotation_y(self.steering_angle)
            * Quat::from_rotation_x(-self.rotation_angle);
    }
}

/// Spring plus damper force for a given compression, clamped to `[0, max]`.
///
/// `closing_speed` is positive while compressing.
pub fn suspension_force(params: &VehicleParams, compression: f32, closing_speed: f32) -> f32 {
    let spring = params.suspension_stiffness * compression * params.suspension_rest_length;
    let damping = if closing_speed > 0.0 {
        params.suspension_compression_damping
    } else {
        params.suspension_relaxation_damping
    };
    let force = (spring + damping * closing_speed) * params.chassis_mass;
    force.clamp(0.0, params.max_suspension_force)
}

/// Tire slip factor from velocity ratio, heavy throttle and handbrake.
pub fn slip_factor(longitudinal: f32, lateral: f32, drive: &WheelDrive, is_front: bool) -> f32 {
    let ratio = (lateral.abs() / (longitudinal.abs() + 0.01)).min(1.0);
    let throttle = if drive.throttle.abs() > HEAVY_THROTTLE {
        HEAVY_THROTTLE_SLIP
    } else {
        0.0
    };
    let handbrake = if drive.handbrake && !is_front {
        HANDBRAKE_SLIP
    } else {
        0.0
    };
    (ratio * 0.8).max(throttle).max(handbrake)
}

/// Slip used for the spin animation; braking also slows the wheel.
fn visual_slip(slip_factor: f32, brake: f32) -> f32 {
    let brake = if brake > 0.1 { (brake * 2.0).min(1.0) } else { 0.0 };
    slip_factor.max(brake)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_suspension_force_clamped() {
        let params = VehicleParams::default();
        assert_eq!(suspension_force(&params, 1.0, 50.0), params.max_suspension_force);
        assert_eq!(suspension_force(&params, 0.0, -5.0), 0.0);
    }

    #[test]
    fn test_suspension_damping_is_asymmetric() {
        let params = VehicleParams::default();
        let at_rest = suspension_force(&params, 0.2, 0.0);
        let compressing = suspension_force(&params, 0.2, 0.1) - at_rest;
        let extending = at_rest - suspension_force(&params, 0.2, -0.1);
        let ratio = compressing / extending;
        let expected =
            params.suspension_compression_damping / params.suspension_relaxation_damping;
        assert!((ratio - expected).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn suspension_force_monotonic_in_compression(a in 0.0f32..=1.0, b in 0.0f32..=1.0, v in -2.0f32..2.0) {
            let params = VehicleParams::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let f_lo = suspension_force(&params, lo, v);
            let f_hi = suspension_force(&params, hi, v);
            prop_assert!(f_lo <= f_hi);
            prop_assert!(f_hi <= params.max_suspension_force);
        }

        // No throttle here: a stopped wheel under throttle is reseeded, see
        // `test_airborne_throttle_spins_stopped_wheel`.
        #[test]
        fn airborne_spin_decays_but_never_stops(initial in 0.5f32..200.0, steps in 1usize..500) {
            let params = VehicleParams::default();
            let mut wheel = WheelState::new(Vec3::ZERO, false, &params);
            wheel.rotation_speed = initial;
            let drive = WheelDrive::default();
            let mut previous = wheel.rotation_speed.abs();
            for _ in 0..steps {
                wheel.update_rotation(0.0, Vec3::ZERO, &drive, 1.0 / 60.0);
                prop_assert!(wheel.rotation_speed.abs() <= previous);
                prop_assert!(wheel.rotation_speed != 0.0);
                previous = wheel.rotation_speed.abs();
            }
        }
    }

    #[test]
    fn test_airborne_throttle_spins_stopped_wheel() {
        let params = VehicleParams::default();
        let mut wheel = WheelState::new(Vec3::ZERO, false, &params);
        let drive = WheelDrive {
            throttle: 1.0,
            ..Default::default()
        };
        wheel.update_rotation(0.0, Vec3::ZERO, &drive, 0.1);
        assert_eq!(wheel.rotation_speed, AIRBORNE_THROTTLE_SPIN);
        assert!((wheel.rotation_angle - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_airborne_throttle_does_not_reseed_turning_wheel() {
        let params = VehicleParams::default();
        let mut wheel = WheelState::new(Vec3::ZERO, false, &params);
        wheel.rotation_speed = 1.0;
        let drive = WheelDrive {
            throttle: 1.0,
            ..Default::default()
        };
        for _ in 0..100 {
            wheel.update_rotation(0.0, Vec3::ZERO, &drive, 1.0 / 60.0);
        }
        assert!(wheel.rotation_speed > 0.0);
        assert!(wheel.rotation_speed < 1.0);
    }

    #[test]
    fn test_grounded_spin_follows_ground_speed() {
        let params = VehicleParams::default();
        let mut wheel = WheelState::new(Vec3::ZERO, false, &params);
        wheel.is_grounded = true;
        wheel.update_rotation(3.4, Vec3::ZERO, &WheelDrive::default(), 0.0);
        assert!((wheel.rotation_speed - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_slip_factor_terms() {
        let idle = WheelDrive::default();
        assert_eq!(slip_factor(10.0, 0.0, &idle, false), 0.0);
        // Pure sideways motion saturates the ratio term.
        assert!((slip_factor(0.0, 5.0, &idle, true) - 0.8).abs() < 1e-6);

        let heavy = WheelDrive {
            throttle: 1.0,
            ..Default::default()
        };
        assert_eq!(slip_factor(10.0, 0.0, &heavy, false), HEAVY_THROTTLE_SLIP);

        let handbrake = WheelDrive {
            handbrake: true,
            ..Default::default()
        };
        assert_eq!(slip_factor(10.0, 0.0, &handbrake, false), HANDBRAKE_SLIP);
        // Front wheels ignore the handbrake.
        assert_eq!(slip_factor(10.0, 0.0, &handbrake, true), 0.0);
    }

    #[test]
    fn test_visual_slip_includes_brake() {
        assert_eq!(visual_slip(0.1, 0.0), 0.1);
        assert_eq!(visual_slip(0.1, 0.3), 0.6);
        assert_eq!(visual_slip(0.1, 1.0), 1.0);
    }

    #[test]
    fn test_rotation_angle_wraps() {
        let params = VehicleParams::default();
        let mut wheel = WheelState::new(Vec3::ZERO, false, &params);
        wheel.rotation_angle = ROTATION_WRAP - 0.01;
        wheel.is_grounded = true;
        wheel.update_rotation(34.0, Vec3::ZERO, &WheelDrive::default(), 0.1);
        assert!(wheel.rotation_angle >= 0.0 && wheel.rotation_angle < TAU);
    }

    #[test]
    fn test_visual_hub_hangs_below_mount() {
        let params = VehicleParams::default();
        let mut wheel = WheelState::new(Vec3::new(1.0, 0.0, 0.0), true, &params);
        wheel.suspension_length = 0.3;
        wheel.update_visual(&ChassisPose {
            position: Vec3::new(0.0, 2.0, 0.0),
            rotation: Quat::IDENTITY,
        });
        assert!(wheel.world_position.abs_diff_eq(Vec3::new(1.0, 1.7, 0.0), 1e-6));
    }
}
