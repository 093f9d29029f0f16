//! Four-wheel vehicle controller.
//!
//! Turns a [`ControlState`] into per-wheel steering, engine and brake
//! commands, runs the wheel model against a [`VehicleBackend`], and applies the
//! resulting impulses. Suspension impulses for every wheel are applied before
//! any tire impulse.

use glam::Vec3;

use crate::{
    backend::{ChassisPose, ChassisVelocity, VehicleBackend},
    control::ControlState,
    error::Result,
    params::{VehicleParams, WHEEL_COUNT},
    wheel::{BRAKE_REFERENCE_RATE, WheelDrive, WheelState},
};

/// Largest step the controller will integrate in one call (seconds).
pub const MAX_STEP: f32 = 0.1;

/// Forward speed (m/s) above which the brake key brakes instead of reversing.
pub const REVERSE_ENGAGE_SPEED: f32 = 0.5;

/// Analog drive command derived from the driver's keys.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveIntent {
    /// Throttle in `[-1, 1]`, positive = forward.
    pub throttle: f32,
    /// Service brake in `[0, 1]`.
    pub brake: f32,
    /// Steering in `[-1, 1]`, positive = right.
    pub steer: f32,
    /// Handbrake held.
    pub handbrake: bool,
}

impl DriveIntent {
    /// Map keys to a drive command.
    ///
    /// The brake key brakes while rolling forward and reverses once nearly
    /// stopped; the accelerate key does the mirror image while rolling back.
    pub fn from_controls(controls: &ControlState, forward_speed: f32) -> Self {
        let rolling_forward = forward_speed > REVERSE_ENGAGE_SPEED;
        let rolling_back = forward_speed < -REVERSE_ENGAGE_SPEED;

        let forward = controls.accelerate && !rolling_back;
        let reverse = controls.brake && !rolling_forward;
        let braking = (controls.brake && rolling_forward) || (controls.accelerate && rolling_back);

        Self {
            throttle: f32::from(u8::from(forward)) - f32::from(u8::from(reverse)),
            brake: f32::from(u8::from(braking)),
            steer: controls.steer_axis(),
            handbrake: controls.handbrake,
        }
    }
}

/// Diagnostics from one controller step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    /// The step was skipped (bad `dt` or no chassis).
    pub skipped: bool,
    /// Integrated step length after clamping.
    pub dt: f32,
    /// Drive command used.
    pub intent: DriveIntent,
    /// Wheels in loaded contact.
    pub grounded_wheels: usize,
    /// Wheels whose ray query failed.
    pub failed_wheels: usize,
    /// Sum of suspension impulses.
    pub suspension_impulse: Vec3,
    /// Sum of tire impulses.
    pub friction_impulse: Vec3,
    /// Downforce applied, in N.
    pub downforce: f32,
    /// Chassis speed in m/s.
    pub speed: f32,
    /// Chassis forward speed in m/s.
    pub forward_speed: f32,
}

/// Orchestrates four wheels against one chassis.
#[derive(Clone, Debug)]
pub struct VehicleController {
    params: VehicleParams,
    wheels: [WheelState; WHEEL_COUNT],
    controls: ControlState,
    intent_override: Option<DriveIntent>,
}

impl VehicleController {
    /// Create a controller for the chassis exposed by `backend`.
    ///
    /// Fails if the parameters are invalid or the chassis cannot be queried.
    pub fn new(params: VehicleParams, backend: &impl VehicleBackend) -> Result<Self> {
        params.validate()?;
        let pose = backend.chassis_pose()?;
        backend.chassis_velocity()?;

        let wheels = build_wheels(&params);
        let mut controller = Self {
            params,
            wheels,
            controls: ControlState::default(),
            intent_override: None,
        };
        for wheel in &mut controller.wheels {
            wheel.update_visual(&pose);
        }

        tracing::info!(
            mass = controller.params.chassis_mass,
            drive = ?controller.params.drive_type,
            "Vehicle controller created"
        );
        Ok(controller)
    }

    /// Current parameters.
    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    /// Replace the parameters between steps.
    ///
    /// Wheel spin is kept; geometry follows the new parameters.
    pub fn set_params(&mut self, params: VehicleParams) -> Result<()> {
        params.validate()?;
        let mut wheels = build_wheels(&params);
        for (new, old) in wheels.iter_mut().zip(&self.wheels) {
            new.rotation_angle = old.rotation_angle;
            new.rotation_speed = old.rotation_speed;
            new.world_position = old.world_position;
            new.world_rotation = old.world_rotation;
        }
        self.wheels = wheels;
        self.params = params;
        tracing::debug!("Vehicle parameters replaced");
        Ok(())
    }

    /// Set the driver's keys for the next steps.
    pub fn set_controls(&mut self, controls: &ControlState) {
        self.controls = *controls;
        self.intent_override = None;
    }

    /// Drive with an analog command instead of keys.
    pub fn set_drive(&mut self, intent: DriveIntent) {
        self.intent_override = Some(intent);
    }

    /// Current keys.
    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    /// All four wheels: FL, FR, RL, RR.
    pub fn wheels(&self) -> &[WheelState; WHEEL_COUNT] {
        &self.wheels
    }

    /// Whether any wheel is loaded.
    pub fn is_grounded(&self) -> bool {
        self.wheels.iter().any(|w| w.is_grounded)
    }

    /// Pose of the visual model for a given rigid-body pose.
    pub fn chassis_visual_pose(&self, pose: &ChassisPose) -> ChassisPose {
        ChassisPose {
            position: pose.position - pose.rotation * self.params.visual_offset,
            rotation: pose.rotation,
        }
    }

    /// Advance the vehicle by `dt` seconds.
    pub fn step(&mut self, backend: &mut impl VehicleBackend, dt: f32) -> StepReport {
        if !dt.is_finite() || dt <= 0.0 {
            tracing::warn!(dt, "Skipping vehicle step with invalid dt");
            return StepReport {
                skipped: true,
                ..Default::default()
            };
        }
        let dt = dt.min(MAX_STEP);

        let (pose, velocity) = match (backend.chassis_pose(), backend.chassis_velocity()) {
            (Ok(pose), Ok(velocity)) => (pose, velocity),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Skipping vehicle step: chassis query failed");
                return StepReport {
                    skipped: true,
                    dt,
                    ..Default::default()
                };
            }
        };

        let forward_speed = velocity.linear.dot(pose.forward());
        let intent = self
            .intent_override
            .unwrap_or_else(|| DriveIntent::from_controls(&self.controls, forward_speed));
        let drives = self.apply_intent(&intent);

        let mut report = StepReport {
            dt,
            intent,
            speed: velocity.linear.length(),
            forward_speed,
            ..Default::default()
        };

        // Suspension for every wheel first.
        for (index, wheel) in self.wheels.iter_mut().enumerate() {
            if let Err(e) = wheel.update_suspension(&*backend, &pose, &velocity, &self.params) {
                tracing::warn!(wheel = index, error = %e, "Wheel query failed; keeping previous state");
                report.failed_wheels += 1;
            }
        }
        for wheel in &self.wheels {
            if let Some((impulse, point)) = wheel.suspension_impulse(dt) {
                backend.apply_impulse(impulse, point);
                report.suspension_impulse += impulse;
            }
        }

        // Then tires, all solved against the same velocity snapshot.
        let local_angular = pose.rotation.inverse() * velocity.angular;
        let mut tire_impulses = [None; WHEEL_COUNT];
        for ((wheel, drive), slot) in self
            .wheels
            .iter_mut()
            .zip(&drives)
            .zip(&mut tire_impulses)
        {
            let (longitudinal, lateral) = wheel.contact_velocity(&pose, &velocity);
            wheel.update_slip(longitudinal, lateral, drive);
            *slot = wheel.friction_impulse(&pose, &velocity, &self.params, dt);
            wheel.update_rotation(longitudinal, local_angular, drive, dt);
        }
        for (impulse, point) in tire_impulses.into_iter().flatten() {
            backend.apply_impulse(impulse, point);
            report.friction_impulse += impulse;
        }

        report.grounded_wheels = self.wheels.iter().filter(|w| w.is_grounded).count();

        for wheel in &mut self.wheels {
            wheel.update_visual(&pose);
        }

        report.downforce = self.apply_downforce(backend, &pose, &velocity, dt);
        report
    }

    /// Write steering, engine and brake commands into the wheels.
    fn apply_intent(&mut self, intent: &DriveIntent) -> [WheelDrive; WHEEL_COUNT] {
        let params = &self.params;
        let engine_per_wheel = params.engine_force_per_wheel();
        let brake = params.brake_force * BRAKE_REFERENCE_RATE;
        let handbrake = brake * params.handbrake_multiplier;

        let mut drives = [WheelDrive::default(); WHEEL_COUNT];
        for (index, (wheel, drive)) in self.wheels.iter_mut().zip(&mut drives).enumerate() {
            let handbrake_held = intent.handbrake && !wheel.is_front;

            wheel.steering_angle = if wheel.is_front {
                -intent.steer * params.max_steering_angle
            } else {
                0.0
            };
            wheel.engine_force = if params.drive_type.drives(index) {
                intent.throttle * engine_per_wheel
            } else {
                0.0
            };
            wheel.brake_force = intent.brake * brake;
            if handbrake_held {
                wheel.brake_force = wheel.brake_force.max(handbrake);
            }

            *drive = WheelDrive {
                throttle: intent.throttle,
                brake: intent.brake,
                handbrake: handbrake_held,
            };
        }
        drives
    }

    fn apply_downforce(
        &self,
        backend: &mut impl VehicleBackend,
        pose: &ChassisPose,
        velocity: &ChassisVelocity,
        dt: f32,
    ) -> f32 {
        let v = velocity.linear;
        let horizontal_sq = v.x * v.x + v.z * v.z;
        let threshold = self.params.downforce_speed_threshold;
        if horizontal_sq <= threshold * threshold {
            return 0.0;
        }
        let force = horizontal_sq * self.params.downforce_coefficient;
        backend.apply_impulse(Vec3::NEG_Y * force * dt, pose.position);
        force
    }
}

fn build_wheels(params: &VehicleParams) -> [WheelState; WHEEL_COUNT] {
    std::array::from_fn(|index| {
        let is_front = index < 2;
        WheelState::new(params.wheel_connection_points[index], is_front, params)
    })
}

#[cfg(test)]
mod tests {
    use glam::Quat;
    use proptest::prelude::*;

    use super::*;
    use crate::{
        error::Error,
        params::{DriveType, FRONT_LEFT, FRONT_RIGHT, REAR_LEFT, REAR_RIGHT},
        sandbox::FlatGround,
    };

    const DT: f32 = 1.0 / 60.0;

    fn settled(params: &VehicleParams) -> (FlatGround, VehicleController) {
        let mut ground = FlatGround::for_vehicle(params, Vec3::new(0.0, 1.0, 0.0));
        let mut controller = VehicleController::new(params.clone(), &ground).unwrap();
        for _ in 0..180 {
            controller.step(&mut ground, DT);
            ground.integrate(DT);
        }
        (ground, controller)
    }

    #[test]
    fn test_new_rejects_invalid_params() {
        let ground = FlatGround::for_vehicle(&VehicleParams::default(), Vec3::Y);
        let params = VehicleParams {
            wheel_radius: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            VehicleController::new(params, &ground),
            Err(Error::InvalidParams {
                field: "wheel_radius",
                ..
            })
        ));
    }

    #[test]
    fn test_new_fails_without_chassis() {
        let mut ground = FlatGround::for_vehicle(&VehicleParams::default(), Vec3::Y);
        ground.fail_chassis = true;
        assert!(matches!(
            VehicleController::new(VehicleParams::default(), &ground),
            Err(Error::ChassisUnavailable { .. })
        ));
    }

    #[test]
    fn test_settles_on_all_four_wheels() {
        let (ground, controller) = settled(&VehicleParams::default());
        assert!(controller.wheels().iter().all(|w| w.is_grounded));
        assert!(ground.velocity.linear.length() < 0.05);
        // Weight is carried by the springs.
        let total: f32 = controller.wheels().iter().map(|w| w.suspension_force).sum();
        let weight = VehicleParams::default().chassis_mass * 9.81;
        assert!((total - weight).abs() / weight < 0.05);
    }

    #[test]
    fn test_straight_line_has_no_yaw() {
        let params = VehicleParams::default();
        let (mut ground, mut controller) = settled(&params);
        controller.set_controls(&ControlState {
            accelerate: true,
            ..Default::default()
        });
        for _ in 0..120 {
            controller.step(&mut ground, DT);
            ground.integrate(DT);
        }
        assert!(ground.velocity.linear.dot(ground.pose.forward()) > 1.0);
        assert!(ground.velocity.angular.y.abs() < 1e-3);
    }

    #[test]
    fn test_steering_front_wheels_only() {
        let params = VehicleParams::default();
        let (mut ground, mut controller) = settled(&params);
        controller.set_controls(&ControlState {
            turn_right: true,
            ..Default::default()
        });
        controller.step(&mut ground, DT);
        let wheels = controller.wheels();
        assert_eq!(wheels[FRONT_LEFT].steering_angle, -params.max_steering_angle);
        assert_eq!(wheels[FRONT_RIGHT].steering_angle, -params.max_steering_angle);
        assert_eq!(wheels[REAR_LEFT].steering_angle, 0.0);
    }

    #[test]
    fn test_drive_type_routes_engine_force() {
        let mut params = VehicleParams::default();
        let (mut ground, mut controller) = settled(&params);
        controller.set_drive(DriveIntent {
            throttle: 1.0,
            ..Default::default()
        });

        controller.step(&mut ground, DT);
        let forces: Vec<f32> = controller.wheels().iter().map(|w| w.engine_force).collect();
        assert_eq!(forces, vec![0.0, 0.0, 1375.0, 1375.0]);

        params.drive_type = DriveType::Awd;
        controller.set_params(params.clone()).unwrap();
        controller.step(&mut ground, DT);
        assert!(controller.wheels().iter().all(|w| w.engine_force == 687.5));

        params.drive_type = DriveType::Fwd;
        controller.set_params(params).unwrap();
        controller.step(&mut ground, DT);
        assert_eq!(controller.wheels()[REAR_RIGHT].engine_force, 0.0);
        assert_eq!(controller.wheels()[FRONT_LEFT].engine_force, 1375.0);
    }

    proptest! {
        #[test]
        fn reversed_throttle_mirrors_engine_force(throttle in 0.0f32..=1.0) {
            let params = VehicleParams::default();
            let mut ground = FlatGround::for_vehicle(&params, Vec3::new(0.0, 1.0, 0.0));
            let mut controller = VehicleController::new(params, &ground).unwrap();

            controller.set_drive(DriveIntent { throttle, ..Default::default() });
            controller.step(&mut ground, DT);
            let forward: Vec<f32> = controller.wheels().iter().map(|w| w.engine_force).collect();

            controller.set_drive(DriveIntent { throttle: -throttle, ..Default::default() });
            controller.step(&mut ground, DT);
            let reverse: Vec<f32> = controller.wheels().iter().map(|w| w.engine_force).collect();

            for (f, r) in forward.iter().zip(&reverse) {
                prop_assert_eq!(*f, -*r);
            }
        }
    }

    #[test]
    fn test_brake_key_brakes_then_reverses() {
        let controls = ControlState {
            brake: true,
            ..Default::default()
        };
        let moving = DriveIntent::from_controls(&controls, 10.0);
        assert_eq!(moving.brake, 1.0);
        assert_eq!(moving.throttle, 0.0);

        let stopped = DriveIntent::from_controls(&controls, 0.0);
        assert_eq!(stopped.brake, 0.0);
        assert_eq!(stopped.throttle, -1.0);

        let accelerate_backwards = DriveIntent::from_controls(
            &ControlState {
                accelerate: true,
                ..Default::default()
            },
            -3.0,
        );
        assert_eq!(accelerate_backwards.brake, 1.0);
        assert_eq!(accelerate_backwards.throttle, 0.0);
    }

    #[test]
    fn test_brake_slows_vehicle() {
        let params = VehicleParams::default();
        let (mut ground, mut controller) = settled(&params);
        ground.velocity.linear = ground.pose.forward() * 15.0;
        controller.set_controls(&ControlState {
            brake: true,
            ..Default::default()
        });
        for _ in 0..45 {
            controller.step(&mut ground, DT);
            ground.integrate(DT);
        }
        let speed = ground.velocity.linear.dot(ground.pose.forward());
        assert!(speed < 10.0, "speed after braking: {speed}");
        // Still rolling forward, so the brake key has not switched to reverse.
        assert!(speed > 0.0);
    }

    #[test]
    fn test_handbrake_locks_rear_only() {
        let params = VehicleParams::default();
        let (mut ground, mut controller) = settled(&params);
        controller.set_controls(&ControlState {
            handbrake: true,
            ..Default::default()
        });
        controller.step(&mut ground, DT);
        let wheels = controller.wheels();
        let expected = params.brake_force * BRAKE_REFERENCE_RATE * params.handbrake_multiplier;
        assert_eq!(wheels[REAR_LEFT].brake_force, expected);
        assert_eq!(wheels[FRONT_LEFT].brake_force, 0.0);
        assert!(wheels[REAR_RIGHT].slip_factor >= 0.7);
    }

    #[test]
    fn test_airborne_wheels_have_no_force() {
        let params = VehicleParams::default();
        let mut ground = FlatGround::for_vehicle(&params, Vec3::new(0.0, 50.0, 0.0));
        let mut controller = VehicleController::new(params, &ground).unwrap();
        let report = controller.step(&mut ground, DT);
        assert_eq!(report.grounded_wheels, 0);
        assert_eq!(report.suspension_impulse, Vec3::ZERO);
        assert!(controller.wheels().iter().all(|w| w.contact.is_none()));
    }

    #[test]
    fn test_invalid_dt_is_skipped() {
        let params = VehicleParams::default();
        let mut ground = FlatGround::for_vehicle(&params, Vec3::Y);
        let mut controller = VehicleController::new(params, &ground).unwrap();
        for dt in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(controller.step(&mut ground, dt).skipped);
        }
        assert_eq!(controller.step(&mut ground, 5.0).dt, MAX_STEP);
    }

    #[test]
    fn test_chassis_failure_skips_step() {
        let params = VehicleParams::default();
        let mut ground = FlatGround::for_vehicle(&params, Vec3::Y);
        let mut controller = VehicleController::new(params, &ground).unwrap();
        ground.fail_chassis = true;
        assert!(controller.step(&mut ground, DT).skipped);
    }

    #[test]
    fn test_failed_wheel_keeps_previous_state() {
        let params = VehicleParams::default();
        let (mut ground, mut controller) = settled(&params);
        let before = controller.wheels()[REAR_LEFT].clone();
        ground.fail_rays_from = Some(ground.pose.transform_point(before.connection_point));
        let report = controller.step(&mut ground, DT);
        assert_eq!(report.failed_wheels, 1);
        let after = &controller.wheels()[REAR_LEFT];
        assert_eq!(after.suspension_force, before.suspension_force);
        assert_eq!(after.contact, before.contact);
        // The other wheels carried on.
        assert_eq!(report.grounded_wheels, 4);
    }

    #[test]
    fn test_downforce_above_threshold() {
        let params = VehicleParams::default();
        let mut ground = FlatGround::for_vehicle(&params, Vec3::new(0.0, 50.0, 0.0));
        let mut controller = VehicleController::new(params.clone(), &ground).unwrap();

        ground.velocity.linear = Vec3::new(0.0, 0.0, -9.0);
        assert_eq!(controller.step(&mut ground, DT).downforce, 0.0);

        ground.velocity.linear = Vec3::new(0.0, -3.0, -20.0);
        let report = controller.step(&mut ground, DT);
        assert!((report.downforce - 400.0 * params.downforce_coefficient).abs() < 1e-3);
    }

    #[test]
    fn test_visual_pose_subtracts_offset() {
        let params = VehicleParams::default();
        let ground = FlatGround::for_vehicle(&params, Vec3::Y);
        let controller = VehicleController::new(params, &ground).unwrap();
        let pose = ChassisPose {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::PI),
        };
        let visual = controller.chassis_visual_pose(&pose);
        assert!(visual.position.abs_diff_eq(Vec3::new(1.0, 2.4, 3.0), 1e-5));
    }

    #[test]
    fn test_set_params_keeps_spin() {
        let params = VehicleParams::default();
        let (mut ground, mut controller) = settled(&params);
        ground.velocity.linear = ground.pose.forward() * 5.0;
        controller.step(&mut ground, DT);
        let angle = controller.wheels()[0].rotation_angle;
        assert!(angle > 0.0);

        controller
            .set_params(VehicleParams {
                wheel_radius: 0.4,
                ..params
            })
            .unwrap();
        assert_eq!(controller.wheels()[0].rotation_angle, angle);
        assert_eq!(controller.wheels()[0].radius, 0.4);
    }
}
