//! Vehicle tuning parameters.
//!
//! Stored as a flat JSON record. Missing keys fall back to defaults, and the
//! camelCase names used by older tuning files are accepted as aliases.

use std::f32::consts::FRAC_PI_6;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of wheels on every vehicle.
pub const WHEEL_COUNT: usize = 4;

/// Index of the front-left wheel.
pub const FRONT_LEFT: usize = 0;
/// Index of the front-right wheel.
pub const FRONT_RIGHT: usize = 1;
/// Index of the rear-left wheel.
pub const REAR_LEFT: usize = 2;
/// Index of the rear-right wheel.
pub const REAR_RIGHT: usize = 3;

/// Which wheels receive engine force.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveType {
    /// Front-wheel drive.
    #[serde(rename = "FWD", alias = "fwd")]
    Fwd,
    /// Rear-wheel drive.
    #[default]
    #[serde(rename = "RWD", alias = "rwd")]
    Rwd,
    /// All-wheel drive.
    #[serde(rename = "AWD", alias = "awd")]
    Awd,
}

impl DriveType {
    /// Number of wheels sharing the engine force.
    pub fn driven_wheel_count(self) -> usize {
        match self {
            DriveType::Fwd | DriveType::Rwd => 2,
            DriveType::Awd => 4,
        }
    }

    /// Whether the wheel at `index` is driven.
    pub fn drives(self, index: usize) -> bool {
        let front = index == FRONT_LEFT || index == FRONT_RIGHT;
        match self {
            DriveType::Fwd => front,
            DriveType::Rwd => !front,
            DriveType::Awd => true,
        }
    }
}

impl std::str::FromStr for DriveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FWD" => Ok(DriveType::Fwd),
            "RWD" => Ok(DriveType::Rwd),
            "AWD" => Ok(DriveType::Awd),
            other => Err(Error::InvalidParams {
                field: "drive_type",
                detail: format!("unknown drive type {other:?}"),
            }),
        }
    }
}

/// Complete tuning record for one vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Chassis mass in kg.
    #[serde(alias = "vehicleMass", alias = "chassisMass")]
    pub chassis_mass: f32,
    /// Chassis collider half extents.
    pub chassis_half_extents: Vec3,
    /// Spring stiffness (per unit compression, scaled by mass).
    #[serde(alias = "suspensionStiffness")]
    pub suspension_stiffness: f32,
    /// Suspension rest length in meters.
    #[serde(alias = "suspensionRestLength")]
    pub suspension_rest_length: f32,
    /// Damping applied while the spring compresses.
    #[serde(alias = "dampingCompression")]
    pub suspension_compression_damping: f32,
    /// Damping applied while the spring extends.
    #[serde(alias = "dampingRelaxation")]
    pub suspension_relaxation_damping: f32,
    /// Extra ray reach beyond rest length, in meters.
    #[serde(alias = "maxSuspensionTravel")]
    pub max_suspension_travel: f32,
    /// Upper clamp on the spring force, in N.
    #[serde(alias = "maxSuspensionForce")]
    pub max_suspension_force: f32,
    /// Base tire friction coefficient.
    #[serde(alias = "frictionSlip")]
    pub friction_slip: f32,
    /// Full-lock steering angle in radians.
    #[serde(alias = "maxSteeringAngle")]
    pub max_steering_angle: f32,
    /// Total engine force, split across the driven wheels.
    #[serde(alias = "enginePower", alias = "engineForce")]
    pub engine_force: f32,
    /// Brake strength per wheel, as an impulse (N·s) per 60 Hz step.
    #[serde(alias = "brakePower", alias = "brakeForce")]
    pub brake_force: f32,
    /// Multiplier on `brake_force` for the rear wheels under handbrake.
    pub handbrake_multiplier: f32,
    /// How far toward the center of mass friction forces act (0 = at the
    /// center of mass, 1 = at the contact point). Lower values reduce body roll.
    #[serde(alias = "rollInfluence")]
    pub roll_influence: f32,
    /// Drive layout.
    #[serde(alias = "driveType")]
    pub drive_type: DriveType,
    /// Downforce per (m/s)².
    #[serde(alias = "downforceCoefficient")]
    pub downforce_coefficient: f32,
    /// Horizontal speed above which downforce applies, in m/s.
    pub downforce_speed_threshold: f32,
    /// Chassis linear damping.
    #[serde(alias = "linearDamping")]
    pub linear_damping: f32,
    /// Chassis angular damping.
    #[serde(alias = "angularDamping")]
    pub angular_damping: f32,
    /// Offset from the rigid body origin to the visual model origin.
    pub visual_offset: Vec3,
    /// Wheel radius in meters.
    #[serde(alias = "wheelRadius")]
    pub wheel_radius: f32,
    /// Wheel width in meters (visual only).
    #[serde(alias = "wheelWidth")]
    pub wheel_width: f32,
    /// Wheel mounts in chassis space: FL, FR, RL, RR.
    pub wheel_connection_points: [Vec3; WHEEL_COUNT],
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            chassis_mass: 653.0,
            chassis_half_extents: Vec3::new(1.25, 0.4, 2.25),
            suspension_stiffness: 55.0,
            suspension_rest_length: 0.5,
            suspension_compression_damping: 4.3,
            suspension_relaxation_damping: 2.3,
            max_suspension_travel: 1.0,
            max_suspension_force: 10_000.0,
            friction_slip: 30.0,
            max_steering_angle: FRAC_PI_6,
            engine_force: 2750.0,
            brake_force: 36.0,
            handbrake_multiplier: 2.5,
            roll_influence: 0.01,
            drive_type: DriveType::Rwd,
            downforce_coefficient: 0.3,
            downforce_speed_threshold: 10.0,
            linear_damping: 0.1,
            angular_damping: 0.5,
            visual_offset: Vec3::new(0.0, -0.4, 0.0),
            wheel_radius: 0.34,
            wheel_width: 0.2,
            // Vehicle forward is -Z, so the front axle sits at negative z.
            wheel_connection_points: [
                Vec3::new(-0.85, -0.15, -1.4),
                Vec3::new(0.85, -0.15, -1.4),
                Vec3::new(-0.85, -0.15, 1.4),
                Vec3::new(0.85, -0.15, 1.4),
            ],
        }
    }
}

impl VehicleParams {
    /// Engine force delivered to each driven wheel at full throttle.
    pub fn engine_force_per_wheel(&self) -> f32 {
        // driven_wheel_count is 2 or 4.
        #[allow(clippy::cast_precision_loss)]
        let count = self.drive_type.driven_wheel_count() as f32;
        self.engine_force / count
    }

    /// Maximum ray length for each wheel.
    pub fn ray_length(&self) -> f32 {
        self.suspension_rest_length + self.max_suspension_travel + self.wheel_radius
    }

    /// Check every field for values that would make the simulation diverge.
    pub fn validate(&self) -> Result<()> {
        positive("chassis_mass", self.chassis_mass)?;
        positive("suspension_rest_length", self.suspension_rest_length)?;
        positive("wheel_radius", self.wheel_radius)?;
        positive("friction_slip", self.friction_slip)?;
        non_negative("suspension_stiffness", self.suspension_stiffness)?;
        non_negative(
            "suspension_compression_damping",
            self.suspension_compression_damping,
        )?;
        non_negative(
            "suspension_relaxation_damping",
            self.suspension_relaxation_damping,
        )?;
        non_negative("max_suspension_travel", self.max_suspension_travel)?;
        non_negative("max_suspension_force", self.max_suspension_force)?;
        non_negative("max_steering_angle", self.max_steering_angle)?;
        non_negative("engine_force", self.engine_force)?;
        non_negative("brake_force", self.brake_force)?;
        non_negative("handbrake_multiplier", self.handbrake_multiplier)?;
        non_negative("roll_influence", self.roll_influence)?;
        non_negative("downforce_coefficient", self.downforce_coefficient)?;
        non_negative("downforce_speed_threshold", self.downforce_speed_threshold)?;
        non_negative("linear_damping", self.linear_damping)?;
        non_negative("angular_damping", self.angular_damping)?;

        if !self.chassis_half_extents.is_finite() || self.chassis_half_extents.min_element() <= 0.0
        {
            return Err(Error::InvalidParams {
                field: "chassis_half_extents",
                detail: format!("must be positive, got {}", self.chassis_half_extents),
            });
        }
        if !self.visual_offset.is_finite() {
            return Err(Error::InvalidParams {
                field: "visual_offset",
                detail: "must be finite".into(),
            });
        }
        if let Some(point) = self.wheel_connection_points.iter().find(|p| !p.is_finite()) {
            return Err(Error::InvalidParams {
                field: "wheel_connection_points",
                detail: format!("non-finite mount {point}"),
            });
        }
        Ok(())
    }

    /// Parse a tuning record, filling absent keys from defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Serialize to a pretty-printed tuning record.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn positive(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParams {
            field,
            detail: format!("must be positive, got {value}"),
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParams {
            field,
            detail: format!("must be non-negative, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        VehicleParams::default().validate().unwrap();
    }

    #[test]
    fn test_engine_force_split() {
        let mut params = VehicleParams {
            engine_force: 2000.0,
            ..Default::default()
        };
        params.drive_type = DriveType::Rwd;
        assert_eq!(params.engine_force_per_wheel(), 1000.0);
        params.drive_type = DriveType::Awd;
        assert_eq!(params.engine_force_per_wheel(), 500.0);
    }

    #[test]
    fn test_drives() {
        assert!(DriveType::Fwd.drives(FRONT_LEFT));
        assert!(!DriveType::Fwd.drives(REAR_RIGHT));
        assert!(DriveType::Rwd.drives(REAR_LEFT));
        assert!(!DriveType::Rwd.drives(FRONT_RIGHT));
        assert!((0..WHEEL_COUNT).all(|i| DriveType::Awd.drives(i)));
    }

    #[test]
    fn test_json_round_trip() {
        let params = VehicleParams {
            chassis_mass: 812.25,
            friction_slip: 1.8,
            drive_type: DriveType::Awd,
            ..Default::default()
        };
        let json = params.to_json().unwrap();
        let restored = VehicleParams::from_json(&json).unwrap();
        assert_eq!(restored, params);
        assert_eq!(restored.drive_type, DriveType::Awd);
    }

    #[test]
    fn test_legacy_keys_merge_over_defaults() {
        let json = r#"{
            "enginePower": 3100,
            "vehicleMass": 700,
            "brakePower": 40,
            "suspensionStiffness": 60,
            "dampingRelaxation": 5,
            "dampingCompression": 3,
            "driveType": "FWD"
        }"#;
        let params = VehicleParams::from_json(json).unwrap();
        assert_eq!(params.engine_force, 3100.0);
        assert_eq!(params.chassis_mass, 700.0);
        assert_eq!(params.brake_force, 40.0);
        assert_eq!(params.suspension_stiffness, 60.0);
        assert_eq!(params.suspension_relaxation_damping, 5.0);
        assert_eq!(params.suspension_compression_damping, 3.0);
        assert_eq!(params.drive_type, DriveType::Fwd);
        // Untouched keys keep their defaults.
        assert_eq!(params.wheel_radius, 0.34);
    }

    #[test]
    fn test_validate_rejects_bad_mass() {
        let params = VehicleParams {
            chassis_mass: 0.0,
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParams {
                field: "chassis_mass",
                ..
            }
        ));

        let params = VehicleParams {
            suspension_stiffness: f32::NAN,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_drive_type_from_str() {
        assert_eq!("awd".parse::<DriveType>().unwrap(), DriveType::Awd);
        assert!("4wd".parse::<DriveType>().is_err());
    }
}
