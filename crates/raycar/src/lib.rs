//! Raycast vehicle dynamics with collision classification.
//!
//! This crate simulates a four-wheeled vehicle as one rigid chassis plus four
//! raycast wheels, derives collider descriptions for track geometry, and
//! routes engine contacts to typed handlers and impact feedback.
//!
//! # Design principles
//!
//! - **Engine-agnostic**: the rigid-body engine sits behind [`VehicleBackend`];
//!   colliders are plain [`ColliderDescriptor`]s the caller turns into engine shapes
//! - **No globals**: [`Simulation`] owns classification and feedback state
//! - **Step-isolated failures**: a failed wheel query keeps last frame's state
//!   instead of aborting the step
//!
//! # Example
//!
//! ```ignore
//! use raycar::{ControlState, FlatGround, VehicleController, VehicleParams};
//!
//! let params = VehicleParams::default();
//! let mut ground = FlatGround::for_vehicle(&params, glam::Vec3::Y);
//! let mut controller = VehicleController::new(params, &ground)?;
//!
//! controller.set_controls(&ControlState { accelerate: true, ..Default::default() });
//! let report = controller.step(&mut ground, 1.0 / 60.0);
//! ground.integrate(report.dt);
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod collider;
pub mod collision;
mod control;
pub mod controller;
mod error;
pub mod feedback;
pub mod params;
pub mod sandbox;
pub mod telemetry;
pub mod track;
pub mod wheel;

pub use backend::{ChassisPose, ChassisVelocity, RayHit, VehicleBackend};
pub use collider::{ColliderBuilder, ColliderDescriptor, ColliderPresets, ColliderShape, MeshSource};
pub use collision::{CollisionClassifier, CollisionEvent, CollisionType, Contact, ContactPhase};
pub use control::ControlState;
pub use controller::{DriveIntent, StepReport, VehicleController};
pub use error::{BackendError, Error, Result};
pub use feedback::{FeedbackDispatcher, FeedbackEvent, FeedbackSink, ImpactTier};
pub use params::{DriveType, VehicleParams};
pub use sandbox::FlatGround;
pub use track::{Simulation, build_track, classify_name};
pub use wheel::WheelState;
