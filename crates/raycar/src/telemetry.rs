//! Vehicle telemetry as CSV.
//!
//! One row per controller step. Rows go to any [`TelemetryOutput`]; the tuner
//! writes to stdout, the sandbox app to a file.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use glam::{EulerRot, Vec3};

use crate::{
    backend::{ChassisPose, ChassisVelocity},
    controller::{StepReport, VehicleController},
    params::WHEEL_COUNT,
};

/// Per-wheel values in a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelSample {
    /// Ray hit the ground this step.
    pub grounded: bool,
    /// Suspension compression in `[0, 1]`.
    pub compression: f32,
    /// Suspension force (N).
    pub force: f32,
    /// Tire slip factor.
    pub slip: f32,
    /// Spin rate (rad/s).
    pub spin: f32,
}

/// Snapshot of vehicle state for one telemetry row.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetrySnapshot {
    /// Simulated seconds since the run started.
    pub elapsed: f32,
    /// Step length actually used.
    pub dt: f32,
    /// Throttle input.
    pub throttle: f32,
    /// Brake input.
    pub brake: f32,
    /// Steering input, positive right.
    pub steer: f32,
    /// Handbrake held.
    pub handbrake: bool,
    /// Chassis position.
    pub position: Vec3,
    /// Chassis rotation as `[x, y, z, w]`.
    pub rotation: [f32; 4],
    /// Chassis linear velocity.
    pub linear_vel: Vec3,
    /// Chassis angular velocity.
    pub angular_vel: Vec3,
    /// Speed along the chassis forward axis.
    pub forward_speed: f32,
    /// Downforce applied this step.
    pub downforce: f32,
    /// Sum of suspension impulses this step.
    pub suspension_impulse: Vec3,
    /// Sum of tire impulses this step.
    pub friction_impulse: Vec3,
    /// Per-wheel values, front-left first.
    pub wheels: [WheelSample; WHEEL_COUNT],
}

impl TelemetrySnapshot {
    /// Capture the state after a step.
    pub fn capture(
        elapsed: f32,
        report: &StepReport,
        controller: &VehicleController,
        pose: &ChassisPose,
        velocity: &ChassisVelocity,
    ) -> Self {
        let wheels = controller.wheels().each_ref().map(|w| WheelSample {
            grounded: w.is_grounded,
            compression: w.compression,
            force: w.suspension_force,
            slip: w.slip_factor,
            spin: w.rotation_speed,
        });
        Self {
            elapsed,
            dt: report.dt,
            throttle: report.intent.throttle,
            brake: report.intent.brake,
            steer: report.intent.steer,
            handbrake: report.intent.handbrake,
            position: pose.position,
            rotation: pose.rotation.to_array(),
            linear_vel: velocity.linear,
            angular_vel: velocity.angular,
            forward_speed: report.forward_speed,
            downforce: report.downforce,
            suspension_impulse: report.suspension_impulse,
            friction_impulse: report.friction_impulse,
            wheels,
        }
    }
}

/// Trait for telemetry output destinations.
pub trait TelemetryOutput {
    /// Write the CSV header.
    fn write_header(&mut self, header: &str);
    /// Write a data row.
    fn write_row(&mut self, row: &str);
}

/// Buffered CSV file.
pub struct FileTelemetryOutput {
    writer: BufWriter<File>,
}

impl FileTelemetryOutput {
    /// Create or truncate the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl TelemetryOutput for FileTelemetryOutput {
    fn write_header(&mut self, header: &str) {
        let _ = writeln!(self.writer, "{header}");
    }

    fn write_row(&mut self, row: &str) {
        let _ = writeln!(self.writer, "{row}");
    }
}

/// Stdout output for the headless tuner.
pub struct StdoutTelemetryOutput;

impl TelemetryOutput for StdoutTelemetryOutput {
    fn write_header(&mut self, header: &str) {
        println!("{header}");
    }

    fn write_row(&mut self, row: &str) {
        println!("{row}");
    }
}

/// In-memory lines, header first.
impl TelemetryOutput for Vec<String> {
    fn write_header(&mut self, header: &str) {
        self.push(header.to_owned());
    }

    fn write_row(&mut self, row: &str) {
        self.push(row.to_owned());
    }
}

/// Define the CSV schema once and generate the writers from it, so column
/// names and formats stay in sync.
macro_rules! define_telemetry {
    (
        columns: { $( $name:ident : $fmt:literal ),* $(,)? },
        prelude: |$snapshot:ident| { $( $prelude:stmt );* $(;)? },
        row_values: { $( $val:expr ),* $(,)? }
    ) => {
        /// CSV header string.
        const CSV_HEADER: &str = concat!( $( stringify!($name), "," ),* );

        /// Write the header to `output`.
        pub fn reset_telemetry_to(output: &mut dyn TelemetryOutput) {
            output.write_header(CSV_HEADER.trim_end_matches(','));
        }

        /// Write one row to `output`.
        #[allow(clippy::redundant_closure_call)]
        pub fn emit_telemetry_to($snapshot: &TelemetrySnapshot, output: &mut dyn TelemetryOutput) {
            $( $prelude )*

            let line = format!( concat!( $( $fmt, "," ),* ), $( $val ),* );
            output.write_row(line.trim_end_matches(','));
        }
    };
}

define_telemetry! {
    columns: {
        t: "{:.4}",
        dt: "{:.5}",
        throttle: "{:.2}",
        brake: "{:.2}",
        steer: "{:.2}",
        handbrake: "{}",
        pos_x: "{:.3}",
        pos_y: "{:.3}",
        pos_z: "{:.3}",
        pitch_deg: "{:.2}",
        yaw_deg: "{:.2}",
        roll_deg: "{:.2}",
        speed: "{:.2}",
        fwd_speed: "{:.2}",
        ang_x: "{:.3}",
        ang_y: "{:.3}",
        ang_z: "{:.3}",
        downforce: "{:.1}",
        susp_y: "{:.2}",
        tire_x: "{:.2}",
        tire_z: "{:.2}",
        grounded: "{}",
        fl_comp: "{:.3}",
        fl_force: "{:.1}",
        fl_slip: "{:.2}",
        fl_spin: "{:.2}",
        fr_comp: "{:.3}",
        fr_force: "{:.1}",
        fr_slip: "{:.2}",
        fr_spin: "{:.2}",
        rl_comp: "{:.3}",
        rl_force: "{:.1}",
        rl_slip: "{:.2}",
        rl_spin: "{:.2}",
        rr_comp: "{:.3}",
        rr_force: "{:.1}",
        rr_slip: "{:.2}",
        rr_spin: "{:.2}",
    },
    prelude: |t| {
        let quat = glam::Quat::from_array(t.rotation);
        let (yaw, pitch, roll) = quat.to_euler(EulerRot::YXZ);
        let grounded = t.wheels.iter().filter(|w| w.grounded).count();
        let [fl, fr, rl, rr] = t.wheels;
    },
    row_values: {
        t.elapsed,
        t.dt,
        t.throttle,
        t.brake,
        t.steer,
        u8::from(t.handbrake),
        t.position.x,
        t.position.y,
        t.position.z,
        pitch.to_degrees(),
        yaw.to_degrees(),
        roll.to_degrees(),
        t.linear_vel.length(),
        t.forward_speed,
        t.angular_vel.x,
        t.angular_vel.y,
        t.angular_vel.z,
        t.downforce,
        t.suspension_impulse.y,
        t.friction_impulse.x,
        t.friction_impulse.z,
        grounded,
        fl.compression,
        fl.force,
        fl.slip,
        fl.spin,
        fr.compression,
        fr.force,
        fr.slip,
        fr.spin,
        rl.compression,
        rl.force,
        rl.slip,
        rl.spin,
        rr.compression,
        rr.force,
        rr.slip,
        rr.spin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{params::VehicleParams, sandbox::FlatGround};

    #[test]
    fn test_header_and_row_have_same_columns() {
        let params = VehicleParams::default();
        let mut ground = FlatGround::for_vehicle(&params, Vec3::new(0.0, 1.0, 0.0));
        let mut controller = VehicleController::new(params, &ground).unwrap();
        let report = controller.step(&mut ground, 1.0 / 60.0);
        let snapshot =
            TelemetrySnapshot::capture(0.0, &report, &controller, &ground.pose, &ground.velocity);

        let mut lines = Vec::new();
        reset_telemetry_to(&mut lines);
        emit_telemetry_to(&snapshot, &mut lines);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("t,dt,throttle"));
        assert!(!lines[0].ends_with(','));
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
    }
}
