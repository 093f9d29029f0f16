//! Headless vehicle tuner.
//!
//! Runs the raycast controller over a flat plane with fixed inputs and prints
//! per-step telemetry CSV on stdout, followed by a summary on stderr.
//!
//! Run with: cargo run -p raycar-sandbox --bin vehicle-tuning -- --params car.json

use std::path::PathBuf;

use clap::Parser;
use glam::Vec3;
use raycar::{
    ControlState, DriveType, FlatGround, VehicleController, VehicleParams,
    telemetry::{StdoutTelemetryOutput, TelemetrySnapshot, emit_telemetry_to, reset_telemetry_to},
};

/// Time spent settling on the suspension before inputs are applied.
const SETTLE_TIME: f32 = 2.0;

/// Reference speed for the acceleration measurement (100 km/h).
const REFERENCE_SPEED: f32 = 100.0 / 3.6;

#[derive(Parser)]
#[command(about = "Headless raycast vehicle tuner")]
struct CliArgs {
    /// Vehicle parameters as JSON. Missing fields take their defaults.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Override the drive layout (FWD, RWD or AWD).
    #[arg(long)]
    drive_type: Option<DriveType>,

    /// Seconds of driving after the settle phase.
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    /// Hold the accelerator.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    throttle: bool,

    /// Steer while driving: -1 left, 0 straight, 1 right.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    steer: i8,

    /// Step length in seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Write the effective parameters as JSON to this file and exit.
    #[arg(long)]
    write_params: Option<PathBuf>,
}

/// Measurements accumulated over a run.
#[derive(Default)]
struct MeasurementResults {
    settled_height: f32,
    settled_grounded: usize,
    max_speed: f32,
    time_to_reference: Option<f32>,
    failed_wheel_steps: usize,
    airborne_steps: usize,
}

fn load_params(args: &CliArgs) -> Result<VehicleParams, String> {
    let mut params = match &args.params {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            VehicleParams::from_json(&json).map_err(|e| format!("{}: {e}", path.display()))?
        }
        None => VehicleParams::default(),
    };
    if let Some(drive) = args.drive_type {
        params.drive_type = drive;
    }
    Ok(params)
}

fn driving_controls(args: &CliArgs) -> ControlState {
    ControlState {
        accelerate: args.throttle,
        turn_left: args.steer < 0,
        turn_right: args.steer > 0,
        ..Default::default()
    }
}

fn run(args: &CliArgs, params: VehicleParams) -> Result<MeasurementResults, String> {
    let spawn_height = params.chassis_half_extents.y + params.suspension_rest_length;
    let mut ground = FlatGround::for_vehicle(&params, Vec3::new(0.0, spawn_height, 0.0));
    let mut controller = VehicleController::new(params, &ground).map_err(|e| e.to_string())?;
    let mut results = MeasurementResults::default();
    let mut output = StdoutTelemetryOutput;
    reset_telemetry_to(&mut output);

    eprintln!("# Settling for {SETTLE_TIME:.1} s...");
    let drive = driving_controls(args);
    let mut elapsed = 0.0;
    let total = SETTLE_TIME + args.seconds;

    while elapsed < total {
        let driving = elapsed >= SETTLE_TIME;
        if driving {
            controller.set_controls(&drive);
        } else {
            controller.set_controls(&ControlState::default());
        }

        let report = controller.step(&mut ground, args.dt);
        ground.integrate(report.dt);
        elapsed += report.dt;

        let snapshot = TelemetrySnapshot::capture(
            elapsed,
            &report,
            &controller,
            &ground.pose,
            &ground.velocity,
        );
        emit_telemetry_to(&snapshot, &mut output);

        results.failed_wheel_steps += usize::from(report.failed_wheels > 0);
        if !driving {
            results.settled_height = ground.pose.position.y;
            results.settled_grounded = report.grounded_wheels;
            continue;
        }

        results.airborne_steps += usize::from(report.grounded_wheels == 0);
        let speed = report.forward_speed.abs();
        results.max_speed = results.max_speed.max(speed);
        if results.time_to_reference.is_none() && speed >= REFERENCE_SPEED {
            results.time_to_reference = Some(elapsed - SETTLE_TIME);
        }
    }

    Ok(results)
}

fn print_summary(params: &VehicleParams, results: &MeasurementResults) {
    eprintln!();
    eprintln!("# === {:?}, {:.0} kg ===", params.drive_type, params.chassis_mass);
    eprintln!("# Suspension:");
    eprintln!("#   Settled chassis height: {:.3} m", results.settled_height);
    eprintln!(
        "#   Grounded wheels at rest: {}/4",
        results.settled_grounded
    );
    eprintln!("# Speed:");
    eprintln!(
        "#   Max Speed: {:.1} m/s ({:.1} km/h)",
        results.max_speed,
        results.max_speed * 3.6
    );
    if let Some(time) = results.time_to_reference {
        eprintln!("#   0-100 km/h: {time:.2} s");
    } else {
        eprintln!("#   0-100 km/h: (not reached)");
    }
    eprintln!("#   Airborne steps: {}", results.airborne_steps);
    if results.failed_wheel_steps > 0 {
        eprintln!("#   Steps with failed wheel queries: {}", results.failed_wheel_steps);
    }
}

fn main() {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }

    let args = CliArgs::parse();
    let params = match load_params(&args) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.write_params {
        let written = params
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("ERROR: failed to write {}: {e}", path.display());
            std::process::exit(1);
        }
        eprintln!("# Wrote parameters to {}", path.display());
        return;
    }

    if !(args.dt.is_finite() && args.dt > 0.0) {
        eprintln!("ERROR: --dt must be positive");
        std::process::exit(1);
    }

    match run(&args, params.clone()) {
        Ok(results) => print_summary(&params, &results),
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["vehicle-tuning"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_default_run_settles_and_accelerates() {
        let args = args(&["--seconds", "3"]);
        let results = run(&args, VehicleParams::default()).unwrap();

        assert_eq!(results.settled_grounded, 4);
        assert!(results.max_speed > 3.0, "max speed {}", results.max_speed);
        assert_eq!(results.failed_wheel_steps, 0);
    }

    #[test]
    fn test_steer_flag() {
        let controls = driving_controls(&args(&["--steer", "-1"]));
        assert!(controls.turn_left);
        assert!(!controls.turn_right);
        assert!(controls.accelerate);
    }

    #[test]
    fn test_drive_type_override() {
        let params = load_params(&args(&["--drive-type", "FWD"])).unwrap();
        assert_eq!(params.drive_type, DriveType::Fwd);
    }
}
