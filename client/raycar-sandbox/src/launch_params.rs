//! Launch parameter parsing for the sandbox.

use std::path::PathBuf;

use clap::Parser;
use raycar::{DriveType, VehicleParams};

#[derive(Parser, Debug)]
#[command(about = "Raycast vehicle sandbox")]
struct CliArgs {
    /// Vehicle parameters as JSON. Missing fields take their defaults.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Override the drive layout (FWD, RWD or AWD).
    #[arg(long)]
    drive_type: Option<DriveType>,

    /// Write per-step telemetry CSV to this file.
    #[arg(long)]
    telemetry: Option<PathBuf>,
}

/// Launch parameters for the sandbox.
#[derive(Debug, Default)]
pub struct LaunchParams {
    /// Vehicle to spawn.
    pub params: VehicleParams,
    /// Telemetry destination, if any.
    pub telemetry: Option<PathBuf>,
}

/// Read a parameter file, or the defaults when `path` is `None`.
pub fn load_params(path: Option<&PathBuf>) -> Result<VehicleParams, String> {
    let Some(path) = path else {
        return Ok(VehicleParams::default());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    VehicleParams::from_json(&json).map_err(|e| format!("{}: {e}", path.display()))
}

/// Parse launch parameters from the command line.
///
/// Exits the process on an unreadable or invalid parameter file.
pub fn parse() -> LaunchParams {
    let args = CliArgs::parse();

    let mut params = match load_params(args.params.as_ref()) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    };
    if let Some(drive) = args.drive_type {
        params.drive_type = drive;
    }

    LaunchParams {
        params,
        telemetry: args.telemetry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_params_defaults_without_path() {
        let params = load_params(None).unwrap();
        assert_eq!(params.drive_type, VehicleParams::default().drive_type);
    }

    #[test]
    fn test_load_params_missing_file() {
        let path = PathBuf::from("/nonexistent/raycar-params.json");
        let err = load_params(Some(&path)).unwrap_err();
        assert!(err.contains("failed to read"));
    }

    #[test]
    fn test_cli_drive_override() {
        let args = CliArgs::parse_from(["raycar-sandbox", "--drive-type", "awd"]);
        assert_eq!(args.drive_type, Some(DriveType::Awd));
        assert!(args.params.is_none());
    }
}
