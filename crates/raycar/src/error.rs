//! Error types for the raycar crate.

use std::fmt;

/// Result type for raycar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or configuring a vehicle or track.
///
/// Per-step query failures never surface here; they are reported as
/// [`BackendError`] and absorbed by the controller.
#[derive(Debug)]
pub enum Error {
    /// A vehicle parameter failed validation.
    InvalidParams {
        /// The offending field.
        field: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// The chassis body could not be queried at construction time.
    ChassisUnavailable {
        /// The backend's description of the failure.
        detail: String,
    },
    /// A scene object had no world transform, so no collider can be placed.
    MissingTransform {
        /// Name of the scene object.
        object: String,
    },
    /// Elevation data for a heightfield collider was malformed.
    InvalidHeightfield {
        /// Description of what was invalid.
        detail: String,
    },
    /// Tuning data could not be serialized or deserialized.
    Persistence(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParams { field, detail } => {
                write!(f, "invalid vehicle parameter {field}: {detail}")
            }
            Error::ChassisUnavailable { detail } => {
                write!(f, "chassis body unavailable: {detail}")
            }
            Error::MissingTransform { object } => {
                write!(f, "scene object {object:?} has no world transform")
            }
            Error::InvalidHeightfield { detail } => {
                write!(f, "invalid heightfield: {detail}")
            }
            Error::Persistence(e) => write!(f, "tuning persistence error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(e)
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Error::ChassisUnavailable { detail: e.0 }
    }
}

/// A recoverable failure reported by a physics backend query.
///
/// The controller logs these and keeps the previous frame's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError(pub String);

impl BackendError {
    /// Create a backend error from any displayable message.
    pub fn new(message: impl fmt::Display) -> Self {
        Self(message.to_string())
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend query failed: {}", self.0)
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_field() {
        let err = Error::InvalidParams {
            field: "chassis_mass",
            detail: "must be positive".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid vehicle parameter chassis_mass: must be positive"
        );
    }

    #[test]
    fn test_backend_error_converts_to_chassis_unavailable() {
        let err: Error = BackendError::new("body removed").into();
        assert!(matches!(err, Error::ChassisUnavailable { ref detail } if detail == "body removed"));
    }
}
