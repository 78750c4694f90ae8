/// Core data types for the wave forecast service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic beyond trait impls, no I/O, and no tensor math — only
/// types, constants, and the error taxonomy.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Physical variable codes
// ---------------------------------------------------------------------------

/// WW3 GRIB shortName for significant wave height, in meters.
/// Always channel 0 of the wave modality; forecast targets derive from it.
pub const VAR_SWH: &str = "swh";

/// WW3 GRIB shortName for mean wave period, in seconds.
pub const VAR_MWP: &str = "mwp";

/// WW3 GRIB shortName for mean wave direction, in degrees.
pub const VAR_MWD: &str = "mwd";

/// GFS GRIB shortName for 10 m eastward wind, in m/s.
pub const VAR_WIND_U: &str = "10u";

/// GFS GRIB shortName for 10 m northward wind, in m/s.
pub const VAR_WIND_V: &str = "10v";

/// GFS GRIB shortName for pressure reduced to mean sea level, in Pa.
pub const VAR_PRMSL: &str = "prmsl";

/// Wave-modality variables in channel order. SWH must stay first.
pub const WW3_VARIABLES: &[&str] = &[VAR_SWH, VAR_MWP, VAR_MWD];

/// Atmospheric-modality variables in channel order.
pub const GFS_VARIABLES: &[&str] = &[VAR_WIND_U, VAR_WIND_V, VAR_PRMSL];

// ---------------------------------------------------------------------------
// Forecast types
// ---------------------------------------------------------------------------

/// One model forecast for a single station: H predicted SWH values, one per
/// lead hour. `lead_hours` and `swh_m` are parallel arrays of equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub station_id: String,
    pub lead_hours: Vec<u32>,
    pub swh_m: Vec<f32>,
}

impl ForecastResult {
    /// Number of horizon steps in this forecast.
    pub fn horizon(&self) -> usize {
        self.swh_m.len()
    }
}

// ---------------------------------------------------------------------------
// Alert types
// ---------------------------------------------------------------------------

/// A threshold evaluation of one forecast. Immutable once created.
///
/// `exceed` is parallel to `swh` and encodes each comparison as 0/1, which
/// is also the wire encoding expected by downstream webhook consumers:
///
/// ```json
/// {"station_id": "46042", "threshold_m": 4.0,
///  "lead_hours": [1,2,3], "swh": [3.9,4.0,4.5], "exceed": [0,1,1]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub station_id: String,
    pub threshold_m: f32,
    pub lead_hours: Vec<u32>,
    pub swh: Vec<f32>,
    pub exceed: Vec<u8>,
}

impl AlertEvent {
    /// True if any horizon step meets or exceeds the threshold.
    pub fn any_exceedance(&self) -> bool {
        self.exceed.iter().any(|&e| e != 0)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while assembling samples or running inference.
///
/// Two conditions deliberately do NOT appear here:
/// - insufficient history produces an empty `SampleSet`, not an error, so
///   callers can tell "no data yet" apart from a hard failure;
/// - webhook delivery failure is reported as `DeliveryStatus::Unconfirmed`
///   because the evaluation itself already succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// The coordinate schema names an axis the raw grid does not carry.
    MissingCoordinate(String),
    /// Two arrays that must be parallel have different lengths.
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A spatial axis is shorter than the requested patch size.
    GridTooSmall {
        axis: &'static str,
        len: usize,
        patch_size: usize,
    },
    /// Under `BoundaryPolicy::Reject`, the centered window would leave the grid.
    PatchOutOfBounds {
        axis: &'static str,
        center: usize,
        patch_size: usize,
        len: usize,
    },
    /// A coordinate vector violates its ordering contract.
    InvalidCoordinate {
        axis: &'static str,
        reason: &'static str,
    },
    /// An operation that needs at least one element received none.
    EmptyInput(&'static str),
    /// The sample archive on disk is internally inconsistent or unreadable.
    ArchiveError(String),
}

impl std::fmt::Display for ForecastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForecastError::MissingCoordinate(name) => {
                write!(f, "grid is missing coordinate '{}'", name)
            }
            ForecastError::ShapeMismatch {
                context,
                expected,
                actual,
            } => write!(
                f,
                "shape mismatch in {}: expected {}, got {}",
                context, expected, actual
            ),
            ForecastError::GridTooSmall {
                axis,
                len,
                patch_size,
            } => write!(
                f,
                "{} axis has {} points, smaller than patch size {}",
                axis, len, patch_size
            ),
            ForecastError::PatchOutOfBounds {
                axis,
                center,
                patch_size,
                len,
            } => write!(
                f,
                "patch of size {} centered at {} index {} runs off the grid (axis length {})",
                patch_size, axis, center, len
            ),
            ForecastError::InvalidCoordinate { axis, reason } => {
                write!(f, "invalid {} coordinate: {}", axis, reason)
            }
            ForecastError::EmptyInput(what) => write!(f, "empty input: {}", what),
            ForecastError::ArchiveError(msg) => write!(f, "sample archive error: {}", msg),
        }
    }
}

impl std::error::Error for ForecastError {}
