/// Gridded forecast fields.
///
/// A `GriddedField` is the in-memory form of one decoded WW3 or GFS product:
/// a float32 array indexed `[time, variable, lat, lon]` plus its coordinate
/// vectors. The GRIB/NetCDF decoding collaborator produces the raw arrays;
/// this module owns validation and coordinate resolution.
///
/// Coordinate names are resolved exactly once, at construction, against an
/// explicit `CoordinateSchema` declared by the decoder. Downstream code never
/// guesses axis names again — a grid that reaches the pipeline is guaranteed
/// to carry resolved latitude/longitude vectors.

use chrono::{DateTime, Utc};
use ndarray::Array4;
use std::collections::BTreeMap;

use crate::model::ForecastError;

// ---------------------------------------------------------------------------
// Coordinate schema
// ---------------------------------------------------------------------------

/// Names under which a decoder publishes its coordinate vectors.
///
/// GRIB products are inconsistent here ("lat" vs "latitude", "lon" vs
/// "longitude", "x"/"y" for projected grids), so the decoder that opened the
/// file declares the names it used and the schema is resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateSchema {
    pub latitude: String,
    pub longitude: String,
    /// `None` for fields without a time axis (e.g. a static bathymetry grid).
    pub time: Option<String>,
}

impl CoordinateSchema {
    pub fn new(latitude: &str, longitude: &str) -> Self {
        Self {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
            time: None,
        }
    }

    pub fn with_time(latitude: &str, longitude: &str, time: &str) -> Self {
        Self {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
            time: Some(time.to_string()),
        }
    }

    /// The names cfgrib-style decoders emit for WW3 and GFS products.
    pub fn cf_default() -> Self {
        Self::with_time("latitude", "longitude", "time")
    }
}

/// One coordinate vector as handed over by the decoder.
#[derive(Debug, Clone)]
pub enum RawCoordinate {
    Numeric(Vec<f64>),
    Time(Vec<DateTime<Utc>>),
}

// ---------------------------------------------------------------------------
// GriddedField
// ---------------------------------------------------------------------------

/// A decoded forecast field: `[time, variable, lat, lon]` values with
/// resolved coordinates. Read-only after construction.
///
/// Fields without a time axis are stored with a time dimension of length 1
/// and `time() == None`; the temporal aligner passes them through untouched.
#[derive(Debug, Clone)]
pub struct GriddedField {
    values: Array4<f32>,
    variables: Vec<String>,
    time: Option<Vec<DateTime<Utc>>>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
}

impl GriddedField {
    /// Builds a field from decoder output, resolving `schema` against the
    /// published coordinate vectors.
    ///
    /// Fails with `MissingCoordinate` when a name in the schema is absent
    /// from `coords` (or names a vector of the wrong kind), and with
    /// `ShapeMismatch` when any coordinate length disagrees with the
    /// corresponding array axis.
    pub fn from_raw(
        values: Array4<f32>,
        variables: Vec<String>,
        coords: &BTreeMap<String, RawCoordinate>,
        schema: &CoordinateSchema,
    ) -> Result<Self, ForecastError> {
        let latitudes = match coords.get(&schema.latitude) {
            Some(RawCoordinate::Numeric(v)) => v.clone(),
            _ => return Err(ForecastError::MissingCoordinate(schema.latitude.clone())),
        };
        let longitudes = match coords.get(&schema.longitude) {
            Some(RawCoordinate::Numeric(v)) => v.clone(),
            _ => return Err(ForecastError::MissingCoordinate(schema.longitude.clone())),
        };
        let time = match &schema.time {
            Some(name) => match coords.get(name) {
                Some(RawCoordinate::Time(v)) => Some(v.clone()),
                _ => return Err(ForecastError::MissingCoordinate(name.clone())),
            },
            None => None,
        };
        Self::from_parts(values, variables, time, latitudes, longitudes)
    }

    /// Builds a field from already-resolved coordinate vectors. This is the
    /// entry point for pipeline-internal construction (resampling, cropping)
    /// and for tests; the same axis-length invariants apply.
    pub fn from_parts(
        values: Array4<f32>,
        variables: Vec<String>,
        time: Option<Vec<DateTime<Utc>>>,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
    ) -> Result<Self, ForecastError> {
        let shape = values.shape();
        let time_len = time.as_ref().map(|t| t.len()).unwrap_or(1);
        if shape[0] != time_len {
            return Err(ForecastError::ShapeMismatch {
                context: "time coordinate vs time axis",
                expected: shape[0],
                actual: time_len,
            });
        }
        if shape[1] != variables.len() {
            return Err(ForecastError::ShapeMismatch {
                context: "variable list vs variable axis",
                expected: shape[1],
                actual: variables.len(),
            });
        }
        if shape[2] != latitudes.len() {
            return Err(ForecastError::ShapeMismatch {
                context: "latitude coordinate vs latitude axis",
                expected: shape[2],
                actual: latitudes.len(),
            });
        }
        if shape[3] != longitudes.len() {
            return Err(ForecastError::ShapeMismatch {
                context: "longitude coordinate vs longitude axis",
                expected: shape[3],
                actual: longitudes.len(),
            });
        }
        if let Some(t) = &time {
            if t.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ForecastError::InvalidCoordinate {
                    axis: "time",
                    reason: "must be strictly increasing",
                });
            }
        }
        if !is_monotonic(&latitudes) {
            return Err(ForecastError::InvalidCoordinate {
                axis: "latitude",
                reason: "must be monotonic",
            });
        }
        if !is_monotonic(&longitudes) {
            return Err(ForecastError::InvalidCoordinate {
                axis: "longitude",
                reason: "must be monotonic",
            });
        }
        Ok(Self {
            values,
            variables,
            time,
            latitudes,
            longitudes,
        })
    }

    pub fn values(&self) -> &Array4<f32> {
        &self.values
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Position of a variable in the channel axis, if present.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    pub fn time(&self) -> Option<&[DateTime<Utc>]> {
        self.time.as_deref()
    }

    pub fn has_time_axis(&self) -> bool {
        self.time.is_some()
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    /// Replaces the time axis and values, keeping spatial coordinates and
    /// variables. Used by the temporal aligner when resampling.
    pub(crate) fn resampled(
        &self,
        time: Vec<DateTime<Utc>>,
        values: Array4<f32>,
    ) -> Result<Self, ForecastError> {
        Self::from_parts(
            values,
            self.variables.clone(),
            Some(time),
            self.latitudes.clone(),
            self.longitudes.clone(),
        )
    }
}

/// Monotonic in either direction. GRIB latitude vectors commonly run
/// north-to-south; longitude is ascending in both encodings we accept.
fn is_monotonic(v: &[f64]) -> bool {
    v.len() < 2 || v.windows(2).all(|w| w[0] < w[1]) || v.windows(2).all(|w| w[0] > w[1])
}
