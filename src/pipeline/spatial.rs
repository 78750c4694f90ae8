/// Buoy-centered patch extraction.
///
/// Crops a fixed P×P spatial window out of a gridded field, centered as
/// closely as the grid allows on a target (lat, lon). Latitude and longitude
/// are located independently by 1-D nearest-neighbor lookup; this is not a
/// great-circle nearest gridpoint, and does not need to be at the 0.25°-0.5°
/// resolutions WW3 and GFS publish.

use ndarray::s;

use crate::grid::GriddedField;
use crate::model::ForecastError;

// ---------------------------------------------------------------------------
// Boundary policy
// ---------------------------------------------------------------------------

/// What to do when the centered window would run off the grid edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryPolicy {
    /// Shift the window inward so it stays on-grid. The patch keeps its full
    /// P×P extent but is no longer centered on the target. This mirrors how
    /// operational products are windowed near basin edges.
    #[default]
    Clamp,
    /// Fail with `PatchOutOfBounds` instead of shifting. Useful when an
    /// off-center patch would silently degrade a downstream product.
    Reject,
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// A P×P crop of a `GriddedField`. Immutable once produced.
#[derive(Debug, Clone)]
pub struct Patch {
    /// The cropped field: same variables and time axis, spatial axes of
    /// length `patch_size`.
    pub field: GriddedField,
    /// Index in the source field where the patch's latitude axis begins.
    pub lat_start: usize,
    /// Index in the source field where the patch's longitude axis begins.
    pub lon_start: usize,
}

impl Patch {
    /// True if the window had to shift off the target to stay on-grid.
    pub fn is_off_center(&self, nearest_lat_idx: usize, nearest_lon_idx: usize) -> bool {
        let half = self.field.latitudes().len() / 2;
        self.lat_start + half != nearest_lat_idx || self.lon_start + half != nearest_lon_idx
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Crops a `patch_size` × `patch_size` window centered as closely as
/// `policy` allows on (`lat`, `lon`).
///
/// The query longitude is first normalized to the field's encoding: if the
/// field uses [0, 360) and the query is negative, 360 is added. `patch_size`
/// is conventionally odd so a single pixel sits at the center.
pub fn extract_patch(
    field: &GriddedField,
    lat: f64,
    lon: f64,
    patch_size: usize,
    policy: BoundaryPolicy,
) -> Result<Patch, ForecastError> {
    if patch_size == 0 {
        return Err(ForecastError::EmptyInput("patch size"));
    }
    let lats = field.latitudes();
    let lons = field.longitudes();
    if lats.len() < patch_size {
        return Err(ForecastError::GridTooSmall {
            axis: "latitude",
            len: lats.len(),
            patch_size,
        });
    }
    if lons.len() < patch_size {
        return Err(ForecastError::GridTooSmall {
            axis: "longitude",
            len: lons.len(),
            patch_size,
        });
    }

    let lon = normalize_longitude(lons, lon);
    let lat_idx = nearest_index(lats, lat);
    let lon_idx = nearest_index(lons, lon);

    let lat_start = window_start(lat_idx, patch_size, lats.len());
    let lon_start = window_start(lon_idx, patch_size, lons.len());

    if policy == BoundaryPolicy::Reject {
        let half = patch_size / 2;
        if lat_start != lat_idx.saturating_sub(half) || lat_idx < half {
            return Err(ForecastError::PatchOutOfBounds {
                axis: "latitude",
                center: lat_idx,
                patch_size,
                len: lats.len(),
            });
        }
        if lon_start != lon_idx.saturating_sub(half) || lon_idx < half {
            return Err(ForecastError::PatchOutOfBounds {
                axis: "longitude",
                center: lon_idx,
                patch_size,
                len: lons.len(),
            });
        }
    }

    let values = field
        .values()
        .slice(s![
            ..,
            ..,
            lat_start..lat_start + patch_size,
            lon_start..lon_start + patch_size
        ])
        .to_owned();
    let cropped = GriddedField::from_parts(
        values,
        field.variables().to_vec(),
        field.time().map(|t| t.to_vec()),
        lats[lat_start..lat_start + patch_size].to_vec(),
        lons[lon_start..lon_start + patch_size].to_vec(),
    )?;

    Ok(Patch {
        field: cropped,
        lat_start,
        lon_start,
    })
}

/// Brings a query longitude into the field's encoding convention.
/// Fields encoded [0, 360) get negative queries shifted up; fields encoded
/// [-180, 180) pass the query through.
fn normalize_longitude(lons: &[f64], lon: f64) -> f64 {
    let all_non_negative = lons.iter().all(|&v| v >= 0.0);
    if all_non_negative && lon < 0.0 {
        (lon + 360.0) % 360.0
    } else {
        lon
    }
}

/// Index of the coordinate value closest to `target`. Ties take the lower
/// index. Works on ascending and descending axes alike.
fn nearest_index(values: &[f64], target: f64) -> usize {
    let mut best_idx = 0;
    let mut best_diff = f64::INFINITY;
    for (i, &v) in values.iter().enumerate() {
        let d = (v - target).abs();
        if d < best_diff {
            best_diff = d;
            best_idx = i;
        }
    }
    best_idx
}

/// Start of a `patch_size` window centered on `idx`, clamped to the axis.
fn window_start(idx: usize, patch_size: usize, len: usize) -> usize {
    let half = patch_size / 2;
    let start = idx as isize - half as isize;
    start.clamp(0, (len - patch_size) as isize) as usize
}
