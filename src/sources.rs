/// Interfaces to upstream data collaborators.
///
/// File retrieval, GRIB decoding, and the buoy metadata registry live
/// outside this crate; the pipeline consumes them through these traits.
/// Production wires in the real decoder and directory, tests wire in
/// in-memory doubles.

use std::path::Path;

use crate::grid::GriddedField;
use crate::model::ForecastError;

// ---------------------------------------------------------------------------
// Bounding boxes
// ---------------------------------------------------------------------------

/// A geographic bounding box `(min_lon, min_lat, max_lon, max_lat)` in
/// degrees, longitudes in [-180, 180).
///
/// When `min_lon > max_lon` the box crosses the antimeridian (e.g. the
/// Bering Sea, 160°E to 160°W) and longitude membership wraps around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// True if the box's longitude range crosses the antimeridian.
    pub fn crosses_dateline(&self) -> bool {
        self.min_lon > self.max_lon
    }

    /// Point membership with dateline wrap-around.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let lon_match = if self.crosses_dateline() {
            lon >= self.min_lon || lon <= self.max_lon
        } else {
            (self.min_lon..=self.max_lon).contains(&lon)
        };
        lon_match && (self.min_lat..=self.max_lat).contains(&lat)
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Decodes an archived grid file (GRIB2/NetCDF already fetched to disk) into
/// a `GriddedField` restricted to the requested variables, in order.
///
/// Implementations own format quirks, missing-value conventions, and the
/// `CoordinateSchema` declaration; download retries belong to the retrieval
/// layer in front of them.
pub trait FieldDecoder {
    fn decode(&self, path: &Path, variables: &[&str]) -> Result<GriddedField, ForecastError>;
}

/// A station with a known position, as reported by the metadata registry.
#[derive(Debug, Clone, PartialEq)]
pub struct StationLocation {
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Looks up buoy station positions. Backed by the NDBC active-stations
/// feed in production; by fixtures in tests.
pub trait StationDirectory {
    /// Position of a single station, or `None` if the id is unknown.
    fn station_latlon(&self, station_id: &str) -> Option<(f64, f64)>;

    /// All known stations inside `bbox`, in registry order.
    fn stations_in_bbox(&self, bbox: &BoundingBox) -> Vec<StationLocation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_bbox_contains() {
        // North Pacific-ish box.
        let bbox = BoundingBox::new(-180.0, 0.0, -100.0, 60.0);
        assert!(bbox.contains(36.8, -122.4)); // Monterey Bay
        assert!(!bbox.contains(36.8, 140.0)); // western Pacific, outside
        assert!(!bbox.contains(-10.0, -122.4)); // south of the box
    }

    #[test]
    fn test_dateline_crossing_bbox_wraps_longitude() {
        // Bering Sea: 160°E across the antimeridian to 160°W.
        let bbox = BoundingBox::new(160.0, 51.0, -160.0, 66.0);
        assert!(bbox.crosses_dateline());
        assert!(bbox.contains(58.0, 175.0)); // west of the antimeridian
        assert!(bbox.contains(58.0, -175.0)); // east of it
        assert!(!bbox.contains(58.0, 150.0)); // Sea of Okhotsk, outside
        assert!(!bbox.contains(58.0, -150.0)); // Gulf of Alaska, outside
    }

    #[test]
    fn test_bbox_edges_are_inclusive() {
        let bbox = BoundingBox::new(-130.0, 20.0, -110.0, 40.0);
        assert!(bbox.contains(20.0, -130.0));
        assert!(bbox.contains(40.0, -110.0));
    }
}
