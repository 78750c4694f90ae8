/// The loaded-model service.
///
/// One `ForecastService` wraps one set of model weights. It is constructed
/// at process start, shared by reference, and never mutated: inference takes
/// `&self`, so concurrent callers need no locking. Reloading a checkpoint
/// means building a new service and swapping it into the `ServiceHandle`;
/// in-flight calls finish on the instance they started with.

use chrono::Duration;
use ndarray::{Array2, Array5, s};
use std::sync::{Arc, RwLock};

use crate::alert::evaluator;
use crate::forecast::model::{ModelConfig, WaveForecaster};
use crate::grid::GriddedField;
use crate::logging;
use crate::model::{AlertEvent, ForecastError, ForecastResult};
use crate::pipeline::spatial::{BoundaryPolicy, extract_patch};
use crate::pipeline::temporal::align_time;
use crate::pipeline::window::build_sequences;
use crate::sources::{BoundingBox, StationDirectory, StationLocation};

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct ForecastService {
    model: WaveForecaster,
}

impl ForecastService {
    pub fn new(cfg: ModelConfig) -> Result<Self, ForecastError> {
        let model = WaveForecaster::new(cfg)?;
        logging::info(
            logging::DataSource::Model,
            None,
            &format!(
                "model loaded: T={} H={} patch={}",
                model.config().time_steps,
                model.config().horizon,
                model.config().patch_size
            ),
        );
        Ok(Self { model })
    }

    pub fn config(&self) -> &ModelConfig {
        self.model.config()
    }

    /// Raw tensor inference: `[B,T,Cw,P,P]` + `[B,T,Cg,P,P]` → `[B,H]`.
    pub fn predict(
        &self,
        ww3: &Array5<f32>,
        gfs: &Array5<f32>,
    ) -> Result<Array2<f32>, ForecastError> {
        self.model.forward(ww3, gfs)
    }

    /// Tensor inference wrapped into per-sample `ForecastResult`s with lead
    /// hours 1..=H.
    pub fn forecast(
        &self,
        station_id: &str,
        ww3: &Array5<f32>,
        gfs: &Array5<f32>,
    ) -> Result<Vec<ForecastResult>, ForecastError> {
        let output = self.model.forward(ww3, gfs)?;
        let horizon = self.model.config().horizon;
        let lead_hours: Vec<u32> = (1..=horizon as u32).collect();
        Ok(output
            .rows()
            .into_iter()
            .map(|row| ForecastResult {
                station_id: station_id.to_string(),
                lead_hours: lead_hours.clone(),
                swh_m: row.to_vec(),
            })
            .collect())
    }

    /// The full assembly-plus-inference chain for one station: align both
    /// fields hourly, crop buoy-centered patches, window, and run the most
    /// recent window through the model.
    ///
    /// Returns `Ok(None)` when the aligned series is shorter than T+H —
    /// insufficient history, not a failure. The whole call is one blocking
    /// computation with no internal suspension points.
    pub fn forecast_latest(
        &self,
        station_id: &str,
        lat: f64,
        lon: f64,
        ww3: &GriddedField,
        gfs: &GriddedField,
        policy: BoundaryPolicy,
    ) -> Result<Option<ForecastResult>, ForecastError> {
        let cfg = self.model.config();
        let aligned = align_time(&[ww3.clone(), gfs.clone()], Duration::hours(1))?;

        let ww3_patch = extract_patch(&aligned.fields[0], lat, lon, cfg.patch_size, policy)?;
        let gfs_patch = extract_patch(&aligned.fields[1], lat, lon, cfg.patch_size, policy)?;

        let samples = build_sequences(
            ww3_patch.field.values(),
            gfs_patch.field.values(),
            cfg.time_steps,
            cfg.horizon,
        )?;
        if samples.is_empty() {
            logging::debug(
                logging::DataSource::Pipeline,
                Some(station_id),
                "insufficient history for a forecast window",
            );
            return Ok(None);
        }

        let last = samples.len() - 1;
        let ww3_in = samples.primary.slice(s![last..last + 1, .., .., .., ..]).to_owned();
        let gfs_in = samples
            .secondary
            .slice(s![last..last + 1, .., .., .., ..])
            .to_owned();
        let mut results = self.forecast(station_id, &ww3_in, &gfs_in)?;
        Ok(results.pop())
    }

    /// Forecasts every station the directory reports inside `bbox`, capped
    /// at `max_stations`, evaluating each forecast against `threshold_m`.
    ///
    /// `inputs_for` supplies the model tensors per station (from assembled
    /// pipelines or an archive); a station whose inputs or inference fail is
    /// logged and skipped rather than aborting the sweep.
    pub fn forecast_region<F>(
        &self,
        directory: &dyn StationDirectory,
        bbox: &BoundingBox,
        max_stations: usize,
        threshold_m: f32,
        mut inputs_for: F,
    ) -> Vec<RegionForecast>
    where
        F: FnMut(&StationLocation) -> Result<(Array5<f32>, Array5<f32>), ForecastError>,
    {
        let stations = directory.stations_in_bbox(bbox);
        let total = stations.len().min(max_stations);
        let mut out = Vec::with_capacity(total);
        let mut failed = 0;

        for station in stations.into_iter().take(max_stations) {
            let attempt = inputs_for(&station).and_then(|(ww3, gfs)| {
                let forecasts = self.forecast(&station.station_id, &ww3, &gfs)?;
                forecasts
                    .into_iter()
                    .next()
                    .ok_or(ForecastError::EmptyInput("region forecast batch"))
            });
            match attempt {
                Ok(forecast) => match evaluator::evaluate_forecast(&forecast, threshold_m) {
                    Ok(alert) => out.push(RegionForecast {
                        station,
                        forecast,
                        alert,
                    }),
                    Err(e) => {
                        failed += 1;
                        logging::warn(
                            logging::DataSource::Model,
                            Some(&station.station_id),
                            &format!("evaluation failed: {}", e),
                        );
                    }
                },
                Err(e) => {
                    failed += 1;
                    logging::warn(
                        logging::DataSource::Model,
                        Some(&station.station_id),
                        &format!("forecast failed: {}", e),
                    );
                }
            }
        }

        logging::log_region_summary(logging::DataSource::Model, total, out.len(), failed);
        out
    }
}

/// One station's entry in a regional sweep.
#[derive(Debug, Clone)]
pub struct RegionForecast {
    pub station: StationLocation,
    pub forecast: ForecastResult,
    pub alert: AlertEvent,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Shared, swappable reference to the current service.
///
/// `current()` hands out an `Arc` snapshot; `replace()` installs a freshly
/// built service without waiting for readers. Callers that began inference
/// on the old instance keep it alive until they drop their `Arc`.
pub struct ServiceHandle {
    inner: RwLock<Arc<ForecastService>>,
}

impl ServiceHandle {
    pub fn new(service: ForecastService) -> Self {
        Self {
            inner: RwLock::new(Arc::new(service)),
        }
    }

    pub fn current(&self) -> Arc<ForecastService> {
        Arc::clone(&self.inner.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn replace(&self, service: ForecastService) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(service);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StationDirectory;
    use ndarray::{Array4, Array5};

    fn tiny_config() -> ModelConfig {
        ModelConfig {
            ww3_channels: 2,
            gfs_channels: 2,
            patch_size: 5,
            time_steps: 4,
            horizon: 3,
            cnn_dim: 8,
            fusion_dim: 8,
            lstm_hidden: 8,
            num_heads: 2,
            fusion_layers: 1,
            feedforward_dim: 8,
            seed: 1,
        }
    }

    /// Hourly field over an 8x8 grid with `len` time steps.
    fn field_of_length(len: usize, channels: usize) -> GriddedField {
        use chrono::TimeZone;
        let start = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let time: Vec<_> = (0..len)
            .map(|i| start + Duration::hours(i as i64))
            .collect();
        let values = Array4::from_shape_fn((len, channels, 8, 8), |(t, c, y, x)| {
            (t as f32) * 0.1 + (c as f32) + 0.01 * ((y + x) as f32)
        });
        let lats: Vec<f64> = (0..8).map(|i| 30.0 + i as f64).collect();
        let lons: Vec<f64> = (0..8).map(|i| 220.0 + i as f64).collect();
        let vars: Vec<String> = (0..channels).map(|c| format!("v{}", c)).collect();
        GriddedField::from_parts(values, vars, Some(time), lats, lons)
            .expect("test field should construct")
    }

    #[test]
    fn test_forecast_latest_returns_h_lead_hours() {
        let service = ForecastService::new(tiny_config()).expect("service should build");
        let ww3 = field_of_length(10, 2); // 10 >= T+H = 7
        let gfs = field_of_length(10, 2);
        let result = service
            .forecast_latest("46042", 33.5, 223.5, &ww3, &gfs, BoundaryPolicy::Clamp)
            .expect("forecast should succeed")
            .expect("enough history for one window");
        assert_eq!(result.lead_hours, vec![1, 2, 3]);
        assert_eq!(result.swh_m.len(), 3);
        assert_eq!(result.station_id, "46042");
    }

    #[test]
    fn test_forecast_latest_with_short_history_is_none() {
        let service = ForecastService::new(tiny_config()).expect("service should build");
        let ww3 = field_of_length(6, 2); // 6 < T+H = 7
        let gfs = field_of_length(6, 2);
        let result = service
            .forecast_latest("46042", 33.5, 223.5, &ww3, &gfs, BoundaryPolicy::Clamp)
            .expect("short history is not an error");
        assert!(result.is_none());
    }

    #[test]
    fn test_handle_swap_preserves_in_flight_instance() {
        let handle = ServiceHandle::new(ForecastService::new(tiny_config()).expect("build"));
        let before = handle.current();

        let replacement_cfg = ModelConfig {
            seed: 2,
            ..tiny_config()
        };
        handle.replace(ForecastService::new(replacement_cfg).expect("build"));
        let after = handle.current();

        // The old Arc still works; the handle now serves the new instance.
        assert_eq!(before.config().seed, 1);
        assert_eq!(after.config().seed, 2);
    }

    struct FixedDirectory(Vec<StationLocation>);

    impl StationDirectory for FixedDirectory {
        fn station_latlon(&self, station_id: &str) -> Option<(f64, f64)> {
            self.0
                .iter()
                .find(|s| s.station_id == station_id)
                .map(|s| (s.latitude, s.longitude))
        }

        fn stations_in_bbox(&self, bbox: &BoundingBox) -> Vec<StationLocation> {
            self.0
                .iter()
                .filter(|s| bbox.contains(s.latitude, s.longitude))
                .cloned()
                .collect()
        }
    }

    #[test]
    fn test_region_sweep_caps_and_evaluates() {
        let cfg = tiny_config();
        let service = ForecastService::new(cfg.clone()).expect("service should build");
        let directory = FixedDirectory(vec![
            StationLocation {
                station_id: "46042".to_string(),
                latitude: 36.8,
                longitude: -122.4,
            },
            StationLocation {
                station_id: "46026".to_string(),
                latitude: 37.8,
                longitude: -122.8,
            },
            StationLocation {
                station_id: "51101".to_string(),
                latitude: 24.3,
                longitude: -162.2,
            },
        ]);
        let bbox = BoundingBox::new(-180.0, 0.0, -100.0, 60.0);

        let results = service.forecast_region(&directory, &bbox, 2, 4.0, |_station| {
            let ww3 = Array5::<f32>::zeros((1, cfg.time_steps, 2, cfg.patch_size, cfg.patch_size));
            let gfs = Array5::<f32>::zeros((1, cfg.time_steps, 2, cfg.patch_size, cfg.patch_size));
            Ok((ww3, gfs))
        });

        assert_eq!(results.len(), 2); // capped below the 3 matching stations
        for r in &results {
            assert_eq!(r.alert.swh, r.forecast.swh_m);
            assert_eq!(r.alert.threshold_m, 4.0);
        }
    }

    #[test]
    fn test_region_sweep_skips_failing_stations() {
        let cfg = tiny_config();
        let service = ForecastService::new(cfg.clone()).expect("service should build");
        let directory = FixedDirectory(vec![
            StationLocation {
                station_id: "46042".to_string(),
                latitude: 36.8,
                longitude: -122.4,
            },
            StationLocation {
                station_id: "46026".to_string(),
                latitude: 37.8,
                longitude: -122.8,
            },
        ]);
        let bbox = BoundingBox::new(-180.0, 0.0, -100.0, 60.0);

        let results = service.forecast_region(&directory, &bbox, 10, 4.0, |station| {
            if station.station_id == "46042" {
                return Err(ForecastError::EmptyInput("no data for station"));
            }
            let ww3 = Array5::<f32>::zeros((1, cfg.time_steps, 2, cfg.patch_size, cfg.patch_size));
            let gfs = Array5::<f32>::zeros((1, cfg.time_steps, 2, cfg.patch_size, cfg.patch_size));
            Ok((ww3, gfs))
        });

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].station.station_id, "46026");
    }
}
