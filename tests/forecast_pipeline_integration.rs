//! End-to-end pipeline integration tests.
//!
//! These run the full chain offline — synthetic gridded fields through
//! alignment, patch extraction, windowing, the model forward pass, and
//! threshold evaluation — with every collaborator in-process. No network,
//! no file fixtures except a temp-dir archive round trip.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ndarray::Array4;
use std::sync::Arc;

use wavecast_service::forecast::model::ModelConfig;
use wavecast_service::forecast::service::ForecastService;
use wavecast_service::grid::GriddedField;
use wavecast_service::pipeline::archive::{SampleArchive, synthetic_sample_set};
use wavecast_service::pipeline::prefetch::{BatchPrefetcher, PrefetchConfig};
use wavecast_service::pipeline::spatial::{BoundaryPolicy, extract_patch};
use wavecast_service::pipeline::temporal::align_time;
use wavecast_service::pipeline::window::build_sequences;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

/// A 12x12 field with `steps` instants spaced `step_hours` apart. Channel 0
/// at every pixel carries the hour of its time step so targets are exactly
/// predictable after resampling; remaining channels carry offsets of it.
fn synthetic_field(steps: usize, step_hours: i64, channels: usize) -> GriddedField {
    let time: Vec<_> = (0..steps)
        .map(|i| t0() + Duration::hours(i as i64 * step_hours))
        .collect();
    let values = Array4::from_shape_fn((steps, channels, 12, 12), |(t, c, _, _)| {
        (t as i64 * step_hours) as f32 + 100.0 * c as f32
    });
    let lats: Vec<f64> = (0..12).map(|i| 30.0 + i as f64 * 0.5).collect();
    let lons: Vec<f64> = (0..12).map(|i| 235.0 + i as f64 * 0.5).collect();
    let vars: Vec<String> = (0..channels).map(|c| format!("v{}", c)).collect();
    GriddedField::from_parts(values, vars, Some(time), lats, lons)
        .expect("synthetic field should construct")
}

fn tiny_config() -> ModelConfig {
    ModelConfig {
        ww3_channels: 3,
        gfs_channels: 3,
        patch_size: 5,
        time_steps: 12,
        horizon: 6,
        cnn_dim: 8,
        fusion_dim: 16,
        lstm_hidden: 8,
        num_heads: 2,
        fusion_layers: 1,
        feedforward_dim: 16,
        seed: 3,
    }
}

// ---------------------------------------------------------------------------
// Assembly chain
// ---------------------------------------------------------------------------

#[test]
fn test_align_extract_window_chain_produces_model_shaped_samples() {
    // 3-hourly waves and hourly atmosphere over the same 21-hour range.
    let ww3 = synthetic_field(8, 3, 3); // hours 0, 3, ..., 21
    let gfs = synthetic_field(22, 1, 3); // hours 0..=21

    let aligned = align_time(&[ww3, gfs], Duration::hours(1)).expect("alignment should succeed");
    assert_eq!(aligned.timeline.len(), 22);

    // Buoy between gridpoints, safely interior for a 5x5 window.
    let (lat, lon) = (32.8, 237.7);
    let ww3_patch = extract_patch(&aligned.fields[0], lat, lon, 5, BoundaryPolicy::Clamp)
        .expect("wave patch should extract");
    let gfs_patch = extract_patch(&aligned.fields[1], lat, lon, 5, BoundaryPolicy::Clamp)
        .expect("atmosphere patch should extract");

    let samples = build_sequences(ww3_patch.field.values(), gfs_patch.field.values(), 12, 6)
        .expect("windowing should succeed");
    // 22 aligned steps, T=12, H=6: N = 22 - 18 + 1.
    assert_eq!(samples.len(), 5);
    assert_eq!(samples.primary.shape(), &[5, 12, 3, 5, 5]);
    assert_eq!(samples.secondary.shape(), &[5, 12, 3, 5, 5]);
    assert_eq!(samples.targets.shape(), &[5, 6]);

    // Sample 0's target window covers aligned hours [12, 18). Hour 13
    // resamples nearest from the 3-hourly waves to 12h; hour 14 to 15h.
    assert_eq!(samples.targets[[0, 0]], 12.0);
    assert_eq!(samples.targets[[0, 1]], 12.0);
    assert_eq!(samples.targets[[0, 2]], 15.0);
    // Sample 4's target window covers aligned hours [16, 22).
    assert_eq!(samples.targets[[4, 5]], 21.0);
}

#[test]
fn test_seventeen_steps_is_insufficient_history_end_to_end() {
    let ww3 = synthetic_field(17, 1, 3);
    let gfs = synthetic_field(17, 1, 3);
    let aligned = align_time(&[ww3, gfs], Duration::hours(1)).expect("alignment should succeed");
    let ww3_patch = extract_patch(&aligned.fields[0], 32.8, 237.7, 5, BoundaryPolicy::Clamp)
        .expect("wave patch should extract");
    let gfs_patch = extract_patch(&aligned.fields[1], 32.8, 237.7, 5, BoundaryPolicy::Clamp)
        .expect("atmosphere patch should extract");

    let samples = build_sequences(ww3_patch.field.values(), gfs_patch.field.values(), 12, 6)
        .expect("short history is not an error");
    assert!(samples.is_empty(), "17 steps with T=12, H=6 must produce 0 windows");
}

// ---------------------------------------------------------------------------
// Full service chain
// ---------------------------------------------------------------------------

#[test]
fn test_service_forecasts_and_alerts_from_gridded_fields() {
    let service = ForecastService::new(tiny_config()).expect("service should build");
    let ww3 = synthetic_field(8, 3, 3);
    let gfs = synthetic_field(22, 1, 3);

    let forecast = service
        .forecast_latest("46042", 32.8, 237.7, &ww3, &gfs, BoundaryPolicy::Clamp)
        .expect("forecast should succeed")
        .expect("22 aligned steps cover one window");

    assert_eq!(forecast.station_id, "46042");
    assert_eq!(forecast.lead_hours, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(forecast.swh_m.len(), 6);
    assert!(forecast.swh_m.iter().all(|v| v.is_finite()));

    let event = wavecast_service::alert::evaluator::evaluate_forecast(&forecast, 4.0)
        .expect("evaluation should succeed");
    assert_eq!(event.swh, forecast.swh_m);
    assert_eq!(event.exceed.len(), 6);
}

#[test]
fn test_service_is_deterministic_across_instances() {
    let a = ForecastService::new(tiny_config()).expect("service should build");
    let b = ForecastService::new(tiny_config()).expect("service should build");
    let ww3 = synthetic_field(8, 3, 3);
    let gfs = synthetic_field(22, 1, 3);

    let fa = a
        .forecast_latest("46042", 32.8, 237.7, &ww3, &gfs, BoundaryPolicy::Clamp)
        .expect("forecast should succeed")
        .expect("enough history");
    let fb = b
        .forecast_latest("46042", 32.8, 237.7, &ww3, &gfs, BoundaryPolicy::Clamp)
        .expect("forecast should succeed")
        .expect("enough history");
    assert_eq!(fa, fb, "same weights and inputs must forecast identically");
}

#[test]
fn test_concurrent_inference_on_shared_service() {
    // The loaded model is read-only during inference; concurrent callers
    // over one Arc must all succeed and agree.
    let service = Arc::new(ForecastService::new(tiny_config()).expect("service should build"));
    let ww3 = Arc::new(synthetic_field(8, 3, 3));
    let gfs = Arc::new(synthetic_field(22, 1, 3));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        let ww3 = Arc::clone(&ww3);
        let gfs = Arc::clone(&gfs);
        handles.push(std::thread::spawn(move || {
            service
                .forecast_latest("46042", 32.8, 237.7, &ww3, &gfs, BoundaryPolicy::Clamp)
                .expect("forecast should succeed")
                .expect("enough history")
        }));
    }
    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread should not panic"))
        .collect();
    for r in &results[1..] {
        assert_eq!(r, &results[0]);
    }
}

// ---------------------------------------------------------------------------
// Archive and prefetch into the model
// ---------------------------------------------------------------------------

#[test]
fn test_archived_samples_flow_through_prefetcher_into_model() {
    let cfg = tiny_config();
    let set = synthetic_sample_set(
        10,
        cfg.time_steps,
        cfg.horizon,
        cfg.ww3_channels,
        cfg.gfs_channels,
        cfg.patch_size,
        17,
    );
    let archive = SampleArchive::from_sample_set(&set).expect("archive should build");

    let dir = std::env::temp_dir().join("wavecast_pipeline_integration");
    std::fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("samples.bin");
    archive.save_to_file(&path).expect("save should succeed");
    let loaded = Arc::new(SampleArchive::load_from_file(&path).expect("load should succeed"));
    std::fs::remove_file(&path).ok();

    let service = ForecastService::new(cfg.clone()).expect("service should build");
    let prefetcher = BatchPrefetcher::spawn(
        loaded,
        PrefetchConfig {
            batch_size: 4,
            queue_depth: 2,
            workers: 2,
        },
    )
    .expect("prefetcher should start");

    let mut samples_seen = 0;
    for (_, batch) in prefetcher {
        let output = service
            .predict(&batch.primary, &batch.secondary)
            .expect("batch inference should succeed");
        assert_eq!(output.shape(), &[batch.len(), cfg.horizon]);
        samples_seen += batch.len();
    }
    assert_eq!(samples_seen, 10);
}
