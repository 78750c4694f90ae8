/// Persisted sample sets.
///
/// A `SampleArchive` is the on-disk form of a `SampleSet`: three parallel
/// float32 arrays (past wave windows, past atmosphere windows, future
/// targets) with their dimensions, serialized as one bincode file. The
/// format is write-once; `validate` runs on every load so a truncated or
/// hand-edited archive fails loudly instead of mis-shaping tensors.

use ndarray::{Array2, Array5};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::model::ForecastError;
use crate::pipeline::window::SampleSet;

const ARCHIVE_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// Archive format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleArchive {
    version: String,
    n_samples: usize,
    time_steps: usize,
    horizon: usize,
    primary_channels: usize,
    secondary_channels: usize,
    patch_size: usize,
    primary: Vec<f32>,
    secondary: Vec<f32>,
    targets: Vec<f32>,
}

impl SampleArchive {
    /// Captures a sample set for persistence. Patches must be square and
    /// share one extent across modalities.
    pub fn from_sample_set(set: &SampleSet) -> Result<Self, ForecastError> {
        let p = set.primary.shape();
        let s = set.secondary.shape();
        if p[3] != p[4] {
            return Err(ForecastError::ShapeMismatch {
                context: "primary patch rows vs cols",
                expected: p[3],
                actual: p[4],
            });
        }
        if s[3] != p[3] || s[4] != p[4] {
            return Err(ForecastError::ShapeMismatch {
                context: "secondary vs primary patch extent",
                expected: p[3],
                actual: s[3],
            });
        }
        let archive = Self {
            version: ARCHIVE_VERSION.to_string(),
            n_samples: p[0],
            time_steps: p[1],
            horizon: set.targets.shape()[1],
            primary_channels: p[2],
            secondary_channels: s[2],
            patch_size: p[3],
            primary: set.primary.iter().copied().collect(),
            secondary: set.secondary.iter().copied().collect(),
            targets: set.targets.iter().copied().collect(),
        };
        archive.validate()?;
        Ok(archive)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ForecastError> {
        let file = File::create(path)
            .map_err(|e| ForecastError::ArchiveError(format!("create failed: {}", e)))?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self)
            .map_err(|e| ForecastError::ArchiveError(format!("serialize failed: {}", e)))?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let file = File::open(path)
            .map_err(|e| ForecastError::ArchiveError(format!("open failed: {}", e)))?;
        let reader = BufReader::new(file);
        let archive: Self = bincode::deserialize_from(reader)
            .map_err(|e| ForecastError::ArchiveError(format!("deserialize failed: {}", e)))?;
        archive.validate()?;
        Ok(archive)
    }

    /// Internal consistency: every flat buffer must hold exactly the element
    /// count its dimensions promise, with N equal across the three arrays.
    pub fn validate(&self) -> Result<(), ForecastError> {
        let patch = self.patch_size * self.patch_size;
        let expect_primary = self.n_samples * self.time_steps * self.primary_channels * patch;
        let expect_secondary = self.n_samples * self.time_steps * self.secondary_channels * patch;
        let expect_targets = self.n_samples * self.horizon;
        if self.primary.len() != expect_primary {
            return Err(ForecastError::ArchiveError(format!(
                "primary array holds {} values, dimensions promise {}",
                self.primary.len(),
                expect_primary
            )));
        }
        if self.secondary.len() != expect_secondary {
            return Err(ForecastError::ArchiveError(format!(
                "secondary array holds {} values, dimensions promise {}",
                self.secondary.len(),
                expect_secondary
            )));
        }
        if self.targets.len() != expect_targets {
            return Err(ForecastError::ArchiveError(format!(
                "target array holds {} values, dimensions promise {}",
                self.targets.len(),
                expect_targets
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.n_samples
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// Rebuilds the full in-memory sample set.
    pub fn to_sample_set(&self) -> Result<SampleSet, ForecastError> {
        self.slice_batch(0, self.n_samples)
    }

    /// Materializes samples [start, start+count) as a batch.
    pub fn slice_batch(&self, start: usize, count: usize) -> Result<SampleSet, ForecastError> {
        if start + count > self.n_samples {
            return Err(ForecastError::ShapeMismatch {
                context: "batch range vs archive length",
                expected: self.n_samples,
                actual: start + count,
            });
        }
        let patch = self.patch_size * self.patch_size;
        let primary_stride = self.time_steps * self.primary_channels * patch;
        let secondary_stride = self.time_steps * self.secondary_channels * patch;

        let primary = Array5::from_shape_vec(
            (
                count,
                self.time_steps,
                self.primary_channels,
                self.patch_size,
                self.patch_size,
            ),
            self.primary[start * primary_stride..(start + count) * primary_stride].to_vec(),
        )
        .map_err(|e| ForecastError::ArchiveError(format!("primary reshape failed: {}", e)))?;
        let secondary = Array5::from_shape_vec(
            (
                count,
                self.time_steps,
                self.secondary_channels,
                self.patch_size,
                self.patch_size,
            ),
            self.secondary[start * secondary_stride..(start + count) * secondary_stride].to_vec(),
        )
        .map_err(|e| ForecastError::ArchiveError(format!("secondary reshape failed: {}", e)))?;
        let targets = Array2::from_shape_vec(
            (count, self.horizon),
            self.targets[start * self.horizon..(start + count) * self.horizon].to_vec(),
        )
        .map_err(|e| ForecastError::ArchiveError(format!("target reshape failed: {}", e)))?;

        Ok(SampleSet {
            primary,
            secondary,
            targets,
        })
    }
}

// ---------------------------------------------------------------------------
// Synthetic samples
// ---------------------------------------------------------------------------

/// Generates a seeded synthetic sample set shaped like real pipeline output.
///
/// Inputs are standard-normal noise; the target is a deterministic function
/// of the most recent input step (a weighted blend of the mean wave channel
/// and the wind-magnitude proxy, drifting upward 0.1 m per lead hour), so a
/// model has structure to learn and tests have values to predict.
pub fn synthetic_sample_set(
    n_samples: usize,
    time_steps: usize,
    horizon: usize,
    primary_channels: usize,
    secondary_channels: usize,
    patch_size: usize,
    seed: u64,
) -> SampleSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut normal = |shape: (usize, usize, usize, usize, usize)| {
        let len = shape.0 * shape.1 * shape.2 * shape.3 * shape.4;
        let data: Vec<f32> = (0..len)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect();
        Array5::from_shape_vec(shape, data).expect("length computed from shape")
    };

    let primary = normal((
        n_samples,
        time_steps,
        primary_channels,
        patch_size,
        patch_size,
    ));
    let secondary = normal((
        n_samples,
        time_steps,
        secondary_channels,
        patch_size,
        patch_size,
    ));

    let pixels = (patch_size * patch_size) as f32;
    let mut targets = Array2::<f32>::zeros((n_samples, horizon));
    let last = time_steps - 1;
    for i in 0..n_samples {
        let wave_mean: f32 = primary
            .slice(ndarray::s![i, last, 0, .., ..])
            .sum()
            / pixels;
        let mut wind_sq = 0.0f32;
        for c in 0..secondary_channels.min(2) {
            let m: f32 = secondary.slice(ndarray::s![i, last, c, .., ..]).sum() / pixels;
            wind_sq += m * m;
        }
        let base = 0.7 * wave_mean + 0.3 * wind_sq.sqrt();
        for h in 0..horizon {
            targets[[i, h]] = base + 0.1 * (h + 1) as f32;
        }
    }

    SampleSet {
        primary,
        secondary,
        targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_set() -> SampleSet {
        synthetic_sample_set(4, 5, 3, 2, 2, 3, 99)
    }

    #[test]
    fn test_archive_round_trip_preserves_values() {
        let set = small_set();
        let archive = SampleArchive::from_sample_set(&set).expect("archive should build");

        let dir = std::env::temp_dir().join("wavecast_archive_test");
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("round_trip.bin");
        archive.save_to_file(&path).expect("save should succeed");

        let loaded = SampleArchive::load_from_file(&path).expect("load should succeed");
        let restored = loaded.to_sample_set().expect("restore should succeed");
        assert_eq!(restored.primary, set.primary);
        assert_eq!(restored.secondary, set.secondary);
        assert_eq!(restored.targets, set.targets);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_validate_catches_truncated_buffer() {
        let set = small_set();
        let mut archive = SampleArchive::from_sample_set(&set).expect("archive should build");
        archive.targets.pop();
        let err = archive.validate().expect_err("truncation should fail validation");
        assert!(matches!(err, ForecastError::ArchiveError(_)));
    }

    #[test]
    fn test_slice_batch_matches_full_set() {
        let set = small_set();
        let archive = SampleArchive::from_sample_set(&set).expect("archive should build");
        let batch = archive.slice_batch(1, 2).expect("slice should succeed");
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.targets.row(0).to_vec(),
            set.targets.row(1).to_vec()
        );
        assert_eq!(
            batch.primary.slice(ndarray::s![0, .., .., .., ..]),
            set.primary.slice(ndarray::s![1, .., .., .., ..])
        );
    }

    #[test]
    fn test_slice_batch_out_of_range_fails() {
        let set = small_set();
        let archive = SampleArchive::from_sample_set(&set).expect("archive should build");
        assert!(archive.slice_batch(3, 2).is_err());
    }

    #[test]
    fn test_synthetic_targets_drift_upward_per_lead_hour() {
        let set = small_set();
        for i in 0..set.len() {
            for h in 1..3 {
                let step = set.targets[[i, h]] - set.targets[[i, h - 1]];
                assert!((step - 0.1).abs() < 1e-6, "drift should be 0.1, got {}", step);
            }
        }
    }

    #[test]
    fn test_synthetic_generation_is_seeded() {
        let a = synthetic_sample_set(2, 4, 2, 1, 1, 3, 7);
        let b = synthetic_sample_set(2, 4, 2, 1, 1, 3, 7);
        assert_eq!(a.primary, b.primary);
        assert_eq!(a.targets, b.targets);
    }
}
