/// Time-axis alignment.
///
/// WW3 and GFS publish on different native steps (3-hourly wave fields,
/// hourly or 3-hourly atmosphere depending on cycle). Before windowing, every
/// field is resampled onto one regular timeline derived from the first
/// field's range, using nearest-value interpolation along time only. Spatial
/// axes are untouched.

use chrono::{DateTime, Duration, Utc};
use ndarray::{Array4, Axis};

use crate::grid::GriddedField;
use crate::model::ForecastError;

/// Fields resampled onto one shared, strictly increasing time axis.
///
/// Members WITH a time axis all carry `timeline` exactly; members without
/// one (static grids) pass through untouched and are exempt from the
/// invariant.
#[derive(Debug, Clone)]
pub struct AlignedSeries {
    pub timeline: Vec<DateTime<Utc>>,
    pub fields: Vec<GriddedField>,
}

/// Resamples `fields` onto a regular timeline at `freq`, spanning the first
/// field's time range. Output order matches input order.
///
/// Timeline points outside a member field's native range fill with NaN, the
/// decoder collaborators' missing-value convention; alignment itself never
/// fails for range mismatches. Callers whose fields only partially overlap
/// the reference should drop NaN rows before windowing.
///
/// If the first field has no time axis there is nothing to align against:
/// every field passes through untouched under an empty timeline.
pub fn align_time(fields: &[GriddedField], freq: Duration) -> Result<AlignedSeries, ForecastError> {
    if fields.is_empty() {
        return Err(ForecastError::EmptyInput("fields to align"));
    }
    if freq <= Duration::zero() {
        return Err(ForecastError::InvalidCoordinate {
            axis: "time",
            reason: "alignment frequency must be positive",
        });
    }

    let reference = &fields[0];
    let Some(ref_time) = reference.time() else {
        return Ok(AlignedSeries {
            timeline: Vec::new(),
            fields: fields.to_vec(),
        });
    };

    let timeline = regular_timeline(ref_time[0], ref_time[ref_time.len() - 1], freq);

    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        match field.time() {
            None => out.push(field.clone()),
            Some(native) => {
                let resampled = resample_nearest(field, native, &timeline)?;
                out.push(resampled);
            }
        }
    }

    Ok(AlignedSeries {
        timeline,
        fields: out,
    })
}

/// Regular instants from `start` to `end` inclusive, stepping by `freq`.
fn regular_timeline(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    freq: Duration,
) -> Vec<DateTime<Utc>> {
    let mut timeline = Vec::new();
    let mut t = start;
    while t <= end {
        timeline.push(t);
        t += freq;
    }
    timeline
}

/// Nearest-value resampling of one field onto `timeline`.
fn resample_nearest(
    field: &GriddedField,
    native: &[DateTime<Utc>],
    timeline: &[DateTime<Utc>],
) -> Result<GriddedField, ForecastError> {
    let src = field.values();
    let shape = src.shape();
    let mut values = Array4::<f32>::from_elem(
        (timeline.len(), shape[1], shape[2], shape[3]),
        f32::NAN,
    );

    let first = native[0];
    let last = native[native.len() - 1];
    for (i, &t) in timeline.iter().enumerate() {
        if t < first || t > last {
            continue; // stays NaN: outside the field's native range
        }
        let j = nearest_time_index(native, t);
        values
            .index_axis_mut(Axis(0), i)
            .assign(&src.index_axis(Axis(0), j));
    }

    field.resampled(timeline.to_vec(), values)
}

/// Index of the native instant closest to `t`. `native` is strictly
/// increasing (guaranteed at field construction); ties take the earlier
/// instant.
fn nearest_time_index(native: &[DateTime<Utc>], t: DateTime<Utc>) -> usize {
    match native.binary_search(&t) {
        Ok(i) => i,
        Err(insertion) => {
            if insertion == 0 {
                0
            } else if insertion == native.len() {
                native.len() - 1
            } else {
                let before = t - native[insertion - 1];
                let after = native[insertion] - t;
                if after < before {
                    insertion
                } else {
                    insertion - 1
                }
            }
        }
    }
}
