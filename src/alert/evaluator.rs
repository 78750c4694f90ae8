/// Threshold evaluation.
///
/// Compares each horizon step of a forecast against the configured SWH
/// safety threshold and records the comparisons in an `AlertEvent`. Pure:
/// no I/O, no clock, no configuration lookup. Delivery is the notifier's
/// job.

use crate::model::{AlertEvent, ForecastError, ForecastResult};

/// Evaluates `predicted` against `threshold_m`.
///
/// `exceed[i]` is 1 when `predicted[i] >= threshold_m`, else 0 — the
/// threshold itself counts as an exceedance. `lead_hours` and `predicted`
/// must be parallel; a length mismatch is a caller bug and fails with
/// `ShapeMismatch`.
pub fn evaluate(
    station_id: &str,
    lead_hours: &[u32],
    predicted: &[f32],
    threshold_m: f32,
) -> Result<AlertEvent, ForecastError> {
    if lead_hours.len() != predicted.len() {
        return Err(ForecastError::ShapeMismatch {
            context: "lead_hours vs predicted",
            expected: lead_hours.len(),
            actual: predicted.len(),
        });
    }
    let exceed = predicted
        .iter()
        .map(|&v| u8::from(v >= threshold_m))
        .collect();
    Ok(AlertEvent {
        station_id: station_id.to_string(),
        threshold_m,
        lead_hours: lead_hours.to_vec(),
        swh: predicted.to_vec(),
        exceed,
    })
}

/// Evaluates a `ForecastResult` directly.
pub fn evaluate_forecast(
    forecast: &ForecastResult,
    threshold_m: f32,
) -> Result<AlertEvent, ForecastError> {
    evaluate(
        &forecast.station_id,
        &forecast.lead_hours,
        &forecast.swh_m,
        threshold_m,
    )
}
