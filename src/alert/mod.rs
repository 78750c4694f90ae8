/// Threshold alerting.
///
/// Split in two so the decision logic stays trivially testable: `evaluator`
/// is a pure function from a forecast to an `AlertEvent`, and `notifier`
/// owns the best-effort webhook side effect that consumes the event.

pub mod evaluator;
pub mod notifier;
