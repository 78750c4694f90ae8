/// Multimodal SWH forecasting model.
///
/// Inference-only: layers carry forward passes and seeded deterministic
/// initialization, no gradients. `layers` holds the numeric primitives,
/// `components` the per-stage building blocks, `model` the assembled
/// forecaster, and `service` the loaded-model handle the rest of the
/// system calls into.

pub mod components;
pub mod layers;
pub mod model;
pub mod service;
