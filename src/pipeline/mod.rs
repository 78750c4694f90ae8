/// Sample-assembly pipeline.
///
/// Turns decoded forecast fields into model-ready tensors:
/// align onto one hourly time axis (`temporal`), crop buoy-centered patches
/// (`spatial`), slide rolling windows into (past, future-target) samples
/// (`window`), persist or replay sample sets (`archive`), and prefetch
/// batches concurrently (`prefetch`).

pub mod archive;
pub mod prefetch;
pub mod spatial;
pub mod temporal;
pub mod window;
