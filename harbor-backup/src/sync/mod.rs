//! Change detection between backup runs.

pub mod delta;

pub use delta::compute_delta;
