//! Read-only analyses over a (filtered) dataset.

pub mod correlation;
pub mod series;
pub mod summary;
pub mod timeseries;
