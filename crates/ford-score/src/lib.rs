//! FORD score: bedside risk of non-home discharge after orthopedic trauma.

pub mod batch;
pub mod config;
pub mod error;
pub mod scoring;
pub mod telemetry;
