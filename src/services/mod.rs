//! Orchestration services

pub mod pipeline;

pub use pipeline::{persist, Pipeline, SiftOutcome};
