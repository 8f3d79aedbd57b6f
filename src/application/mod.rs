//! Application layer - run orchestration.
//!
//! Coordinates the domain core and the infrastructure adapters into one
//! sequential extraction run.

pub mod pipeline;

// Re-export commonly used items
pub use pipeline::{ExtractionPipeline, HarvestOutcome, RunReport, harvest_listing};
