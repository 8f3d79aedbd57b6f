//! Revenda Scraper - Reseller Portal Product Extraction
//!
//! Extracts the full product catalog from the Grupo Boticário reseller
//! portal: signs in, converges the incrementally-loaded listing, reads
//! every product card through cascading locator strategies, and persists
//! the normalized records as batched JSON page files.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;

// Re-export the types a run is assembled from
pub use application::{ExtractionPipeline, RunReport};
pub use domain::{Product, RawProduct};
pub use infrastructure::{
    ConfigManager, Credentials, ScraperConfig, SiteProfile, SnapshotSession, WebDriverSession,
};
