//! Infrastructure layer: browser automation, extraction, and persistence.
//!
//! Everything here plugs concrete machinery into the domain's ports: the
//! WebDriver session and its offline snapshot twin, the locator-cascade
//! extraction stack, the incremental-load controller, and the batched
//! JSON writer.

pub mod batch_writer;
pub mod config;
pub mod extraction;
pub mod load_more;
pub mod logging;
pub mod portal;
pub mod profile;
pub mod snapshot;
pub mod webdriver;

// Re-export commonly used items
pub use batch_writer::{BatchWriter, WriteSummary};
pub use config::{ConfigManager, Credentials, ScraperConfig};
pub use load_more::{IncrementalLoadController, LoadEnd, LoadSummary};
pub use logging::{init_logging, init_logging_with_config};
pub use profile::SiteProfile;
pub use snapshot::SnapshotSession;
pub use webdriver::WebDriverSession;
