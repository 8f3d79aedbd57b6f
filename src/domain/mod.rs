//! Domain module - Core business logic and entities
//!
//! Record types, the locator model, identity-based deduplication, and the
//! automation-session port the extraction core is written against.

pub mod cycle;
pub mod dedup;
pub mod locator;
pub mod product;
pub mod session;

// Re-export commonly used items
pub use cycle::{CycleInfo, CyclePeriod};
pub use dedup::Deduplicator;
pub use locator::{ExtractMode, FieldSpec, LocatorQuery, LocatorStrategy};
pub use product::{NAME_NOT_FOUND, Product, RawProduct};
pub use session::{AutomationSession, SessionError, SessionResult};
