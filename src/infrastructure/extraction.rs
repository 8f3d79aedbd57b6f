//! Extraction stack: locator cascades, field normalization, card records.
//!
//! The resolver walks a field's strategy cascade against a live session
//! and the extractor assembles one raw record per product card. The
//! normalizer then turns pt-BR storefront strings into typed values.

pub mod extractor;
pub mod normalizer;
pub mod resolver;

// Re-export public types
pub use extractor::RecordExtractor;
pub use normalizer::{normalize_product, parse_currency, parse_discount};
pub use resolver::{ResolvedValue, resolve_element, resolve_value};
