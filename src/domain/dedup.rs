//! Duplicate suppression for extracted records.
//!
//! Incremental loading re-renders earlier cards, so the same product is
//! routinely seen more than once. Records are keyed by SKU, canonical link
//! and trimmed name; a match on any key the record carries makes it a
//! duplicate. The first occurrence always wins, which means two distinct
//! products sharing a key collapse to the first. Downstream pricing jobs
//! depend on never seeing the same SKU twice, so keep it that way.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::product::RawProduct;

/// Identity key kind, in decreasing order of reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey {
    Sku,
    Link,
    Name,
}

/// Tracks every identity key seen so far in a run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen_skus: HashSet<String>,
    seen_links: HashSet<String>,
    seen_names: HashSet<String>,
    accepted: usize,
    duplicates: usize,
    keyless: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a record. Returns `true` and registers all of the record's
    /// identity keys on first sight; returns `false` when any key was seen
    /// before. A record with no identity key at all is admitted (and
    /// counted), since nothing proves it a repeat.
    pub fn admit(&mut self, raw: &RawProduct) -> bool {
        if let Some(key) = self.known_key(raw) {
            self.duplicates += 1;
            debug!(
                "⏭️ Duplicate card skipped ({key:?}: {})",
                duplicate_key_display(raw, key)
            );
            return false;
        }

        if let Some(sku) = &raw.sku {
            self.seen_skus.insert(sku.clone());
        }
        if let Some(link) = &raw.link {
            self.seen_links.insert(link.clone());
        }
        if let Some(name) = raw.identity_name() {
            self.seen_names.insert(name.to_string());
        }
        if !raw.has_identity() {
            self.keyless += 1;
        }
        self.accepted += 1;
        true
    }

    /// Which key, checked in reliability order, flags this record as seen.
    fn known_key(&self, raw: &RawProduct) -> Option<IdentityKey> {
        if let Some(sku) = &raw.sku {
            if self.seen_skus.contains(sku) {
                return Some(IdentityKey::Sku);
            }
        }
        if let Some(link) = &raw.link {
            if self.seen_links.contains(link) {
                return Some(IdentityKey::Link);
            }
        }
        if let Some(name) = raw.identity_name() {
            if self.seen_names.contains(name) {
                return Some(IdentityKey::Name);
            }
        }
        None
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn keyless(&self) -> usize {
        self.keyless
    }
}

fn duplicate_key_display(raw: &RawProduct, key: IdentityKey) -> String {
    match key {
        IdentityKey::Sku => raw.sku.clone().unwrap_or_default(),
        IdentityKey::Link => raw.link.clone().unwrap_or_default(),
        IdentityKey::Name => raw.identity_name().unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::NAME_NOT_FOUND;

    fn raw(
        sku: Option<&str>,
        link: Option<&str>,
        name: &str,
    ) -> RawProduct {
        RawProduct {
            link: link.map(str::to_string),
            sku: sku.map(str::to_string),
            name: name.to_string(),
            image: None,
            price_pay: None,
            price_resale: None,
            price_profit: None,
            discount: None,
            price_list: None,
            promo_tag: None,
            available: true,
        }
    }

    #[test]
    fn test_same_sku_with_different_links_is_a_duplicate() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.admit(&raw(Some("78365"), Some("https://a/produto/78365"), "Malbec")));
        assert!(!dedup.admit(&raw(
            Some("78365"),
            Some("https://a/produto/78365?origem=vitrine"),
            "Malbec Eau de Parfum"
        )));
        assert_eq!(dedup.duplicates(), 1);
        assert_eq!(dedup.accepted(), 1);
    }

    #[test]
    fn test_name_matches_after_trimming() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.admit(&raw(None, None, "Creme Nivea")));
        assert!(!dedup.admit(&raw(None, None, "  Creme Nivea  ")));
    }

    #[test]
    fn test_sentinel_names_never_collide() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.admit(&raw(None, None, NAME_NOT_FOUND)));
        assert!(dedup.admit(&raw(None, None, NAME_NOT_FOUND)));
        assert_eq!(dedup.duplicates(), 0);
        assert_eq!(dedup.keyless(), 2);
    }

    #[test]
    fn test_distinct_records_register_every_key() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.admit(&raw(
            Some("101"),
            Some("https://a/produto/101"),
            "Lily Lumière"
        )));
        // Each key alone must now collide.
        assert!(!dedup.admit(&raw(Some("101"), None, NAME_NOT_FOUND)));
        assert!(!dedup.admit(&raw(None, Some("https://a/produto/101"), NAME_NOT_FOUND)));
        assert!(!dedup.admit(&raw(None, None, "Lily Lumière")));
        assert_eq!(dedup.duplicates(), 3);
    }

    #[test]
    fn test_second_record_sharing_only_a_weak_key_is_still_a_duplicate() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.admit(&raw(Some("200"), Some("https://a/produto/200"), "Kit Egeo")));
        // Different SKU, same name: the name index catches it.
        assert!(!dedup.admit(&raw(Some("201"), Some("https://a/produto/201"), "Kit Egeo")));
        // The rejected record's keys were not registered.
        assert!(dedup.admit(&raw(Some("201"), None, "Kit Egeo Dolce")));
    }
}
