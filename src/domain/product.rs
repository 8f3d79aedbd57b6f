//! Product record types.
//!
//! [`RawProduct`] is what one card yields before any value normalization:
//! raw strings exactly as the page rendered them, `None` where every locator
//! strategy missed. [`Product`] is the normalized record persisted to the
//! page files; its serde names follow the established JSON contract of the
//! downstream import, which is why they are Portuguese.

use serde::{Deserialize, Serialize};

/// Sentinel stored when no name strategy produced a plausible value.
/// Sentinel names never participate in duplicate detection.
pub const NAME_NOT_FOUND: &str = "Nome não encontrado";

/// Raw field values captured from one product card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    /// Canonical product link, already made absolute. Identity key.
    pub link: Option<String>,
    /// Digit-only SKU code. Strongest identity key.
    pub sku: Option<String>,
    /// Display name, [`NAME_NOT_FOUND`] when unresolved.
    pub name: String,
    /// Image source as rendered (may still be a full srcset string).
    pub image: Option<String>,
    /// "Pague" price, the amount the reseller pays.
    pub price_pay: Option<String>,
    /// "Revenda" price, the suggested resale amount.
    pub price_resale: Option<String>,
    /// "Lucre" amount shown on the card. Captured for diagnostics; it is
    /// implied by the other two prices and is not persisted.
    pub price_profit: Option<String>,
    /// Discount badge, e.g. `-15%`.
    pub discount: Option<String>,
    /// Struck-through list price before discount.
    pub price_list: Option<String>,
    /// Promotion badge text or aria-label.
    pub promo_tag: Option<String>,
    /// Whether the card advertised availability.
    pub available: bool,
}

impl RawProduct {
    /// Trimmed name usable as an identity key, or `None` for the sentinel
    /// and for blank names.
    pub fn identity_name(&self) -> Option<&str> {
        let trimmed = self.name.trim();
        if trimmed.is_empty() || trimmed == NAME_NOT_FOUND {
            None
        } else {
            Some(trimmed)
        }
    }

    /// Whether any identity key (SKU, link, usable name) is present.
    pub fn has_identity(&self) -> bool {
        self.sku.is_some() || self.link.is_some() || self.identity_name().is_some()
    }
}

/// Normalized product record, one per accepted card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// SKU when available, otherwise the code embedded in the product link.
    #[serde(rename = "codigo")]
    pub code: Option<String>,
    #[serde(rename = "nome")]
    pub name: String,
    /// Promotion text doubles as the only description the listing exposes.
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    /// Reseller cost ("Revenda").
    #[serde(rename = "preco_custo")]
    pub cost_price: Option<f64>,
    /// Suggested sale price ("Pague").
    #[serde(rename = "preco_sugerido")]
    pub suggested_price: Option<f64>,
    /// List price before discount.
    #[serde(rename = "preco_tabela")]
    pub list_price: Option<f64>,
    #[serde(rename = "desconto_percentual")]
    pub discount_percent: Option<f64>,
    /// Not exposed on listing cards; kept for schema compatibility.
    #[serde(rename = "categoria")]
    pub category: Option<String>,
    #[serde(rename = "subcategoria")]
    pub subcategory: Option<String>,
    #[serde(rename = "ean")]
    pub ean: Option<String>,
    #[serde(rename = "sku")]
    pub sku: Option<String>,
    #[serde(rename = "disponivel")]
    pub available: bool,
    #[serde(rename = "pontos_venda")]
    pub sales_points: Option<f64>,
    #[serde(rename = "url_imagem")]
    pub image_url: Option<String>,
}
