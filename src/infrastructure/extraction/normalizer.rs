//! Normalization of raw storefront strings into typed values.
//!
//! Every function here is total: whatever the page rendered, the result is
//! a value or `None`, never an error and never a panic. Unparseable input
//! is routine (placeholder cards, skeleton loaders, mid-render reads) and
//! must not abort a run.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::domain::product::{Product, RawProduct};

/// Brazilian-format amount: thousands separated by `.`, decimals by `,`.
static GROUPED_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{1,3}(?:\.\d{3})*(?:,\d{2})?").expect("amount pattern must compile")
});

/// Loose first-number fallback once `,` has been mapped to `.`.
static LOOSE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.?\d*").expect("number pattern must compile"));

/// Parse a pt-BR currency string. `"R$ 1.234,56"` becomes `1234.56`,
/// `"R$ 118,52"` becomes `118.52`. Multi-line card text keeps only its
/// first line, which is where the amount sits.
pub fn parse_currency(input: &str) -> Option<f64> {
    let cleaned = input
        .replace("R$", "")
        .replace("&nbsp;", "")
        .replace('\u{a0}', "")
        .replace(' ', "");
    let first_line = cleaned.trim().lines().next().unwrap_or_default();

    if let Some(grouped) = GROUPED_AMOUNT.find(first_line) {
        let canonical = grouped.as_str().replace('.', "").replace(',', ".");
        if let Ok(value) = canonical.parse::<f64>() {
            return Some(value);
        }
    }

    let relaxed = first_line.replace(',', ".");
    LOOSE_NUMBER
        .find(&relaxed)
        .and_then(|number| number.as_str().parse().ok())
}

/// Parse a discount badge. `"-15%"` becomes `15.0`; the sign and the `%`
/// are presentation only.
pub fn parse_discount(input: &str) -> Option<f64> {
    let unsigned = input.replace('-', "");
    LOOSE_NUMBER
        .find(&unsigned)
        .and_then(|number| number.as_str().parse().ok())
}

/// Reduce an image source to a single URL. Lazy-loaded cards expose a
/// srcset-style candidate list; the first whitespace/comma-delimited token
/// is the URL of the smallest variant, which is all the record needs.
pub fn normalize_image_url(input: &str) -> Option<String> {
    let first_candidate = input.split(',').next().unwrap_or_default().trim();
    let without_descriptor = first_candidate
        .split_whitespace()
        .next()
        .unwrap_or_default();
    if without_descriptor.is_empty() {
        None
    } else {
        Some(without_descriptor.to_string())
    }
}

/// Prefix origin-relative paths with the portal origin; anything else
/// passes through untouched.
pub fn absolutize_url(href: &str, origin: &str) -> String {
    if !href.starts_with('/') {
        return href.to_string();
    }
    if let Ok(base) = Url::parse(origin) {
        if let Ok(joined) = base.join(href) {
            return joined.to_string();
        }
    }
    format!("{}{}", origin.trim_end_matches('/'), href)
}

/// Product code embedded in a canonical link: the path segment after the
/// last `/produto/`, query string stripped.
pub fn code_from_link(link: &str) -> Option<String> {
    let (_, tail) = link.rsplit_once("/produto/")?;
    let code = tail
        .split('?')
        .next()
        .unwrap_or_default()
        .split('/')
        .next()
        .unwrap_or_default();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

/// Derive the persisted record from a raw capture. Deterministic and
/// one-to-one; field-level failures become `None`, never errors.
pub fn normalize_product(raw: &RawProduct) -> Product {
    let code = raw
        .sku
        .clone()
        .or_else(|| raw.link.as_deref().and_then(code_from_link));

    Product {
        name: raw.name.clone(),
        description: raw.promo_tag.clone(),
        cost_price: raw.price_resale.as_deref().and_then(parse_currency),
        suggested_price: raw.price_pay.as_deref().and_then(parse_currency),
        list_price: raw.price_list.as_deref().and_then(parse_currency),
        discount_percent: raw.discount.as_deref().and_then(parse_discount),
        category: None,
        subcategory: None,
        ean: None,
        sku: raw.sku.clone().or_else(|| code.clone()),
        available: raw.available,
        sales_points: None,
        image_url: raw.image.as_deref().and_then(normalize_image_url),
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("R$ 118,52", Some(118.52))]
    #[case("R$ 1.234,56", Some(1234.56))]
    #[case("R$\u{a0}164,90", Some(164.90))]
    #[case("R$ 99", Some(99.0))]
    #[case("139,44", Some(139.44))]
    #[case("R$ 118,52\nno boleto", Some(118.52))]
    #[case("", None)]
    #[case("   ", None)]
    #[case("indisponível", None)]
    fn test_currency_cases(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_currency(input), expected);
    }

    #[rstest]
    #[case("-15%", Some(15.0))]
    #[case("-7%", Some(7.0))]
    #[case("15% OFF", Some(15.0))]
    #[case("", None)]
    #[case("promo", None)]
    fn test_discount_cases(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_discount(input), expected);
    }

    #[test]
    fn test_srcset_keeps_first_url_token() {
        let srcset = "https://cdn.example/img-320.webp 320w, https://cdn.example/img-640.webp 640w";
        assert_eq!(
            normalize_image_url(srcset).as_deref(),
            Some("https://cdn.example/img-320.webp")
        );
        assert_eq!(
            normalize_image_url("https://cdn.example/plain.png").as_deref(),
            Some("https://cdn.example/plain.png")
        );
        assert_eq!(normalize_image_url("   "), None);
    }

    #[test]
    fn test_absolutize_only_touches_relative_paths() {
        let origin = "https://revendedores.grupoboticario.com.br";
        assert_eq!(
            absolutize_url("/produto/78365", origin),
            "https://revendedores.grupoboticario.com.br/produto/78365"
        );
        assert_eq!(
            absolutize_url("https://outra.loja/produto/1", origin),
            "https://outra.loja/produto/1"
        );
    }

    #[test]
    fn test_code_from_link() {
        assert_eq!(
            code_from_link("https://revendedores.grupoboticario.com.br/produto/78365?origem=home")
                .as_deref(),
            Some("78365")
        );
        assert_eq!(
            code_from_link("https://revendedores.grupoboticario.com.br/produto/78365/detalhe")
                .as_deref(),
            Some("78365")
        );
        assert_eq!(code_from_link("https://revendedores.grupoboticario.com.br/"), None);
    }

    #[test]
    fn test_normalize_product_maps_prices_and_falls_back_to_link_code() {
        let raw = RawProduct {
            link: Some("https://revendedores.grupoboticario.com.br/produto/90210?o=1".to_string()),
            sku: None,
            name: "Lily Eau de Parfum".to_string(),
            image: Some("https://cdn.example/a.webp 320w, https://cdn.example/b.webp".to_string()),
            price_pay: Some("R$ 118,52".to_string()),
            price_resale: Some("R$ 139,44".to_string()),
            price_profit: Some("R$ 20,92".to_string()),
            discount: Some("-15%".to_string()),
            price_list: Some("R$ 164,90".to_string()),
            promo_tag: Some("Leve 3 Pague 2".to_string()),
            available: true,
        };
        let product = normalize_product(&raw);
        assert_eq!(product.code.as_deref(), Some("90210"));
        assert_eq!(product.sku.as_deref(), Some("90210"));
        assert_eq!(product.suggested_price, Some(118.52));
        assert_eq!(product.cost_price, Some(139.44));
        assert_eq!(product.list_price, Some(164.90));
        assert_eq!(product.discount_percent, Some(15.0));
        assert_eq!(product.description.as_deref(), Some("Leve 3 Pague 2"));
        assert_eq!(product.image_url.as_deref(), Some("https://cdn.example/a.webp"));
        assert_eq!(product.category, None);
    }

    proptest! {
        #[test]
        fn test_currency_is_total(input in "\\PC*") {
            let _ = parse_currency(&input);
        }

        #[test]
        fn test_discount_is_total(input in "\\PC*") {
            let _ = parse_discount(&input);
        }

        #[test]
        fn test_image_url_is_total(input in "\\PC*") {
            let _ = normalize_image_url(&input);
        }
    }
}
