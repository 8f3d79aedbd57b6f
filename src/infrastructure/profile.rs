//! Site profiles.
//!
//! A profile is the complete declarative description of one listing: where
//! it lives, how to sign in, what a product card looks like and how every
//! field and affordance on it is located. The extraction core is profile
//! agnostic; pointing the pipeline at another storefront section means
//! writing another table here, not another extractor.

use serde::{Deserialize, Serialize};

use crate::domain::locator::{FieldSpec, LocatorQuery, LocatorStrategy};
use crate::infrastructure::config::portal;

/// Sign-in form description for listings behind a login wall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSpec {
    pub login_url: String,
    pub username_field: FieldSpec,
    pub password_field: FieldSpec,
    pub submit: FieldSpec,
    /// Substring that marks the login route; sign-in succeeded once the
    /// current URL no longer contains it.
    pub route_marker: String,
}

/// Locator cascades for every field of a product card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFieldSpecs {
    pub link: FieldSpec,
    pub sku: FieldSpec,
    pub name: FieldSpec,
    pub image: FieldSpec,
    pub price_pay: FieldSpec,
    pub price_resale: FieldSpec,
    pub price_profit: FieldSpec,
    pub discount: FieldSpec,
    pub price_list: FieldSpec,
    pub promo_tag: FieldSpec,
    /// Presence probe; `None` means the listing never marks availability
    /// and every card counts as available.
    pub availability: Option<FieldSpec>,
}

/// Declarative description of one storefront listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    pub base_url: String,
    /// Origin used to absolutize relative product links.
    pub origin: String,
    pub login: Option<LoginSpec>,
    /// Card container queries, most specific first. The first query is also
    /// the one the load controller counts cards with.
    pub card_queries: Vec<LocatorQuery>,
    pub fields: ProductFieldSpecs,
    /// "Load more" affordance; `None` for listings rendered in one shot.
    pub load_more: Option<FieldSpec>,
    /// Entry affordance that opens the full catalog from the landing page.
    pub catalog_entry: Option<FieldSpec>,
    /// Where the active sales-cycle banner lives.
    pub cycle_banner: Option<FieldSpec>,
}

impl SiteProfile {
    /// Public showcase carousel on the consumer storefront. No login, no
    /// incremental loading, generic class-fragment selectors. Mostly useful
    /// as proof that listing differences stay inside the profile table.
    pub fn vitrine() -> Self {
        Self {
            name: "vitrine".to_string(),
            base_url: "https://www.boticario.com.br/".to_string(),
            origin: "https://www.boticario.com.br".to_string(),
            login: None,
            card_queries: vec![
                LocatorQuery::css("[class*=\"showcase-card\"]"),
                LocatorQuery::css("[class*=\"product-card\"]"),
                LocatorQuery::css("article"),
                LocatorQuery::css(".product-item"),
            ],
            fields: ProductFieldSpecs {
                link: FieldSpec::new(
                    "link",
                    vec![
                        LocatorStrategy::css_attr(".showcase-card-link-overlay", "href"),
                        LocatorStrategy::css_attr("a[href]", "href"),
                    ],
                ),
                sku: FieldSpec::empty("sku"),
                name: FieldSpec::new(
                    "nome",
                    vec![
                        LocatorStrategy::css("h3"),
                        LocatorStrategy::css("h4"),
                        LocatorStrategy::css("h2"),
                        LocatorStrategy::css("[class*=\"name\"]"),
                        LocatorStrategy::css("[class*=\"title\"]"),
                        LocatorStrategy::css(".product-title"),
                    ],
                ),
                image: FieldSpec::new(
                    "imagem",
                    vec![
                        LocatorStrategy::css_attr("img", "src").rejecting("data:image"),
                        LocatorStrategy::css_attr("img", "srcset"),
                    ],
                ),
                price_pay: FieldSpec::new(
                    "preco",
                    vec![
                        LocatorStrategy::css("[class*=\"current-price\"]"),
                        LocatorStrategy::css("[class*=\"price\"]"),
                        LocatorStrategy::css("[class*=\"preco\"]"),
                        LocatorStrategy::css(".valor"),
                    ],
                ),
                price_resale: FieldSpec::empty("preco_revenda"),
                price_profit: FieldSpec::empty("preco_lucre"),
                discount: FieldSpec::new(
                    "desconto",
                    vec![
                        LocatorStrategy::css("[class*=\"discount\"]"),
                        LocatorStrategy::css("[class*=\"desconto\"]"),
                        LocatorStrategy::css("[class*=\"off\"]"),
                    ],
                ),
                price_list: FieldSpec::new(
                    "preco_original",
                    vec![
                        LocatorStrategy::css("[class*=\"original\"]"),
                        LocatorStrategy::css("[class*=\"old\"]"),
                        LocatorStrategy::css(".price-before"),
                    ],
                ),
                promo_tag: FieldSpec::new(
                    "tag_promocao",
                    vec![
                        LocatorStrategy::css("[class*=\"badge\"]"),
                        LocatorStrategy::css("[class*=\"tag\"]"),
                        LocatorStrategy::css("[class*=\"description\"]"),
                    ],
                ),
                availability: None,
            },
            load_more: None,
            catalog_entry: None,
            cycle_banner: None,
        }
    }
}

/// The reseller portal is the profile this crate exists for.
impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            name: "revendedores".to_string(),
            base_url: portal::BASE_URL.to_string(),
            origin: portal::ORIGIN.to_string(),
            login: Some(LoginSpec {
                login_url: portal::LOGIN_URL.to_string(),
                username_field: FieldSpec::new(
                    "usuario",
                    vec![
                        LocatorStrategy::css("input#username"),
                        LocatorStrategy::css("input[name=\"username\"]"),
                        LocatorStrategy::css("input[placeholder*=\"CPF\"]"),
                        LocatorStrategy::css("input[autocomplete=\"username\"]"),
                    ],
                ),
                password_field: FieldSpec::new(
                    "senha",
                    vec![
                        LocatorStrategy::css("input#password"),
                        LocatorStrategy::css("input[name=\"password\"]"),
                        LocatorStrategy::css("input[type=\"password\"]"),
                        LocatorStrategy::css("input[autocomplete=\"password\"]"),
                    ],
                ),
                submit: FieldSpec::new(
                    "entrar",
                    vec![
                        LocatorStrategy::css("button[type=\"submit\"]"),
                        LocatorStrategy::label_ancestor("Entrar", "button"),
                        LocatorStrategy::css("input[type=\"submit\"]"),
                        LocatorStrategy::css("button[data-flora=\"button\"]"),
                        LocatorStrategy::label("Entrar"),
                    ],
                ),
                route_marker: "login".to_string(),
            }),
            card_queries: vec![
                LocatorQuery::css("div[data-flora=\"card\"]"),
                LocatorQuery::css("div.flora--c-jAOGHF"),
            ],
            fields: ProductFieldSpecs {
                link: FieldSpec::new(
                    "link",
                    vec![LocatorStrategy::css_attr("a[href*=\"/produto\"]", "href")],
                ),
                sku: FieldSpec::new(
                    "sku",
                    vec![LocatorStrategy::css("span[data-custom=\"true\"] p").digits_only()],
                ),
                name: FieldSpec::new(
                    "nome",
                    vec![
                        LocatorStrategy::css("div.flora--c-ieqJkR p"),
                        LocatorStrategy::css_attr("a[href*=\"/produto\"] img", "alt"),
                    ],
                ),
                image: FieldSpec::new(
                    "imagem",
                    vec![
                        LocatorStrategy::css_attr("img", "src").rejecting("data:image"),
                        LocatorStrategy::css_attr("img", "srcset"),
                    ],
                ),
                price_pay: FieldSpec::new(
                    "preco_pague",
                    vec![
                        LocatorStrategy::css("div[data-pague=\"true\"] p.flora--c-PJLV-gvAhgR"),
                        LocatorStrategy::label_following("Pague"),
                    ],
                ),
                price_resale: FieldSpec::new(
                    "preco_revenda",
                    vec![LocatorStrategy::label_following("Revenda")],
                ),
                price_profit: FieldSpec::new(
                    "preco_lucre",
                    vec![LocatorStrategy::label_following("Lucre")],
                ),
                discount: FieldSpec::new(
                    "desconto",
                    vec![LocatorStrategy::css("p[data-testid=\"discount\"]")],
                ),
                price_list: FieldSpec::new(
                    "preco_original",
                    vec![LocatorStrategy::css("div[data-pague=\"true\"] p.flora--c-PJLV-gxwRVS")],
                ),
                promo_tag: FieldSpec::new(
                    "tag_promocao",
                    vec![
                        LocatorStrategy::css_attr(
                            "span[data-custom=\"promotion\"] p span",
                            "aria-label",
                        ),
                        LocatorStrategy::css("span[data-custom=\"promotion\"] p span"),
                        LocatorStrategy::css("span[data-custom=\"promotion\"]"),
                    ],
                ),
                availability: Some(FieldSpec::new(
                    "disponivel",
                    vec![LocatorStrategy::css("div[data-available=\"true\"]")],
                )),
            },
            load_more: Some(FieldSpec::new(
                "ver_mais",
                vec![
                    LocatorStrategy::label_ancestor(portal::LOAD_MORE_LABEL, "button"),
                    LocatorStrategy::label(portal::LOAD_MORE_LABEL),
                ],
            )),
            catalog_entry: Some(FieldSpec::new(
                "ver_tudo",
                vec![
                    LocatorStrategy::label_ancestor(portal::CATALOG_LABEL, "button"),
                    LocatorStrategy::label_ancestor(portal::CATALOG_LABEL, "a"),
                    LocatorStrategy::label(portal::CATALOG_LABEL),
                ],
            )),
            cycle_banner: Some(FieldSpec::new(
                "ciclo",
                vec![
                    LocatorStrategy::css("small.css-2mmsys"),
                    LocatorStrategy::css("small[class*=\"css-\"]"),
                    LocatorStrategy::label(portal::CYCLE_LABEL),
                ],
            )),
        }
    }
}
