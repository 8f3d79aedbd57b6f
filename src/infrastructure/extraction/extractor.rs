//! Per-card record extraction.
//!
//! Runs the resolver once per declared field against a single card element
//! and assembles the immutable [`RawProduct`]. Unresolved fields are `None`
//! (the name gets its sentinel); nothing here is fatal short of losing the
//! session itself.

use tracing::trace;

use crate::domain::locator::FieldSpec;
use crate::domain::product::{NAME_NOT_FOUND, RawProduct};
use crate::domain::session::{AutomationSession, SessionResult};
use crate::infrastructure::extraction::normalizer::absolutize_url;
use crate::infrastructure::extraction::resolver::{resolve_element, resolve_value};
use crate::infrastructure::profile::ProductFieldSpecs;

pub struct RecordExtractor {
    specs: ProductFieldSpecs,
    origin: String,
}

impl RecordExtractor {
    pub fn new(specs: ProductFieldSpecs, origin: impl Into<String>) -> Self {
        Self {
            specs,
            origin: origin.into(),
        }
    }

    /// Extract one card. The link is absolutized here because the canonical
    /// link is an identity key and duplicate detection runs on raw records.
    pub async fn extract<S: AutomationSession>(
        &self,
        session: &S,
        card: &S::Handle,
    ) -> SessionResult<RawProduct> {
        let link = self
            .field(session, &self.specs.link, card)
            .await?
            .map(|href| absolutize_url(&href, &self.origin));

        let sku = self.field(session, &self.specs.sku, card).await?;

        let name = self
            .field(session, &self.specs.name, card)
            .await?
            .unwrap_or_else(|| NAME_NOT_FOUND.to_string());

        let image = self.field(session, &self.specs.image, card).await?;
        let price_pay = self.field(session, &self.specs.price_pay, card).await?;
        let price_resale = self.field(session, &self.specs.price_resale, card).await?;
        let price_profit = self.field(session, &self.specs.price_profit, card).await?;
        let discount = self.field(session, &self.specs.discount, card).await?;
        let price_list = self.field(session, &self.specs.price_list, card).await?;
        let promo_tag = self.field(session, &self.specs.promo_tag, card).await?;

        // Availability is a presence probe, not a value read. Profiles
        // without a probe treat every card as available.
        let available = match &self.specs.availability {
            Some(spec) => resolve_element(session, spec, Some(card)).await?.is_some(),
            None => true,
        };

        Ok(RawProduct {
            link,
            sku,
            name,
            image,
            price_pay,
            price_resale,
            price_profit,
            discount,
            price_list,
            promo_tag,
            available,
        })
    }

    async fn field<S: AutomationSession>(
        &self,
        session: &S,
        spec: &FieldSpec,
        card: &S::Handle,
    ) -> SessionResult<Option<String>> {
        let resolved = resolve_value(session, spec, Some(card)).await?;
        if resolved.is_none() {
            trace!("Field '{}' unresolved on this card", spec.name);
        }
        Ok(resolved.map(|hit| hit.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::profile::SiteProfile;
    use crate::infrastructure::snapshot::SnapshotSession;

    const FULL_CARD_PAGE: &str = r#"
        <html><body>
          <div data-flora="card">
            <a href="/produto/78365?origem=vitrine">
              <img src="data:image/gif;base64,R0lGODlh"
                   srcset="https://res.boticario.com/malbec-320.webp 320w, https://res.boticario.com/malbec-640.webp 640w"
                   alt="Malbec Tradicional Desodorante Colônia 100ml">
            </a>
            <span data-custom="true"><p>78365</p></span>
            <div class="flora--c-ieqJkR"><p>Malbec Tradicional Desodorante Colônia 100ml</p></div>
            <span data-custom="promotion"><p><span aria-label="Leve 3 Pague 2">Leve 3 Pague 2</span></p></span>
            <div data-pague="true">
              <p class="flora--c-PJLV-gxwRVS">R$ 164,90</p>
              <p class="flora--c-PJLV-gvAhgR">R$ 118,52</p>
            </div>
            <p data-testid="discount">-15%</p>
            <p>Revenda</p>
            <p>R$ 139,44</p>
            <p>Lucre</p>
            <p>R$ 20,92</p>
            <div data-available="true"><p>Disponível</p></div>
          </div>
        </body></html>
    "#;

    const SPARSE_CARD_PAGE: &str = r#"
        <html><body>
          <div data-flora="card">
            <a href="/produto/55110"><img alt="Kit Presente Egeo Dolce"></a>
          </div>
        </body></html>
    "#;

    fn extractor() -> RecordExtractor {
        let profile = SiteProfile::default();
        RecordExtractor::new(profile.fields, profile.origin)
    }

    async fn card_of(session: &SnapshotSession) -> <SnapshotSession as AutomationSession>::Handle {
        let profile = SiteProfile::default();
        session
            .query(&profile.card_queries[0], None)
            .await
            .unwrap()
            .into_iter()
            .next()
            .expect("fixture must contain a card")
    }

    #[tokio::test]
    async fn test_full_card_extraction() {
        let session = SnapshotSession::from_html(FULL_CARD_PAGE);
        let card = card_of(&session).await;
        let raw = extractor().extract(&session, &card).await.unwrap();

        assert_eq!(
            raw.link.as_deref(),
            Some("https://revendedores.grupoboticario.com.br/produto/78365?origem=vitrine")
        );
        assert_eq!(raw.sku.as_deref(), Some("78365"));
        assert_eq!(raw.name, "Malbec Tradicional Desodorante Colônia 100ml");
        // Placeholder data URI is rejected; the srcset strategy provides it.
        assert_eq!(
            raw.image.as_deref(),
            Some(
                "https://res.boticario.com/malbec-320.webp 320w, https://res.boticario.com/malbec-640.webp 640w"
            )
        );
        assert_eq!(raw.price_pay.as_deref(), Some("R$ 118,52"));
        assert_eq!(raw.price_resale.as_deref(), Some("R$ 139,44"));
        assert_eq!(raw.price_profit.as_deref(), Some("R$ 20,92"));
        assert_eq!(raw.discount.as_deref(), Some("-15%"));
        assert_eq!(raw.price_list.as_deref(), Some("R$ 164,90"));
        assert_eq!(raw.promo_tag.as_deref(), Some("Leve 3 Pague 2"));
        assert!(raw.available);
    }

    #[tokio::test]
    async fn test_sparse_card_uses_alt_name_and_sentinel_free_fields() {
        let session = SnapshotSession::from_html(SPARSE_CARD_PAGE);
        let card = card_of(&session).await;
        let raw = extractor().extract(&session, &card).await.unwrap();

        assert_eq!(
            raw.link.as_deref(),
            Some("https://revendedores.grupoboticario.com.br/produto/55110")
        );
        assert_eq!(raw.name, "Kit Presente Egeo Dolce");
        assert_eq!(raw.sku, None);
        assert_eq!(raw.price_pay, None);
        assert_eq!(raw.discount, None);
        assert!(!raw.available);
    }

    #[tokio::test]
    async fn test_empty_card_gets_the_name_sentinel() {
        let session = SnapshotSession::from_html(
            r#"<html><body><div data-flora="card"><div class="skeleton"></div></div></body></html>"#,
        );
        let card = card_of(&session).await;
        let raw = extractor().extract(&session, &card).await.unwrap();
        assert_eq!(raw.name, NAME_NOT_FOUND);
        assert!(!raw.has_identity());
    }
}
