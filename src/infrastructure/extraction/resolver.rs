//! Cascading locator resolution.
//!
//! One field, many strategies: each strategy is tried in declared order and
//! the first plausible hit resolves the field. Element-level session errors
//! (missing nodes, stale handles, unparseable selectors) count as a miss for
//! that strategy; only session-fatal errors propagate.

use tracing::{debug, trace};

use crate::domain::locator::{ExtractMode, FieldSpec, LocatorStrategy};
use crate::domain::session::{AutomationSession, SessionResult};

/// Outcome of a value cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    /// Index of the winning strategy within the cascade, 0 = preferred.
    pub strategy_index: usize,
}

/// Resolve a field to a text value. `None` means every strategy missed,
/// which is a normal outcome on a drifted or partial card.
pub async fn resolve_value<S: AutomationSession>(
    session: &S,
    spec: &FieldSpec,
    scope: Option<&S::Handle>,
) -> SessionResult<Option<ResolvedValue>> {
    for (index, strategy) in spec.strategies.iter().enumerate() {
        match strategy_value(session, strategy, scope).await {
            Ok(Some(value)) => {
                if index > 0 {
                    debug!(
                        "🔁 Field '{}' resolved by fallback strategy {} ({})",
                        spec.name,
                        index + 1,
                        strategy.query
                    );
                }
                return Ok(Some(ResolvedValue {
                    value,
                    strategy_index: index,
                }));
            }
            Ok(None) => {}
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                trace!(
                    "Strategy {} for '{}' failed: {error}",
                    index + 1,
                    spec.name
                );
            }
        }
    }
    Ok(None)
}

/// Resolve a field to an interactable element. Affordances (buttons behind
/// label paragraphs) and form fields share the cascade model with value
/// fields.
pub async fn resolve_element<S: AutomationSession>(
    session: &S,
    spec: &FieldSpec,
    scope: Option<&S::Handle>,
) -> SessionResult<Option<S::Handle>> {
    for (index, strategy) in spec.strategies.iter().enumerate() {
        match strategy_element(session, strategy, scope).await {
            Ok(Some(handle)) => {
                if index > 0 {
                    debug!(
                        "🔁 Element '{}' resolved by fallback strategy {} ({})",
                        spec.name,
                        index + 1,
                        strategy.query
                    );
                }
                return Ok(Some(handle));
            }
            Ok(None) => {}
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                trace!(
                    "Strategy {} for '{}' failed: {error}",
                    index + 1,
                    spec.name
                );
            }
        }
    }
    Ok(None)
}

/// Run one strategy to a value: query, derive the target per mode, read,
/// and keep the first candidate that passes the plausibility checks.
async fn strategy_value<S: AutomationSession>(
    session: &S,
    strategy: &LocatorStrategy,
    scope: Option<&S::Handle>,
) -> SessionResult<Option<String>> {
    let candidates = session.query(&strategy.query, scope).await?;
    for candidate in &candidates {
        let Some(target) = derive_target(session, strategy, candidate).await? else {
            continue;
        };
        let value = match &strategy.mode {
            ExtractMode::Attribute(name) => session
                .read_attribute(&target, name)
                .await?
                .unwrap_or_default(),
            _ => session.read_text(&target).await?,
        };
        let trimmed = value.trim();
        if strategy.is_plausible(trimmed) {
            return Ok(Some(trimmed.to_string()));
        }
    }
    Ok(None)
}

async fn strategy_element<S: AutomationSession>(
    session: &S,
    strategy: &LocatorStrategy,
    scope: Option<&S::Handle>,
) -> SessionResult<Option<S::Handle>> {
    let candidates = session.query(&strategy.query, scope).await?;
    for candidate in &candidates {
        if let Some(target) = derive_target(session, strategy, candidate).await? {
            return Ok(Some(target));
        }
    }
    Ok(None)
}

/// Apply the strategy's mode to a matched candidate. Sibling and ancestor
/// derivations can legitimately come up empty, in which case the next
/// candidate (or strategy) gets its turn.
async fn derive_target<S: AutomationSession>(
    session: &S,
    strategy: &LocatorStrategy,
    candidate: &S::Handle,
) -> SessionResult<Option<S::Handle>> {
    match &strategy.mode {
        ExtractMode::FollowingText => session.following_sibling(candidate).await,
        ExtractMode::AncestorTag(tag) => session.ancestor_with_tag(candidate, tag).await,
        ExtractMode::Text | ExtractMode::Attribute(_) => Ok(Some(candidate.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::snapshot::SnapshotSession;

    const CARD: &str = r#"
        <html><body>
          <div data-flora="card">
            <div class="flora--c-ieqJkR"><p>Malbec Tradicional 100ml</p></div>
            <p>Revenda</p>
            <p>R$ 139,44</p>
            <span data-custom="true"><p>Promo</p></span>
            <span data-custom="true"><p>78365</p></span>
            <button class="cta"><p>Ver mais produtos</p></button>
          </div>
        </body></html>
    "#;

    #[tokio::test]
    async fn test_first_plausible_strategy_wins() {
        let session = SnapshotSession::from_html(CARD);
        let spec = FieldSpec::new(
            "nome",
            vec![
                LocatorStrategy::css("div.flora--c-ieqJkR p"),
                LocatorStrategy::css("p"),
            ],
        );
        let resolved = resolve_value(&session, &spec, None).await.unwrap().unwrap();
        assert_eq!(resolved.value, "Malbec Tradicional 100ml");
        assert_eq!(resolved.strategy_index, 0);
    }

    #[tokio::test]
    async fn test_cascade_falls_through_missing_strategies() {
        let session = SnapshotSession::from_html(CARD);
        let spec = FieldSpec::new(
            "nome",
            vec![
                LocatorStrategy::css("h1.titulo-produto"),
                LocatorStrategy::css("div.flora--c-ieqJkR p"),
            ],
        );
        let resolved = resolve_value(&session, &spec, None).await.unwrap().unwrap();
        assert_eq!(resolved.value, "Malbec Tradicional 100ml");
        assert_eq!(resolved.strategy_index, 1);
    }

    #[tokio::test]
    async fn test_implausible_candidates_are_skipped_within_a_strategy() {
        // Both data-custom spans match; only the digit-only one is a SKU.
        let session = SnapshotSession::from_html(CARD);
        let spec = FieldSpec::new(
            "sku",
            vec![LocatorStrategy::css("span[data-custom=\"true\"] p").digits_only()],
        );
        let resolved = resolve_value(&session, &spec, None).await.unwrap().unwrap();
        assert_eq!(resolved.value, "78365");
    }

    #[tokio::test]
    async fn test_label_following_reads_the_value_paragraph() {
        let session = SnapshotSession::from_html(CARD);
        let spec = FieldSpec::new("preco_revenda", vec![LocatorStrategy::label_following("Revenda")]);
        let resolved = resolve_value(&session, &spec, None).await.unwrap().unwrap();
        assert_eq!(resolved.value, "R$ 139,44");
    }

    #[tokio::test]
    async fn test_label_ancestor_resolves_the_clickable_control() {
        let session = SnapshotSession::from_html(CARD);
        let spec = FieldSpec::new(
            "ver_mais",
            vec![
                LocatorStrategy::label_ancestor("Ver mais produtos", "button"),
                LocatorStrategy::label("Ver mais produtos"),
            ],
        );
        let handle = resolve_element(&session, &spec, None).await.unwrap();
        assert!(handle.is_some());
        let text = session.read_text(&handle.unwrap()).await.unwrap();
        assert_eq!(text.trim(), "Ver mais produtos");
    }

    #[tokio::test]
    async fn test_exhausted_cascade_resolves_to_none() {
        let session = SnapshotSession::from_html(CARD);
        let spec = FieldSpec::new("desconto", vec![LocatorStrategy::css("p[data-testid=\"discount\"]")]);
        assert_eq!(resolve_value(&session, &spec, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_spec_resolves_to_none_without_session_calls() {
        let session = SnapshotSession::from_html(CARD);
        let spec = FieldSpec::empty("sku");
        assert_eq!(resolve_value(&session, &spec, None).await.unwrap(), None);
        assert!(resolve_element(&session, &spec, None).await.unwrap().is_none());
    }
}
