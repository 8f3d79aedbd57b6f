//! Offline session over captured page markup.
//!
//! Parses a saved HTML document with `scraper` and serves the whole
//! [`AutomationSession`] port from it. Chunked snapshots reveal additional
//! markup on every trigger, which is how incremental-loading behavior is
//! exercised without a browser. The replay binary drives the same session
//! over the debug dump of a live run.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::domain::locator::LocatorQuery;
use crate::domain::session::{AutomationSession, SessionError, SessionResult};

/// Marker where revealed chunks are spliced into the document. Without it,
/// chunks land at the end of `<body>`.
pub const APPEND_MARKER: &str = "<!-- snapshot:append -->";

/// Address of an element as child-element indexes from the document root.
///
/// Paths stay valid across re-parses because chunk reveals only ever append
/// nodes after the existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotHandle(Vec<usize>);

struct SnapshotState {
    html: String,
    pending_chunks: VecDeque<String>,
    exhausted_label: Option<String>,
    current_url: String,
    post_trigger_url: Option<String>,
    filled: Vec<String>,
    triggers: usize,
    closed: bool,
}

/// In-memory automation session backed by parsed HTML.
pub struct SnapshotSession {
    state: Mutex<SnapshotState>,
}

impl SnapshotSession {
    pub fn from_html(html: &str) -> Self {
        Self {
            state: Mutex::new(SnapshotState {
                html: html.to_string(),
                pending_chunks: VecDeque::new(),
                exhausted_label: None,
                current_url: "snapshot://local".to_string(),
                post_trigger_url: None,
                filled: Vec::new(),
                triggers: 0,
                closed: false,
            }),
        }
    }

    /// Load a snapshot from disk, typically a `pagina_debug.html` dump.
    pub async fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let html = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read page snapshot {path:?}"))?;
        Ok(Self::from_html(&html))
    }

    /// Markup revealed one piece per trigger, in order.
    #[must_use]
    pub fn with_chunks(self, chunks: Vec<String>) -> Self {
        {
            let mut state = self.lock();
            state.pending_chunks = chunks.into();
        }
        self
    }

    /// Hide elements carrying this label once all chunks are revealed.
    /// Models listings that remove their "load more" control at the end.
    #[must_use]
    pub fn exhaust_affordance(self, label: &str) -> Self {
        {
            let mut state = self.lock();
            state.exhausted_label = Some(label.to_string());
        }
        self
    }

    /// URL reported before any navigation.
    #[must_use]
    pub fn with_url(self, url: &str) -> Self {
        {
            let mut state = self.lock();
            state.current_url = url.to_string();
        }
        self
    }

    /// URL the session moves to on the first trigger. Models the redirect
    /// that follows a submitted sign-in form.
    #[must_use]
    pub fn with_post_trigger_url(self, url: &str) -> Self {
        {
            let mut state = self.lock();
            state.post_trigger_url = Some(url.to_string());
        }
        self
    }

    /// Values typed into form fields, in call order.
    pub fn filled_values(&self) -> Vec<String> {
        self.lock().filled.clone()
    }

    /// Number of trigger activations so far.
    pub fn triggers_fired(&self) -> usize {
        self.lock().triggers
    }

    fn lock(&self) -> MutexGuard<'_, SnapshotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current markup, or an error when the session has been closed.
    fn live_html(&self) -> SessionResult<String> {
        let state = self.lock();
        if state.closed {
            return Err(SessionError::Backend("session is closed".to_string()));
        }
        Ok(state.html.clone())
    }
}

fn element_at<'a>(document: &'a Html, path: &[usize]) -> Option<ElementRef<'a>> {
    let mut current = document.root_element();
    for &index in path {
        current = current
            .children()
            .filter_map(ElementRef::wrap)
            .nth(index)?;
    }
    Some(current)
}

fn path_of(element: ElementRef<'_>) -> Vec<usize> {
    let mut path = Vec::new();
    let mut node = *element;
    while let Some(parent) = node.parent() {
        if !parent.value().is_element() {
            break;
        }
        let index = parent
            .children()
            .filter(|child| child.value().is_element())
            .position(|child| child.id() == node.id())
            .unwrap_or(0);
        path.push(index);
        node = parent;
    }
    path.reverse();
    path
}

/// Text sitting directly inside an element, not inside its children. Label
/// matching works on this so that a container never shadows the labelled
/// element it wraps.
fn direct_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|text| text.trim().to_string()))
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_matches(
    html: &str,
    query: &LocatorQuery,
    scope: Option<&[usize]>,
) -> SessionResult<Vec<SnapshotHandle>> {
    let document = Html::parse_document(html);
    let scope_element = match scope {
        Some(path) => Some(element_at(&document, path).ok_or_else(|| {
            SessionError::Stale(format!("scope {path:?} no longer resolves"))
        })?),
        None => None,
    };

    let matches: Vec<ElementRef<'_>> = match query {
        LocatorQuery::Css(selector_text) => {
            let selector = Selector::parse(selector_text).map_err(|error| {
                SessionError::InvalidLocator(format!("{selector_text}: {error}"))
            })?;
            match scope_element {
                Some(scope_el) => scope_el.select(&selector).collect(),
                None => document.select(&selector).collect(),
            }
        }
        LocatorQuery::LabelText(label) => {
            let root = scope_element.unwrap_or_else(|| document.root_element());
            root.descendants()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.id() != root.id())
                .filter(|el| direct_text(*el).contains(label.as_str()))
                .collect()
        }
    };

    Ok(matches
        .into_iter()
        .map(|el| SnapshotHandle(path_of(el)))
        .collect())
}

fn reveal(html: &mut String, chunk: &str) {
    if let Some(index) = html.find(APPEND_MARKER) {
        html.insert_str(index, chunk);
    } else if let Some(index) = html.rfind("</body>") {
        html.insert_str(index, chunk);
    } else {
        html.push_str(chunk);
    }
}

#[async_trait]
impl AutomationSession for SnapshotSession {
    type Handle = SnapshotHandle;

    async fn navigate(&self, url: &str) -> SessionResult<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(SessionError::Backend("session is closed".to_string()));
        }
        state.current_url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> SessionResult<String> {
        let state = self.lock();
        if state.closed {
            return Err(SessionError::Backend("session is closed".to_string()));
        }
        Ok(state.current_url.clone())
    }

    async fn wait_for_presence(
        &self,
        query: &LocatorQuery,
        _timeout: Duration,
    ) -> SessionResult<bool> {
        // Snapshots only mutate through triggers, so a single check is
        // equivalent to polling.
        let handles = self.query(query, None).await?;
        Ok(!handles.is_empty())
    }

    async fn query(
        &self,
        query: &LocatorQuery,
        scope: Option<&SnapshotHandle>,
    ) -> SessionResult<Vec<SnapshotHandle>> {
        let html = {
            let state = self.lock();
            if state.closed {
                return Err(SessionError::Backend("session is closed".to_string()));
            }
            if let LocatorQuery::LabelText(label) = query {
                let exhausted = state.pending_chunks.is_empty()
                    && state.exhausted_label.as_deref() == Some(label.as_str());
                if exhausted {
                    return Ok(Vec::new());
                }
            }
            state.html.clone()
        };
        collect_matches(&html, query, scope.map(|handle| handle.0.as_slice()))
    }

    async fn read_text(&self, handle: &SnapshotHandle) -> SessionResult<String> {
        let html = self.live_html()?;
        let document = Html::parse_document(&html);
        let element = element_at(&document, &handle.0)
            .ok_or_else(|| SessionError::Stale(format!("handle {:?} no longer resolves", handle.0)))?;
        let joined = element.text().collect::<Vec<_>>().join(" ");
        Ok(joined.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    async fn read_attribute(
        &self,
        handle: &SnapshotHandle,
        name: &str,
    ) -> SessionResult<Option<String>> {
        let html = self.live_html()?;
        let document = Html::parse_document(&html);
        let element = element_at(&document, &handle.0)
            .ok_or_else(|| SessionError::Stale(format!("handle {:?} no longer resolves", handle.0)))?;
        Ok(element.value().attr(name).map(str::to_string))
    }

    async fn following_sibling(
        &self,
        handle: &SnapshotHandle,
    ) -> SessionResult<Option<SnapshotHandle>> {
        let html = self.live_html()?;
        let document = Html::parse_document(&html);
        let element = element_at(&document, &handle.0)
            .ok_or_else(|| SessionError::Stale(format!("handle {:?} no longer resolves", handle.0)))?;
        Ok(element
            .next_siblings()
            .find_map(ElementRef::wrap)
            .map(|sibling| SnapshotHandle(path_of(sibling))))
    }

    async fn ancestor_with_tag(
        &self,
        handle: &SnapshotHandle,
        tag: &str,
    ) -> SessionResult<Option<SnapshotHandle>> {
        let html = self.live_html()?;
        let document = Html::parse_document(&html);
        let element = element_at(&document, &handle.0)
            .ok_or_else(|| SessionError::Stale(format!("handle {:?} no longer resolves", handle.0)))?;
        Ok(element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
            .map(|ancestor| SnapshotHandle(path_of(ancestor))))
    }

    async fn fill(&self, handle: &SnapshotHandle, text: &str) -> SessionResult<()> {
        // Validate the handle, then record what was typed.
        let html = self.live_html()?;
        let document = Html::parse_document(&html);
        element_at(&document, &handle.0)
            .ok_or_else(|| SessionError::Stale(format!("handle {:?} no longer resolves", handle.0)))?;
        self.lock().filled.push(text.to_string());
        Ok(())
    }

    async fn trigger(&self, handle: &SnapshotHandle) -> SessionResult<()> {
        let html = self.live_html()?;
        let document = Html::parse_document(&html);
        element_at(&document, &handle.0)
            .ok_or_else(|| SessionError::Stale(format!("handle {:?} no longer resolves", handle.0)))?;
        drop(document);

        let mut state = self.lock();
        state.triggers += 1;
        if let Some(chunk) = state.pending_chunks.pop_front() {
            reveal(&mut state.html, &chunk);
        }
        if let Some(url) = state.post_trigger_url.take() {
            state.current_url = url;
        }
        Ok(())
    }

    async fn scroll_into_view(&self, _handle: &SnapshotHandle) -> SessionResult<()> {
        Ok(())
    }

    async fn visible_count(&self, query: &LocatorQuery) -> SessionResult<usize> {
        let handles = self.query(query, None).await?;
        Ok(handles.len())
    }

    async fn page_source(&self) -> SessionResult<String> {
        self.live_html()
    }

    async fn close(&self) -> SessionResult<()> {
        self.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <div id="grid">
            <div data-flora="card"><p>Card A</p></div>
            <div data-flora="card"><p>Card B</p></div>
            <!-- snapshot:append -->
          </div>
          <button><p>Ver mais produtos</p></button>
        </body></html>
    "#;

    const MORE_CARDS: &str =
        r#"<div data-flora="card"><p>Card C</p></div><div data-flora="card"><p>Card D</p></div>"#;

    fn cards() -> LocatorQuery {
        LocatorQuery::css("div[data-flora=\"card\"]")
    }

    #[tokio::test]
    async fn test_css_queries_return_document_order() {
        let session = SnapshotSession::from_html(LISTING);
        let handles = session.query(&cards(), None).await.unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(session.read_text(&handles[0]).await.unwrap(), "Card A");
        assert_eq!(session.read_text(&handles[1]).await.unwrap(), "Card B");
    }

    #[tokio::test]
    async fn test_scoped_query_only_sees_descendants() {
        let session = SnapshotSession::from_html(LISTING);
        let grid = session
            .query(&LocatorQuery::css("#grid"), None)
            .await
            .unwrap()
            .remove(0);
        let inside = session
            .query(&LocatorQuery::label("Ver mais produtos"), Some(&grid))
            .await
            .unwrap();
        assert!(inside.is_empty());
        let anywhere = session
            .query(&LocatorQuery::label("Ver mais produtos"), None)
            .await
            .unwrap();
        assert_eq!(anywhere.len(), 1);
    }

    #[tokio::test]
    async fn test_handles_survive_chunk_reveals() {
        let session =
            SnapshotSession::from_html(LISTING).with_chunks(vec![MORE_CARDS.to_string()]);
        let before = session.query(&cards(), None).await.unwrap();
        assert_eq!(before.len(), 2);

        let button = session
            .query(&LocatorQuery::label("Ver mais produtos"), None)
            .await
            .unwrap()
            .remove(0);
        session.trigger(&button).await.unwrap();

        assert_eq!(session.visible_count(&cards()).await.unwrap(), 4);
        // Pre-reveal handles still point at the same elements.
        assert_eq!(session.read_text(&before[0]).await.unwrap(), "Card A");
        assert_eq!(session.read_text(&before[1]).await.unwrap(), "Card B");
    }

    #[tokio::test]
    async fn test_exhausted_affordance_disappears_from_label_queries() {
        let session = SnapshotSession::from_html(LISTING)
            .with_chunks(vec![MORE_CARDS.to_string()])
            .exhaust_affordance("Ver mais produtos");
        let affordance = LocatorQuery::label("Ver mais produtos");

        let button = session.query(&affordance, None).await.unwrap().remove(0);
        session.trigger(&button).await.unwrap();

        // Last chunk consumed, the control is gone.
        assert!(session.query(&affordance, None).await.unwrap().is_empty());
        assert!(!session
            .wait_for_presence(&affordance, Duration::from_secs(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_first_trigger_navigates_when_configured() {
        let session = SnapshotSession::from_html(LISTING)
            .with_url("https://portal.example/login")
            .with_post_trigger_url("https://portal.example/");
        let button = session
            .query(&LocatorQuery::label("Ver mais produtos"), None)
            .await
            .unwrap()
            .remove(0);

        assert_eq!(
            session.current_url().await.unwrap(),
            "https://portal.example/login"
        );
        session.trigger(&button).await.unwrap();
        assert_eq!(session.current_url().await.unwrap(), "https://portal.example/");
        assert_eq!(session.triggers_fired(), 1);
    }

    #[tokio::test]
    async fn test_sibling_and_ancestor_derivation() {
        let session = SnapshotSession::from_html(
            r#"<html><body><button id="cta"><p>Ver mais produtos</p></button>
               <p id="label">Revenda</p><p>R$ 139,44</p></body></html>"#,
        );

        let label = session
            .query(&LocatorQuery::css("#label"), None)
            .await
            .unwrap()
            .remove(0);
        let value = session.following_sibling(&label).await.unwrap().unwrap();
        assert_eq!(session.read_text(&value).await.unwrap(), "R$ 139,44");

        let inner = session
            .query(&LocatorQuery::css("#cta p"), None)
            .await
            .unwrap()
            .remove(0);
        let button = session.ancestor_with_tag(&inner, "button").await.unwrap().unwrap();
        let tag_probe = session.read_attribute(&button, "id").await.unwrap();
        assert_eq!(tag_probe.as_deref(), Some("cta"));
        assert!(session.ancestor_with_tag(&inner, "form").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fill_records_typed_values() {
        let session = SnapshotSession::from_html(
            r#"<html><body><input id="username"><input id="password"></body></html>"#,
        );
        let user = session
            .query(&LocatorQuery::css("#username"), None)
            .await
            .unwrap()
            .remove(0);
        let pass = session
            .query(&LocatorQuery::css("#password"), None)
            .await
            .unwrap()
            .remove(0);

        session.fill(&user, "00000000000").await.unwrap();
        session.fill(&pass, "segredo").await.unwrap();
        assert_eq!(session.filled_values(), vec!["00000000000", "segredo"]);
    }

    #[tokio::test]
    async fn test_read_text_collapses_whitespace() {
        let session = SnapshotSession::from_html(
            "<html><body><div id=\"x\"><span>R$</span>\n   <span>118,52</span></div></body></html>",
        );
        let div = session
            .query(&LocatorQuery::css("#x"), None)
            .await
            .unwrap()
            .remove(0);
        assert_eq!(session.read_text(&div).await.unwrap(), "R$ 118,52");
    }

    #[tokio::test]
    async fn test_closed_session_rejects_operations() {
        let session = SnapshotSession::from_html(LISTING);
        session.close().await.unwrap();
        let error = session.query(&cards(), None).await.unwrap_err();
        assert!(error.is_fatal());
    }
}
