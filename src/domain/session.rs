//! Automation session port.
//!
//! Everything the extraction core needs from a live page is expressed
//! through [`AutomationSession`]. The production implementation drives a
//! WebDriver browser; tests and offline replay run the same core over a
//! parsed HTML snapshot.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

use crate::domain::locator::LocatorQuery;

/// Errors surfaced by an automation session.
///
/// Element-level failures are part of normal operation on a drifting page:
/// the resolver treats them as "no match" and keeps walking its cascade.
/// Session-level failures mean the browser or its driver is gone and the run
/// cannot continue.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Locator could not be evaluated: {0}")]
    InvalidLocator(String),

    #[error("Element is stale or detached: {0}")]
    Stale(String),

    #[error("Element interaction failed: {0}")]
    Interaction(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Automation backend failure: {0}")]
    Backend(String),
}

impl SessionError {
    /// Fatal errors abort the run (after partial results are persisted);
    /// everything else degrades to an unresolved field or a finished loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Navigation(_) | Self::Backend(_))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Sequential page-automation capability.
///
/// One session corresponds to one logged-in browser context. All operations
/// are awaited in order; implementations do not need to support concurrent
/// calls.
#[async_trait]
pub trait AutomationSession: Send + Sync {
    /// Opaque element handle. Handles may go stale when the page mutates;
    /// operations on a stale handle return [`SessionError::Stale`].
    type Handle: Clone + Debug + Send + Sync;

    /// Load the given URL in the session's page.
    async fn navigate(&self, url: &str) -> SessionResult<()>;

    /// URL the page currently sits on.
    async fn current_url(&self) -> SessionResult<String>;

    /// Poll until `query` matches at least one element or the timeout
    /// elapses. Returns whether a match appeared; expiry is not an error.
    async fn wait_for_presence(
        &self,
        query: &LocatorQuery,
        timeout: Duration,
    ) -> SessionResult<bool>;

    /// All elements matching `query`, in document order, searched within
    /// `scope` (or the whole page when `scope` is `None`).
    async fn query(
        &self,
        query: &LocatorQuery,
        scope: Option<&Self::Handle>,
    ) -> SessionResult<Vec<Self::Handle>>;

    /// Visible text content of an element.
    async fn read_text(&self, handle: &Self::Handle) -> SessionResult<String>;

    /// A named attribute, `None` when absent.
    async fn read_attribute(
        &self,
        handle: &Self::Handle,
        name: &str,
    ) -> SessionResult<Option<String>>;

    /// The element immediately following `handle` among its siblings.
    async fn following_sibling(&self, handle: &Self::Handle)
    -> SessionResult<Option<Self::Handle>>;

    /// Nearest enclosing element with the given tag name.
    async fn ancestor_with_tag(
        &self,
        handle: &Self::Handle,
        tag: &str,
    ) -> SessionResult<Option<Self::Handle>>;

    /// Clear a form field and type `text` into it.
    async fn fill(&self, handle: &Self::Handle, text: &str) -> SessionResult<()>;

    /// Activate an element (click or equivalent).
    async fn trigger(&self, handle: &Self::Handle) -> SessionResult<()>;

    /// Bring an element into the viewport. Lazy-rendered listings only
    /// populate cards near the viewport, so extraction scrolls as it walks.
    async fn scroll_into_view(&self, handle: &Self::Handle) -> SessionResult<()>;

    /// Number of elements currently matching `query` on the page.
    async fn visible_count(&self, query: &LocatorQuery) -> SessionResult<usize>;

    /// Full HTML source of the current page, for diagnostic snapshots.
    async fn page_source(&self) -> SessionResult<String>;

    /// Tear the session down. Safe to call once at the end of a run.
    async fn close(&self) -> SessionResult<()>;
}
