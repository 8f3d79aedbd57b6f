//! WebDriver-backed automation session.
//!
//! Production implementation of [`AutomationSession`] driving a Chrome
//! instance through a chromedriver endpoint. Label queries compile to the
//! same `contains(text(), ...)` XPath the portal tolerates; clicks go
//! through script first because the portal wraps its buttons in paragraphs
//! that swallow native clicks.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use thirtyfour::prelude::*;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::domain::locator::LocatorQuery;
use crate::domain::session::{AutomationSession, SessionError, SessionResult};
use crate::infrastructure::config::WebDriverConfig;

const PRESENCE_POLL: Duration = Duration::from_millis(250);

const SCRIPT_CLICK: &str = "arguments[0].click();";
const SCRIPT_SCROLL_CENTER: &str =
    "arguments[0].scrollIntoView({behavior: 'smooth', block: 'center'});";
const SCRIPT_MASK_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// One logged-in Chrome session. Owns the driver connection for the whole
/// run; [`AutomationSession::close`] quits the browser.
pub struct WebDriverSession {
    driver: WebDriver,
}

impl WebDriverSession {
    /// Connect to the WebDriver server and open a hardened Chrome session.
    pub async fn connect(config: &WebDriverConfig) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in [
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-blink-features=AutomationControlled",
        ] {
            caps.add_arg(arg).context("Failed to build browser capabilities")?;
        }
        caps.add_arg(&format!("--user-agent={}", config.user_agent))
            .context("Failed to set the user agent")?;
        caps.add_arg(&format!("--window-size={}", config.window_size))
            .context("Failed to set the window size")?;
        for arg in &config.extra_args {
            caps.add_arg(arg)
                .with_context(|| format!("Failed to add browser argument {arg:?}"))?;
        }
        if config.headless {
            caps.add_arg("--headless=new")
                .context("Failed to enable headless mode")?;
        }
        caps.add_experimental_option("excludeSwitches", json!(["enable-automation"]))
            .context("Failed to hide the automation switches")?;
        caps.add_experimental_option("useAutomationExtension", false)
            .context("Failed to disable the automation extension")?;

        info!("🚀 Connecting to the WebDriver server at {}", config.server_url);
        let driver = WebDriver::new(&config.server_url, caps)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to the WebDriver server at {}",
                    config.server_url
                )
            })?;
        driver
            .execute(SCRIPT_MASK_WEBDRIVER, Vec::new())
            .await
            .context("Failed to mask the webdriver flag")?;
        info!("✅ Browser session ready");
        Ok(Self { driver })
    }
}

#[async_trait]
impl AutomationSession for WebDriverSession {
    type Handle = WebElement;

    async fn navigate(&self, url: &str) -> SessionResult<()> {
        self.driver
            .goto(url)
            .await
            .map_err(|error| SessionError::Navigation(format!("{url}: {error}")))
    }

    async fn current_url(&self) -> SessionResult<String> {
        self.driver
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|error| classify(error, "reading the current URL"))
    }

    async fn wait_for_presence(
        &self,
        query: &LocatorQuery,
        timeout: Duration,
    ) -> SessionResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.query(query, None).await?.is_empty() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(PRESENCE_POLL).await;
        }
    }

    async fn query(
        &self,
        query: &LocatorQuery,
        scope: Option<&Self::Handle>,
    ) -> SessionResult<Vec<Self::Handle>> {
        let by = by_for(query, scope.is_some());
        let found = match scope {
            Some(element) => element.find_all(by).await,
            None => self.driver.find_all(by).await,
        };
        found.map_err(|error| classify(error, "querying elements"))
    }

    async fn read_text(&self, handle: &Self::Handle) -> SessionResult<String> {
        handle
            .text()
            .await
            .map_err(|error| classify(error, "reading element text"))
    }

    async fn read_attribute(
        &self,
        handle: &Self::Handle,
        name: &str,
    ) -> SessionResult<Option<String>> {
        handle
            .attr(name)
            .await
            .map_err(|error| classify(error, "reading an attribute"))
    }

    async fn following_sibling(
        &self,
        handle: &Self::Handle,
    ) -> SessionResult<Option<Self::Handle>> {
        match handle.find(By::XPath("./following-sibling::*[1]")).await {
            Ok(element) => Ok(Some(element)),
            Err(error) => absent_to_none(error, "resolving a following sibling"),
        }
    }

    async fn ancestor_with_tag(
        &self,
        handle: &Self::Handle,
        tag: &str,
    ) -> SessionResult<Option<Self::Handle>> {
        let xpath = format!("./ancestor::{tag}[1]");
        match handle.find(By::XPath(xpath)).await {
            Ok(element) => Ok(Some(element)),
            Err(error) => absent_to_none(error, "resolving an ancestor"),
        }
    }

    async fn fill(&self, handle: &Self::Handle, text: &str) -> SessionResult<()> {
        handle
            .clear()
            .await
            .map_err(|error| classify(error, "clearing a field"))?;
        handle
            .send_keys(text)
            .await
            .map_err(|error| classify(error, "typing into a field"))
    }

    async fn trigger(&self, handle: &Self::Handle) -> SessionResult<()> {
        let target = handle
            .to_json()
            .map_err(|error| classify(error, "passing an element to a script"))?;
        match self.driver.execute(SCRIPT_CLICK, vec![target]).await {
            Ok(_) => Ok(()),
            Err(script_error) => {
                debug!("🔁 Script click failed ({script_error}), trying a native click");
                handle
                    .click()
                    .await
                    .map_err(|error| classify(error, "clicking an element"))
            }
        }
    }

    async fn scroll_into_view(&self, handle: &Self::Handle) -> SessionResult<()> {
        let target = handle
            .to_json()
            .map_err(|error| classify(error, "passing an element to a script"))?;
        match self.driver.execute(SCRIPT_SCROLL_CENTER, vec![target]).await {
            Ok(_) => Ok(()),
            Err(_) => handle
                .scroll_into_view()
                .await
                .map_err(|error| classify(error, "scrolling to an element")),
        }
    }

    async fn visible_count(&self, query: &LocatorQuery) -> SessionResult<usize> {
        Ok(self.query(query, None).await?.len())
    }

    async fn page_source(&self) -> SessionResult<String> {
        self.driver
            .source()
            .await
            .map_err(|error| classify(error, "capturing the page source"))
    }

    async fn close(&self) -> SessionResult<()> {
        debug!("🔒 Quitting the browser session");
        self.driver
            .clone()
            .quit()
            .await
            .map_err(|error| classify(error, "quitting the browser"))
    }
}

/// Map a locator query onto the driver's selector language. Label queries
/// become the same `contains(text(), ...)` XPath the portal tolerates;
/// scoped queries anchor at the element instead of the document root.
fn by_for(query: &LocatorQuery, scoped: bool) -> By {
    match query {
        LocatorQuery::Css(selector) => By::Css(selector.as_str()),
        LocatorQuery::LabelText(label) => By::XPath(label_xpath(label, scoped)),
    }
}

fn label_xpath(label: &str, scoped: bool) -> String {
    let anchor = if scoped { "." } else { "" };
    format!(r#"{anchor}//*[contains(text(), "{label}")]"#)
}

/// Fold driver errors into the session taxonomy. Chromedriver encodes the
/// failure kind in the message text, which survives intermediate wrapping
/// better than the error enum shape does.
fn classify(error: WebDriverError, context: &str) -> SessionError {
    classify_text(&error.to_string(), context)
}

fn classify_text(text: &str, context: &str) -> SessionError {
    let lowered = text.to_lowercase();
    let detail = format!("{context}: {text}");
    if lowered.contains("stale element") {
        SessionError::Stale(detail)
    } else if lowered.contains("no such element") {
        SessionError::NotFound(detail)
    } else if lowered.contains("invalid selector") || lowered.contains("invalid xpath") {
        SessionError::InvalidLocator(detail)
    } else if lowered.contains("intercepted") || lowered.contains("not interactable") {
        SessionError::Interaction(detail)
    } else if lowered.contains("timeout") || lowered.contains("timed out") {
        SessionError::Timeout(detail)
    } else {
        SessionError::Backend(detail)
    }
}

fn absent_to_none(
    error: WebDriverError,
    context: &str,
) -> SessionResult<Option<WebElement>> {
    match classify(error, context) {
        SessionError::NotFound(_) => Ok(None),
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_message_classification() {
        assert!(matches!(
            classify_text("stale element reference: element is not attached", "read"),
            SessionError::Stale(_)
        ));
        assert!(matches!(
            classify_text("no such element: Unable to locate element", "query"),
            SessionError::NotFound(_)
        ));
        assert!(matches!(
            classify_text("invalid selector: An invalid or illegal selector was specified", "query"),
            SessionError::InvalidLocator(_)
        ));
        assert!(matches!(
            classify_text("element click intercepted: Element <p> is not clickable", "click"),
            SessionError::Interaction(_)
        ));
        assert!(matches!(
            classify_text("element not interactable", "click"),
            SessionError::Interaction(_)
        ));
        assert!(matches!(
            classify_text("timeout: Timed out receiving message from renderer", "wait"),
            SessionError::Timeout(_)
        ));
    }

    #[test]
    fn test_unrecognized_driver_failures_are_fatal() {
        assert!(classify_text("chrome not reachable", "navigate").is_fatal());
        assert!(classify_text("disconnected: not connected to DevTools", "click").is_fatal());
        assert!(!classify_text("no such element: gone", "query").is_fatal());
    }

    #[test]
    fn test_label_queries_compile_to_xpath() {
        assert_eq!(
            label_xpath("Ver tudo", false),
            r#"//*[contains(text(), "Ver tudo")]"#
        );
        assert_eq!(
            label_xpath("Pague", true),
            r#".//*[contains(text(), "Pague")]"#
        );
    }
}
