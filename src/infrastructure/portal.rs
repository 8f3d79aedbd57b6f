//! Portal entry flows: sign-in, cycle banner capture, catalog entry.
//!
//! These run once at the start of a run, before the listing is loaded and
//! harvested. Sign-in failure aborts the run; the cycle banner and the
//! catalog shortcut are best-effort and the run continues without them.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::domain::cycle::CyclePeriod;
use crate::domain::locator::{FieldSpec, LocatorQuery};
use crate::domain::session::{AutomationSession, SessionResult};
use crate::infrastructure::config::{Credentials, PacingConfig};
use crate::infrastructure::extraction::resolver::{resolve_element, resolve_value};
use crate::infrastructure::profile::LoginSpec;

/// Authenticate the session against the portal's login form.
///
/// Navigates to the login page, fills both fields through their cascades,
/// submits, and confirms the redirect left the login route. The URL check
/// runs twice with a pause in between because the portal redirects slowly
/// after heavy first-paint work.
pub async fn sign_in<S: AutomationSession>(
    session: &S,
    login: &LoginSpec,
    credentials: &Credentials,
    pacing: &PacingConfig,
    element_wait: Duration,
) -> Result<()> {
    info!("🔐 Signing in at {}", login.login_url);
    session
        .navigate(&login.login_url)
        .await
        .context("Failed to open the login page")?;
    session
        .wait_for_presence(&LocatorQuery::css("body"), element_wait)
        .await
        .context("Login page never rendered")?;
    sleep(Duration::from_secs(pacing.page_settle_seconds)).await;

    info!("🔍 Looking for the sign-in form...");
    if let Some(first) = login.username_field.strategies.first() {
        // Give the form time to render before the cascade runs; a miss here
        // is not final, later strategies may still hit.
        session.wait_for_presence(&first.query, element_wait).await?;
    }

    let Some(username_field) = resolve_element(session, &login.username_field, None).await? else {
        error!("❌ Username field not found on the login page");
        bail!("Username field not found on the login page");
    };
    session
        .fill(&username_field, &credentials.username)
        .await
        .context("Failed to fill the username field")?;
    info!("✅ Username filled: {}", mask(&credentials.username));
    sleep(Duration::from_secs(pacing.field_pause_seconds)).await;

    let Some(password_field) = resolve_element(session, &login.password_field, None).await? else {
        error!("❌ Password field not found on the login page");
        bail!("Password field not found on the login page");
    };
    session
        .fill(&password_field, &credentials.password)
        .await
        .context("Failed to fill the password field")?;
    info!("✅ Password filled");
    sleep(Duration::from_secs(pacing.field_pause_seconds)).await;

    let Some(submit) = resolve_element(session, &login.submit, None).await? else {
        error!("❌ Submit control not found on the login page");
        bail!("Submit control not found on the login page");
    };
    session
        .trigger(&submit)
        .await
        .context("Failed to submit the login form")?;
    info!("⏳ Waiting for the post-login redirect...");
    sleep(Duration::from_secs(pacing.login_settle_seconds)).await;

    let url = session.current_url().await?;
    if !on_login_route(&url, login) {
        info!("✅ Signed in, now at {url}");
        return Ok(());
    }

    warn!("⚠️ Still on the login route, rechecking...");
    sleep(Duration::from_secs(pacing.login_recheck_seconds)).await;
    let url = session.current_url().await?;
    if on_login_route(&url, login) {
        error!("❌ Sign-in did not leave the login route ({url})");
        bail!("Sign-in did not leave the login route");
    }
    info!("✅ Signed in, now at {url}");
    Ok(())
}

fn on_login_route(url: &str, login: &LoginSpec) -> bool {
    url.to_lowercase().contains(login.route_marker.as_str())
}

/// First characters of a credential for the log, rest hidden.
fn mask(value: &str) -> String {
    let head: String = value.chars().take(5).collect();
    format!("{head}***")
}

/// Read the sales-cycle banner, if the page shows one.
///
/// `None` covers both "no banner on this layout" and "the cascade matched
/// something that is not a cycle"; either way the run continues and the
/// page files fall back to a year-wide cycle.
pub async fn capture_cycle<S: AutomationSession>(
    session: &S,
    banner: &FieldSpec,
) -> SessionResult<Option<CyclePeriod>> {
    info!("📅 Reading the sales-cycle banner...");
    let Some(resolved) = resolve_value(session, banner, None).await? else {
        warn!("⚠️ Cycle banner not found, falling back to a year-wide cycle");
        return Ok(None);
    };

    let period = CyclePeriod::parse(&resolved.value, Utc::now());
    if !period.is_recognized() {
        warn!(
            "⚠️ Banner text did not look like a cycle ({:?}), falling back",
            period.label
        );
        return Ok(None);
    }

    match &period.number {
        Some(number) => info!(
            "✅ Cycle {number} captured: {} a {}",
            period.start_date, period.end_date
        ),
        None => info!("📋 Cycle period captured without a number: {}", period.label),
    }
    Ok(Some(period))
}

/// Open the full catalog through its entry shortcut, when the landing page
/// shows one. Returns whether the shortcut was activated; either way the
/// current view is usable and the run continues.
pub async fn open_catalog<S: AutomationSession>(
    session: &S,
    entry: &FieldSpec,
    pacing: &PacingConfig,
) -> SessionResult<bool> {
    info!("🔍 Looking for the catalog entry shortcut...");
    sleep(Duration::from_secs(pacing.page_settle_seconds)).await;

    let Some(control) = resolve_element(session, entry, None).await? else {
        warn!("⚠️ Catalog shortcut not found, continuing on the current view");
        return Ok(false);
    };

    if let Err(error) = session.scroll_into_view(&control).await {
        if error.is_fatal() {
            return Err(error);
        }
    }
    sleep(Duration::from_secs(pacing.scroll_settle_seconds)).await;

    match session.trigger(&control).await {
        Ok(()) => {}
        Err(error) if error.is_fatal() => return Err(error),
        Err(error) => {
            warn!("⚠️ Could not activate the catalog shortcut ({error}), continuing");
            return Ok(false);
        }
    }

    info!("✅ Catalog opened");
    sleep(Duration::from_secs(pacing.catalog_settle_seconds)).await;
    Ok(true)
}
