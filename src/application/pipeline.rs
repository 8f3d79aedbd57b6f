//! End-to-end extraction run.
//!
//! Drives one session through the portal flow: sign in, read the cycle
//! banner, open the catalog, converge the incremental listing, harvest and
//! deduplicate the cards, persist the batched page files. Every stage logs
//! its progress; a session lost mid-harvest still persists whatever was
//! extracted before the failure.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::cycle::{CycleInfo, CyclePeriod};
use crate::domain::dedup::Deduplicator;
use crate::domain::product::Product;
use crate::domain::session::{AutomationSession, SessionError};
use crate::infrastructure::batch_writer::{BatchWriter, WriteSummary};
use crate::infrastructure::config::{Credentials, PacingConfig, ScraperConfig, defaults, portal};
use crate::infrastructure::extraction::extractor::RecordExtractor;
use crate::infrastructure::extraction::normalizer::normalize_product;
use crate::infrastructure::load_more::{IncrementalLoadController, LoadSummary};
use crate::infrastructure::portal::{capture_cycle, open_catalog, sign_in};
use crate::infrastructure::profile::SiteProfile;

/// Everything one run produced, for the closing summary and the exit code.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub profile: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub catalog_opened: bool,
    pub cycle: Option<CyclePeriod>,
    pub load: Option<LoadSummary>,
    pub cards_found: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub keyless: usize,
    pub unnamed: usize,
    pub write: WriteSummary,
    /// First few persisted products, for the closing summary.
    pub sample: Vec<Product>,
    /// Set when the session died mid-harvest, after partial persistence.
    pub session_error: Option<String>,
}

/// What the card harvest produced. `session_error` is set when the browser
/// was lost mid-walk; the products collected up to that point are kept.
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    pub cards_found: usize,
    pub products: Vec<Product>,
    pub duplicates: usize,
    pub keyless: usize,
    pub unnamed: usize,
    pub session_error: Option<SessionError>,
}

/// One extraction run over one session and one site profile.
pub struct ExtractionPipeline<'a, S: AutomationSession> {
    session: &'a S,
    profile: &'a SiteProfile,
    config: &'a ScraperConfig,
}

impl<'a, S: AutomationSession> ExtractionPipeline<'a, S> {
    pub fn new(session: &'a S, profile: &'a SiteProfile, config: &'a ScraperConfig) -> Self {
        Self {
            session,
            profile,
            config,
        }
    }

    /// Run the whole flow. Failures before any card is harvested abort with
    /// an error; a session lost during the harvest persists the partial
    /// result and reports the failure through [`RunReport::session_error`].
    pub async fn run(&self, credentials: Option<&Credentials>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = std::time::Instant::now();
        let pacing = &self.config.pacing;
        let element_wait = Duration::from_secs(self.config.webdriver.element_wait_seconds);

        info!(
            "🚀 Starting extraction run {run_id} against profile '{}'",
            self.profile.name
        );

        if let Some(login) = &self.profile.login {
            let Some(credentials) = credentials else {
                bail!(
                    "Profile '{}' requires credentials; set {} and {}",
                    self.profile.name,
                    portal::USER_ENV,
                    portal::PASS_ENV
                );
            };
            step_banner("Step 1: signing in");
            sign_in(self.session, login, credentials, pacing, element_wait).await?;
            sleep(Duration::from_secs(pacing.step_pause_seconds)).await;
        }

        let period = match &self.profile.cycle_banner {
            Some(banner) => {
                step_banner("Step 2: reading the sales cycle");
                capture_cycle(self.session, banner)
                    .await
                    .context("Reading the cycle banner")?
            }
            None => None,
        };

        let mut catalog_opened = false;
        if let Some(entry) = &self.profile.catalog_entry {
            step_banner("Step 3: opening the full catalog");
            catalog_opened = open_catalog(self.session, entry, pacing)
                .await
                .context("Opening the catalog")?;
            sleep(Duration::from_secs(pacing.step_pause_seconds)).await;
        }

        let load = match IncrementalLoadController::from_profile(self.profile, pacing) {
            Some(controller) => {
                step_banner("Step 4: loading the whole listing");
                Some(
                    controller
                        .run(self.session)
                        .await
                        .context("Loading the listing")?,
                )
            }
            None => None,
        };
        sleep(Duration::from_secs(pacing.page_settle_seconds)).await;

        step_banner("Step 5: extracting product cards");
        let outcome = harvest_listing(self.session, self.profile, pacing).await;

        let writer = BatchWriter::new(&self.config.output);
        if outcome.cards_found == 0 && outcome.session_error.is_none() {
            match self.session.page_source().await {
                Ok(html) => match writer.dump_debug_page(&html).await {
                    Ok(path) => info!("💾 Page snapshot saved to {path:?} for selector review"),
                    Err(dump_error) => {
                        warn!("⚠️ Could not save the page snapshot: {dump_error:#}")
                    }
                },
                Err(source_error) => warn!("⚠️ Could not read the page source: {source_error}"),
            }
        }

        step_banner("Step 6: persisting results");
        let cycle = period
            .as_ref()
            .map(|period| CycleInfo::from_period(period, started_at.year()))
            .unwrap_or_else(|| CycleInfo::fallback(started_at.year()));
        let write = writer
            .persist(period.as_ref(), &cycle, &outcome.products)
            .await
            .context("Persisting extracted products")?;

        let report = RunReport {
            run_id,
            profile: self.profile.name.clone(),
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            catalog_opened,
            cycle: period,
            load,
            cards_found: outcome.cards_found,
            accepted: outcome.products.len(),
            duplicates: outcome.duplicates,
            keyless: outcome.keyless,
            unnamed: outcome.unnamed,
            sample: outcome.products.iter().take(5).cloned().collect(),
            write,
            session_error: outcome.session_error.map(|error| error.to_string()),
        };

        match &report.session_error {
            None => info!(
                "🎉 Run finished: {} products across {} page files in {}ms",
                report.accepted,
                report.write.page_files.len(),
                report.duration_ms
            ),
            Some(session_error) => error!(
                "💥 Session lost mid-run after persisting {} products: {session_error}",
                report.accepted
            ),
        }
        Ok(report)
    }
}

/// Walk every card on the converged listing and collect unique products.
///
/// Card-level failures are skipped; only a fatal session error stops the
/// walk, and the records collected so far are returned alongside it.
pub async fn harvest_listing<S: AutomationSession>(
    session: &S,
    profile: &SiteProfile,
    pacing: &PacingConfig,
) -> HarvestOutcome {
    let mut outcome = HarvestOutcome::default();

    info!("📦 Starting product card extraction...");
    sleep(Duration::from_secs(pacing.step_pause_seconds)).await;

    let mut cards = Vec::new();
    for (index, query) in profile.card_queries.iter().enumerate() {
        match session.query(query, None).await {
            Ok(found) if found.is_empty() => {
                if index == 0 && profile.card_queries.len() > 1 {
                    warn!("⚠️ No cards via the primary selector, trying fallbacks...");
                }
            }
            Ok(found) => {
                if index > 0 {
                    info!("✅ Found {} cards via fallback selector {query}", found.len());
                }
                cards = found;
                break;
            }
            Err(error) if error.is_fatal() => {
                outcome.session_error = Some(error);
                return outcome;
            }
            Err(error) => debug!("Card query {query} failed: {error}"),
        }
    }

    if cards.is_empty() {
        warn!("❌ No product cards identified on the page");
        return outcome;
    }
    outcome.cards_found = cards.len();
    info!("🛍️ {} product cards found", cards.len());

    let extractor = RecordExtractor::new(profile.fields.clone(), profile.origin.clone());
    let mut dedup = Deduplicator::new();

    for (index, card) in cards.iter().enumerate() {
        if index == 0 || (index + 1) % defaults::PROGRESS_LOG_EVERY == 0 {
            info!("📦 Processing card {}/{}...", index + 1, cards.len());
        }

        // Cards render lazily; bring each one into the viewport first.
        if let Err(error) = session.scroll_into_view(card).await {
            if error.is_fatal() {
                outcome.session_error = Some(error);
                break;
            }
        }
        let pause = pacing.card_pause_ms + jitter(pacing.card_jitter_ms);
        sleep(Duration::from_millis(pause)).await;

        let raw = match extractor.extract(session, card).await {
            Ok(raw) => raw,
            Err(error) if error.is_fatal() => {
                outcome.session_error = Some(error);
                break;
            }
            Err(error) => {
                warn!("❌ Card {} failed: {error}", index + 1);
                continue;
            }
        };

        if dedup.admit(&raw) {
            if raw.identity_name().is_none() {
                outcome.unnamed += 1;
            }
            outcome.products.push(normalize_product(&raw));
        }
    }

    outcome.duplicates = dedup.duplicates();
    outcome.keyless = dedup.keyless();
    info!(
        "✅ {} unique products extracted ({} duplicates skipped)",
        outcome.products.len(),
        outcome.duplicates
    );
    outcome
}

fn jitter(max: u64) -> u64 {
    if max == 0 { 0 } else { fastrand::u64(0..=max) }
}

fn step_banner(title: &str) {
    info!("{}", "=".repeat(70));
    info!("📋 {title}");
    info!("{}", "=".repeat(70));
}
