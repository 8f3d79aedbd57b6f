//! Incremental load convergence.
//!
//! The listing renders a fixed window of cards and appends more whenever the
//! "load more" control is activated. This controller drives that control
//! until the card count stops growing, the control disappears, or the
//! activation cap is hit. Counts only ever grow; a shrinking count would
//! mean the page was torn down under us and shows up as a stall instead.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::domain::locator::{FieldSpec, LocatorQuery};
use crate::domain::session::{AutomationSession, SessionResult};
use crate::infrastructure::config::PacingConfig;
use crate::infrastructure::extraction::resolver::resolve_element;
use crate::infrastructure::profile::SiteProfile;

/// Why the convergence loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadEnd {
    /// The control is gone; the listing rendered everything it has.
    AffordanceMissing,
    /// The control is still there but activations stopped adding cards.
    GrowthStalled,
    /// The activation cap fired before the listing converged.
    TriggerCapReached,
    /// The control could not be activated (obscured, disabled, detached).
    InteractionFailed,
}

impl fmt::Display for LoadEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AffordanceMissing => "affordance missing",
            Self::GrowthStalled => "growth stalled",
            Self::TriggerCapReached => "trigger cap reached",
            Self::InteractionFailed => "interaction failed",
        };
        f.write_str(text)
    }
}

/// Result of one convergence run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub triggers_fired: u32,
    /// Card count at loop exit.
    pub final_count: usize,
    /// Highest card count seen at any point of the loop.
    pub max_observed: usize,
    pub end: LoadEnd,
}

/// Phase of the convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    /// Locate the control and take the current card count.
    Searching,
    /// An activation happened; wait for rendering and compare counts.
    Loading { before: usize },
    /// The count did not move after the settle window; one grace recheck.
    Stalled { before: usize },
}

pub struct IncrementalLoadController {
    pub affordance: FieldSpec,
    pub card_query: LocatorQuery,
    pub max_triggers: u32,
    pub post_trigger_settle: Duration,
    pub stall_recheck: Duration,
    pub scroll_settle: Duration,
}

impl IncrementalLoadController {
    /// `None` when the profile's listing renders in one shot.
    pub fn from_profile(profile: &SiteProfile, pacing: &PacingConfig) -> Option<Self> {
        let affordance = profile.load_more.clone()?;
        let card_query = profile.card_queries.first()?.clone();
        Some(Self {
            affordance,
            card_query,
            max_triggers: pacing.max_load_triggers,
            post_trigger_settle: Duration::from_secs(pacing.post_trigger_settle_seconds),
            stall_recheck: Duration::from_secs(pacing.stall_recheck_seconds),
            scroll_settle: Duration::from_secs(pacing.scroll_settle_seconds),
        })
    }

    /// Drive the listing until it converges. Only session-fatal errors
    /// propagate; everything else ends the loop with a [`LoadEnd`].
    pub async fn run<S: AutomationSession>(&self, session: &S) -> SessionResult<LoadSummary> {
        let mut phase = LoadPhase::Searching;
        let mut previous_count = 0usize;
        let mut max_observed = 0usize;
        let mut triggers_fired = 0u32;

        let end = loop {
            match phase {
                LoadPhase::Searching => {
                    if triggers_fired >= self.max_triggers {
                        warn!(
                            "⚠️ Activation cap of {} reached, stopping",
                            self.max_triggers
                        );
                        break LoadEnd::TriggerCapReached;
                    }

                    info!(
                        "🔄 Attempt {}: locating the '{}' control...",
                        triggers_fired + 1,
                        self.affordance.name
                    );
                    let current = session.visible_count(&self.card_query).await?;
                    max_observed = max_observed.max(current);
                    info!("📊 Cards currently on page: {current}");

                    let Some(control) = resolve_element(session, &self.affordance, None).await?
                    else {
                        info!("✅ No load control left, listing fully rendered");
                        break LoadEnd::AffordanceMissing;
                    };

                    if triggers_fired > 0 && current == previous_count {
                        warn!("⚠️ No new cards since the previous activation, stopping");
                        break LoadEnd::GrowthStalled;
                    }

                    if let Err(error) = self.activate(session, &control).await {
                        if error.is_fatal() {
                            return Err(error);
                        }
                        warn!("❌ Could not activate the load control: {error}");
                        break LoadEnd::InteractionFailed;
                    }
                    triggers_fired += 1;
                    info!("✅ Activation {triggers_fired}: loading more cards...");
                    phase = LoadPhase::Loading { before: current };
                }

                LoadPhase::Loading { before } => {
                    sleep(self.post_trigger_settle).await;
                    let after = session.visible_count(&self.card_query).await?;
                    max_observed = max_observed.max(after);
                    if after > before {
                        info!("✅ {} new cards loaded (total: {after})", after - before);
                        previous_count = before;
                        phase = LoadPhase::Searching;
                    } else {
                        info!("⏳ Waiting for cards to render...");
                        phase = LoadPhase::Stalled { before };
                    }
                }

                LoadPhase::Stalled { before } => {
                    sleep(self.stall_recheck).await;
                    let settled = session.visible_count(&self.card_query).await?;
                    max_observed = max_observed.max(settled);
                    if settled == before {
                        info!("✅ Every available card is already loaded");
                        break LoadEnd::GrowthStalled;
                    }
                    info!("✅ {} new cards loaded (total: {settled})", settled - before);
                    previous_count = before;
                    phase = LoadPhase::Searching;
                }
            }
        };

        let final_count = session.visible_count(&self.card_query).await?;
        let max_observed = max_observed.max(final_count);
        info!("📊 Total activations: {triggers_fired}");
        info!("📊 Total cards loaded: {final_count}");

        Ok(LoadSummary {
            triggers_fired,
            final_count,
            max_observed,
            end,
        })
    }

    async fn activate<S: AutomationSession>(
        &self,
        session: &S,
        control: &S::Handle,
    ) -> SessionResult<()> {
        session.scroll_into_view(control).await?;
        sleep(self.scroll_settle).await;
        session.trigger(control).await
    }
}
