//! Replay extraction over a saved page snapshot.
//!
//! Feeds a `pagina_debug.html` capture back through the exact extraction
//! stack the live run uses, so selector drift can be diagnosed offline
//! without a browser or credentials.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use revenda_scraper_lib::application::harvest_listing;
use revenda_scraper_lib::infrastructure::config::{PacingConfig, defaults};
use revenda_scraper_lib::infrastructure::logging::init_logging;
use revenda_scraper_lib::infrastructure::profile::SiteProfile;
use revenda_scraper_lib::infrastructure::snapshot::SnapshotSession;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        PathBuf::from(defaults::OUTPUT_DIR).join(defaults::DEBUG_PAGE_FILE)
    });
    info!("📄 Replaying snapshot {path:?}");

    let session = SnapshotSession::from_file(&path)
        .await
        .with_context(|| format!("Loading snapshot {path:?}"))?;

    let profile = SiteProfile::default();
    let outcome = harvest_listing(&session, &profile, &replay_pacing()).await;

    println!("{}", "=".repeat(70));
    println!("📊 SNAPSHOT REPLAY");
    println!("{}", "=".repeat(70));
    println!("Cards found: {}", outcome.cards_found);
    println!(
        "Products:    {} ({} duplicates, {} keyless, {} unnamed)",
        outcome.products.len(),
        outcome.duplicates,
        outcome.keyless,
        outcome.unnamed
    );
    for product in outcome.products.iter().take(10) {
        println!(
            "  - [{}] {}",
            product.sku.as_deref().unwrap_or("n/a"),
            product.name
        );
    }
    if outcome.products.len() > 10 {
        println!("  ... and {} more", outcome.products.len() - 10);
    }
    Ok(())
}

/// Snapshots have no network latency to respect.
fn replay_pacing() -> PacingConfig {
    PacingConfig {
        step_pause_seconds: 0,
        card_pause_ms: 0,
        card_jitter_ms: 0,
        ..PacingConfig::default()
    }
}
