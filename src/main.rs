//! Command-line entry point: one full extraction run against the portal.

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use revenda_scraper_lib::application::{ExtractionPipeline, RunReport};
use revenda_scraper_lib::domain::session::AutomationSession;
use revenda_scraper_lib::infrastructure::config::{ConfigManager, Credentials};
use revenda_scraper_lib::infrastructure::logging::init_logging_with_config;
use revenda_scraper_lib::infrastructure::profile::SiteProfile;
use revenda_scraper_lib::infrastructure::webdriver::WebDriverSession;

#[tokio::main]
async fn main() -> Result<()> {
    let manager = ConfigManager::new().context("Locating the configuration directory")?;
    let config = manager.initialize_on_first_run().await?;
    init_logging_with_config(&config.logging)?;

    info!("🚀 Reseller portal extraction starting");

    let credentials = Credentials::from_env()?;
    let profile = SiteProfile::default();

    let session = WebDriverSession::connect(&config.webdriver).await?;
    let pipeline = ExtractionPipeline::new(&session, &profile, &config);
    let result = pipeline.run(Some(&credentials)).await;

    // The browser goes down whether the run succeeded or not.
    info!("🔒 Closing the browser...");
    if let Err(close_error) = session.close().await {
        warn!("⚠️ Browser teardown failed: {close_error}");
    }

    let report = result?;
    print_summary(&report);

    if let Some(session_error) = &report.session_error {
        error!("💥 Run ended with a session failure: {session_error}");
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("\n{}", "=".repeat(70));
    println!("📊 RUN SUMMARY");
    println!("{}", "=".repeat(70));
    println!("Profile:    {}", report.profile);
    println!("Cards seen: {}", report.cards_found);
    println!(
        "Products:   {} ({} duplicates skipped, {} without identity)",
        report.accepted, report.duplicates, report.keyless
    );
    if let Some(load) = &report.load {
        println!(
            "Listing:    {} triggers, {} cards, ended by {}",
            load.triggers_fired, load.final_count, load.end
        );
    }
    if let Some(cycle) = &report.cycle {
        println!(
            "Cycle:      {} ({} a {})",
            cycle.number.as_deref().unwrap_or("n/a"),
            cycle.start_date,
            cycle.end_date
        );
    }
    println!("Files:      {} page file(s)", report.write.page_files.len());
    for path in &report.write.page_files {
        println!("  - {}", path.display());
    }
    if !report.write.failed_pages.is_empty() {
        println!(
            "⚠️ {} page file(s) failed to write:",
            report.write.failed_pages.len()
        );
        for path in &report.write.failed_pages {
            println!("  - {}", path.display());
        }
    }

    if !report.sample.is_empty() {
        println!("\n📊 FIRST PRODUCTS:");
        println!("{}", "=".repeat(50));
        for (index, product) in report.sample.iter().enumerate() {
            println!("{}. {}", index + 1, product.name);
            println!(
                "   SKU: {} | Pague: {}",
                product.sku.as_deref().unwrap_or("n/a"),
                product
                    .suggested_price
                    .map(|value| format!("R$ {value:.2}"))
                    .unwrap_or_else(|| "n/a".to_string())
            );
            println!("{}", "-".repeat(30));
        }
    }
    println!("{}", "=".repeat(70));
}
