//! Batched persistence of extracted products.
//!
//! Output layout per run: one `ciclo_periodo.json` with the raw banner
//! capture, then page files of at most `page_size` products each, named
//! `produtos_001_100.json`, `produtos_101_200.json` and so on. Downstream
//! imports detect completeness from the contiguous ranges in the names.
//! The cycle file goes first so provenance survives a run that dies halfway
//! through the pages.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

use crate::domain::cycle::{CycleInfo, CyclePeriod};
use crate::domain::product::Product;
use crate::infrastructure::config::{OutputConfig, defaults};

/// Envelope of one page file.
#[derive(Serialize)]
struct ProductPage<'a> {
    marca_id: u32,
    ciclo_info: &'a CycleInfo,
    produtos: &'a [Product],
}

/// What one persistence run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteSummary {
    /// Path of the cycle metadata file, when the banner was captured and
    /// the write succeeded.
    pub cycle_file: Option<PathBuf>,
    pub page_files: Vec<PathBuf>,
    /// Pages that could not be written. Failures are isolated; the
    /// remaining pages are still attempted.
    pub failed_pages: Vec<PathBuf>,
}

pub struct BatchWriter {
    output_dir: PathBuf,
    page_size: usize,
    brand_id: u32,
}

impl BatchWriter {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            output_dir: config.directory.clone(),
            // A zero page size would loop forever in chunks().
            page_size: config.page_size.max(1),
            brand_id: config.brand_id,
        }
    }

    /// Persist one run: cycle metadata first, then the product pages.
    pub async fn persist(
        &self,
        period: Option<&CyclePeriod>,
        cycle: &CycleInfo,
        products: &[Product],
    ) -> Result<WriteSummary> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir)
                .await
                .with_context(|| format!("Failed to create output dir {:?}", self.output_dir))?;
            info!("📁 Created output directory '{}'", self.output_dir.display());
        }

        let mut summary = WriteSummary::default();

        match period {
            Some(period) => {
                let cycle_path = self.output_dir.join(defaults::CYCLE_FILE);
                match write_json(&cycle_path, period).await {
                    Ok(()) => {
                        info!("💾 Cycle metadata saved to: {}", cycle_path.display());
                        info!(
                            "   📅 Cycle: {} | Period: {} to {}",
                            period.number.as_deref().unwrap_or("N/A"),
                            period.start_date,
                            period.end_date
                        );
                        summary.cycle_file = Some(cycle_path);
                    }
                    Err(error) => {
                        error!("❌ Could not save cycle metadata: {error:#}");
                    }
                }
            }
            None => warn!("⚠️ Cycle metadata was not captured"),
        }

        if products.is_empty() {
            warn!("⚠️ No products to save");
            return Ok(summary);
        }

        for (page_index, page) in products.chunks(self.page_size).enumerate() {
            let first = page_index * self.page_size + 1;
            let last = page_index * self.page_size + page.len();
            let page_path = self
                .output_dir
                .join(format!("produtos_{first:03}_{last:03}.json"));

            let envelope = ProductPage {
                marca_id: self.brand_id,
                ciclo_info: cycle,
                produtos: page,
            };

            match write_json(&page_path, &envelope).await {
                Ok(()) => {
                    info!(
                        "💾 File created: {} - {} products",
                        page_path.display(),
                        page.len()
                    );
                    summary.page_files.push(page_path);
                }
                Err(error) => {
                    error!("❌ Could not write {}: {error:#}", page_path.display());
                    summary.failed_pages.push(page_path);
                }
            }
        }

        info!(
            "✅ Total of {} products saved in {} file(s)",
            products.len(),
            summary.page_files.len()
        );
        info!("📁 Folder: {}/", self.output_dir.display());

        Ok(summary)
    }

    /// Dump the current page markup for offline inspection. Called when a
    /// converged listing still yields zero cards.
    pub async fn dump_debug_page(&self, html: &str) -> Result<PathBuf> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir)
                .await
                .with_context(|| format!("Failed to create output dir {:?}", self.output_dir))?;
        }
        let path = self.output_dir.join(defaults::DEBUG_PAGE_FILE);
        fs::write(&path, html)
            .await
            .with_context(|| format!("Failed to write debug page {path:?}"))?;
        info!("📄 Page snapshot saved to: {}", path.display());
        Ok(path)
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {path:?}"))?;
    Ok(())
}
