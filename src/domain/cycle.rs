//! Sales-cycle metadata.
//!
//! The portal prices everything per sales cycle and shows the active one in
//! a banner, typically `"Ciclo 16: 03/11 a 30/11"`. The banner carries no
//! year, so dates are completed with the year of the capture moment.

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CYCLE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Ciclo\s+(\d+)").expect("cycle number pattern must compile"));
static CYCLE_PERIOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}/\d{2})\s+a\s+(\d{2}/\d{2})").expect("cycle period pattern must compile")
});

/// Cycle banner capture, persisted as `ciclo_periodo.json` before any page
/// file is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePeriod {
    /// Banner text exactly as displayed.
    #[serde(rename = "texto_completo")]
    pub label: String,
    /// Cycle number digits, when the banner carried them.
    #[serde(rename = "numero_ciclo")]
    pub number: Option<String>,
    /// ISO start date (`YYYY-MM-DD`).
    #[serde(rename = "data_inicio")]
    pub start_date: String,
    /// ISO end date (`YYYY-MM-DD`).
    #[serde(rename = "data_fim")]
    pub end_date: String,
    /// Capture timestamp, `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "extraido_em")]
    pub extracted_at: String,
}

impl CyclePeriod {
    /// Parse a banner text. Missing pieces fall back to the bounds of the
    /// capture year so a run always has a usable period.
    pub fn parse(label: &str, captured_at: DateTime<Utc>) -> Self {
        let label = label.trim();
        let year = captured_at.year();

        let number = CYCLE_NUMBER
            .captures(label)
            .map(|captures| captures[1].to_string());

        let (start_date, end_date) = match CYCLE_PERIOD.captures(label) {
            Some(captures) => (
                day_month_to_iso(&captures[1], year)
                    .unwrap_or_else(|| format!("{year}-01-01")),
                day_month_to_iso(&captures[2], year)
                    .unwrap_or_else(|| format!("{year}-12-31")),
            ),
            None => (format!("{year}-01-01"), format!("{year}-12-31")),
        };

        Self {
            label: label.to_string(),
            number,
            start_date,
            end_date,
            extracted_at: captured_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Year the period belongs to, taken from the start date.
    pub fn year(&self) -> Option<i32> {
        self.start_date.split('-').next()?.parse().ok()
    }

    /// Whether the captured text actually looked like a cycle banner and not
    /// some unrelated element a loose selector happened to match.
    pub fn is_recognized(&self) -> bool {
        self.number.is_some() || CYCLE_PERIOD.is_match(&self.label)
    }
}

/// Formatted cycle block embedded in every product page file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleInfo {
    /// Zero-padded `NN/YYYY`, e.g. `16/2025`.
    #[serde(rename = "numero")]
    pub number: String,
    /// Human label, e.g. `Ciclo 16 2025`.
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "data_inicio")]
    pub start_date: String,
    #[serde(rename = "data_fim")]
    pub end_date: String,
}

impl CycleInfo {
    pub fn from_period(period: &CyclePeriod, fallback_year: i32) -> Self {
        let year = period.year().unwrap_or(fallback_year);
        match &period.number {
            Some(number) => Self {
                number: format!("{number:0>2}/{year}"),
                name: format!("Ciclo {number} {year}"),
                start_date: period.start_date.clone(),
                end_date: period.end_date.clone(),
            },
            None => Self {
                number: format!("01/{year}"),
                name: format!("Ciclo {year}"),
                start_date: period.start_date.clone(),
                end_date: period.end_date.clone(),
            },
        }
    }

    /// Placeholder used when the banner could not be captured at all.
    pub fn fallback(year: i32) -> Self {
        Self {
            number: format!("01/{year}"),
            name: format!("Ciclo {year}"),
            start_date: format!("{year}-01-01"),
            end_date: format!("{year}-12-31"),
        }
    }
}

/// `"03/11"` with year 2025 becomes `"2025-11-03"`.
fn day_month_to_iso(day_month: &str, year: i32) -> Option<String> {
    let (day, month) = day_month.split_once('/')?;
    if day.is_empty() || month.is_empty() {
        return None;
    }
    Some(format!("{year}-{month:0>2}-{day:0>2}"))
}
