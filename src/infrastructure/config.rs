//! Configuration infrastructure
//!
//! Loading and management of scraper settings. Settings live in a JSON file
//! under the user config directory and every value has a sensible default,
//! so a fresh checkout runs without any setup beyond exporting credentials.
//!
//! Credentials are deliberately NOT part of the config file. They are read
//! from the environment at startup and never written to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// Complete scraper configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Browser session settings
    pub webdriver: WebDriverConfig,

    /// Waits and pauses between portal interactions
    pub pacing: PacingConfig,

    /// Where and how extracted data is written
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Browser session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebDriverConfig {
    /// WebDriver server endpoint (chromedriver)
    pub server_url: String,

    /// Run the browser without a visible window
    pub headless: bool,

    /// Browser window size, "width,height"
    pub window_size: String,

    /// User agent presented to the portal
    pub user_agent: String,

    /// Extra Chrome arguments appended after the built-in set
    pub extra_args: Vec<String>,

    /// Upper bound for element presence waits in seconds
    pub element_wait_seconds: u64,
}

/// Waits and pauses between portal interactions.
///
/// The portal renders asynchronously after every click, so each interaction
/// is followed by a settle pause. These values were tuned against the live
/// site; shrinking them makes runs faster and flakier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Pause after a page or view finishes loading in seconds
    pub page_settle_seconds: u64,

    /// Pause after triggering the "load more" affordance in seconds
    pub post_trigger_settle_seconds: u64,

    /// Extra wait before declaring growth stalled in seconds
    pub stall_recheck_seconds: u64,

    /// Pause after scrolling an element into view in seconds
    pub scroll_settle_seconds: u64,

    /// Base pause between product cards in milliseconds
    pub card_pause_ms: u64,

    /// Random extra pause added to the card pause, upper bound in milliseconds
    pub card_jitter_ms: u64,

    /// Pause after submitting the sign-in form in seconds
    pub login_settle_seconds: u64,

    /// Second chance wait when the first sign-in check still sees the login route
    pub login_recheck_seconds: u64,

    /// Pause between the numbered portal steps in seconds
    pub step_pause_seconds: u64,

    /// Pause between filling individual form fields in seconds
    pub field_pause_seconds: u64,

    /// Pause after opening the full catalog in seconds
    pub catalog_settle_seconds: u64,

    /// Hard cap on "load more" activations for a single run
    pub max_load_triggers: u32,
}

/// Where and how extracted data is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for cycle and product files, relative to the working dir
    pub directory: PathBuf,

    /// Products per output file
    pub page_size: usize,

    /// Brand identifier stamped into every product page envelope
    pub brand_id: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Also write logs to a daily rotated file
    pub file_output: bool,

    /// Directory for log files when file output is enabled
    pub log_dir: PathBuf,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            webdriver: WebDriverConfig::default(),
            pacing: PacingConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            server_url: defaults::WEBDRIVER_URL.to_string(),
            headless: defaults::HEADLESS,
            window_size: defaults::WINDOW_SIZE.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
            extra_args: Vec::new(),
            element_wait_seconds: defaults::ELEMENT_WAIT_SECONDS,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_settle_seconds: defaults::PAGE_SETTLE_SECONDS,
            post_trigger_settle_seconds: defaults::POST_TRIGGER_SETTLE_SECONDS,
            stall_recheck_seconds: defaults::STALL_RECHECK_SECONDS,
            scroll_settle_seconds: defaults::SCROLL_SETTLE_SECONDS,
            card_pause_ms: defaults::CARD_PAUSE_MS,
            card_jitter_ms: defaults::CARD_JITTER_MS,
            login_settle_seconds: defaults::LOGIN_SETTLE_SECONDS,
            login_recheck_seconds: defaults::LOGIN_RECHECK_SECONDS,
            step_pause_seconds: defaults::STEP_PAUSE_SECONDS,
            field_pause_seconds: defaults::FIELD_PAUSE_SECONDS,
            catalog_settle_seconds: defaults::CATALOG_SETTLE_SECONDS,
            max_load_triggers: defaults::MAX_LOAD_TRIGGERS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::OUTPUT_DIR),
            page_size: defaults::PAGE_SIZE,
            brand_id: defaults::BRAND_ID,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            file_output: false,
            log_dir: PathBuf::from(defaults::LOG_DIR),
        }
    }
}

/// Portal sign-in credentials, read from the environment.
///
/// `Debug` never prints the password, so the struct is safe to log.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Read credentials from `REVENDA_USER` / `REVENDA_PASS`.
    pub fn from_env() -> Result<Self> {
        let username = std::env::var(portal::USER_ENV)
            .with_context(|| format!("{} environment variable is not set", portal::USER_ENV))?;
        let password = std::env::var(portal::PASS_ENV)
            .with_context(|| format!("{} environment variable is not set", portal::PASS_ENV))?;
        Ok(Self { username, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("revenda-scraper");

        Ok(config_dir)
    }

    /// Create a new configuration manager with the standard config path
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let config_path = config_dir.join("revenda_scraper_config.json");

        Ok(Self { config_path })
    }

    /// Initialize configuration on first run
    pub async fn initialize_on_first_run(&self) -> Result<ScraperConfig> {
        let config_dir = self
            .config_path
            .parent()
            .context("Failed to get config directory")?;

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)
                .await
                .context("Failed to create config directory")?;
            info!("✅ Created configuration directory: {:?}", config_dir);
        }

        let is_first_run = !self.config_path.exists();

        if is_first_run {
            info!("🎉 First run detected - initializing default configuration");
            let default_config = ScraperConfig::default();
            self.save_config(&default_config).await?;
            info!("✅ Initial configuration setup completed");
            Ok(default_config)
        } else {
            self.load_config().await
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<ScraperConfig> {
        if !self.config_path.exists() {
            info!(
                "Configuration file not found, creating default: {:?}",
                self.config_path
            );
            let default_config = ScraperConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<ScraperConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                tracing::warn!("⚠️  Configuration file unreadable: {}", parse_error);
                tracing::warn!("⚠️  Resetting to default configuration");

                // Keep the unreadable file around for inspection
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    tracing::warn!("Failed to back up corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = ScraperConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;

                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &ScraperConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Update configuration settings in place
    pub async fn update_config<F>(&self, updater: F) -> Result<ScraperConfig>
    where
        F: FnOnce(&mut ScraperConfig),
    {
        let mut config = self.load_config().await?;
        updater(&mut config);
        self.save_config(&config).await?;
        Ok(config)
    }
}

/// Reseller portal constants
pub mod portal {
    /// Portal origin, also used to absolutize relative product links
    pub const ORIGIN: &str = "https://revendedores.grupoboticario.com.br";

    /// Landing page after sign-in
    pub const BASE_URL: &str = "https://revendedores.grupoboticario.com.br/";

    /// Sign-in page
    pub const LOGIN_URL: &str = "https://revendedores.grupoboticario.com.br/login";

    /// Visible label of the incremental loading affordance
    pub const LOAD_MORE_LABEL: &str = "Ver mais produtos";

    /// Visible label of the full-catalog entry affordance
    pub const CATALOG_LABEL: &str = "Ver tudo";

    /// Visible label near the active sales-cycle banner
    pub const CYCLE_LABEL: &str = "Ciclo";

    /// Environment variable holding the portal username (CPF)
    pub const USER_ENV: &str = "REVENDA_USER";

    /// Environment variable holding the portal password
    pub const PASS_ENV: &str = "REVENDA_PASS";
}

/// Default configuration values
pub mod defaults {
    /// Default WebDriver server endpoint (chromedriver's standard port)
    pub const WEBDRIVER_URL: &str = "http://localhost:9515";

    /// Default headless mode. The portal tolerates headless Chrome as long
    /// as the automation fingerprint is masked.
    pub const HEADLESS: bool = true;

    /// Default browser window size
    pub const WINDOW_SIZE: &str = "1920,1080";

    /// Default user agent presented to the portal
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    /// Default upper bound for element presence waits in seconds
    pub const ELEMENT_WAIT_SECONDS: u64 = 20;

    /// Default pause after a page or view finishes loading in seconds
    pub const PAGE_SETTLE_SECONDS: u64 = 2;

    /// Default pause after a "load more" activation in seconds
    pub const POST_TRIGGER_SETTLE_SECONDS: u64 = 4;

    /// Default extra wait before declaring growth stalled in seconds
    pub const STALL_RECHECK_SECONDS: u64 = 2;

    /// Default pause after scrolling an element into view in seconds
    pub const SCROLL_SETTLE_SECONDS: u64 = 1;

    /// Default base pause between product cards in milliseconds
    pub const CARD_PAUSE_MS: u64 = 300;

    /// Default upper bound of the random extra card pause in milliseconds
    pub const CARD_JITTER_MS: u64 = 200;

    /// Default pause after submitting the sign-in form in seconds
    pub const LOGIN_SETTLE_SECONDS: u64 = 5;

    /// Default second-chance wait during the sign-in URL check in seconds
    pub const LOGIN_RECHECK_SECONDS: u64 = 3;

    /// Default pause between the numbered portal steps in seconds
    pub const STEP_PAUSE_SECONDS: u64 = 3;

    /// Default pause between filling individual form fields in seconds
    pub const FIELD_PAUSE_SECONDS: u64 = 1;

    /// Default pause after opening the full catalog in seconds
    pub const CATALOG_SETTLE_SECONDS: u64 = 5;

    /// Default hard cap on "load more" activations
    pub const MAX_LOAD_TRIGGERS: u32 = 100;

    /// Default products per output file
    pub const PAGE_SIZE: usize = 100;

    /// Default brand identifier in the output envelope
    pub const BRAND_ID: u32 = 1;

    /// Default output directory
    pub const OUTPUT_DIR: &str = "produtos_revendedores";

    /// File name for the captured sales-cycle period
    pub const CYCLE_FILE: &str = "ciclo_periodo.json";

    /// File name for the page snapshot dumped when no cards are found
    pub const DEBUG_PAGE_FILE: &str = "pagina_debug.html";

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Default log file directory
    pub const LOG_DIR: &str = "logs";

    /// Cards between progress log lines during extraction
    pub const PROGRESS_LOG_EVERY: usize = 10;
}
