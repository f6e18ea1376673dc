//! Application configuration for CoralIngest.
//!
//! User config lives at `~/.coralingest/coralingest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoralIngestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "coralingest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".coralingest";

// ---------------------------------------------------------------------------
// Config structs (matching coralingest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Location fallbacks applied when a page yields no breadcrumbs.
    #[serde(default)]
    pub fallbacks: FallbacksConfig,

    /// Geocoding provider settings.
    #[serde(default)]
    pub geocode: GeocodeConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Seconds to wait between page visits.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    /// Per-page navigation timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Reload attempts for a suspect page before giving up.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Seconds to cool down before reloading a suspect page.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,

    /// Maximum gallery photos attached per listing.
    #[serde(default = "default_images_max")]
    pub images_max: usize,

    /// Root directory for stored photo files.
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// SQLite database file path.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Domain attached to cookies passed via `--cookie-string`.
    #[serde(default = "default_cookie_domain")]
    pub cookie_domain: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            cooldown_secs: default_cooldown_secs(),
            images_max: default_images_max(),
            media_root: default_media_root(),
            db_path: default_db_path(),
            cookie_domain: default_cookie_domain(),
        }
    }
}

fn default_delay_secs() -> f64 {
    1.5
}
fn default_timeout_ms() -> u64 {
    20_000
}
fn default_retries() -> u32 {
    2
}
fn default_cooldown_secs() -> f64 {
    5.0
}
fn default_images_max() -> usize {
    15
}
fn default_media_root() -> String {
    "media".into()
}
fn default_db_path() -> String {
    "coralingest.db".into()
}
fn default_cookie_domain() -> String {
    ".sahibinden.com".into()
}

/// `[fallbacks]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbacksConfig {
    /// City used when the page yields none.
    #[serde(default)]
    pub city: String,

    /// State/province used when the page yields none.
    #[serde(default)]
    pub state: String,

    /// Postal code used when the page yields none.
    #[serde(default)]
    pub zipcode: String,

    /// Street address used when the page yields none.
    #[serde(default)]
    pub address: String,
}

/// `[geocode]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    /// Nominatim search endpoint.
    #[serde(default = "default_geocode_base_url")]
    pub base_url: String,

    /// User agent sent on geocoding requests (required by Nominatim policy).
    #[serde(default = "default_geocode_user_agent")]
    pub user_agent: String,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocode_base_url(),
            user_agent: default_geocode_user_agent(),
        }
    }
}

fn default_geocode_base_url() -> String {
    "https://nominatim.openstreetmap.org/search".into()
}
fn default_geocode_user_agent() -> String {
    "coralingest/0.1".into()
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime import configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Owner assigned to every listing touched by this run.
    pub realtor_id: i64,
    /// Input file holding one listing URL per line (or a CSV with a `url` column).
    pub urls_file: PathBuf,
    /// Pause between page visits.
    pub delay: Duration,
    /// Per-page navigation timeout.
    pub timeout: Duration,
    /// Run the browser without a visible window.
    pub headless: bool,
    /// Persistent browser profile directory (keeps session state across runs).
    pub profile_dir: Option<PathBuf>,
    /// If set, rendered page markup is written here for later inspection.
    pub snapshot_dir: Option<PathBuf>,
    /// Reload attempts for a suspect page.
    pub retries: u32,
    /// Cooldown before each reload attempt.
    pub cooldown: Duration,
    /// Skip geocoding of newly created listings.
    pub skip_geocode: bool,
    /// Extract and report without writing anything.
    pub dry_run: bool,
    /// Location fallbacks for pages with no breadcrumbs.
    pub default_city: String,
    pub default_state: String,
    pub default_zipcode: String,
    pub default_address: String,
    /// Raw `name=value; name2=value2` cookie header to install in the session.
    pub cookie_string: Option<String>,
    /// Netscape-format cookie file to install in the session.
    pub cookie_file: Option<PathBuf>,
    /// Domain attached to cookies parsed from `cookie_string`.
    pub cookie_domain: String,
    /// Extra HTTP headers, later entries overriding the built-in defaults.
    pub extra_headers: Vec<(String, String)>,
    /// Skip the photo pipeline entirely.
    pub no_images: bool,
    /// Cap on photos attached per listing (0 = unlimited).
    pub images_max: usize,
    /// Root directory for stored photo files.
    pub media_root: PathBuf,
    /// SQLite database file path.
    pub db_path: PathBuf,
    /// Geocoding provider settings.
    pub geocode: GeocodeConfig,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.coralingest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CoralIngestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.coralingest/coralingest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CoralIngestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CoralIngestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CoralIngestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CoralIngestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CoralIngestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("delay_secs"));
        assert!(toml_str.contains("nominatim.openstreetmap.org"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.retries, 2);
        assert_eq!(parsed.defaults.images_max, 15);
        assert_eq!(parsed.defaults.cookie_domain, ".sahibinden.com");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
delay_secs = 3.0

[fallbacks]
city = "Istanbul"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.delay_secs, 3.0);
        assert_eq!(config.defaults.timeout_ms, 20_000);
        assert_eq!(config.fallbacks.city, "Istanbul");
        assert!(config.fallbacks.state.is_empty());
    }
}
