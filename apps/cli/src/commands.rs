//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use coralingest_core::pipeline::{ImportResult, ProgressReporter};
use coralingest_shared::{AppConfig, RunConfig, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// CoralIngest: import real-estate listings from their source pages.
#[derive(Parser)]
#[command(
    name = "coralingest",
    version,
    about = "Import real-estate listings into a local database, photos included.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Visit listing URLs and import them into the database.
    Import {
        /// File with one listing URL per line, or a CSV with a `url` column.
        urls_file: PathBuf,

        /// Realtor who owns every listing touched by this run.
        #[arg(long)]
        realtor_id: i64,

        /// Seconds to wait between page visits.
        #[arg(long)]
        delay: Option<f64>,

        /// Per-page navigation timeout in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Show the browser window instead of running headless.
        #[arg(long)]
        headed: bool,

        /// Persistent browser profile directory (keeps session state).
        #[arg(long)]
        profile_dir: Option<PathBuf>,

        /// Write rendered page markup here for later inspection.
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Reload attempts for a suspect page before giving up.
        #[arg(long)]
        retries: Option<u32>,

        /// Seconds to cool down before reloading a suspect page.
        #[arg(long)]
        cooldown: Option<f64>,

        /// Do not geocode newly created listings.
        #[arg(long, alias = "defer-geocode")]
        skip_geocode: bool,

        /// Extract and report without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// City used when a page yields no breadcrumbs.
        #[arg(long)]
        default_city: Option<String>,

        /// District used when a page yields no breadcrumbs.
        #[arg(long)]
        default_state: Option<String>,

        /// Postal code used when a page yields no breadcrumbs.
        #[arg(long)]
        default_zipcode: Option<String>,

        /// Street address used when a page yields no breadcrumbs.
        #[arg(long)]
        default_address: Option<String>,

        /// Raw cookie header (`name=value; name2=value2`) for the session.
        #[arg(long)]
        cookie_string: Option<String>,

        /// Netscape-format cookie file for the session.
        #[arg(long)]
        cookie_file: Option<PathBuf>,

        /// Domain attached to cookies from --cookie-string.
        #[arg(long)]
        cookie_domain: Option<String>,

        /// Extra HTTP header `Name: Value`; repeatable, overrides defaults.
        #[arg(long = "header")]
        headers: Vec<String>,

        /// Skip the photo pipeline entirely.
        #[arg(long)]
        no_images: bool,

        /// Cap on photos attached per listing (0 = unlimited).
        #[arg(long)]
        images_max: Option<usize>,

        /// Database file path.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Root directory for stored photo files.
        #[arg(long)]
        media_root: Option<PathBuf>,
    },

    /// Geocode stored listings that still lack coordinates.
    GeocodeMissing {
        /// Maximum listings to process.
        #[arg(long, default_value = "50")]
        limit: u32,

        /// Seconds between provider calls.
        #[arg(long, default_value = "1.0")]
        delay: f64,

        /// Database file path.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show recently updated listings.
    List {
        /// Maximum rows to show.
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Database file path.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "coralingest=info",
        1 => "coralingest=debug",
        _ => "coralingest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import {
            urls_file,
            realtor_id,
            delay,
            timeout_ms,
            headed,
            profile_dir,
            snapshot_dir,
            retries,
            cooldown,
            skip_geocode,
            dry_run,
            default_city,
            default_state,
            default_zipcode,
            default_address,
            cookie_string,
            cookie_file,
            cookie_domain,
            headers,
            no_images,
            images_max,
            db,
            media_root,
        } => {
            let config = load_config()?;
            let run_config = build_run_config(
                &config,
                ImportFlags {
                    urls_file,
                    realtor_id,
                    delay,
                    timeout_ms,
                    headed,
                    profile_dir,
                    snapshot_dir,
                    retries,
                    cooldown,
                    skip_geocode,
                    dry_run,
                    default_city,
                    default_state,
                    default_zipcode,
                    default_address,
                    cookie_string,
                    cookie_file,
                    cookie_domain,
                    headers,
                    no_images,
                    images_max,
                    db,
                    media_root,
                },
            )?;
            cmd_import(run_config).await
        }
        Command::GeocodeMissing { limit, delay, db } => {
            cmd_geocode_missing(limit, delay, db).await
        }
        Command::List { limit, db } => cmd_list(limit, db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Config merging
// ---------------------------------------------------------------------------

struct ImportFlags {
    urls_file: PathBuf,
    realtor_id: i64,
    delay: Option<f64>,
    timeout_ms: Option<u64>,
    headed: bool,
    profile_dir: Option<PathBuf>,
    snapshot_dir: Option<PathBuf>,
    retries: Option<u32>,
    cooldown: Option<f64>,
    skip_geocode: bool,
    dry_run: bool,
    default_city: Option<String>,
    default_state: Option<String>,
    default_zipcode: Option<String>,
    default_address: Option<String>,
    cookie_string: Option<String>,
    cookie_file: Option<PathBuf>,
    cookie_domain: Option<String>,
    headers: Vec<String>,
    no_images: bool,
    images_max: Option<usize>,
    db: Option<PathBuf>,
    media_root: Option<PathBuf>,
}

/// Merge config file values and CLI flags into runtime configuration.
fn build_run_config(config: &AppConfig, flags: ImportFlags) -> Result<RunConfig> {
    if flags.realtor_id <= 0 {
        return Err(eyre!("--realtor-id must be a positive id"));
    }

    let mut extra_headers = Vec::new();
    for raw in &flags.headers {
        match coralingest_core::parse_header_flag(raw) {
            Some(pair) => extra_headers.push(pair),
            None => warn!(raw, "ignoring malformed --header flag, expected 'Name: Value'"),
        }
    }

    let defaults = &config.defaults;
    Ok(RunConfig {
        realtor_id: flags.realtor_id,
        urls_file: flags.urls_file,
        delay: Duration::from_secs_f64(flags.delay.unwrap_or(defaults.delay_secs)),
        timeout: Duration::from_millis(flags.timeout_ms.unwrap_or(defaults.timeout_ms)),
        headless: !flags.headed,
        profile_dir: flags.profile_dir,
        snapshot_dir: flags.snapshot_dir,
        retries: flags.retries.unwrap_or(defaults.retries),
        cooldown: Duration::from_secs_f64(flags.cooldown.unwrap_or(defaults.cooldown_secs)),
        skip_geocode: flags.skip_geocode,
        dry_run: flags.dry_run,
        default_city: flags
            .default_city
            .unwrap_or_else(|| config.fallbacks.city.clone()),
        default_state: flags
            .default_state
            .unwrap_or_else(|| config.fallbacks.state.clone()),
        default_zipcode: flags
            .default_zipcode
            .unwrap_or_else(|| config.fallbacks.zipcode.clone()),
        default_address: flags
            .default_address
            .unwrap_or_else(|| config.fallbacks.address.clone()),
        cookie_string: flags.cookie_string,
        cookie_file: flags.cookie_file,
        cookie_domain: flags
            .cookie_domain
            .unwrap_or_else(|| defaults.cookie_domain.clone()),
        extra_headers,
        no_images: flags.no_images,
        images_max: flags.images_max.unwrap_or(defaults.images_max),
        media_root: flags
            .media_root
            .unwrap_or_else(|| PathBuf::from(&defaults.media_root)),
        db_path: flags.db.unwrap_or_else(|| PathBuf::from(&defaults.db_path)),
        geocode: config.geocode.clone(),
    })
}

fn resolve_db(db: Option<PathBuf>) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(path),
        None => Ok(PathBuf::from(&load_config()?.defaults.db_path)),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_import(config: RunConfig) -> Result<()> {
    info!(
        urls_file = ?config.urls_file,
        realtor_id = config.realtor_id,
        dry_run = config.dry_run,
        "starting import"
    );

    let reporter = CliProgress::new();
    let result = coralingest_core::pipeline::run_import(&config, &reporter).await?;

    println!();
    println!("  Import finished.");
    println!("  Created: {}", result.created);
    println!("  Updated: {}", result.updated);
    println!("  Skipped: {}", result.skipped);
    println!("  Total:   {}", result.total);
    println!("  Time:    {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_geocode_missing(limit: u32, delay: f64, db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(db)?;

    let updated = coralingest_core::pipeline::run_geocode_missing(
        &db_path,
        &config.geocode,
        limit,
        Duration::from_secs_f64(delay),
    )
    .await?;

    println!("Geocoded {updated} listing(s).");
    Ok(())
}

async fn cmd_list(limit: u32, db: Option<PathBuf>) -> Result<()> {
    let db_path = resolve_db(db)?;
    let storage = coralingest_storage::Storage::open(&db_path).await?;
    let listings = storage.list_recent(limit).await?;

    if listings.is_empty() {
        println!("No listings yet.");
        return Ok(());
    }

    println!("{:>6}  {:<12} {:<10} {:>12}  {}", "id", "ad no", "city", "price", "title");
    for listing in listings {
        println!(
            "{:>6}  {:<12} {:<10} {:>12}  {}",
            listing.id.unwrap_or_default(),
            listing.external_id.as_deref().unwrap_or("-"),
            listing.city,
            listing.price,
            listing.title,
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config file created at {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn url_started(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Visiting [{current}/{total}] {url}"));
    }

    fn done(&self, _result: &ImportResult) {
        self.spinner.finish_and_clear();
    }
}
