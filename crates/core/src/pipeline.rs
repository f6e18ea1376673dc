//! End-to-end import pipeline: URL list → browser visit → extract → judge →
//! reconcile → persist.

use std::future::Future;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use url::Url;

use coralingest_browser::{
    Session, SessionConfig, load_cookie_file, merge_headers, parse_cookie_string,
};
use coralingest_extract::{PageExtract, PageVerdict, extract_listing_page, judge_page};
use coralingest_geocode::Nominatim;
use coralingest_images::{ImageFetcher, collect_gallery_urls};
use coralingest_shared::{CoralIngestError, GeocodeConfig, Result, RunConfig};
use coralingest_storage::Storage;

use crate::executor::{CommitJob, PersistExecutor};
use crate::reconcile;
use crate::sources;

/// Element whose appearance marks a detail page as rendered.
const TITLE_SELECTOR: &str = "div.classifiedDetailTitle h1";

/// Timeout for individual photo downloads.
const IMAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Summary counters for one import run.
#[derive(Debug, Default, serde::Serialize)]
pub struct ImportResult {
    /// Listings created.
    pub created: usize,
    /// Listings merged into an existing row.
    pub updated: usize,
    /// URLs given up on (navigation failures, suspect pages, failed writes).
    pub skipped: usize,
    /// URLs attempted.
    pub total: usize,
    /// Total elapsed time.
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a listing URL is about to be visited.
    fn url_started(&self, url: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &ImportResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn url_started(&self, _url: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &ImportResult) {}
}

/// Build the browser session identity from the run configuration.
pub fn session_config(config: &RunConfig) -> Result<SessionConfig> {
    let mut cookies = Vec::new();
    if let Some(raw) = &config.cookie_string {
        cookies.extend(parse_cookie_string(raw, &config.cookie_domain));
    }
    if let Some(path) = &config.cookie_file {
        cookies.extend(load_cookie_file(path)?);
    }

    Ok(SessionConfig {
        headless: config.headless,
        nav_timeout: config.timeout,
        headers: merge_headers(&config.extra_headers),
        cookies,
        profile_dir: config.profile_dir.clone(),
        ..SessionConfig::default()
    })
}

/// Run a full import over every URL in the configured source file.
#[instrument(skip_all, fields(realtor_id = config.realtor_id, dry_run = config.dry_run))]
pub async fn run_import(
    config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<ImportResult> {
    let start = Instant::now();

    progress.phase("reading url list");
    let urls = sources::read_urls(&config.urls_file)?;
    if urls.is_empty() {
        warn!(path = ?config.urls_file, "no listing urls found, nothing to do");
        return Ok(ImportResult {
            elapsed: start.elapsed(),
            ..ImportResult::default()
        });
    }
    info!(count = urls.len(), "listing urls loaded");

    // Dry runs never touch the database or media tree.
    let executor = if config.dry_run {
        None
    } else {
        Some(
            PersistExecutor::spawn(&config.db_path, config.media_root.clone(), &config.geocode)
                .await?,
        )
    };
    let run_id = match &executor {
        Some(executor) => Some(executor.start_run().await?),
        None => None,
    };

    progress.phase("launching browser");
    let session_cfg = session_config(config)?;
    let cookie_header = cookie_header(&session_cfg);
    let session = Session::launch(session_cfg).await?;

    let mut result = ImportResult {
        total: urls.len(),
        ..ImportResult::default()
    };

    progress.phase("importing listings");
    for (index, url) in urls.iter().enumerate() {
        progress.url_started(url, index + 1, urls.len());

        match import_one(config, &session, executor.as_ref(), cookie_header.as_deref(), url).await
        {
            Ok(Outcome::Created) => result.created += 1,
            Ok(Outcome::Updated) => result.updated += 1,
            Ok(Outcome::DryRun) => {}
            Ok(Outcome::Skipped) => result.skipped += 1,
            Err(e) => {
                warn!(url, %e, "listing import failed, moving on");
                result.skipped += 1;
            }
        }

        if index + 1 < urls.len() {
            tokio::time::sleep(config.delay).await;
        }
    }

    session.close().await;

    if let (Some(executor), Some(run_id)) = (executor, run_id) {
        let stats = serde_json::to_string(&result)
            .map_err(|e| CoralIngestError::Storage(format!("stats serialization: {e}")))?;
        if let Err(e) = executor.finish_run(run_id, stats).await {
            warn!(%e, "failed to record run stats");
        }
        executor.shutdown().await;
    }

    result.elapsed = start.elapsed();
    info!(
        created = result.created,
        updated = result.updated,
        skipped = result.skipped,
        total = result.total,
        elapsed_ms = result.elapsed.as_millis(),
        "import finished"
    );
    progress.done(&result);
    Ok(result)
}

enum Outcome {
    Created,
    Updated,
    Skipped,
    DryRun,
}

/// Result of one reload-and-re-judge pass.
enum Reeval {
    Page {
        html: String,
        extract: PageExtract,
        verdict: PageVerdict,
    },
    /// The reload itself failed; keep the current verdict and stop retrying.
    Unavailable,
}

/// Bounded suspect-page retry: cool down, re-evaluate, re-judge, up to
/// `retries` times. Anti-bot walls often clear after a cooldown and reload.
/// Returns the last observed page state; a still-suspect verdict is the
/// caller's cue to skip the URL without writing anything.
async fn settle_page<F, Fut>(
    mut html: String,
    mut extract: PageExtract,
    mut verdict: PageVerdict,
    retries: u32,
    cooldown: Duration,
    mut reevaluate: F,
) -> Result<(String, PageExtract, PageVerdict)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Reeval>>,
{
    let mut attempt: u32 = 0;
    while let PageVerdict::Suspect(reason) = &verdict {
        if attempt >= retries {
            break;
        }
        attempt += 1;
        warn!(%reason, attempt, "suspect page, cooling down before reload");
        tokio::time::sleep(cooldown).await;
        match reevaluate(attempt).await? {
            Reeval::Page {
                html: fresh_html,
                extract: fresh_extract,
                verdict: fresh_verdict,
            } => {
                html = fresh_html;
                extract = fresh_extract;
                verdict = fresh_verdict;
            }
            Reeval::Unavailable => break,
        }
    }
    Ok((html, extract, verdict))
}

async fn import_one(
    config: &RunConfig,
    session: &Session,
    executor: Option<&PersistExecutor>,
    cookie_header: Option<&str>,
    url: &str,
) -> Result<Outcome> {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    let visit = session.visit(url).await?;
    visit.wait_for(TITLE_SELECTOR, config.timeout).await;

    let html = match visit.html().await {
        Ok(html) => html,
        Err(e) => {
            visit.close().await;
            return Err(e);
        }
    };
    let extract = extract_listing_page(&html);
    let verdict = judge_page(&extract, &host);

    let settled = settle_page(
        html,
        extract,
        verdict,
        config.retries,
        config.cooldown,
        |_attempt| {
            let visit = &visit;
            let host = host.as_str();
            async move {
                if let Err(e) = visit.reload(config.timeout).await {
                    warn!(url, %e, "reload failed");
                    return Ok(Reeval::Unavailable);
                }
                visit.wait_for(TITLE_SELECTOR, config.timeout).await;
                let html = visit.html().await?;
                let extract = extract_listing_page(&html);
                let verdict = judge_page(&extract, host);
                Ok(Reeval::Page {
                    html,
                    extract,
                    verdict,
                })
            }
        },
    )
    .await;
    let (html, extract, verdict) = match settled {
        Ok(state) => state,
        Err(e) => {
            visit.close().await;
            return Err(e);
        }
    };

    if let PageVerdict::Suspect(reason) = verdict {
        warn!(url, %reason, "page stayed suspect after retries, skipping");
        visit.close().await;
        return Ok(Outcome::Skipped);
    }

    if let Some(dir) = &config.snapshot_dir {
        save_snapshot(dir, url, &html);
    }

    let record = reconcile::build_record(&extract, url, config);

    if config.dry_run {
        info!(
            url,
            external_id = ?record.external_id,
            title = %record.title,
            price = record.price,
            city = %record.city,
            "dry run, not persisting"
        );
        visit.close().await;
        return Ok(Outcome::DryRun);
    }
    let executor = executor.ok_or_else(|| {
        CoralIngestError::Storage("persistence executor missing outside dry run".into())
    })?;

    // Lookup failures degrade to "treat as new"; the insert will surface a
    // genuinely broken database.
    let existing = match executor
        .find(record.external_id.clone(), url.to_string())
        .await
    {
        Ok(existing) => existing,
        Err(e) => {
            warn!(url, %e, "lookup failed, treating listing as new");
            None
        }
    };

    // Photos: skip downloads entirely when the stored set is already intact.
    let mut images = Vec::new();
    if !config.no_images {
        let set_intact = match existing.as_ref().and_then(|l| l.id) {
            Some(id) => executor.images_valid(id).await.unwrap_or(false),
            None => false,
        };
        if !set_intact {
            let candidates = collect_gallery_urls(&html, config.images_max);
            if !candidates.is_empty() {
                let key = record
                    .external_id
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                let fetcher = ImageFetcher::new(url, cookie_header.map(str::to_string), IMAGE_TIMEOUT)?;
                images = fetcher.download_all(&candidates, &key).await;
            }
        }
    }

    // Release the page before the write; pages are the scarce resource.
    visit.close().await;

    let (job, created_expected) = match existing {
        Some(mut stored) => {
            let filled = reconcile::merge_missing(&mut stored, &record);
            info!(url, listing_id = ?stored.id, ?filled, "merging into existing listing");
            let existing_id = stored.id;
            (
                CommitJob {
                    record: stored,
                    existing_id,
                    images,
                    skip_geocode: config.skip_geocode,
                },
                false,
            )
        }
        None => (
            CommitJob {
                record,
                existing_id: None,
                images,
                skip_geocode: config.skip_geocode,
            },
            true,
        ),
    };

    match executor.commit(job).await {
        Ok(outcome) => {
            debug_assert_eq!(outcome.created, created_expected);
            if outcome.created {
                Ok(Outcome::Created)
            } else {
                Ok(Outcome::Updated)
            }
        }
        Err(e) => {
            warn!(url, %e, "persist failed");
            Ok(Outcome::Skipped)
        }
    }
}

/// Best-effort snapshot of the rendered markup, named by URL digest.
fn save_snapshot(dir: &std::path::Path, url: &str, html: &str) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(?dir, %e, "snapshot dir creation failed");
        return;
    }
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    let path = dir.join(format!("{}.html", &digest[..16]));
    if let Err(e) = std::fs::write(&path, html) {
        warn!(?path, %e, "snapshot write failed");
    }
}

/// Geocode stored listings that still lack coordinates.
///
/// Returns how many listings were updated. Paced by `delay` between
/// provider calls.
pub async fn run_geocode_missing(
    db_path: &std::path::Path,
    geocode: &GeocodeConfig,
    limit: u32,
    delay: Duration,
) -> Result<usize> {
    let storage = Storage::open(db_path).await?;
    let geocoder = Nominatim::new(geocode)?;

    let pending = storage.listings_missing_coordinates(limit).await?;
    info!(count = pending.len(), "listings missing coordinates");

    let mut updated = 0;
    for listing in &pending {
        let Some(id) = listing.id else { continue };
        let address = format!("{}, {}, {}", listing.address, listing.state, listing.city);
        match geocoder.geocode(&address).await {
            Ok(Some((lat, lon))) => {
                storage.set_coordinates(id, lat, lon).await?;
                updated += 1;
            }
            Ok(None) => info!(listing_id = id, address, "no geocoding match"),
            Err(e) => warn!(listing_id = id, %e, "geocoding failed"),
        }
        tokio::time::sleep(delay).await;
    }

    Ok(updated)
}

fn cookie_header(session: &SessionConfig) -> Option<String> {
    if session.cookies.is_empty() {
        return None;
    }
    Some(
        session
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}
