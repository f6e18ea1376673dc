//! Isolated persistence executor.
//!
//! All database and media writes happen on one dedicated task that owns the
//! [`Storage`] handle, the [`MediaStore`], and the geocoder. The scraping
//! loop talks to it over a channel, so a wedged write can never corrupt
//! browser state and the writer never sees concurrent mutation.

use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use coralingest_geocode::Nominatim;
use coralingest_shared::{CoralIngestError, GeocodeConfig, ListingRecord, Result};
use coralingest_storage::{MediaStore, Storage};

/// A unit of persistence work: one listing plus its downloaded photos.
#[derive(Debug)]
pub struct CommitJob {
    /// The record to write; merged in place when `existing_id` is set.
    pub record: ListingRecord,
    /// Row id of the listing being updated; `None` creates a new row.
    pub existing_id: Option<i64>,
    /// Downloaded photos as `(file_name, bytes)`, gallery order.
    pub images: Vec<(String, Vec<u8>)>,
    /// Skip geocoding even when the record lacks coordinates.
    pub skip_geocode: bool,
}

/// What a commit did.
#[derive(Debug)]
pub struct CommitOutcome {
    pub listing_id: i64,
    pub created: bool,
    pub images_attached: usize,
    pub images_removed: usize,
}

enum Request {
    Find {
        external_id: Option<String>,
        original_url: String,
        reply: oneshot::Sender<Result<Option<ListingRecord>>>,
    },
    ImagesValid {
        listing_id: i64,
        reply: oneshot::Sender<Result<bool>>,
    },
    Commit {
        job: Box<CommitJob>,
        reply: oneshot::Sender<Result<CommitOutcome>>,
    },
    StartRun {
        reply: oneshot::Sender<Result<String>>,
    },
    FinishRun {
        run_id: String,
        stats_json: String,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Handle to the persistence task.
pub struct PersistExecutor {
    tx: mpsc::Sender<Request>,
    task: JoinHandle<()>,
}

impl PersistExecutor {
    /// Open the database and media store on a fresh writer task.
    pub async fn spawn(
        db_path: &Path,
        media_root: PathBuf,
        geocode: &GeocodeConfig,
    ) -> Result<Self> {
        let storage = Storage::open(db_path).await?;
        let media = MediaStore::new(media_root);
        let geocoder = Nominatim::new(geocode)?;

        let (tx, mut rx) = mpsc::channel::<Request>(1);
        let task = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    Request::Find {
                        external_id,
                        original_url,
                        reply,
                    } => {
                        let result = storage
                            .find_listing(external_id.as_deref(), &original_url)
                            .await;
                        let _ = reply.send(result);
                    }
                    Request::ImagesValid { listing_id, reply } => {
                        let _ = reply.send(images_valid(&storage, &media, listing_id).await);
                    }
                    Request::Commit { job, reply } => {
                        let _ =
                            reply.send(handle_commit(&storage, &media, &geocoder, *job).await);
                    }
                    Request::StartRun { reply } => {
                        let _ = reply.send(storage.start_import_run().await);
                    }
                    Request::FinishRun {
                        run_id,
                        stats_json,
                        reply,
                    } => {
                        let _ =
                            reply.send(storage.finish_import_run(&run_id, &stats_json).await);
                    }
                }
            }
        });

        Ok(Self { tx, task })
    }

    async fn request<T>(
        &self,
        request: Request,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.tx
            .send(request)
            .await
            .map_err(|_| CoralIngestError::Storage("persistence task is gone".into()))?;
        rx.await
            .map_err(|_| CoralIngestError::Storage("persistence task dropped the reply".into()))?
    }

    /// Look up an existing listing by ad number, then source URL.
    pub async fn find(
        &self,
        external_id: Option<String>,
        original_url: String,
    ) -> Result<Option<ListingRecord>> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Request::Find {
                external_id,
                original_url,
                reply,
            },
            rx,
        )
        .await
    }

    /// Whether a listing has image rows and every one is intact on disk.
    pub async fn images_valid(&self, listing_id: i64) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::ImagesValid { listing_id, reply }, rx)
            .await
    }

    /// Persist one listing and its photos.
    pub async fn commit(&self, job: CommitJob) -> Result<CommitOutcome> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Request::Commit {
                job: Box::new(job),
                reply,
            },
            rx,
        )
        .await
    }

    /// Record the start of an import run.
    pub async fn start_run(&self) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::StartRun { reply }, rx).await
    }

    /// Mark an import run finished with summary stats.
    pub async fn finish_run(&self, run_id: String, stats_json: String) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Request::FinishRun {
                run_id,
                stats_json,
                reply,
            },
            rx,
        )
        .await
    }

    /// Drain outstanding work and stop the writer task.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!(%e, "persistence task ended abnormally");
        }
    }
}

/// True when the listing has at least one image row and every row's file is
/// retrievable and non-empty.
async fn images_valid(storage: &Storage, media: &MediaStore, listing_id: i64) -> Result<bool> {
    let images = storage.images_for(listing_id).await?;
    if images.is_empty() {
        return Ok(false);
    }
    Ok(images.iter().all(|image| media.exists(&image.file_path)))
}

#[instrument(skip_all, fields(external_id = ?job.record.external_id, existing = job.existing_id.is_some()))]
async fn handle_commit(
    storage: &Storage,
    media: &MediaStore,
    geocoder: &Nominatim,
    mut job: CommitJob,
) -> Result<CommitOutcome> {
    let created = job.existing_id.is_none();

    // Geocode only creations that arrived without coordinates. Failures are
    // absorbed; a listing without coordinates is still a listing.
    if created
        && !job.skip_geocode
        && job.record.latitude.is_none()
        && !job.record.address.is_empty()
    {
        let address = format!(
            "{}, {}, {}",
            job.record.address, job.record.state, job.record.city
        );
        match geocoder.geocode(&address).await {
            Ok(Some((lat, lon))) => {
                job.record.latitude = Some(lat);
                job.record.longitude = Some(lon);
            }
            Ok(None) => {}
            Err(e) => warn!(%e, address, "geocoding failed, leaving coordinates empty"),
        }
    }

    let listing_id = match job.existing_id {
        Some(id) => {
            job.record.id = Some(id);
            storage.update_listing(&job.record).await?;
            id
        }
        None => {
            let id = storage.insert_listing(&job.record).await?;
            job.record.id = Some(id);
            id
        }
    };

    // Photo repair: drop rows whose files are broken, then attach fresh
    // downloads only when no intact rows remain.
    let mut images_removed = 0;
    for image in storage.images_for(listing_id).await? {
        if !media.exists(&image.file_path) {
            storage.delete_image(image.id).await?;
            media.remove(&image.file_path)?;
            images_removed += 1;
        }
    }

    let mut images_attached = 0;
    let remaining = storage.images_for(listing_id).await?;
    if remaining.is_empty() && !job.images.is_empty() {
        let key = MediaStore::listing_key(job.record.external_id.as_deref(), listing_id);
        for (order, (file_name, bytes)) in job.images.iter().enumerate() {
            let relative = MediaStore::relative_path(&key, file_name);
            media.save(&relative, bytes)?;
            storage
                .insert_image(listing_id, &relative, order as i64, order == 0)
                .await?;
            images_attached += 1;
        }
    }

    info!(
        listing_id,
        created, images_attached, images_removed, "listing committed"
    );

    Ok(CommitOutcome {
        listing_id,
        created,
        images_attached,
        images_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coralingest_shared::DealType;
    use uuid::Uuid;

    fn temp_paths() -> (PathBuf, PathBuf) {
        let stamp = Uuid::now_v7();
        (
            std::env::temp_dir().join(format!("ci_exec_{stamp}.db")),
            std::env::temp_dir().join(format!("ci_exec_media_{stamp}")),
        )
    }

    async fn test_executor() -> PersistExecutor {
        let (db, media) = temp_paths();
        PersistExecutor::spawn(&db, media, &GeocodeConfig::default())
            .await
            .expect("spawn executor")
    }

    fn scraped_record() -> ListingRecord {
        ListingRecord {
            realtor_id: 7,
            title: "Satılık 3+1 Daire".into(),
            address: "Caferağa Mah.".into(),
            city: "İstanbul".into(),
            state: "Kadıköy".into(),
            price: 2_450_000,
            deal_type: Some(DealType::Sale),
            property_type: "Daire".into(),
            external_id: Some("1186156117".into()),
            original_url: Some("https://www.sahibinden.com/ilan/1186156117".into()),
            latitude: Some(40.99),
            longitude: Some(29.03),
            ..ListingRecord::default()
        }
    }

    #[tokio::test]
    async fn create_then_find_then_update_yields_one_row() {
        let executor = test_executor().await;

        let outcome = executor
            .commit(CommitJob {
                record: scraped_record(),
                existing_id: None,
                images: Vec::new(),
                skip_geocode: true,
            })
            .await
            .expect("create");
        assert!(outcome.created);

        let found = executor
            .find(
                Some("1186156117".into()),
                "https://www.sahibinden.com/ilan/1186156117".into(),
            )
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.id, Some(outcome.listing_id));

        let second = executor
            .commit(CommitJob {
                record: found.clone(),
                existing_id: found.id,
                images: Vec::new(),
                skip_geocode: true,
            })
            .await
            .expect("update");
        assert!(!second.created);
        assert_eq!(second.listing_id, outcome.listing_id);

        executor.shutdown().await;
    }

    #[tokio::test]
    async fn photos_attach_on_create_and_repair_on_breakage() {
        let (db, media_root) = temp_paths();
        let executor = PersistExecutor::spawn(&db, media_root.clone(), &GeocodeConfig::default())
            .await
            .expect("spawn");
        let media = MediaStore::new(media_root);

        let outcome = executor
            .commit(CommitJob {
                record: scraped_record(),
                existing_id: None,
                images: vec![
                    ("listing_1186156117_0.jpg".into(), vec![1, 2, 3]),
                    ("listing_1186156117_1.jpg".into(), vec![4, 5]),
                ],
                skip_geocode: true,
            })
            .await
            .expect("create");
        assert_eq!(outcome.images_attached, 2);
        let listing_id = outcome.listing_id;

        assert!(executor.images_valid(listing_id).await.expect("valid"));

        // Break one photo on disk; the set is no longer valid.
        let rel = MediaStore::relative_path("1186156117", "listing_1186156117_0.jpg");
        media.remove(&rel).expect("break photo");
        assert!(!executor.images_valid(listing_id).await.expect("valid"));

        // Commit removes the broken row but keeps the intact one, so the
        // fresh download is not attached.
        let found = executor
            .find(Some("1186156117".into()), "unused".into())
            .await
            .expect("find")
            .expect("present");
        let outcome = executor
            .commit(CommitJob {
                record: found.clone(),
                existing_id: found.id,
                images: vec![("listing_1186156117_9.jpg".into(), vec![9])],
                skip_geocode: true,
            })
            .await
            .expect("repair");
        assert_eq!(outcome.images_removed, 1);
        assert_eq!(outcome.images_attached, 0);
        assert!(executor.images_valid(listing_id).await.expect("valid"));

        executor.shutdown().await;
    }

    #[tokio::test]
    async fn empty_image_set_attaches_fresh_downloads() {
        let executor = test_executor().await;

        let outcome = executor
            .commit(CommitJob {
                record: scraped_record(),
                existing_id: None,
                images: Vec::new(),
                skip_geocode: true,
            })
            .await
            .expect("create");
        // No rows at all: not a valid image set.
        assert!(!executor.images_valid(outcome.listing_id).await.expect("valid"));

        let found = executor
            .find(Some("1186156117".into()), "unused".into())
            .await
            .expect("find")
            .expect("present");
        let second = executor
            .commit(CommitJob {
                record: found.clone(),
                existing_id: found.id,
                images: vec![("listing_1186156117_0.jpg".into(), vec![7, 7])],
                skip_geocode: true,
            })
            .await
            .expect("attach");
        assert_eq!(second.images_attached, 1);
        assert!(executor.images_valid(outcome.listing_id).await.expect("valid"));

        executor.shutdown().await;
    }

    #[tokio::test]
    async fn geocode_fills_missing_coordinates_on_create() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"lat": "41.0082", "lon": "28.9784"}
            ])))
            .mount(&server)
            .await;

        let (db, media_root) = temp_paths();
        let geocode = GeocodeConfig {
            base_url: format!("{}/search", server.uri()),
            user_agent: "coralingest-test/0".into(),
        };
        let executor = PersistExecutor::spawn(&db, media_root, &geocode)
            .await
            .expect("spawn");

        let mut record = scraped_record();
        record.latitude = None;
        record.longitude = None;

        let outcome = executor
            .commit(CommitJob {
                record,
                existing_id: None,
                images: Vec::new(),
                skip_geocode: false,
            })
            .await
            .expect("create");

        let stored = executor
            .find(Some("1186156117".into()), "unused".into())
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.id, Some(outcome.listing_id));
        assert_eq!(stored.latitude, Some(41.0082));
        assert_eq!(stored.longitude, Some(28.9784));

        executor.shutdown().await;
    }
}
