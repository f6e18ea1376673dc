//! libSQL storage layer for listings, photos, and import run history.
//!
//! The [`Storage`] struct wraps a libSQL database; [`media::MediaStore`]
//! owns the photo files on disk. Both are intended to be held by a single
//! writer task, see the persistence executor in `coralingest-core`.

mod migrations;

pub mod media;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use uuid::Uuid;

use coralingest_shared::{CoralIngestError, DealType, ListingImage, ListingRecord, Result};

pub use media::MediaStore;

/// Column list shared by every listing SELECT, in `row_to_listing` order.
const LISTING_COLUMNS: &str = "id, realtor_id, title, address, city, state, zipcode, \
    latitude, longitude, description, price, bedrooms, deal_type, property_type, \
    bathrooms, sqft, external_id, ad_date, original_url, m2_gross, m2_net, rooms_text, \
    building_age, floor_number, floors_total, heating, kitchen_type, balcony, elevator, \
    parking_area, furnished, usage_status, in_complex, complex_name, maintenance_fee, \
    deposit, deed_status, from_whom, is_published, list_date";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoralIngestError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    CoralIngestError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Listing operations
    // -----------------------------------------------------------------------

    /// Look up an existing listing by ad number, falling back to the source
    /// URL when the ad number is absent or unknown.
    pub async fn find_listing(
        &self,
        external_id: Option<&str>,
        original_url: &str,
    ) -> Result<Option<ListingRecord>> {
        if let Some(external_id) = external_id {
            let found = self
                .query_one(
                    &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE external_id = ?1 LIMIT 1"),
                    params![external_id],
                )
                .await?;
            if found.is_some() {
                return Ok(found);
            }
        }

        self.query_one(
            &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE original_url = ?1 LIMIT 1"),
            params![original_url],
        )
        .await
    }

    /// Get a listing by row id.
    pub async fn get_listing(&self, id: i64) -> Result<Option<ListingRecord>> {
        self.query_one(
            &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1"),
            params![id],
        )
        .await
    }

    async fn query_one(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<ListingRecord>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_listing(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(CoralIngestError::Storage(e.to_string())),
        }
    }

    /// Insert a new listing and return its row id.
    pub async fn insert_listing(&self, record: &ListingRecord) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO listings (realtor_id, title, address, city, state, zipcode, \
                 latitude, longitude, description, price, bedrooms, deal_type, property_type, \
                 bathrooms, sqft, external_id, ad_date, original_url, m2_gross, m2_net, \
                 rooms_text, building_age, floor_number, floors_total, heating, kitchen_type, \
                 balcony, elevator, parking_area, furnished, usage_status, in_complex, \
                 complex_name, maintenance_fee, deposit, deed_status, from_whom, is_published, \
                 list_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, \
                 ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39, ?40, ?41)",
                listing_params(record, &now),
            )
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Rewrite an existing listing row from the given record.
    pub async fn update_listing(&self, record: &ListingRecord) -> Result<()> {
        let id = record
            .id
            .ok_or_else(|| CoralIngestError::Storage("update of an unsaved listing".into()))?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE listings SET realtor_id = ?1, title = ?2, address = ?3, city = ?4, \
                 state = ?5, zipcode = ?6, latitude = ?7, longitude = ?8, description = ?9, \
                 price = ?10, bedrooms = ?11, deal_type = ?12, property_type = ?13, \
                 bathrooms = ?14, sqft = ?15, external_id = ?16, ad_date = ?17, \
                 original_url = ?18, m2_gross = ?19, m2_net = ?20, rooms_text = ?21, \
                 building_age = ?22, floor_number = ?23, floors_total = ?24, heating = ?25, \
                 kitchen_type = ?26, balcony = ?27, elevator = ?28, parking_area = ?29, \
                 furnished = ?30, usage_status = ?31, in_complex = ?32, complex_name = ?33, \
                 maintenance_fee = ?34, deposit = ?35, deed_status = ?36, from_whom = ?37, \
                 is_published = ?38, list_date = ?39, updated_at = ?40 \
                 WHERE id = ?41",
                update_params(record, &now, id),
            )
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Fill in coordinates for a listing.
    pub async fn set_coordinates(&self, id: i64, latitude: f64, longitude: f64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE listings SET latitude = ?1, longitude = ?2, updated_at = ?3 WHERE id = ?4",
                params![latitude, longitude, now.as_str(), id],
            )
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Listings that have an address but no coordinates yet.
    pub async fn listings_missing_coordinates(&self, limit: u32) -> Result<Vec<ListingRecord>> {
        self.query_many(
            &format!(
                "SELECT {LISTING_COLUMNS} FROM listings \
                 WHERE latitude IS NULL AND longitude IS NULL AND address <> '' \
                 ORDER BY id LIMIT ?1"
            ),
            params![limit],
        )
        .await
    }

    /// Most recently updated listings.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<ListingRecord>> {
        self.query_many(
            &format!("SELECT {LISTING_COLUMNS} FROM listings ORDER BY updated_at DESC LIMIT ?1"),
            params![limit],
        )
        .await
    }

    async fn query_many(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<ListingRecord>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_listing(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Image operations
    // -----------------------------------------------------------------------

    /// All image rows for a listing, in sort order.
    pub async fn images_for(&self, listing_id: i64) -> Result<Vec<ListingImage>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, listing_id, file_path, sort_order, is_primary, is_visible \
                 FROM listing_images WHERE listing_id = ?1 ORDER BY sort_order, id",
                params![listing_id],
            )
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ListingImage {
                id: col_i64(&row, 0)?,
                listing_id: col_i64(&row, 1)?,
                file_path: col_text(&row, 2)?,
                sort_order: col_i64(&row, 3)?,
                is_primary: col_i64(&row, 4)? != 0,
                is_visible: col_i64(&row, 5)? != 0,
            });
        }
        Ok(results)
    }

    /// Attach an image row. Inserting a primary image demotes any prior
    /// primary, keeping at most one per listing.
    pub async fn insert_image(
        &self,
        listing_id: i64,
        file_path: &str,
        sort_order: i64,
        is_primary: bool,
    ) -> Result<i64> {
        if is_primary {
            self.conn
                .execute(
                    "UPDATE listing_images SET is_primary = 0 \
                     WHERE listing_id = ?1 AND is_primary = 1",
                    params![listing_id],
                )
                .await
                .map_err(|e| CoralIngestError::Storage(e.to_string()))?;
        }

        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO listing_images \
                 (listing_id, file_path, sort_order, is_primary, is_visible, created_at) \
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![
                    listing_id,
                    file_path,
                    sort_order,
                    is_primary as i64,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Delete an image row by id.
    pub async fn delete_image(&self, image_id: i64) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM listing_images WHERE id = ?1",
                params![image_id],
            )
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Import run history
    // -----------------------------------------------------------------------

    /// Record the start of an import run; returns the run id.
    pub async fn start_import_run(&self) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO import_runs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Mark an import run finished, attaching summary stats as JSON.
    pub async fn finish_import_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE import_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| CoralIngestError::Storage(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn col_text(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| CoralIngestError::Storage(format!("column {idx}: {e}")))
}

fn col_i64(row: &libsql::Row, idx: i32) -> Result<i64> {
    row.get::<i64>(idx)
        .map_err(|e| CoralIngestError::Storage(format!("column {idx}: {e}")))
}

fn row_to_listing(row: &libsql::Row) -> Result<ListingRecord> {
    Ok(ListingRecord {
        id: Some(col_i64(row, 0)?),
        realtor_id: col_i64(row, 1)?,
        title: col_text(row, 2)?,
        address: col_text(row, 3)?,
        city: col_text(row, 4)?,
        state: col_text(row, 5)?,
        zipcode: col_text(row, 6)?,
        latitude: row.get::<f64>(7).ok(),
        longitude: row.get::<f64>(8).ok(),
        description: col_text(row, 9)?,
        price: col_i64(row, 10)?,
        bedrooms: col_i64(row, 11)?,
        deal_type: row
            .get::<String>(12)
            .ok()
            .and_then(|s| s.parse::<DealType>().ok()),
        property_type: col_text(row, 13)?,
        bathrooms: col_i64(row, 14)?,
        sqft: col_i64(row, 15)?,
        external_id: row.get::<String>(16).ok(),
        ad_date: row
            .get::<String>(17)
            .ok()
            .and_then(|s| chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        original_url: row.get::<String>(18).ok(),
        m2_gross: row.get::<i64>(19).ok(),
        m2_net: row.get::<i64>(20).ok(),
        rooms_text: col_text(row, 21)?,
        building_age: row.get::<i64>(22).ok(),
        floor_number: row.get::<i64>(23).ok(),
        floors_total: row.get::<i64>(24).ok(),
        heating: col_text(row, 25)?,
        kitchen_type: col_text(row, 26)?,
        balcony: row.get::<i64>(27).ok().map(|v| v != 0),
        elevator: row.get::<i64>(28).ok().map(|v| v != 0),
        parking_area: col_text(row, 29)?,
        furnished: row.get::<i64>(30).ok().map(|v| v != 0),
        usage_status: col_text(row, 31)?,
        in_complex: row.get::<i64>(32).ok().map(|v| v != 0),
        complex_name: col_text(row, 33)?,
        maintenance_fee: row.get::<i64>(34).ok(),
        deposit: row.get::<i64>(35).ok(),
        deed_status: col_text(row, 36)?,
        from_whom: col_text(row, 37)?,
        is_published: col_i64(row, 38)? != 0,
        list_date: {
            let s = col_text(row, 39)?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| CoralIngestError::Storage(format!("invalid list_date: {e}")))?
        },
    })
}

fn listing_params(record: &ListingRecord, now: &str) -> impl libsql::params::IntoParams {
    params![
        record.realtor_id,
        record.title.as_str(),
        record.address.as_str(),
        record.city.as_str(),
        record.state.as_str(),
        record.zipcode.as_str(),
        record.latitude,
        record.longitude,
        record.description.as_str(),
        record.price,
        record.bedrooms,
        record.deal_type.map(|d| d.as_str()),
        record.property_type.as_str(),
        record.bathrooms,
        record.sqft,
        record.external_id.as_deref(),
        record.ad_date.map(|d| d.to_string()),
        record.original_url.as_deref(),
        record.m2_gross,
        record.m2_net,
        record.rooms_text.as_str(),
        record.building_age,
        record.floor_number,
        record.floors_total,
        record.heating.as_str(),
        record.kitchen_type.as_str(),
        record.balcony.map(i64::from),
        record.elevator.map(i64::from),
        record.parking_area.as_str(),
        record.furnished.map(i64::from),
        record.usage_status.as_str(),
        record.in_complex.map(i64::from),
        record.complex_name.as_str(),
        record.maintenance_fee,
        record.deposit,
        record.deed_status.as_str(),
        record.from_whom.as_str(),
        record.is_published as i64,
        record.list_date.to_rfc3339(),
        now,
        now,
    ]
}

fn update_params(record: &ListingRecord, now: &str, id: i64) -> impl libsql::params::IntoParams {
    params![
        record.realtor_id,
        record.title.as_str(),
        record.address.as_str(),
        record.city.as_str(),
        record.state.as_str(),
        record.zipcode.as_str(),
        record.latitude,
        record.longitude,
        record.description.as_str(),
        record.price,
        record.bedrooms,
        record.deal_type.map(|d| d.as_str()),
        record.property_type.as_str(),
        record.bathrooms,
        record.sqft,
        record.external_id.as_deref(),
        record.ad_date.map(|d| d.to_string()),
        record.original_url.as_deref(),
        record.m2_gross,
        record.m2_net,
        record.rooms_text.as_str(),
        record.building_age,
        record.floor_number,
        record.floors_total,
        record.heating.as_str(),
        record.kitchen_type.as_str(),
        record.balcony.map(i64::from),
        record.elevator.map(i64::from),
        record.parking_area.as_str(),
        record.furnished.map(i64::from),
        record.usage_status.as_str(),
        record.in_complex.map(i64::from),
        record.complex_name.as_str(),
        record.maintenance_fee,
        record.deposit,
        record.deed_status.as_str(),
        record.from_whom.as_str(),
        record.is_published as i64,
        record.list_date.to_rfc3339(),
        now,
        id,
    ]
}
