//! SQL migration definitions for the CoralIngest database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: listings, listing_images, import_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Normalized listings
CREATE TABLE IF NOT EXISTS listings (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    realtor_id      INTEGER NOT NULL,
    title           TEXT NOT NULL,
    address         TEXT NOT NULL DEFAULT '',
    city            TEXT NOT NULL DEFAULT '',
    state           TEXT NOT NULL DEFAULT '',
    zipcode         TEXT NOT NULL DEFAULT '',
    latitude        REAL,
    longitude       REAL,
    description     TEXT NOT NULL DEFAULT '',
    price           INTEGER NOT NULL DEFAULT 0,
    bedrooms        INTEGER NOT NULL DEFAULT 0,
    deal_type       TEXT,
    property_type   TEXT NOT NULL DEFAULT '',
    bathrooms       INTEGER NOT NULL DEFAULT 0,
    sqft            INTEGER NOT NULL DEFAULT 0,
    external_id     TEXT,
    ad_date         TEXT,
    original_url    TEXT,
    m2_gross        INTEGER,
    m2_net          INTEGER,
    rooms_text      TEXT NOT NULL DEFAULT '',
    building_age    INTEGER,
    floor_number    INTEGER,
    floors_total    INTEGER,
    heating         TEXT NOT NULL DEFAULT '',
    kitchen_type    TEXT NOT NULL DEFAULT '',
    balcony         INTEGER,
    elevator        INTEGER,
    parking_area    TEXT NOT NULL DEFAULT '',
    furnished       INTEGER,
    usage_status    TEXT NOT NULL DEFAULT '',
    in_complex      INTEGER,
    complex_name    TEXT NOT NULL DEFAULT '',
    maintenance_fee INTEGER,
    deposit         INTEGER,
    deed_status     TEXT NOT NULL DEFAULT '',
    from_whom       TEXT NOT NULL DEFAULT '',
    is_published    INTEGER NOT NULL DEFAULT 1,
    list_date       TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_external_id ON listings(external_id);
CREATE INDEX IF NOT EXISTS idx_listings_original_url ON listings(original_url);
CREATE INDEX IF NOT EXISTS idx_listings_realtor ON listings(realtor_id);

-- Photos attached to listings
CREATE TABLE IF NOT EXISTS listing_images (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    listing_id INTEGER NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
    file_path  TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_primary INTEGER NOT NULL DEFAULT 0,
    is_visible INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listing_images_listing ON listing_images(listing_id);

-- Import run history
CREATE TABLE IF NOT EXISTS import_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
