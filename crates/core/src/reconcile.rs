//! Record assembly and create-vs-merge reconciliation.
//!
//! [`build_record`] fans the raw page fields out through the normalizers
//! into a [`ListingRecord`]. [`merge_missing`] applies the non-destructive
//! merge policy for listings that already exist: scraped values only fill
//! fields the stored record has empty, never overwrite ones a human may
//! have edited.

use tracing::debug;

use coralingest_extract::PageExtract;
use coralingest_normalize as normalize;
use coralingest_shared::{ListingRecord, RunConfig};

/// Attribute rows folded into the description when the page offers no
/// free-form text of its own.
const DESCRIPTION_KEYS: [&str; 7] = [
    "Bina Yaşı",
    "Bulunduğu Kat",
    "Kat Sayısı",
    "Isıtma",
    "Balkon",
    "Eşyalı",
    "Aidat",
];

/// Build a normalized listing record from one extracted page.
pub fn build_record(extract: &PageExtract, url: &str, config: &RunConfig) -> ListingRecord {
    let details = &extract.details;
    let mut record = ListingRecord {
        realtor_id: config.realtor_id,
        title: extract.title.clone().unwrap_or_default(),
        external_id: extract.external_id().map(str::to_string),
        original_url: Some(url.to_string()),
        ..ListingRecord::default()
    };

    record.price = extract
        .price_text
        .as_deref()
        .map(normalize::digits)
        .unwrap_or(0);

    if let Some(kind) = details.get("Emlak Tipi") {
        let (deal, property_type) = normalize::classify_deal(kind);
        record.deal_type = deal;
        record.property_type = property_type;
    }

    if let Some(rooms) = details.get("Oda Sayısı") {
        record.rooms_text = rooms.trim().to_string();
        record.bedrooms = normalize::bedrooms_from_rooms(rooms);
    }
    if let Some(baths) = details.get("Banyo Sayısı") {
        record.bathrooms = normalize::digits(baths);
    }

    if let Some(gross) = details.get("m² (Brüt)") {
        let value = normalize::digits(gross);
        record.m2_gross = (value > 0).then_some(value);
        record.sqft = normalize::sqft_from_m2(value);
    }
    if let Some(net) = details.get("m² (Net)") {
        let value = normalize::digits(net);
        record.m2_net = (value > 0).then_some(value);
    }

    record.ad_date = details
        .get("İlan Tarihi")
        .and_then(normalize::parse_listing_date);

    record.building_age = details
        .get("Bina Yaşı")
        .map(normalize::digits)
        .and_then(|v| (v > 0).then_some(v));
    record.floor_number = details
        .get("Bulunduğu Kat")
        .map(normalize::digits)
        .and_then(|v| (v > 0).then_some(v));
    record.floors_total = details
        .get("Kat Sayısı")
        .map(normalize::digits)
        .and_then(|v| (v > 0).then_some(v));
    record.heating = details.get("Isıtma").unwrap_or_default().to_string();
    record.kitchen_type = details
        .get_any(&["Mutfak", "Mutfak Tipi"])
        .unwrap_or_default()
        .to_string();
    record.balcony = details.get("Balkon").and_then(normalize::parse_yes_no);
    record.elevator = details.get("Asansör").and_then(normalize::parse_yes_no);
    record.parking_area = details.get("Otopark").unwrap_or_default().to_string();
    record.furnished = details.get("Eşyalı").and_then(normalize::parse_yes_no);
    record.usage_status = details
        .get("Kullanım Durumu")
        .unwrap_or_default()
        .to_string();
    record.in_complex = details
        .get("Site İçerisinde")
        .and_then(normalize::parse_yes_no);
    record.complex_name = details.get("Site Adı").unwrap_or_default().to_string();
    if let Some(fee) = details.get("Aidat") {
        let value = normalize::digits(fee);
        record.maintenance_fee = (value > 0).then_some(value);
    }
    if let Some(deposit) = details.get("Depozito") {
        let value = normalize::digits(deposit);
        record.deposit = (value > 0).then_some(value);
    }
    record.deed_status = details.get("Tapu Durumu").unwrap_or_default().to_string();
    record.from_whom = details.get("Kimden").unwrap_or_default().to_string();

    // Location: breadcrumbs first, configured fallbacks otherwise.
    match normalize::location_from_breadcrumbs(&extract.breadcrumbs) {
        Some((city, district, neighborhood)) => {
            record.city = city;
            record.state = district;
            record.address = neighborhood;
            record.zipcode = config.default_zipcode.clone();
        }
        None => {
            record.city = config.default_city.clone();
            record.state = config.default_state.clone();
            record.zipcode = config.default_zipcode.clone();
            record.address = config.default_address.clone();
        }
    }

    // Coordinates from the page's own map link beat any later geocoding.
    if let Some(href) = &extract.map_href {
        if let Some((lat, lon)) = normalize::coords_from_map_url(href) {
            record.latitude = Some(lat);
            record.longitude = Some(lon);
        }
    }

    // Description: a compact attribute summary standing in for the page's
    // free-form text, which renders behind further client-side calls.
    let summary: Vec<String> = DESCRIPTION_KEYS
        .iter()
        .filter_map(|key| details.get(key).map(|v| format!("{key}: {v}")))
        .collect();
    record.description = summary.join(" | ");

    record
}

/// Fill empty fields of a stored listing from a freshly scraped one.
///
/// Only gap-filling, never overwriting. Returns the names of the fields
/// that were filled, for logging.
pub fn merge_missing(existing: &mut ListingRecord, scraped: &ListingRecord) -> Vec<&'static str> {
    let mut filled = Vec::new();

    if existing.original_url.as_deref().unwrap_or("").is_empty() {
        if let Some(url) = &scraped.original_url {
            existing.original_url = Some(url.clone());
            filled.push("original_url");
        }
    }
    if existing.description.is_empty() && !scraped.description.is_empty() {
        existing.description = scraped.description.clone();
        filled.push("description");
    }
    if existing.property_type.is_empty() && !scraped.property_type.is_empty() {
        existing.property_type = scraped.property_type.clone();
        filled.push("property_type");
    }
    if existing.deal_type.is_none() && scraped.deal_type.is_some() {
        existing.deal_type = scraped.deal_type;
        filled.push("deal_type");
    }
    if existing.latitude.is_none() && existing.longitude.is_none() {
        if let (Some(lat), Some(lon)) = (scraped.latitude, scraped.longitude) {
            existing.latitude = Some(lat);
            existing.longitude = Some(lon);
            filled.push("coordinates");
        }
    }

    if !filled.is_empty() {
        debug!(?filled, external_id = ?existing.external_id, "merged missing fields");
    }
    filled
}
