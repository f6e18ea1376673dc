//! Core domain types for CoralIngest listings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoralIngestError;

// ---------------------------------------------------------------------------
// Turkish-aware folding
// ---------------------------------------------------------------------------

/// Lowercase a string and strip Turkish diacritics for tolerant comparisons.
///
/// `İlan No`, `ilan no` and `Ilan No` all fold to `ilan no`, so label lookups
/// and keyword checks survive the casing and diacritic variation seen across
/// rendered pages.
pub fn fold_turkish(text: &str) -> String {
    text.chars()
        .flat_map(|c| {
            let mapped = match c {
                'ç' | 'Ç' => 'c',
                'ğ' | 'Ğ' => 'g',
                'ı' | 'İ' => 'i',
                'ö' | 'Ö' => 'o',
                'ş' | 'Ş' => 's',
                'ü' | 'Ü' => 'u',
                other => other,
            };
            mapped.to_lowercase()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// DealType
// ---------------------------------------------------------------------------

/// Whether a listing is offered for rent or for sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealType {
    Rent,
    Sale,
}

impl DealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rent => "rent",
            Self::Sale => "sale",
        }
    }
}

impl std::fmt::Display for DealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DealType {
    type Err = CoralIngestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rent" => Ok(Self::Rent),
            "sale" => Ok(Self::Sale),
            other => Err(CoralIngestError::parse(format!(
                "unknown deal type: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// RawDetailBag
// ---------------------------------------------------------------------------

/// Label/value pairs lifted verbatim from a detail page's attribute list.
///
/// Lookups fold both sides with [`fold_turkish`], so callers ask for a
/// canonical label (`"İlan No"`) without caring how the page spelled it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDetailBag {
    entries: Vec<(String, String)>,
}

impl RawDetailBag {
    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.entries.push((label.into(), value.into()));
    }

    /// First value whose label folds to the same form as `label`.
    pub fn get(&self, label: &str) -> Option<&str> {
        let wanted = fold_turkish(label);
        self.entries
            .iter()
            .find(|(k, _)| fold_turkish(k) == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// First value matching any of the given labels, tried in order.
    pub fn get_any(&self, labels: &[&str]) -> Option<&str> {
        labels.iter().find_map(|label| self.get(label))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ListingRecord
// ---------------------------------------------------------------------------

/// A fully normalized listing, as stored in the `listings` table.
///
/// `id` is `None` until the record has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: Option<i64>,
    /// Owning realtor; every imported listing is assigned to one.
    pub realtor_id: i64,
    pub title: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: String,
    /// Price in whole currency units; 0 when the page yielded none.
    pub price: i64,
    pub bedrooms: i64,
    pub deal_type: Option<DealType>,
    pub property_type: String,
    pub bathrooms: i64,
    /// Derived from gross m² at 10.7639 sqft per m².
    pub sqft: i64,
    /// Source-site ad number; the primary identity key for reconciliation.
    pub external_id: Option<String>,
    pub ad_date: Option<NaiveDate>,
    pub original_url: Option<String>,
    pub m2_gross: Option<i64>,
    pub m2_net: Option<i64>,
    /// Room layout exactly as the page shows it, e.g. `3+1`.
    pub rooms_text: String,
    pub building_age: Option<i64>,
    pub floor_number: Option<i64>,
    pub floors_total: Option<i64>,
    pub heating: String,
    pub kitchen_type: String,
    pub balcony: Option<bool>,
    pub elevator: Option<bool>,
    pub parking_area: String,
    pub furnished: Option<bool>,
    pub usage_status: String,
    pub in_complex: Option<bool>,
    pub complex_name: String,
    pub maintenance_fee: Option<i64>,
    pub deposit: Option<i64>,
    pub deed_status: String,
    pub from_whom: String,
    pub is_published: bool,
    pub list_date: DateTime<Utc>,
}

impl Default for ListingRecord {
    fn default() -> Self {
        Self {
            id: None,
            realtor_id: 0,
            title: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            zipcode: String::new(),
            latitude: None,
            longitude: None,
            description: String::new(),
            price: 0,
            bedrooms: 0,
            deal_type: None,
            property_type: String::new(),
            bathrooms: 0,
            sqft: 0,
            external_id: None,
            ad_date: None,
            original_url: None,
            m2_gross: None,
            m2_net: None,
            rooms_text: String::new(),
            building_age: None,
            floor_number: None,
            floors_total: None,
            heating: String::new(),
            kitchen_type: String::new(),
            balcony: None,
            elevator: None,
            parking_area: String::new(),
            furnished: None,
            usage_status: String::new(),
            in_complex: None,
            complex_name: String::new(),
            maintenance_fee: None,
            deposit: None,
            deed_status: String::new(),
            from_whom: String::new(),
            is_published: true,
            list_date: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ListingImage
// ---------------------------------------------------------------------------

/// A photo attached to a listing, stored in the `listing_images` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingImage {
    pub id: i64,
    pub listing_id: i64,
    /// Path relative to the media root, e.g. `photos/listing_1234/listing_1234_0.jpg`.
    pub file_path: String,
    pub sort_order: i64,
    /// At most one image per listing carries this flag.
    pub is_primary: bool,
    pub is_visible: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_normalizes_turkish_labels() {
        assert_eq!(fold_turkish("İlan No"), "ilan no");
        assert_eq!(fold_turkish("Oda Sayısı"), "oda sayisi");
        assert_eq!(fold_turkish("KİRALIK DAİRE"), "kiralik daire");
        assert_eq!(fold_turkish("Ağustos"), "agustos");
    }

    #[test]
    fn bag_lookup_is_diacritic_insensitive() {
        let mut bag = RawDetailBag::default();
        bag.push("Ilan No", "1186156117");
        bag.push("Oda Sayısı", "3+1");

        assert_eq!(bag.get("İlan No"), Some("1186156117"));
        assert_eq!(bag.get("oda sayisi"), Some("3+1"));
        assert_eq!(bag.get("Banyo Sayısı"), None);
        assert_eq!(bag.get_any(&["Mutfak", "Oda Sayısı"]), Some("3+1"));
    }

    #[test]
    fn deal_type_roundtrip() {
        let dt: DealType = "rent".parse().expect("parse");
        assert_eq!(dt, DealType::Rent);
        assert_eq!(dt.to_string(), "rent");
        assert!("leasehold".parse::<DealType>().is_err());

        let json = serde_json::to_string(&DealType::Sale).expect("serialize");
        assert_eq!(json, "\"sale\"");
    }

    #[test]
    fn new_record_defaults_to_published() {
        let record = ListingRecord::default();
        assert!(record.is_published);
        assert!(record.id.is_none());
        assert_eq!(record.price, 0);
    }
}
