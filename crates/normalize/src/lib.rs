//! Total normalizers turning raw page text into typed listing fields.
//!
//! Every function here accepts arbitrary input and returns a value rather
//! than an error: unparseable text maps to a zero, an empty string, or
//! `None`. A single garbled field must never sink a whole page.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use coralingest_shared::{DealType, fold_turkish};

/// Turkish month names, folded. Index + 1 is the month number.
const MONTHS_TR: [&str; 12] = [
    "ocak", "subat", "mart", "nisan", "mayis", "haziran", "temmuz", "agustos", "eylul", "ekim",
    "kasim", "aralik",
];

fn leading_rooms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)\s*\+").unwrap())
}

fn coords_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(-?\d+\.\d+),(-?\d+\.\d+)").unwrap())
}

fn coords_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&](?:q|ll)=(-?\d+\.\d+),(-?\d+\.\d+)").unwrap())
}

/// Concatenate every digit run in `text` and parse the result.
///
/// `"2.450.000 TL"` → 2450000, `"1.250"` → 1250. Returns 0 when no digits
/// survive or the digits overflow an `i64`.
pub fn digits(text: &str) -> i64 {
    let joined: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    joined.parse().unwrap_or(0)
}

/// Bedroom count from a Turkish room layout such as `3+1`.
///
/// The figure before the `+` wins; otherwise all digits collapse together
/// (`"Stüdyo (1+0)"` → 10 is accepted noise, matching the lenient rule for
/// free-form layouts).
pub fn bedrooms_from_rooms(value: &str) -> i64 {
    if let Some(caps) = leading_rooms_re().captures(value) {
        if let Ok(n) = caps[1].parse() {
            return n;
        }
    }
    digits(value)
}

/// Classify a combined deal/property phrase like `"Kiralık Daire"`.
///
/// Returns the deal kind when a rent/sale keyword is present, plus the
/// remaining words as the property type. Unrecognized phrases keep the whole
/// trimmed text as the property type with no deal kind.
pub fn classify_deal(text: &str) -> (Option<DealType>, String) {
    let trimmed = text.trim();
    let folded = fold_turkish(trimmed);

    let deal = if folded.contains("kiralik") {
        Some(DealType::Rent)
    } else if folded.contains("satilik") {
        Some(DealType::Sale)
    } else {
        None
    };

    let mut words = trimmed.split_whitespace();
    let property_type = match (deal, words.next()) {
        (Some(_), Some(_)) => {
            let rest: Vec<&str> = words.collect();
            if rest.is_empty() {
                trimmed.to_string()
            } else {
                rest.join(" ")
            }
        }
        _ => trimmed.to_string(),
    };

    (deal, property_type)
}

/// Tri-state yes/no from Turkish or English boolean text.
pub fn parse_yes_no(value: &str) -> Option<bool> {
    match fold_turkish(value.trim()).as_str() {
        "evet" | "var" | "yes" | "available" => Some(true),
        "hayir" | "yok" | "no" | "not available" => Some(false),
        _ => None,
    }
}

/// Parse a Turkish long date such as `"21 Ağustos 2025"`.
///
/// Needs at least day, month name, and year tokens; anything else is `None`.
pub fn parse_listing_date(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }

    let day = digits(parts[0]);
    if day == 0 {
        return None;
    }

    let folded_month = fold_turkish(parts[1]);
    let month = MONTHS_TR
        .iter()
        .position(|m| *m == folded_month)
        .map(|i| i as u32 + 1)?;

    let year = digits(parts[2]);
    NaiveDate::from_ymd_opt(year as i32, month, day as u32)
}

/// Square feet from gross m², rounded. Non-positive input yields 0.
pub fn sqft_from_m2(m2: i64) -> i64 {
    if m2 <= 0 {
        return 0;
    }
    (m2 as f64 * 10.7639).round() as i64
}

/// Pull a coordinate pair out of a map-provider URL.
///
/// Tries the path form (`/41.0082,28.9784`) first, then the query form
/// (`?q=` or `&ll=`).
pub fn coords_from_map_url(url: &str) -> Option<(f64, f64)> {
    let caps = coords_path_re()
        .captures(url)
        .or_else(|| coords_query_re().captures(url))?;

    let lat: f64 = caps[1].parse().ok()?;
    let lon: f64 = caps[2].parse().ok()?;
    Some((lat, lon))
}

/// City, district, and neighborhood from location breadcrumb texts.
///
/// City and district come from the first two crumbs, the neighborhood from
/// the last one. Needs at least three non-empty crumbs; otherwise the caller
/// falls back to its configured defaults.
pub fn location_from_breadcrumbs(crumbs: &[String]) -> Option<(String, String, String)> {
    let parts: Vec<&str> = crumbs
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    if parts.len() < 3 {
        return None;
    }

    Some((
        parts[0].to_string(),
        parts[1].to_string(),
        parts[parts.len() - 1].to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_strips_grouping_and_units() {
        assert_eq!(digits("2.450.000 TL"), 2_450_000);
        assert_eq!(digits("1.250"), 1_250);
        assert_eq!(digits("m² yok"), 0);
        assert_eq!(digits(""), 0);
    }

    #[test]
    fn bedrooms_prefer_figure_before_plus() {
        assert_eq!(bedrooms_from_rooms("3+1"), 3);
        assert_eq!(bedrooms_from_rooms(" 4 + 2 "), 4);
        assert_eq!(bedrooms_from_rooms("Stüdyo"), 0);
        // No leading figure, so all digits collapse together.
        assert_eq!(bedrooms_from_rooms("Stüdyo (1+0)"), 10);
    }

    #[test]
    fn deal_classification() {
        let (deal, ptype) = classify_deal("Kiralık Daire");
        assert_eq!(deal, Some(DealType::Rent));
        assert_eq!(ptype, "Daire");

        let (deal, ptype) = classify_deal("Satılık Müstakil Ev");
        assert_eq!(deal, Some(DealType::Sale));
        assert_eq!(ptype, "Müstakil Ev");

        // Folded keyword match still works on ascii spellings.
        let (deal, _) = classify_deal("kiralik daire");
        assert_eq!(deal, Some(DealType::Rent));

        let (deal, ptype) = classify_deal("  Devremülk  ");
        assert_eq!(deal, None);
        assert_eq!(ptype, "Devremülk");
    }

    #[test]
    fn yes_no_tri_state() {
        assert_eq!(parse_yes_no("Evet"), Some(true));
        assert_eq!(parse_yes_no("Var"), Some(true));
        assert_eq!(parse_yes_no("Hayır"), Some(false));
        assert_eq!(parse_yes_no("hayir"), Some(false));
        assert_eq!(parse_yes_no("Yok"), Some(false));
        assert_eq!(parse_yes_no("Belirtilmemiş"), None);
        assert_eq!(parse_yes_no(""), None);
    }

    #[test]
    fn turkish_dates_parse() {
        assert_eq!(
            parse_listing_date("21 Ağustos 2025"),
            NaiveDate::from_ymd_opt(2025, 8, 21)
        );
        // Ascii month spelling folds to the same key.
        assert_eq!(
            parse_listing_date("3 Subat 2024"),
            NaiveDate::from_ymd_opt(2024, 2, 3)
        );
        assert_eq!(parse_listing_date("Ağustos 2025"), None);
        assert_eq!(parse_listing_date("32 Ocak 2025"), None);
        assert_eq!(parse_listing_date("21 Augusto 2025"), None);
    }

    #[test]
    fn sqft_conversion_rounds() {
        assert_eq!(sqft_from_m2(100), 1_076);
        assert_eq!(sqft_from_m2(1), 11);
        assert_eq!(sqft_from_m2(0), 0);
        assert_eq!(sqft_from_m2(-5), 0);
    }

    #[test]
    fn coords_from_path_and_query_urls() {
        assert_eq!(
            coords_from_map_url("https://maps.example.com/@/41.0082,28.9784,15z"),
            Some((41.0082, 28.9784))
        );
        assert_eq!(
            coords_from_map_url("https://maps.example.com/?q=36.8969,30.7133"),
            Some((36.8969, 30.7133))
        );
        assert_eq!(
            coords_from_map_url("https://maps.example.com/dir?ll=-33.8688,151.2093"),
            Some((-33.8688, 151.2093))
        );
        assert_eq!(coords_from_map_url("https://maps.example.com/place/Kadikoy"), None);
    }

    #[test]
    fn breadcrumbs_need_three_crumbs() {
        let crumbs = vec![
            "İstanbul".to_string(),
            " Kadıköy ".to_string(),
            "Moda Mah.".to_string(),
        ];
        assert_eq!(
            location_from_breadcrumbs(&crumbs),
            Some((
                "İstanbul".to_string(),
                "Kadıköy".to_string(),
                "Moda Mah.".to_string()
            ))
        );

        let short = vec!["İstanbul".to_string(), "".to_string(), "  ".to_string()];
        assert_eq!(location_from_breadcrumbs(&short), None);
    }

    #[test]
    fn breadcrumbs_take_last_crumb_as_neighborhood() {
        let crumbs = vec![
            "İstanbul".to_string(),
            "Kadıköy".to_string(),
            "Caferağa".to_string(),
            "Moda Mah.".to_string(),
        ];
        assert_eq!(
            location_from_breadcrumbs(&crumbs),
            Some((
                "İstanbul".to_string(),
                "Kadıköy".to_string(),
                "Moda Mah.".to_string()
            ))
        );
    }
}
