//! Default and user-supplied HTTP headers for browser sessions.

/// Desktop Chrome user agent presented on every page visit.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Accept-Language advertised to the site (Turkish first).
pub const ACCEPT_LANGUAGE: &str = "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7";

/// Headers installed on every visit unless overridden by the user.
pub fn default_headers() -> Vec<(String, String)> {
    vec![
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
        ),
        ("Accept-Language".to_string(), ACCEPT_LANGUAGE.to_string()),
        (
            "Referer".to_string(),
            "https://www.sahibinden.com/".to_string(),
        ),
        ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
    ]
}

/// Parse a `Name: Value` CLI header flag. Returns `None` for malformed input.
pub fn parse_header_flag(raw: &str) -> Option<(String, String)> {
    let (name, value) = raw.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Merge user headers over the defaults; names compare case-insensitively.
pub fn merge_headers(user: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged = default_headers();
    for (name, value) in user {
        match merged
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.clone(),
            None => merged.push((name.clone(), value.clone())),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_flag_parsing() {
        assert_eq!(
            parse_header_flag("X-Requested-With: XMLHttpRequest"),
            Some(("X-Requested-With".to_string(), "XMLHttpRequest".to_string()))
        );
        assert_eq!(parse_header_flag("no-colon-here"), None);
        assert_eq!(parse_header_flag(": value-only"), None);
    }

    #[test]
    fn user_headers_override_defaults_case_insensitively() {
        let user = vec![
            ("referer".to_string(), "https://example.com/".to_string()),
            ("X-Custom".to_string(), "1".to_string()),
        ];
        let merged = merge_headers(&user);

        let referer = merged
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("referer"))
            .map(|(_, v)| v.as_str());
        assert_eq!(referer, Some("https://example.com/"));
        assert!(merged.iter().any(|(n, _)| n == "X-Custom"));
        // Override replaced in place, no duplicates.
        assert_eq!(
            merged
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case("referer"))
                .count(),
            1
        );
    }
}
