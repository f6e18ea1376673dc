//! Cookie ingestion from header strings and Netscape cookie files.

use coralingest_shared::{CoralIngestError, Result};

/// A cookie ready to be installed into the browser session.
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    /// Unix expiry timestamp; `None` for session cookies.
    pub expires: Option<i64>,
}

/// Parse a raw `Cookie:` header value (`name=value; name2=value2`).
///
/// Every cookie is attached to the given domain at path `/`. Fragments
/// without an `=` are skipped.
pub fn parse_cookie_string(raw: &str, domain: &str) -> Vec<Cookie> {
    raw.split(';')
        .filter_map(|fragment| {
            let fragment = fragment.trim();
            let (name, value) = fragment.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Cookie {
                name: name.to_string(),
                value: value.trim().to_string(),
                domain: domain.to_string(),
                path: "/".to_string(),
                secure: false,
                expires: None,
            })
        })
        .collect()
}

/// Parse Netscape `cookies.txt` content: seven tab-separated fields per line,
/// `#` comment lines and blank lines skipped.
///
/// Field order is `domain, include_subdomains, path, secure, expires, name,
/// value`. Short lines are skipped rather than treated as fatal.
pub fn parse_netscape_cookies(text: &str) -> Vec<Cookie> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                return None;
            }
            let expires: i64 = fields[4].trim().parse().unwrap_or(0);
            Some(Cookie {
                name: fields[5].trim().to_string(),
                value: fields[6].trim().to_string(),
                domain: fields[0].trim().to_string(),
                path: fields[2].trim().to_string(),
                secure: fields[3].trim().eq_ignore_ascii_case("true"),
                expires: (expires > 0).then_some(expires),
            })
        })
        .collect()
}

/// Read and parse a Netscape cookie file from disk.
pub fn load_cookie_file(path: &std::path::Path) -> Result<Vec<Cookie>> {
    let text =
        std::fs::read_to_string(path).map_err(|e| CoralIngestError::io(path, e))?;
    Ok(parse_netscape_cookies(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_string_parsing() {
        let cookies = parse_cookie_string(
            "st=abc123; vid=42; malformed; =empty",
            ".sahibinden.com",
        );
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "st");
        assert_eq!(cookies[0].value, "abc123");
        assert_eq!(cookies[0].domain, ".sahibinden.com");
        assert_eq!(cookies[0].path, "/");
        assert_eq!(cookies[1].name, "vid");
    }

    #[test]
    fn netscape_file_parsing() {
        let text = "\
# Netscape HTTP Cookie File
.sahibinden.com\tTRUE\t/\tTRUE\t1767225600\tst\tabc123

.sahibinden.com\tTRUE\t/\tFALSE\t0\tvid\t42
not-enough\tfields
";
        let cookies = parse_netscape_cookies(text);
        assert_eq!(cookies.len(), 2);

        assert_eq!(cookies[0].name, "st");
        assert_eq!(cookies[0].value, "abc123");
        assert!(cookies[0].secure);
        assert_eq!(cookies[0].expires, Some(1767225600));

        // Zero expiry means a session cookie.
        assert_eq!(cookies[1].expires, None);
        assert!(!cookies[1].secure);
    }
}
