//! Listing URL source files.
//!
//! Two shapes are accepted: a plain text file with one URL per line, and a
//! minimal CSV whose header names a `url` column. Blank lines and `#`
//! comments are skipped in both.

use std::path::Path;

use tracing::debug;

use coralingest_shared::{CoralIngestError, Result};

/// Read listing URLs from a source file.
///
/// An unreadable file is an error; a readable file with no URLs yields an
/// empty list and the caller decides what that means.
pub fn read_urls(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| CoralIngestError::io(path, e))?;

    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let Some(first) = lines.next() else {
        return Ok(Vec::new());
    };

    let mut urls = Vec::new();

    // A header row containing a `url` column switches on CSV mode.
    let header_fields: Vec<String> = first
        .split(',')
        .map(|f| f.trim().to_ascii_lowercase())
        .collect();
    if let Some(url_column) = header_fields.iter().position(|f| f == "url") {
        debug!(?path, url_column, "url source detected as csv");
        for line in lines {
            if let Some(field) = line.split(',').nth(url_column) {
                let field = field.trim();
                if !field.is_empty() {
                    urls.push(field.to_string());
                }
            }
        }
        return Ok(urls);
    }

    // Plain mode: the whole trimmed line is the URL, first field if commas
    // sneak in.
    for line in std::iter::once(first).chain(lines) {
        if let Some(field) = line.split(',').next() {
            let field = field.trim();
            if !field.is_empty() {
                urls.push(field.to_string());
            }
        }
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn write_temp(content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("ci_urls_{}.txt", Uuid::now_v7()));
        std::fs::write(&path, content).expect("write temp file");
        path
    }

    #[test]
    fn plain_lines_with_comments() {
        let path = write_temp(
            "# seed list\n\
             https://www.sahibinden.com/ilan/1\n\
             \n\
             https://www.sahibinden.com/ilan/2\n",
        );
        let urls = read_urls(&path).expect("read");
        assert_eq!(
            urls,
            vec![
                "https://www.sahibinden.com/ilan/1",
                "https://www.sahibinden.com/ilan/2"
            ]
        );
    }

    #[test]
    fn csv_with_url_column() {
        let path = write_temp(
            "id,URL,notes\n\
             1,https://www.sahibinden.com/ilan/1,fresh\n\
             2,https://www.sahibinden.com/ilan/2,\n\
             3,,missing\n",
        );
        let urls = read_urls(&path).expect("read");
        assert_eq!(
            urls,
            vec![
                "https://www.sahibinden.com/ilan/1",
                "https://www.sahibinden.com/ilan/2"
            ]
        );
    }

    #[test]
    fn empty_file_is_not_an_error() {
        let path = write_temp("# nothing but comments\n\n");
        assert!(read_urls(&path).expect("read").is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("ci_urls_definitely_missing.txt");
        assert!(read_urls(&path).is_err());
    }
}
