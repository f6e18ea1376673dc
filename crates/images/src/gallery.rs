//! Gallery photo URL collection from rendered listing markup.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

fn avif_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.avif(\?.*)?$").unwrap())
}

/// Filter and rewrite one raw gallery candidate URL.
///
/// Data URIs, placeholder images, and non-absolute URLs are dropped. An
/// `.avif` suffix is rewritten to `.jpg`, which the image host serves for
/// the same path.
pub fn normalize_candidate(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") || raw.contains("blank") {
        return None;
    }
    if !raw.starts_with("http") {
        return None;
    }
    Some(avif_suffix_re().replace(raw, ".jpg").into_owned())
}

/// Collect gallery photo URLs from a rendered listing document.
///
/// Pulls `data-src`/`src` from gallery `img` tags and every `srcset` entry
/// from gallery `source` tags, normalizes each candidate, deduplicates
/// preserving first-seen order, and caps the result at `max` (0 = no cap).
pub fn collect_gallery_urls(html: &str, max: usize) -> Vec<String> {
    let doc = Html::parse_document(html);
    let img_sel = Selector::parse("div.classifiedDetailPhotos img").unwrap();
    let source_sel = Selector::parse("div.classifiedDetailPhotos source").unwrap();

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let mut push = |candidate: &str| {
        if let Some(url) = normalize_candidate(candidate) {
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    };

    for img in doc.select(&img_sel) {
        if let Some(src) = img.value().attr("data-src").or_else(|| img.value().attr("src")) {
            push(src);
        }
    }

    for source in doc.select(&source_sel) {
        if let Some(srcset) = source.value().attr("srcset") {
            // srcset entries are comma-separated, each "url [descriptor]".
            for entry in srcset.split(',') {
                if let Some(url) = entry.trim().split_whitespace().next() {
                    push(url);
                }
            }
        }
    }

    if max > 0 {
        urls.truncate(max);
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_filtering_and_avif_rewrite() {
        assert_eq!(
            normalize_candidate("https://img.example.com/p/123_1.avif"),
            Some("https://img.example.com/p/123_1.jpg".to_string())
        );
        assert_eq!(
            normalize_candidate("https://img.example.com/p/123_1.avif?v=2"),
            Some("https://img.example.com/p/123_1.jpg".to_string())
        );
        assert_eq!(
            normalize_candidate("https://img.example.com/p/123_1.jpg"),
            Some("https://img.example.com/p/123_1.jpg".to_string())
        );
        assert_eq!(normalize_candidate("data:image/gif;base64,R0lGOD"), None);
        assert_eq!(normalize_candidate("https://img.example.com/blank.png"), None);
        assert_eq!(normalize_candidate("/relative/p/123_1.jpg"), None);
        assert_eq!(normalize_candidate("  "), None);
    }

    #[test]
    fn gallery_collection_dedupes_and_caps() {
        let html = r#"
<div class="classifiedDetailPhotos">
  <img data-src="https://img.example.com/p/1.avif" src="data:image/gif;base64,xx">
  <img src="https://img.example.com/p/2.jpg">
  <img src="https://img.example.com/p/1.jpg">
  <picture>
    <source srcset="https://img.example.com/p/3.avif 1x, https://img.example.com/p/4.jpg 2x">
  </picture>
</div>
<img src="https://img.example.com/outside-gallery.jpg">
"#;
        let urls = collect_gallery_urls(html, 0);
        assert_eq!(
            urls,
            vec![
                "https://img.example.com/p/1.jpg",
                "https://img.example.com/p/2.jpg",
                "https://img.example.com/p/3.jpg",
                "https://img.example.com/p/4.jpg",
            ]
        );

        let capped = collect_gallery_urls(html, 2);
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0], "https://img.example.com/p/1.jpg");
    }
}
