//! Suspect-page detection.
//!
//! Anti-bot walls and expired ads render a page that navigates fine but
//! carries no listing. Such pages must never be persisted; the pipeline
//! retries them after a cooldown and skips for good if they stay suspect.

use coralingest_shared::fold_turkish;

use crate::PageExtract;

/// Why a rendered page was judged unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspectReason {
    /// No ad number rendered; identity cannot be established.
    MissingExternalId,
    /// No heading of any kind rendered.
    MissingTitle,
    /// The heading is just the site hostname, the anti-bot wall signature.
    HostnameTitle,
}

impl std::fmt::Display for SuspectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::MissingExternalId => "no ad number on page",
            Self::MissingTitle => "no title on page",
            Self::HostnameTitle => "title is the bare site hostname",
        };
        f.write_str(msg)
    }
}

/// Outcome of judging one rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    Valid,
    Suspect(SuspectReason),
}

/// Judge whether a rendered page carries a real listing.
pub fn judge_page(extract: &PageExtract, host: &str) -> PageVerdict {
    let title = match &extract.title {
        Some(t) if !t.trim().is_empty() => t.trim(),
        _ => return PageVerdict::Suspect(SuspectReason::MissingTitle),
    };

    if fold_turkish(title) == fold_turkish(host) {
        return PageVerdict::Suspect(SuspectReason::HostnameTitle);
    }

    match extract.external_id() {
        Some(id) if !id.is_empty() => PageVerdict::Valid,
        _ => PageVerdict::Suspect(SuspectReason::MissingExternalId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coralingest_shared::RawDetailBag;

    fn extract_with(title: Option<&str>, external_id: Option<&str>) -> PageExtract {
        let mut details = RawDetailBag::default();
        if let Some(id) = external_id {
            details.push("İlan No", id);
        }
        PageExtract {
            title: title.map(str::to_string),
            details,
            ..PageExtract::default()
        }
    }

    #[test]
    fn complete_page_is_valid() {
        let extract = extract_with(Some("Satılık 3+1 Daire"), Some("1186156117"));
        assert_eq!(
            judge_page(&extract, "www.sahibinden.com"),
            PageVerdict::Valid
        );
    }

    #[test]
    fn hostname_title_is_suspect() {
        let extract = extract_with(Some("www.sahibinden.com"), Some("1186156117"));
        assert_eq!(
            judge_page(&extract, "www.sahibinden.com"),
            PageVerdict::Suspect(SuspectReason::HostnameTitle)
        );
    }

    #[test]
    fn missing_title_is_suspect() {
        let extract = extract_with(None, Some("1186156117"));
        assert_eq!(
            judge_page(&extract, "www.sahibinden.com"),
            PageVerdict::Suspect(SuspectReason::MissingTitle)
        );

        let extract = extract_with(Some("   "), Some("1186156117"));
        assert_eq!(
            judge_page(&extract, "www.sahibinden.com"),
            PageVerdict::Suspect(SuspectReason::MissingTitle)
        );
    }

    #[test]
    fn missing_ad_number_is_suspect() {
        let extract = extract_with(Some("Satılık 3+1 Daire"), None);
        assert_eq!(
            judge_page(&extract, "www.sahibinden.com"),
            PageVerdict::Suspect(SuspectReason::MissingExternalId)
        );
    }
}
