//! Field extraction from rendered listing markup.
//!
//! Extraction is pure: it takes the serialized document produced by a
//! browser visit and lifts out raw text fields, touching no I/O. Whether
//! the page is actually usable is judged separately by [`detect`].

pub mod detect;

use scraper::{Html, Selector};

use coralingest_shared::RawDetailBag;

pub use detect::{PageVerdict, SuspectReason, judge_page};

/// Raw fields lifted from one listing page, before normalization.
#[derive(Debug, Clone, Default)]
pub struct PageExtract {
    /// Listing headline, if any heading rendered.
    pub title: Option<String>,
    /// Price text as displayed, grouping dots and currency included.
    pub price_text: Option<String>,
    /// Label/value attribute rows from the detail list.
    pub details: RawDetailBag,
    /// Href of the map directions link, if present.
    pub map_href: Option<String>,
    /// Location breadcrumb texts, outermost first.
    pub breadcrumbs: Vec<String>,
}

impl PageExtract {
    /// Source-site ad number, the identity key for reconciliation.
    pub fn external_id(&self) -> Option<&str> {
        self.details.get("İlan No").map(str::trim)
    }
}

fn selector(css: &str) -> Selector {
    // Selectors here are compile-time constants; a parse failure is a bug.
    Selector::parse(css).unwrap()
}

fn element_text(el: scraper::ElementRef<'_>) -> String {
    let joined: String = el.text().collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    doc.select(&selector(css))
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Lift raw fields out of a rendered listing document.
pub fn extract_listing_page(html: &str) -> PageExtract {
    let doc = Html::parse_document(html);

    // Headline: detail pane first, then any h1, then the document title.
    let title = first_text(&doc, "div.classifiedDetailTitle h1")
        .or_else(|| first_text(&doc, "h1"))
        .or_else(|| first_text(&doc, "head title"));

    let price_text = first_text(&doc, "div.classifiedInfo .classified-price-wrapper")
        .or_else(|| first_text(&doc, "div.classifiedInfo h3"));

    let mut details = RawDetailBag::default();
    let label_sel = selector("strong");
    let value_sel = selector("span");
    for row in doc.select(&selector("ul.classifiedInfoList > li")) {
        let label = row.select(&label_sel).next().map(element_text);
        let value = row.select(&value_sel).next().map(element_text);
        if let (Some(label), Some(value)) = (label, value) {
            if !label.is_empty() {
                details.push(label, value);
            }
        }
    }

    let map_href = doc
        .select(&selector("div.getDirectionsButton a"))
        .find_map(|a| a.value().attr("href"))
        .map(str::to_string);

    let breadcrumbs = doc
        .select(&selector("a[data-click-label^='Adres Breadcrumb']"))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();

    PageExtract {
        title,
        price_text,
        details,
        map_href,
        breadcrumbs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_HTML: &str = r#"
<html>
<head><title>Satılık Daire - sahibinden.com</title></head>
<body>
  <div class="classifiedDetailTitle"><h1>  Kadıköy'de   Satılık 3+1 Daire </h1></div>
  <div class="classifiedInfo">
    <div class="classified-price-wrapper"> 2.450.000 TL </div>
    <ul class="classifiedInfoList">
      <li><strong>İlan No</strong><span> 1186156117 </span></li>
      <li><strong>İlan Tarihi</strong><span>21 Ağustos 2025</span></li>
      <li><strong>Emlak Tipi</strong><span>Satılık Daire</span></li>
      <li><strong>m² (Brüt)</strong><span>145</span></li>
      <li><strong>m² (Net)</strong><span>120</span></li>
      <li><strong>Oda Sayısı</strong><span>3+1</span></li>
      <li><strong>Balkon</strong><span>Var</span></li>
      <li><strong>no-value-row</strong></li>
    </ul>
  </div>
  <div class="getDirectionsButton">
    <a href="https://maps.example.com/?q=40.9901,29.0301">Yol Tarifi Al</a>
  </div>
  <a data-click-label="Adres Breadcrumb - 1">İstanbul</a>
  <a data-click-label="Adres Breadcrumb - 2">Kadıköy</a>
  <a data-click-label="Adres Breadcrumb - 3">Caferağa Mah.</a>
</body>
</html>"#;

    #[test]
    fn full_page_extraction() {
        let extract = extract_listing_page(LISTING_HTML);

        assert_eq!(
            extract.title.as_deref(),
            Some("Kadıköy'de Satılık 3+1 Daire")
        );
        assert_eq!(extract.price_text.as_deref(), Some("2.450.000 TL"));
        assert_eq!(extract.external_id(), Some("1186156117"));
        assert_eq!(extract.details.get("Oda Sayısı"), Some("3+1"));
        assert_eq!(extract.details.get("Balkon"), Some("Var"));
        // Rows without both label and value are dropped.
        assert_eq!(extract.details.get("no-value-row"), None);
        assert_eq!(
            extract.map_href.as_deref(),
            Some("https://maps.example.com/?q=40.9901,29.0301")
        );
        assert_eq!(
            extract.breadcrumbs,
            vec!["İstanbul", "Kadıköy", "Caferağa Mah."]
        );
    }

    #[test]
    fn title_falls_back_to_document_title() {
        let html = "<html><head><title>Fallback Title</title></head><body><p>shell</p></body></html>";
        let extract = extract_listing_page(html);
        assert_eq!(extract.title.as_deref(), Some("Fallback Title"));
        assert!(extract.details.is_empty());
        assert!(extract.breadcrumbs.is_empty());
        assert_eq!(extract.external_id(), None);
    }
}
