//! Photo downloads over plain HTTP.
//!
//! The image host does not require a browser, but it does check the
//! referer and session cookies, so the fetcher carries both from the
//! page visit that produced the gallery URLs.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use coralingest_shared::{CoralIngestError, Result};

/// User agent sent on photo requests; matches the browser session.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Downloads gallery photos for one listing.
pub struct ImageFetcher {
    client: reqwest::Client,
    referer: String,
    cookie_header: Option<String>,
}

impl ImageFetcher {
    /// Build a fetcher carrying the visiting page's referer and cookies.
    pub fn new(referer: &str, cookie_header: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CoralIngestError::Network(format!("image client build failed: {e}")))?;

        Ok(Self {
            client,
            referer: referer.to_string(),
            cookie_header,
        })
    }

    /// Fetch one photo, returning its bytes. Non-2xx responses and empty
    /// bodies are errors.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "image/avif,image/webp,image/*,*/*;q=0.8")
            .header("Referer", &self.referer);
        if let Some(cookies) = &self.cookie_header {
            request = request.header("Cookie", cookies);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoralIngestError::Network(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoralIngestError::Network(format!(
                "GET {url} returned {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoralIngestError::Network(format!("body read for {url} failed: {e}")))?;

        if bytes.is_empty() {
            return Err(CoralIngestError::Network(format!("GET {url} returned an empty body")));
        }

        Ok(bytes.to_vec())
    }

    /// Download every candidate, skipping failures with a warning.
    ///
    /// Returns `(file_name, bytes)` pairs named `listing_<key>_<index>.jpg`,
    /// indexed by position in the candidate list.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn download_all(&self, urls: &[String], key: &str) -> Vec<(String, Vec<u8>)> {
        let mut downloads = Vec::new();
        for (index, url) in urls.iter().enumerate() {
            match self.fetch(url).await {
                Ok(bytes) => {
                    debug!(url, size = bytes.len(), "photo downloaded");
                    downloads.push((format!("listing_{key}_{index}.jpg"), bytes));
                }
                Err(e) => warn!(url, %e, "photo download failed, skipping"),
            }
        }
        downloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn failed_downloads_are_skipped() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p/1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/p/2.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(
            "https://www.sahibinden.com/ilan/123",
            None,
            Duration::from_secs(5),
        )
        .expect("build fetcher");

        let urls = vec![
            format!("{}/p/1.jpg", server.uri()),
            format!("{}/p/2.jpg", server.uri()),
        ];
        let downloads = fetcher.download_all(&urls, "123").await;

        assert_eq!(downloads.len(), 1);
        assert_eq!(downloads[0].0, "listing_123_0.jpg");
        assert_eq!(downloads[0].1, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn referer_and_cookies_are_sent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p/1.jpg"))
            .and(header("Referer", "https://www.sahibinden.com/ilan/123"))
            .and(header("Cookie", "st=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(
            "https://www.sahibinden.com/ilan/123",
            Some("st=abc123".to_string()),
            Duration::from_secs(5),
        )
        .expect("build fetcher");

        let bytes = fetcher
            .fetch(&format!("{}/p/1.jpg", server.uri()))
            .await
            .expect("fetch");
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p/empty.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::<u8>::new()))
            .mount(&server)
            .await;

        let fetcher =
            ImageFetcher::new("https://example.com/", None, Duration::from_secs(5)).expect("build");
        let result = fetcher.fetch(&format!("{}/p/empty.jpg", server.uri())).await;
        assert!(result.is_err());
    }
}
