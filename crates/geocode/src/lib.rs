//! Forward geocoding through Nominatim.
//!
//! Coordinates lifted from a listing's own map link always win; geocoding
//! only runs for records that arrive without them. Providers rate-limit
//! aggressively, so callers pace their requests.

use serde::Deserialize;
use tracing::{debug, instrument};

use coralingest_shared::{CoralIngestError, GeocodeConfig, Result};

/// One result row from the Nominatim search endpoint.
///
/// Nominatim serializes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Nominatim client.
pub struct Nominatim {
    client: reqwest::Client,
    base_url: String,
}

impl Nominatim {
    pub fn new(config: &GeocodeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CoralIngestError::Geocode(format!("client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Resolve a free-form address to coordinates.
    ///
    /// Returns `None` when the provider has no match. Transport and decode
    /// failures are errors; the caller decides whether they sink the record
    /// (they should not).
    #[instrument(skip(self))]
    pub async fn geocode(&self, address: &str) -> Result<Option<(f64, f64)>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| CoralIngestError::Geocode(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoralIngestError::Geocode(format!(
                "provider returned {status}"
            )));
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| CoralIngestError::Geocode(format!("bad response body: {e}")))?;

        let Some(place) = places.first() else {
            debug!(address, "no geocoding match");
            return Ok(None);
        };

        let lat: f64 = place
            .lat
            .parse()
            .map_err(|e| CoralIngestError::Geocode(format!("bad latitude: {e}")))?;
        let lon: f64 = place
            .lon
            .parse()
            .map_err(|e| CoralIngestError::Geocode(format!("bad longitude: {e}")))?;

        Ok(Some((lat, lon)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> GeocodeConfig {
        GeocodeConfig {
            base_url: format!("{}/search", server.uri()),
            user_agent: "coralingest-test/0".into(),
        }
    }

    #[tokio::test]
    async fn resolves_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Caferağa Mah., Kadıköy, İstanbul"))
            .and(query_param("format", "json"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"lat": "40.9901", "lon": "29.0301", "display_name": "Caferağa"}
            ])))
            .mount(&server)
            .await;

        let geocoder = Nominatim::new(&test_config(&server)).expect("build");
        let coords = geocoder
            .geocode("Caferağa Mah., Kadıköy, İstanbul")
            .await
            .expect("geocode");
        assert_eq!(coords, Some((40.9901, 29.0301)));
    }

    #[tokio::test]
    async fn empty_result_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let geocoder = Nominatim::new(&test_config(&server)).expect("build");
        let coords = geocoder.geocode("nowhere at all").await.expect("geocode");
        assert_eq!(coords, None);
    }

    #[tokio::test]
    async fn provider_error_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let geocoder = Nominatim::new(&test_config(&server)).expect("build");
        assert!(geocoder.geocode("İstanbul").await.is_err());
    }
}
