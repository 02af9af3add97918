//! City and address to coordinates, with call-rate limiting

use crate::error::{MatcherError, Result};
use crate::model::GeoPoint;
use crate::processing::normalizer::fold;
use crate::storage::JobStore;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the place is unknown.
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>>;
}

/// Offline lookup of Swedish municipalities, keyed by folded name.
pub struct CityTableGeocoder {
    cities: HashMap<String, GeoPoint>,
}

impl Default for CityTableGeocoder {
    fn default() -> Self {
        Self::new(&[
            ("Stockholm", 59.3293, 18.0686),
            ("Göteborg", 57.7089, 11.9746),
            ("Malmö", 55.60498, 13.00382),
            ("Uppsala", 59.8586, 17.6389),
            ("Bålsta", 59.5692, 17.5277),
            ("Solna", 59.3600, 18.0009),
            ("Sundbyberg", 59.3600, 17.9711),
            ("Täby", 59.4439, 18.0687),
            ("Nacka", 59.3105, 18.1637),
            ("Södertälje", 59.1955, 17.6253),
            ("Västerås", 59.6099, 16.5448),
            ("Örebro", 59.2753, 15.2134),
            ("Linköping", 58.4108, 15.6214),
            ("Helsingborg", 56.0465, 12.6945),
            ("Jönköping", 57.7826, 14.1618),
            ("Norrköping", 58.5877, 16.1924),
            ("Lund", 55.7047, 13.1910),
            ("Umeå", 63.8258, 20.2630),
            ("Gävle", 60.6749, 17.1413),
            ("Sundsvall", 62.3908, 17.3069),
            ("Luleå", 65.5848, 22.1547),
        ])
    }
}

impl CityTableGeocoder {
    pub fn new(entries: &[(&str, f64, f64)]) -> Self {
        Self {
            cities: entries
                .iter()
                .map(|(name, lat, lon)| (fold(name.trim()), GeoPoint::new(*lat, *lon)))
                .collect(),
        }
    }

    pub fn lookup(&self, city: &str) -> Option<GeoPoint> {
        let key = fold(city.trim());
        if let Some(point) = self.cities.get(&key) {
            return Some(*point);
        }
        // "Solna kommun", "Stockholms stad"
        let first = key.split([' ', ',']).next()?;
        self.cities
            .get(first)
            .or_else(|| self.cities.get(first.trim_end_matches('s')))
            .copied()
    }
}

#[async_trait]
impl Geocoder for CityTableGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>> {
        Ok(self.lookup(query))
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// OpenStreetMap Nominatim search. Wrap in [`RateLimitedGeocoder`].
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("job-matcher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MatcherError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("limit", "1"), ("countrycodes", "se")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatcherError::provider(
                format!("Geocoder returned {}", status),
                status.is_server_error() || status.as_u16() == 429,
            ));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        Ok(places.first().and_then(|p| {
            let lat = p.lat.parse().ok()?;
            let lon = p.lon.parse().ok()?;
            Some(GeoPoint::new(lat, lon))
        }))
    }
}

/// Serialises calls and spaces them at least `min_interval` apart.
pub struct RateLimitedGeocoder<G> {
    inner: G,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<G: Geocoder> RateLimitedGeocoder<G> {
    pub fn new(inner: G, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval: min_interval.max(Duration::from_secs(1)),
            last_call: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for RateLimitedGeocoder<G> {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>> {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        let result = self.inner.geocode(query).await;
        *last_call = Some(Instant::now());
        result
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct GeocodeReport {
    pub resolved: usize,
    pub unresolved: usize,
    pub failed: usize,
}

/// Fill coordinates for stored jobs that have a city but no location.
pub async fn geocode_missing(store: &dyn JobStore, geocoder: &dyn Geocoder) -> Result<GeocodeReport> {
    let mut report = GeocodeReport::default();

    for id in store.job_ids().await? {
        let Some(job) = store.get_job(&id).await? else {
            continue;
        };
        if job.location.is_some() {
            continue;
        }
        let Some(city) = job.city.clone().filter(|c| !c.trim().is_empty()) else {
            continue;
        };

        match geocoder.geocode(&city).await {
            Ok(Some(point)) => {
                debug!("Geocoded job {} ({}) to {:?}", id, city, point);
                store.set_location(&id, point).await?;
                report.resolved += 1;
            }
            Ok(None) => report.unresolved += 1,
            Err(e) => {
                warn!("Geocoding failed for job {} ({}): {}", id, city, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Geocoding done: {} resolved, {} unknown, {} failed",
        report.resolved, report.unresolved, report.failed
    );
    Ok(report)
}
