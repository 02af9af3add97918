//! Idempotent ingestion of job feed pages

use crate::error::{MatcherError, Result};
use crate::model::{GeoPoint, JobPosting};
use crate::storage::JobStore;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub text_changed: usize,
    pub unchanged: usize,
    pub expired: usize,
    pub deactivated: usize,
}

pub struct FeedIngestor<'a> {
    store: &'a dyn JobStore,
    /// Refuse to deactivate when the feed reports fewer live ids than this.
    min_active_ids: usize,
}

impl<'a> FeedIngestor<'a> {
    pub fn new(store: &'a dyn JobStore, min_active_ids: usize) -> Self {
        Self {
            store,
            min_active_ids,
        }
    }

    /// Parse a feed page: `{"hits": [...]}`, `{"jobs": [...]}` or a bare array.
    pub fn parse_page(content: &str) -> Result<Vec<JobPosting>> {
        let value: Value = serde_json::from_str(content)?;
        let hits = match &value {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => map
                .get("hits")
                .or_else(|| map.get("jobs"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .ok_or_else(|| {
                    MatcherError::InvalidInput("Feed page has no hits or jobs array".to_string())
                })?,
            _ => {
                return Err(MatcherError::InvalidInput(
                    "Feed page must be a JSON array or object".to_string(),
                ))
            }
        };

        let mut postings = Vec::with_capacity(hits.len());
        for hit in hits {
            match parse_hit(hit) {
                Ok(job) => postings.push(job),
                Err(e) => warn!("Skipping malformed feed record: {}", e),
            }
        }
        Ok(postings)
    }

    /// Upsert postings by identity.
    ///
    /// Derived fields survive when source text is unchanged and are nulled
    /// when it differs. Postings already past their deadline are stored inactive.
    pub async fn ingest(&self, postings: Vec<JobPosting>, now: DateTime<Utc>) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for mut incoming in postings {
            let expired = incoming.deadline.map_or(false, |d| d < now);
            incoming.is_active = !expired;
            if expired {
                report.expired += 1;
            }

            match self.store.get_job(&incoming.id).await? {
                None => {
                    incoming.invalidate_derived();
                    report.inserted += 1;
                }
                Some(existing) => {
                    if existing.source_differs(&incoming) {
                        incoming.invalidate_derived();
                        report.text_changed += 1;
                    } else {
                        incoming.vector = existing.vector;
                        incoming.requirements = existing.requirements;
                        incoming.category_tags = existing.category_tags;
                        incoming.needs_reembedding = existing.needs_reembedding;
                        report.unchanged += 1;
                    }
                    if incoming.location.is_none() {
                        incoming.location = existing.location;
                    }
                }
            }

            self.store.upsert_job(incoming).await?;
        }

        info!(
            "Ingested feed page: {} new, {} changed, {} unchanged, {} expired",
            report.inserted, report.text_changed, report.unchanged, report.expired
        );
        Ok(report)
    }

    /// Deactivate stored postings absent from a complete feed listing.
    pub async fn deactivate_missing(&self, live_ids: &HashSet<String>) -> Result<usize> {
        if live_ids.len() < self.min_active_ids {
            return Err(MatcherError::InvalidInput(format!(
                "Feed listed only {} live jobs (minimum {}); refusing to deactivate",
                live_ids.len(),
                self.min_active_ids
            )));
        }

        let mut deactivated = 0;
        for id in self.store.job_ids().await? {
            if live_ids.contains(&id) {
                continue;
            }
            if let Some(job) = self.store.get_job(&id).await? {
                if job.is_active {
                    self.store.set_active(&id, false).await?;
                    deactivated += 1;
                }
            }
        }

        info!("Deactivated {} postings missing from the feed", deactivated);
        Ok(deactivated)
    }

    /// Deactivate stored postings whose deadline has passed.
    pub async fn expire_past_deadline(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut expired = 0;
        for id in self.store.job_ids().await? {
            if let Some(job) = self.store.get_job(&id).await? {
                if job.is_active && job.deadline.map_or(false, |d| d < now) {
                    self.store.set_active(&id, false).await?;
                    expired += 1;
                }
            }
        }
        Ok(expired)
    }
}

/// Map one feed record onto a posting. The raw record becomes the snapshot.
pub fn parse_hit(hit: &Value) -> Result<JobPosting> {
    let id = match hit.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(MatcherError::Validation(
                "Feed record is missing an id".to_string(),
            ))
        }
    };

    let description = hit
        .get("description_text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| hit.get("description").and_then(|d| text_of(d.get("text").unwrap_or(d))))
        .unwrap_or_default();

    let address = hit.get("workplace_address");
    let location = address
        .and_then(|a| a.get("coordinates"))
        .and_then(Value::as_array)
        .and_then(|coords| match coords.as_slice() {
            [lon, lat] => Some(GeoPoint::new(lat.as_f64()?, lon.as_f64()?)),
            _ => None,
        })
        .or_else(|| {
            let lat = hit.get("lat").and_then(Value::as_f64)?;
            let lon = hit.get("lon").and_then(Value::as_f64)?;
            Some(GeoPoint::new(lat, lon))
        });

    Ok(JobPosting {
        id,
        headline: hit.get("headline").and_then(text_of).unwrap_or_default(),
        description_text: description,
        snapshot: Some(hit.clone()),
        occupation_field: hit.get("occupation_field").and_then(label_of),
        occupation_group: hit.get("occupation_group").and_then(label_of),
        occupation: hit.get("occupation").and_then(label_of),
        employer_name: hit.get("employer").and_then(|e| e.get("name")).and_then(text_of),
        city: address
            .and_then(|a| a.get("municipality").or_else(|| a.get("city")))
            .and_then(text_of)
            .or_else(|| hit.get("city").and_then(text_of)),
        location,
        published_at: hit
            .get("publication_date")
            .or_else(|| hit.get("published_at"))
            .and_then(Value::as_str)
            .and_then(parse_timestamp),
        deadline: hit
            .get("application_deadline")
            .or_else(|| hit.get("deadline"))
            .and_then(Value::as_str)
            .and_then(parse_timestamp),
        is_active: true,
        driving_license_required: hit
            .get("driving_license_required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        ..Default::default()
    })
}

/// Plain string, or a language map preferring Swedish.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(map) => ["sv", "en", "text"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn label_of(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("label").and_then(text_of),
        other => text_of(other),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
