//! Candidate to job matching over stored postings

pub mod engine;
pub mod geo;
pub mod types;

pub use engine::MatchEngine;
pub use types::{MatchEntry, MatchQuery, MatchResult, VectorChoice};

use crate::error::{MatcherError, Result};
use crate::geocoding::Geocoder;
use crate::storage::{CandidateStore, JobStore};
use log::{debug, info};

/// Loads a candidate and the live corpus, then runs the engine.
pub struct MatchService<'a> {
    jobs: &'a dyn JobStore,
    candidates: &'a dyn CandidateStore,
    geocoder: Option<&'a dyn Geocoder>,
}

impl<'a> MatchService<'a> {
    pub fn new(jobs: &'a dyn JobStore, candidates: &'a dyn CandidateStore) -> Self {
        Self {
            jobs,
            candidates,
            geocoder: None,
        }
    }

    /// Resolve a candidate's city when they have no stored coordinates.
    pub fn with_geocoder(mut self, geocoder: &'a dyn Geocoder) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub async fn match_candidate(&self, candidate_id: &str, query: &MatchQuery) -> Result<MatchResult> {
        let mut candidate = self
            .candidates
            .get_candidate(candidate_id)
            .await?
            .ok_or_else(|| MatcherError::NotFound(format!("candidate {}", candidate_id)))?;

        if candidate.location.is_none() {
            if let (Some(geocoder), Some(city)) = (self.geocoder, candidate.city.clone()) {
                candidate.location = geocoder.geocode(&city).await?;
                debug!("Resolved candidate city {} to {:?}", city, candidate.location);
            }
        }

        let jobs = self.jobs.live_jobs(query.now).await?;
        let result = MatchEngine::run(&candidate, &jobs, query)?;

        info!(
            "Matched candidate {}: {} of {} jobs returned",
            candidate_id,
            result.entries.len(),
            result.counts.considered
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MatchFailure, MatchStage};
    use crate::geocoding::CityTableGeocoder;
    use crate::model::CandidateProfile;
    use crate::storage::InMemoryStore;

    async fn store_with(candidate: CandidateProfile) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.upsert_candidate(candidate).await.unwrap();
        store
    }

    fn stage_of(result: Result<MatchResult>) -> (MatchStage, MatchFailure) {
        match result {
            Err(MatcherError::Match(err)) => (err.stage, err.failure),
            other => panic!("expected a match failure, got {:?}", other.map(|r| r.entries.len())),
        }
    }

    #[tokio::test]
    async fn test_unembedded_candidate_fails_at_vector_stage() {
        let store = store_with(CandidateProfile {
            id: "c1".into(),
            city: Some("Uppsala".into()),
            category_tags: ["health"].into_iter().collect(),
            ..Default::default()
        })
        .await;
        let geocoder = CityTableGeocoder::default();
        let result = MatchService::new(&store, &store)
            .with_geocoder(&geocoder)
            .match_candidate("c1", &MatchQuery::default())
            .await;

        let (stage, failure) = stage_of(result);
        assert_eq!(stage, MatchStage::Vector);
        assert!(matches!(failure, MatchFailure::InsufficientProfile(_)));
    }

    #[tokio::test]
    async fn test_unresolved_city_with_radius_fails_at_geo_stage() {
        let store = store_with(CandidateProfile {
            id: "c2".into(),
            city: Some("Atlantis".into()),
            category_tags: ["it"].into_iter().collect(),
            ..Default::default()
        })
        .await;
        let query = MatchQuery {
            radius_km: Some(10.0),
            ..Default::default()
        };
        let geocoder = CityTableGeocoder::default();
        let result = MatchService::new(&store, &store)
            .with_geocoder(&geocoder)
            .match_candidate("c2", &query)
            .await;

        let (stage, failure) = stage_of(result);
        assert_eq!(stage, MatchStage::Geo);
        assert!(matches!(failure, MatchFailure::IncompleteLocation(_)));
    }
}
