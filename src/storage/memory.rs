//! In-memory store with an optional JSON snapshot file

use crate::error::{MatcherError, Result};
use crate::model::{CandidateProfile, DerivedJobData, GeoPoint, JobPosting};
use crate::storage::{CandidateStore, JobStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Snapshot {
    jobs: Vec<JobPosting>,
    candidates: Vec<CandidateProfile>,
}

/// Ordered by id so cursor paging is a range scan.
#[derive(Default)]
pub struct InMemoryStore {
    jobs: RwLock<BTreeMap<String, JobPosting>>,
    candidates: RwLock<BTreeMap<String, CandidateProfile>>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a snapshot file, starting empty if it does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let snapshot: Snapshot = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Snapshot::default()
        };

        info!(
            "Opened store {} ({} jobs, {} candidates)",
            path.display(),
            snapshot.jobs.len(),
            snapshot.candidates.len()
        );

        Ok(Self {
            jobs: RwLock::new(snapshot.jobs.into_iter().map(|j| (j.id.clone(), j)).collect()),
            candidates: RwLock::new(
                snapshot
                    .candidates
                    .into_iter()
                    .map(|c| (c.id.clone(), c))
                    .collect(),
            ),
            snapshot_path: Some(path.to_path_buf()),
        })
    }

    pub fn with_jobs(jobs: Vec<JobPosting>) -> Self {
        Self {
            jobs: RwLock::new(jobs.into_iter().map(|j| (j.id.clone(), j)).collect()),
            ..Self::default()
        }
    }

    /// Write the snapshot atomically: temp file in the same directory, then rename.
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            jobs: self.jobs.read().await.values().cloned().collect(),
            candidates: self.candidates.read().await.values().cloned().collect(),
        };
        let body = serde_json::to_vec_pretty(&snapshot)?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| MatcherError::Io(e.error))?;

        debug!("Persisted store snapshot to {}", path.display());
        Ok(())
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }
}

fn after_bound(after: Option<&str>) -> (Bound<String>, Bound<String>) {
    match after {
        Some(id) => (Bound::Excluded(id.to_string()), Bound::Unbounded),
        None => (Bound::Unbounded, Bound::Unbounded),
    }
}

fn job_is_pending(job: &JobPosting) -> bool {
    job.needs_processing() || job.requirements.is_none() || job.category_tags.is_none()
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn get_job(&self, id: &str) -> Result<Option<JobPosting>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn upsert_job(&self, job: JobPosting) -> Result<()> {
        if job.id.trim().is_empty() {
            return Err(MatcherError::Validation("Job id cannot be empty".to_string()));
        }
        self.jobs.write().await.insert(job.id.clone(), job);
        Ok(())
    }

    async fn write_derived(&self, id: &str, derived: DerivedJobData) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| MatcherError::NotFound(format!("job {}", id)))?;
        job.vector = Some(derived.vector);
        job.requirements = Some(derived.requirements);
        job.category_tags = Some(derived.category_tags);
        job.needs_reembedding = false;
        Ok(())
    }

    async fn pending_jobs(
        &self,
        after: Option<&str>,
        limit: usize,
        only_active: bool,
    ) -> Result<Vec<JobPosting>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .range(after_bound(after))
            .map(|(_, job)| job)
            .filter(|job| !only_active || job.is_active)
            .filter(|job| job_is_pending(job))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn live_jobs(&self, now: DateTime<Utc>) -> Result<Vec<JobPosting>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.is_live(now))
            .cloned()
            .collect())
    }

    async fn job_ids(&self) -> Result<Vec<String>> {
        Ok(self.jobs.read().await.keys().cloned().collect())
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| MatcherError::NotFound(format!("job {}", id)))?;
        job.is_active = active;
        Ok(())
    }

    async fn set_location(&self, id: &str, location: GeoPoint) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| MatcherError::NotFound(format!("job {}", id)))?;
        job.location = Some(location);
        Ok(())
    }
}

#[async_trait]
impl CandidateStore for InMemoryStore {
    async fn get_candidate(&self, id: &str) -> Result<Option<CandidateProfile>> {
        Ok(self.candidates.read().await.get(id).cloned())
    }

    async fn upsert_candidate(&self, mut candidate: CandidateProfile) -> Result<()> {
        if candidate.id.trim().is_empty() {
            return Err(MatcherError::Validation("Candidate id cannot be empty".to_string()));
        }
        let mut candidates = self.candidates.write().await;
        if let Some(stored) = candidates.get(&candidate.id) {
            if stored.source_differs(&candidate) {
                debug!("Candidate {} text changed, invalidating derived fields", candidate.id);
                candidate.invalidate_derived();
            }
        }
        candidates.insert(candidate.id.clone(), candidate);
        Ok(())
    }

    async fn pending_candidates(&self, after: Option<&str>, limit: usize) -> Result<Vec<CandidateProfile>> {
        let candidates = self.candidates.read().await;
        Ok(candidates
            .range(after_bound(after))
            .map(|(_, c)| c)
            .filter(|c| c.vectors.profile.is_none() || c.needs_reembedding)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CandidateVectors, EmbeddingVector};
    use crate::processing::requirements::RequirementSet;

    fn job(id: &str) -> JobPosting {
        JobPosting {
            id: id.into(),
            headline: format!("Job {}", id),
            ..Default::default()
        }
    }

    fn derived() -> DerivedJobData {
        DerivedJobData {
            vector: EmbeddingVector::new(vec![0.6, 0.8]),
            requirements: RequirementSet::default(),
            category_tags: ["it"].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_pending_pages_by_cursor() {
        let store = InMemoryStore::with_jobs(vec![job("a"), job("b"), job("c"), job("d")]);
        store.write_derived("b", derived()).await.unwrap();

        let first = store.pending_jobs(None, 2, true).await.unwrap();
        assert_eq!(first.iter().map(|j| j.id.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);

        let second = store.pending_jobs(Some("c"), 2, true).await.unwrap();
        assert_eq!(second.iter().map(|j| j.id.as_str()).collect::<Vec<_>>(), vec!["d"]);
    }

    #[tokio::test]
    async fn test_write_derived_is_complete() {
        let store = InMemoryStore::with_jobs(vec![job("a")]);
        store.write_derived("a", derived()).await.unwrap();

        let stored = store.get_job("a").await.unwrap().unwrap();
        assert!(stored.vector.is_some());
        assert!(stored.requirements.is_some());
        assert!(stored.category_tags.is_some());
        assert!(!stored.needs_reembedding);

        assert!(matches!(
            store.write_derived("missing", derived()).await,
            Err(MatcherError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_excluded_from_pending_when_requested() {
        let mut inactive = job("a");
        inactive.is_active = false;
        let store = InMemoryStore::with_jobs(vec![inactive]);

        assert!(store.pending_jobs(None, 10, true).await.unwrap().is_empty());
        assert_eq!(store.pending_jobs(None, 10, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = InMemoryStore::open(&path).unwrap();
        store.upsert_job(job("a")).await.unwrap();
        store
            .upsert_candidate(CandidateProfile {
                id: "c1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store.persist().await.unwrap();

        let reopened = InMemoryStore::open(&path).unwrap();
        assert_eq!(reopened.job_count().await, 1);
        assert!(reopened.get_candidate("c1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_changed_candidate_text_drops_derived_fields() {
        let store = InMemoryStore::new();
        let embedded = CandidateProfile {
            id: "c1".into(),
            source_text: "Utvecklare med Python".into(),
            category_tags: ["it"].into_iter().collect(),
            vectors: CandidateVectors {
                profile: Some(EmbeddingVector::new(vec![0.6, 0.8])),
                ..Default::default()
            },
            ..Default::default()
        };
        store.upsert_candidate(embedded.clone()).await.unwrap();

        let mut relocated = embedded.clone();
        relocated.radius_km = Some(30.0);
        store.upsert_candidate(relocated).await.unwrap();
        let stored = store.get_candidate("c1").await.unwrap().unwrap();
        assert!(stored.vectors.profile.is_some());
        assert!(!stored.needs_reembedding);

        let mut rewritten = embedded;
        rewritten.source_text = "Sjuksköterska på akuten".into();
        store.upsert_candidate(rewritten).await.unwrap();
        let stored = store.get_candidate("c1").await.unwrap().unwrap();
        assert!(stored.vectors.is_empty());
        assert!(stored.category_tags.is_empty());
        assert!(stored.needs_reembedding);
        assert_eq!(store.pending_candidates(None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_location_keeps_derived_fields() {
        let store = InMemoryStore::with_jobs(vec![job("a")]);
        store.write_derived("a", derived()).await.unwrap();
        store.set_location("a", GeoPoint::new(59.86, 17.64)).await.unwrap();

        let stored = store.get_job("a").await.unwrap().unwrap();
        assert!(stored.location.is_some());
        assert!(stored.vector.is_some());
        assert!(matches!(
            store.set_location("missing", GeoPoint::new(0.0, 0.0)).await,
            Err(MatcherError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.upsert_job(job("  ")).await,
            Err(MatcherError::Validation(_))
        ));
    }
}
