//! Persistence contracts, the in-memory store, backfill and feed ingestion

pub mod backfill;
pub mod feed;
pub mod memory;

use crate::error::Result;
use crate::model::{CandidateProfile, DerivedJobData, GeoPoint, JobPosting};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::InMemoryStore;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get_job(&self, id: &str) -> Result<Option<JobPosting>>;

    /// Insert or replace by identity.
    async fn upsert_job(&self, job: JobPosting) -> Result<()>;

    /// Write a vector and its derived metadata as one operation and clear the stale flag.
    async fn write_derived(&self, id: &str, derived: DerivedJobData) -> Result<()>;

    /// Rows missing derived data or flagged stale, ordered by id, strictly after `after`.
    async fn pending_jobs(
        &self,
        after: Option<&str>,
        limit: usize,
        only_active: bool,
    ) -> Result<Vec<JobPosting>>;

    /// Active, not-expired postings for matching.
    async fn live_jobs(&self, now: DateTime<Utc>) -> Result<Vec<JobPosting>>;

    async fn job_ids(&self) -> Result<Vec<String>>;

    async fn set_active(&self, id: &str, active: bool) -> Result<()>;

    /// Set coordinates without touching any other field.
    async fn set_location(&self, id: &str, location: GeoPoint) -> Result<()>;
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn get_candidate(&self, id: &str) -> Result<Option<CandidateProfile>>;

    /// Insert or replace by identity. A changed CV, wish or persona text drops derived fields.
    async fn upsert_candidate(&self, candidate: CandidateProfile) -> Result<()>;

    /// Candidates without a profile vector or flagged stale, ordered by id.
    async fn pending_candidates(&self, after: Option<&str>, limit: usize) -> Result<Vec<CandidateProfile>>;
}
