//! Resumable recomputation of derived job and candidate data

use crate::config::BackfillConfig;
use crate::embedding::Enricher;
use crate::error::{MatcherError, Result};
use crate::storage::{CandidateStore, JobStore};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillTarget {
    Jobs,
    Candidates,
}

/// Last id fully handled by an interrupted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorCheckpoint {
    pub target: BackfillTarget,
    pub last_id: String,
}

impl CursorCheckpoint {
    /// A missing or unreadable checkpoint means start from the beginning.
    pub fn load(path: &Path, target: BackfillTarget) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<CursorCheckpoint>(&content) {
            Ok(checkpoint) if checkpoint.target == target => Some(checkpoint),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring unreadable checkpoint {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MatcherError::Io(e)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub pages: usize,
    pub processed: usize,
    pub updated: usize,
    pub failed: Vec<String>,
    pub resumed_from: Option<String>,
}

pub struct BackfillRunner<'a> {
    enricher: &'a Enricher,
    page_size: usize,
    only_active: bool,
    checkpoint_path: PathBuf,
    max_pages: Option<usize>,
    progress: ProgressBar,
}

impl<'a> BackfillRunner<'a> {
    pub fn new(enricher: &'a Enricher, config: &BackfillConfig) -> Self {
        Self {
            enricher,
            page_size: config.page_size.max(1),
            only_active: config.only_active,
            checkpoint_path: config.checkpoint_path.clone(),
            max_pages: None,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        if show {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} processed {msg}")
            {
                bar.set_style(style);
            }
            self.progress = bar;
        }
        self
    }

    /// Stop after this many pages, leaving the checkpoint in place.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub async fn run_jobs(&self, store: &dyn JobStore) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        let mut cursor = CursorCheckpoint::load(&self.checkpoint_path, BackfillTarget::Jobs)
            .map(|c| c.last_id);
        report.resumed_from = cursor.clone();
        if let Some(last_id) = &cursor {
            info!("Resuming job backfill after id {}", last_id);
        }

        loop {
            if self.page_limit_reached(&report) {
                info!("Stopping job backfill after {} pages; checkpoint kept", report.pages);
                self.progress.finish_and_clear();
                return Ok(report);
            }

            let page = store
                .pending_jobs(cursor.as_deref(), self.page_size, self.only_active)
                .await?;
            let Some(last) = page.last().map(|job| job.id.clone()) else {
                break;
            };

            for (id, derived) in self.enricher.enrich_jobs(&page).await {
                report.processed += 1;
                self.progress.inc(1);
                match derived {
                    Ok(derived) => match store.write_derived(&id, derived).await {
                        Ok(()) => report.updated += 1,
                        Err(e) => {
                            warn!("Failed to store derived data for job {}: {}", id, e);
                            report.failed.push(id);
                        }
                    },
                    Err(e) => {
                        warn!("Skipping job {}: {}", id, e);
                        report.failed.push(id);
                    }
                }
            }

            report.pages += 1;
            CursorCheckpoint {
                target: BackfillTarget::Jobs,
                last_id: last.clone(),
            }
            .save(&self.checkpoint_path)?;
            self.progress.set_message(format!("(page {}, last id {})", report.pages, last));
            cursor = Some(last);
        }

        CursorCheckpoint::clear(&self.checkpoint_path)?;
        self.progress.finish_and_clear();
        info!(
            "Job backfill complete: {} processed, {} updated, {} failed",
            report.processed,
            report.updated,
            report.failed.len()
        );
        Ok(report)
    }

    pub async fn run_candidates(&self, store: &dyn CandidateStore) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        let mut cursor = CursorCheckpoint::load(&self.checkpoint_path, BackfillTarget::Candidates)
            .map(|c| c.last_id);
        report.resumed_from = cursor.clone();

        loop {
            if self.page_limit_reached(&report) {
                self.progress.finish_and_clear();
                return Ok(report);
            }

            let page = store.pending_candidates(cursor.as_deref(), self.page_size).await?;
            let Some(last) = page.last().map(|c| c.id.clone()) else {
                break;
            };

            for candidate in &page {
                report.processed += 1;
                self.progress.inc(1);
                let outcome = match self.enricher.enrich_candidate(candidate).await {
                    Ok(enriched) => store.upsert_candidate(enriched).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(()) => report.updated += 1,
                    Err(e) => {
                        warn!("Skipping candidate {}: {}", candidate.id, e);
                        report.failed.push(candidate.id.clone());
                    }
                }
            }

            report.pages += 1;
            CursorCheckpoint {
                target: BackfillTarget::Candidates,
                last_id: last.clone(),
            }
            .save(&self.checkpoint_path)?;
            cursor = Some(last);
        }

        CursorCheckpoint::clear(&self.checkpoint_path)?;
        self.progress.finish_and_clear();
        info!(
            "Candidate backfill complete: {} processed, {} updated, {} failed",
            report.processed,
            report.updated,
            report.failed.len()
        );
        Ok(report)
    }

    fn page_limit_reached(&self, report: &BackfillReport) -> bool {
        self.max_pages.map_or(false, |max| report.pages >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        assert!(CursorCheckpoint::load(&path, BackfillTarget::Jobs).is_none());

        CursorCheckpoint {
            target: BackfillTarget::Jobs,
            last_id: "job-42".into(),
        }
        .save(&path)
        .unwrap();
        let loaded = CursorCheckpoint::load(&path, BackfillTarget::Jobs).unwrap();
        assert_eq!(loaded.last_id, "job-42");

        assert!(CursorCheckpoint::load(&path, BackfillTarget::Candidates).is_none());

        CursorCheckpoint::clear(&path).unwrap();
        assert!(!path.exists());
        CursorCheckpoint::clear(&path).unwrap();
    }

    #[test]
    fn test_corrupt_checkpoint_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, "{garbage").unwrap();
        assert!(CursorCheckpoint::load(&path, BackfillTarget::Jobs).is_none());
    }
}
