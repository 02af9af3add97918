//! Loads job corpora, candidate records and candidate documents

use crate::error::{MatcherError, Result};
use crate::input::file_detector::InputFormat;
use crate::input::text_extractor::{
    MarkdownExtractor, PdfExtractor, PlainTextExtractor, TextExtractor,
};
use crate::model::{CandidateProfile, JobPosting};
use log::info;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

pub struct InputManager {
    cache: HashMap<String, String>,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Free text from a PDF, Markdown or plain text document.
    pub async fn extract_text(&mut self, path: &Path) -> Result<String> {
        let key = path.to_string_lossy().to_string();
        if let Some(cached) = self.cache.get(&key) {
            info!("Using cached text for: {}", path.display());
            return Ok(cached.clone());
        }

        let text = match self.detect_format(path)? {
            InputFormat::Pdf => {
                info!("Extracting text from PDF: {}", path.display());
                PdfExtractor.extract(path).await?
            }
            InputFormat::Markdown => MarkdownExtractor.extract(path).await?,
            InputFormat::Text => PlainTextExtractor.extract(path).await?,
            InputFormat::Json | InputFormat::Unknown => {
                return Err(MatcherError::InvalidInput(format!(
                    "Not a text document: {}",
                    path.display()
                )))
            }
        };

        self.cache.insert(key, text.clone());
        Ok(text)
    }

    /// A JSON array of job postings, or `{"jobs": [...]}`.
    pub async fn load_jobs(&self, path: &Path) -> Result<Vec<JobPosting>> {
        let jobs: Vec<JobPosting> = self.load_records(path, "jobs").await?;
        info!("Loaded {} jobs from {}", jobs.len(), path.display());
        Ok(jobs)
    }

    /// A JSON array of candidate profiles, or `{"candidates": [...]}`.
    pub async fn load_candidates(&self, path: &Path) -> Result<Vec<CandidateProfile>> {
        let candidates: Vec<CandidateProfile> = self.load_records(path, "candidates").await?;
        info!("Loaded {} candidates from {}", candidates.len(), path.display());
        Ok(candidates)
    }

    /// Build a bare candidate from a CV document; enrichment fills the rest.
    pub async fn candidate_from_document(&mut self, id: &str, path: &Path) -> Result<CandidateProfile> {
        let source_text = self.extract_text(path).await?;
        Ok(CandidateProfile {
            id: id.to_string(),
            source_text,
            needs_reembedding: true,
            ..Default::default()
        })
    }

    async fn load_records<T: DeserializeOwned>(&self, path: &Path, key: &str) -> Result<Vec<T>> {
        if self.detect_format(path)? != InputFormat::Json {
            return Err(MatcherError::InvalidInput(format!(
                "Expected a .json file: {}",
                path.display()
            )));
        }
        let content = tokio::fs::read_to_string(path).await?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        let records = match value {
            serde_json::Value::Object(mut map) => map.remove(key).ok_or_else(|| {
                MatcherError::InvalidInput(format!("{} has no \"{}\" array", path.display(), key))
            })?,
            other => other,
        };
        Ok(serde_json::from_value(records)?)
    }

    fn detect_format(&self, path: &Path) -> Result<InputFormat> {
        if !path.exists() {
            return Err(MatcherError::InvalidInput(format!(
                "File does not exist: {}",
                path.display()
            )));
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                MatcherError::InvalidInput(format!("File has no extension: {}", path.display()))
            })?;
        Ok(InputFormat::from_extension(extension))
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_text_is_cached() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "Lagerarbetare med truckkort").unwrap();

        let mut manager = InputManager::new();
        let text = manager.extract_text(file.path()).await.unwrap();
        assert_eq!(text, "Lagerarbetare med truckkort");
        assert_eq!(manager.cache_size(), 1);
    }

    #[tokio::test]
    async fn test_load_jobs_wrapped_or_bare() {
        let mut bare = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(bare, r#"[{{"id": "1", "headline": "Utvecklare"}}]"#).unwrap();
        let mut wrapped = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(wrapped, r#"{{"jobs": [{{"id": "2"}}, {{"id": "3"}}]}}"#).unwrap();

        let manager = InputManager::new();
        assert_eq!(manager.load_jobs(bare.path()).await.unwrap().len(), 1);
        let jobs = manager.load_jobs(wrapped.path()).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].is_active);
    }

    #[tokio::test]
    async fn test_missing_file_rejected() {
        let mut manager = InputManager::new();
        let err = manager.extract_text(Path::new("/nonexistent/cv.txt")).await;
        assert!(matches!(err, Err(MatcherError::InvalidInput(_))));
    }
}
