//! Overlapping character-window chunking and signal document assembly

use crate::config::ProcessingConfig;
use crate::error::{MatcherError, Result};
use crate::model::{CandidateAttributes, JobPosting};
use crate::processing::requirements::RequirementSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// Character offsets into the source text.
    pub start: usize,
    pub end: usize,
    /// Leading characters repeated from the previous chunk.
    pub overlap: usize,
}

impl Chunk {
    /// Chunk text with the repeated prefix removed.
    pub fn fresh_text(&self) -> String {
        self.text.chars().skip(self.overlap).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_chars: usize,
    overlap_chars: usize,
    max_chunks: usize,
}

impl Chunker {
    pub fn new(chunk_chars: usize, overlap_chars: usize, max_chunks: usize) -> Result<Self> {
        if chunk_chars <= overlap_chars {
            return Err(MatcherError::Validation(format!(
                "Chunk size ({}) must be greater than overlap ({})",
                chunk_chars, overlap_chars
            )));
        }
        if max_chunks == 0 {
            return Err(MatcherError::Validation(
                "max_chunks must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            chunk_chars,
            overlap_chars,
            max_chunks,
        })
    }

    pub fn from_config(config: &ProcessingConfig) -> Result<Self> {
        Self::new(config.chunk_chars, config.overlap_chars, config.max_chunks)
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let window_end = (start + self.chunk_chars).min(total);
            let mut end = window_end;

            // Break on the last whitespace that still moves past the overlap.
            if window_end < total {
                let floor = start + self.overlap_chars + 1;
                if let Some(ws) = (floor..window_end).rev().find(|&i| chars[i].is_whitespace()) {
                    end = ws + 1;
                }
            }

            chunks.push(Chunk {
                index: chunks.len(),
                text: chars[start..end].iter().collect(),
                start,
                end,
                overlap: if chunks.is_empty() { 0 } else { self.overlap_chars },
            });

            if end >= total || chunks.len() >= self.max_chunks {
                break;
            }
            start = end - self.overlap_chars;
        }

        chunks
    }
}

/// Prioritised embedding input: extracted signal ahead of prose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalDocument {
    pub signal: String,
    pub context: String,
    pub body: String,
}

impl SignalDocument {
    pub fn build(job: &JobPosting, requirements: &RequirementSet, cleaned_description: &str) -> Self {
        let mut signal = Vec::new();
        let mut must: Vec<String> = requirements.must_have.skills.clone();
        must.extend(requirements.must_have.education.iter().cloned());
        if !must.is_empty() {
            signal.push(format!("Krav: {}.", must.join(", ")));
        }
        let nice = &requirements.nice_to_have.skills;
        if !nice.is_empty() {
            signal.push(format!("Meriterande: {}.", nice.join(", ")));
        }

        let mut credentials: Vec<String> = requirements.must_have.licenses.clone();
        credentials.extend(requirements.must_have.certifications.iter().cloned());
        credentials.extend(requirements.nice_to_have.certifications.iter().cloned());
        if !credentials.is_empty() {
            signal.push(format!("Behörigheter: {}.", credentials.join(", ")));
        }
        if let Some(years) = requirements.must_have.min_experience_years {
            signal.push(format!("Erfarenhet: {}+ år.", years));
        }

        let mut context = Vec::new();
        if !job.headline.trim().is_empty() {
            context.push(format!("Jobb: {}", job.headline.trim()));
        }
        if let Some(category) = job.occupation.as_deref().or(job.occupation_group.as_deref()) {
            context.push(format!("Kategori: {}", category));
        }
        if let Some(employer) = job.employer_name.as_deref() {
            context.push(format!("Företag: {}", employer));
        }
        if let Some(city) = job.city.as_deref() {
            context.push(format!("Plats: {}", city));
        }

        Self {
            signal: signal.join("\n"),
            context: context.join("\n"),
            body: cleaned_description.to_string(),
        }
    }

    pub fn for_candidate(attributes: &CandidateAttributes, cleaned_text: &str) -> Self {
        let mut signal = Vec::new();
        if !attributes.skills.is_empty() {
            signal.push(format!("Kompetens: {}.", attributes.skills.join(", ")));
        }
        let mut credentials = attributes.licenses.clone();
        credentials.extend(attributes.certifications.iter().cloned());
        if !credentials.is_empty() {
            signal.push(format!("Behörigheter: {}.", credentials.join(", ")));
        }
        if !attributes.education.is_empty() {
            signal.push(format!("Utbildning: {}.", attributes.education.join(", ")));
        }
        if let Some(years) = attributes.experience_years {
            signal.push(format!("Erfarenhet: {}+ år.", years));
        }

        Self {
            signal: signal.join("\n"),
            context: String::new(),
            body: cleaned_text.to_string(),
        }
    }

    pub fn text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.signal.is_empty() {
            parts.push(&self.signal);
        }
        if !self.context.is_empty() {
            parts.push(&self.context);
        }
        if !self.body.is_empty() {
            parts.push("Beskrivning:");
            parts.push(&self.body);
        }
        parts.join("\n")
    }
}

/// The signal document when its signal part is long enough, else the cleaned text.
pub fn select_embedding_text(signal: &SignalDocument, cleaned: &str, min_signal_chars: usize) -> String {
    if signal.signal.chars().count() >= min_signal_chars {
        signal.text()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::requirements::RequirementBucket;

    #[test]
    fn test_invalid_overlap_rejected() {
        assert!(matches!(Chunker::new(100, 100, 5), Err(MatcherError::Validation(_))));
        assert!(Chunker::new(100, 10, 0).is_err());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = Chunker::new(100, 10, 5).unwrap();
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::new(100, 10, 5).unwrap();
        let chunks = chunker.chunk("kort text");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "kort text");
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn test_chunks_cover_input_without_cap() {
        let text = "ord ".repeat(200) + "slut";
        let chunker = Chunker::new(50, 10, 100).unwrap();
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        let rebuilt: String = chunks.iter().map(Chunk::fresh_text).collect();
        assert_eq!(rebuilt, text);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 50));
    }

    #[test]
    fn test_chunks_form_prefix_when_capped() {
        let text = "abcdefghij".repeat(100);
        let chunker = Chunker::new(40, 5, 3).unwrap();
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks.len(), 3);
        let rebuilt: String = chunks.iter().map(Chunk::fresh_text).collect();
        assert!(text.starts_with(&rebuilt));
        assert_eq!(rebuilt.chars().count(), 40 + 35 + 35);
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text = "ett två tre fyra fem sex sju åtta nio tio elva tolv";
        let chunker = Chunker::new(20, 4, 10).unwrap();
        let chunks = chunker.chunk(text);

        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            let head: String = pair[1].text.chars().take(4).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_signal_document_prefers_extracted_signal() {
        let job = JobPosting {
            id: "1".into(),
            headline: "Backendutvecklare".into(),
            city: Some("Stockholm".into()),
            ..Default::default()
        };
        let requirements = RequirementSet {
            must_have: RequirementBucket {
                skills: vec!["Python".into(), "SQL".into()],
                licenses: vec!["B-körkort".into()],
                min_experience_years: Some(3),
                ..Default::default()
            },
            nice_to_have: RequirementBucket {
                skills: vec!["Docker".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let doc = SignalDocument::build(&job, &requirements, "Lång beskrivning.");

        assert!(doc.signal.starts_with("Krav: Python, SQL."));
        assert!(doc.signal.contains("Meriterande: Docker."));
        assert!(doc.signal.contains("Erfarenhet: 3+ år."));

        let text = select_embedding_text(&doc, "Lång beskrivning.", 40);
        assert!(text.starts_with("Krav:"));
        assert!(text.contains("Jobb: Backendutvecklare"));
        assert!(text.ends_with("Lång beskrivning."));
    }

    #[test]
    fn test_thin_signal_falls_back_to_cleaned_text() {
        let doc = SignalDocument::for_candidate(&CandidateAttributes::default(), "CV text");
        assert_eq!(select_embedding_text(&doc, "CV text", 40), "CV text");
    }
}
