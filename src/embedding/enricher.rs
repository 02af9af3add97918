//! Recomputes every derived field of jobs and candidates in one pass

use crate::config::Config;
use crate::embedding::pipeline::EmbeddingPipeline;
use crate::error::{MatcherError, Result};
use crate::model::{CandidateProfile, CandidateVectors, CategoryTagSet, DerivedJobData, JobPosting};
use crate::processing::chunker::{select_embedding_text, SignalDocument};
use crate::processing::normalizer::TextNormalizer;
use crate::processing::requirements::{RequirementExtractor, RequirementSet};
use crate::processing::tagger::CategoryTagger;
use log::{debug, info};

/// Metadata computed without the embedding provider.
#[derive(Debug, Clone, PartialEq)]
pub struct JobMetadata {
    pub requirements: RequirementSet,
    pub category_tags: CategoryTagSet,
    pub embedding_text: String,
}

pub struct Enricher {
    normalizer: TextNormalizer,
    extractor: RequirementExtractor,
    tagger: CategoryTagger,
    pipeline: EmbeddingPipeline,
    signal_min_chars: usize,
}

impl Enricher {
    pub fn new(config: &Config, tagger: CategoryTagger, pipeline: EmbeddingPipeline) -> Result<Self> {
        Ok(Self {
            normalizer: TextNormalizer::new(&config.processing)?,
            extractor: RequirementExtractor::new(config.processing.max_text_chars)?,
            tagger,
            pipeline,
            signal_min_chars: config.processing.signal_min_chars,
        })
    }

    pub fn extractor(&self) -> &RequirementExtractor {
        &self.extractor
    }

    pub fn tagger(&self) -> &CategoryTagger {
        &self.tagger
    }

    /// Requirements, tags and the text to embed. Pure and total.
    pub fn job_metadata(&self, job: &JobPosting) -> JobMetadata {
        let requirements = self.extractor.extract(job);
        let category_tags = self.tagger.tag_job(job);
        let cleaned = self.normalizer.normalize_with_sections(&job.description_text);
        let signal = SignalDocument::build(job, &requirements, &cleaned.text);

        let mut embedding_text = select_embedding_text(&signal, &cleaned.text, self.signal_min_chars);
        if embedding_text == cleaned.text && !job.headline.trim().is_empty() {
            embedding_text = format!("{}\n{}", job.headline.trim(), cleaned.text);
        }

        JobMetadata {
            requirements,
            category_tags,
            embedding_text,
        }
    }

    /// Derive all fields for a page of jobs, embedding them in shared batches.
    ///
    /// Results keep input order; one job failing does not affect the rest.
    pub async fn enrich_jobs(&self, jobs: &[JobPosting]) -> Vec<(String, Result<DerivedJobData>)> {
        let metadata: Vec<JobMetadata> = jobs.iter().map(|job| self.job_metadata(job)).collect();
        let texts: Vec<String> = metadata.iter().map(|m| m.embedding_text.clone()).collect();
        let vectors = self.pipeline.embed_documents(&texts).await;

        jobs.iter()
            .zip(metadata)
            .zip(vectors)
            .map(|((job, meta), vector)| {
                let derived = vector.map(|vector| DerivedJobData {
                    vector,
                    requirements: meta.requirements,
                    category_tags: meta.category_tags,
                });
                (job.id.clone(), derived)
            })
            .collect()
    }

    /// Fill in a candidate's vectors, tags and attributes from its texts.
    pub async fn enrich_candidate(&self, candidate: &CandidateProfile) -> Result<CandidateProfile> {
        let cleaned = self.normalizer.normalize_with_sections(&candidate.source_text);
        let min_chars = self.pipeline.min_text_chars();
        if cleaned.char_count() < min_chars {
            return Err(MatcherError::Validation(format!(
                "Candidate {} source text has {} chars after cleaning, minimum {}",
                candidate.id,
                cleaned.char_count(),
                min_chars
            )));
        }

        let mut enriched = candidate.clone();
        enriched.derived_attributes = Some(self.extractor.candidate_attributes(&cleaned.text));

        let mut tag_text = cleaned.text.clone();
        if let Some(wish) = &candidate.wish_text {
            tag_text.push('\n');
            tag_text.push_str(wish);
        }
        enriched.category_tags = self.tagger.tag_candidate(&tag_text);

        let attributes = enriched.requirement_attributes().unwrap_or_default();
        let profile_doc = SignalDocument::for_candidate(&attributes, &cleaned.text);
        let mut texts = vec![select_embedding_text(&profile_doc, &cleaned.text, self.signal_min_chars)];

        let wish = candidate
            .wish_text
            .as_deref()
            .map(|w| self.normalizer.clean(w).text)
            .filter(|w| w.chars().count() >= min_chars);
        let has_wish = wish.is_some();
        texts.extend(wish);

        let personas: Vec<String> = candidate
            .persona_texts
            .iter()
            .map(|p| self.normalizer.clean(p).text)
            .filter(|p| p.chars().count() >= min_chars)
            .collect();
        if personas.len() < candidate.persona_texts.len() {
            debug!(
                "Skipping {} persona texts below minimum length for candidate {}",
                candidate.persona_texts.len() - personas.len(),
                candidate.id
            );
        }
        texts.extend(personas);

        let mut results = self.pipeline.embed_documents(&texts).await.into_iter();
        let profile = results
            .next()
            .unwrap_or_else(|| Err(MatcherError::Validation("No profile embedding".to_string())))?;
        let wish = if has_wish { results.next().transpose()? } else { None };
        let personas = results.collect::<Result<Vec<_>>>()?;

        enriched.vectors = CandidateVectors {
            profile: Some(profile),
            wish,
            personas,
        };
        enriched.needs_reembedding = false;

        info!(
            "Embedded candidate {} ({} tags, {} persona vectors)",
            enriched.id,
            enriched.category_tags.len(),
            enriched.vectors.personas.len()
        );
        Ok(enriched)
    }
}
