//! Batched, bounded-concurrency embedding of whole documents

use crate::config::{EmbeddingConfig, ProcessingConfig};
use crate::embedding::provider::{validate_batch, EmbeddingProvider};
use crate::error::{MatcherError, Result};
use crate::model::EmbeddingVector;
use crate::processing::chunker::Chunker;
use crate::processing::reducer::mean_pool_normalize;
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// One provider call: chunk inputs tagged with the document they came from.
struct Batch {
    owners: Vec<(usize, usize)>,
    inputs: Vec<String>,
}

pub struct EmbeddingPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    permits: Arc<Semaphore>,
    batch_size: usize,
    max_concurrency: usize,
    max_retries: u32,
    backoff_base: Duration,
    document_prefix: Option<String>,
    min_text_chars: usize,
}

impl EmbeddingPipeline {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        embedding: &EmbeddingConfig,
        processing: &ProcessingConfig,
    ) -> Result<Self> {
        Ok(Self {
            provider,
            chunker: Chunker::from_config(processing)?,
            permits: Arc::new(Semaphore::new(embedding.max_concurrency)),
            batch_size: embedding.batch_size.max(1),
            max_concurrency: embedding.max_concurrency.max(1),
            max_retries: embedding.max_retries,
            backoff_base: Duration::from_millis(embedding.backoff_base_ms),
            document_prefix: embedding
                .document_prefix
                .clone()
                .filter(|p| !p.trim().is_empty()),
            min_text_chars: processing.min_text_chars,
        })
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn min_text_chars(&self) -> usize {
        self.min_text_chars
    }

    /// Embed one document into a single unit vector.
    pub async fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        let mut results = self.embed_documents(&[text.to_string()]).await;
        results.pop().unwrap_or_else(|| {
            Err(MatcherError::Validation("No embedding produced".to_string()))
        })
    }

    /// Embed many documents, returning one result per document in order.
    ///
    /// Chunks from all documents share provider batches. A document whose
    /// chunks all succeed is pooled; any failed chunk fails that document only.
    pub async fn embed_documents(&self, documents: &[String]) -> Vec<Result<EmbeddingVector>> {
        let mut results: Vec<Option<Result<EmbeddingVector>>> = Vec::with_capacity(documents.len());
        let mut chunk_slots: Vec<Vec<Option<EmbeddingVector>>> = Vec::with_capacity(documents.len());
        let mut pending: Vec<(usize, usize, String)> = Vec::new();

        for (doc_idx, text) in documents.iter().enumerate() {
            let length = text.trim().chars().count();
            if length < self.min_text_chars {
                results.push(Some(Err(MatcherError::Validation(format!(
                    "Text too short to embed: {} chars, minimum {}",
                    length, self.min_text_chars
                )))));
                chunk_slots.push(Vec::new());
                continue;
            }

            let chunks = self.chunker.chunk(text.trim());
            chunk_slots.push(vec![None; chunks.len()]);
            results.push(None);
            for chunk in chunks {
                pending.push((doc_idx, chunk.index, self.format_input(&chunk.text)));
            }
        }

        let batches: Vec<Batch> = pending
            .chunks(self.batch_size)
            .map(|slice| Batch {
                owners: slice.iter().map(|(d, c, _)| (*d, *c)).collect(),
                inputs: slice.iter().map(|(_, _, text)| text.clone()).collect(),
            })
            .collect();
        debug!(
            "Embedding {} documents as {} chunks in {} batches",
            documents.len(),
            pending.len(),
            batches.len()
        );

        let outcomes: Vec<(Vec<(usize, usize)>, Result<Vec<EmbeddingVector>>)> = stream::iter(batches)
            .map(|batch| async move {
                let outcome = self.call_with_retry(&batch.inputs).await;
                (batch.owners, outcome)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for (owners, outcome) in outcomes {
            match outcome {
                Ok(vectors) => {
                    for ((doc_idx, chunk_idx), vector) in owners.into_iter().zip(vectors) {
                        chunk_slots[doc_idx][chunk_idx] = Some(vector);
                    }
                }
                Err(e) => {
                    for (doc_idx, _) in owners {
                        if results[doc_idx].is_none() {
                            results[doc_idx] = Some(Err(replicate(&e)));
                        }
                    }
                }
            }
        }

        results
            .into_iter()
            .zip(chunk_slots)
            .map(|(result, slots)| match result {
                Some(done) => done,
                None => {
                    let vectors: Vec<EmbeddingVector> = slots.into_iter().flatten().collect();
                    mean_pool_normalize(&vectors)
                }
            })
            .collect()
    }

    fn format_input(&self, chunk: &str) -> String {
        match &self.document_prefix {
            Some(prefix) => format!("{} {}", prefix, chunk.trim()),
            None => chunk.trim().to_string(),
        }
    }

    /// One provider call under a concurrency permit, retried with exponential backoff.
    async fn call_with_retry(&self, inputs: &[String]) -> Result<Vec<EmbeddingVector>> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|e| MatcherError::provider(format!("Embedding pool closed: {}", e), false))?;
                self.provider.embed_batch(inputs).await
            };

            let outcome = outcome.and_then(|vectors| {
                validate_batch(inputs.len(), &vectors, self.provider.dimension())?;
                Ok(vectors)
            });

            match outcome {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff_base * 2u32.saturating_pow(attempt);
                    warn!(
                        "Embedding call failed (attempt {}/{}): {}; retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Copy a batch error onto each document that shared the batch.
fn replicate(err: &MatcherError) -> MatcherError {
    match err {
        MatcherError::Timeout(ms) => MatcherError::Timeout(*ms),
        MatcherError::Provider { message, retryable } => MatcherError::Provider {
            message: message.clone(),
            retryable: *retryable,
        },
        MatcherError::Validation(message) => MatcherError::Validation(message.clone()),
        other => MatcherError::provider(other.to_string(), false),
    }
}
