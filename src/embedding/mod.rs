//! Embedding provider contract, batched pipeline and document enrichment

pub mod enricher;
pub mod pipeline;
pub mod provider;

pub use enricher::Enricher;
pub use pipeline::EmbeddingPipeline;
pub use provider::{EmbeddingProvider, HttpEmbeddingProvider};
