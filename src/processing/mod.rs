//! Text processing: cleaning, chunking, pooling, requirement extraction and tagging

pub mod chunker;
pub mod normalizer;
pub mod reducer;
pub mod requirements;
pub mod tagger;
