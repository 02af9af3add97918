//! Candidate and job posting matching library

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod geocoding;
pub mod input;
pub mod matching;
pub mod model;
pub mod output;
pub mod processing;
pub mod storage;

pub use config::Config;
pub use error::{MatcherError, Result};
