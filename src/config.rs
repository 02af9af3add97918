//! Configuration management for the job matcher
//!
//! A `Config` is built once at startup and passed by reference into every
//! component; nothing reads process state after that.

use crate::error::{MatcherError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub processing: ProcessingConfig,
    pub matching: MatchingConfig,
    pub taxonomy: TaxonomyConfig,
    pub storage: StorageConfig,
    pub backfill: BackfillConfig,
    pub feed: FeedConfig,
    pub geocoding: GeocodingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Prepended to every chunk so documents share one similarity space.
    pub document_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub chunk_chars: usize,
    pub overlap_chars: usize,
    pub max_chunks: usize,
    pub min_text_chars: usize,
    pub signal_min_chars: usize,
    pub max_text_chars: usize,
    pub boilerplate_patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementPolicyKind {
    /// Unmet must-haves exclude the job.
    Hard,
    /// Unmet must-haves lower the score.
    Soft,
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub default_radius_km: f64,
    pub top_k: usize,
    pub bypass_ungated: bool,
    pub include_unknown_location: bool,
    pub requirement_policy: RequirementPolicyKind,
    pub penalty_per_gap: f32,
    pub max_penalty: f32,
    pub bonus_per_nice_match: f32,
    pub max_bonus: f32,
    /// Below this parse confidence a hard policy degrades to soft.
    pub hard_min_confidence: f32,
    pub fuzzy_skill_threshold: f32,
    pub min_similarity: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    pub category_map_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot holding jobs and candidates.
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    pub page_size: usize,
    pub checkpoint_path: PathBuf,
    pub only_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// A complete listing with fewer live ids than this is treated as a feed outage.
    pub min_active_ids: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub min_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub detailed: bool,
    pub color_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Console,
    Json,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/embed".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            timeout_secs: 180,
            batch_size: 32,
            max_concurrency: 4,
            max_retries: 3,
            backoff_base_ms: 500,
            document_prefix: Some("search_document:".to_string()),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 1800,
            overlap_chars: 250,
            max_chunks: 10,
            min_text_chars: 80,
            signal_min_chars: 40,
            max_text_chars: 12000,
            boilerplate_patterns: vec![
                r"öppen för alla".to_string(),
                r"vi fokuserar på din kompetens".to_string(),
                r"var ligger arbetsplatsen".to_string(),
                r"^postadress".to_string(),
                r"^ansök".to_string(),
                r"^sök jobbet".to_string(),
                r"arbetsgivaren har tagit bort annonsen".to_string(),
            ],
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 50.0,
            top_k: 20,
            bypass_ungated: false,
            include_unknown_location: false,
            requirement_policy: RequirementPolicyKind::Soft,
            penalty_per_gap: 0.05,
            max_penalty: 0.25,
            bonus_per_nice_match: 0.02,
            max_bonus: 0.10,
            hard_min_confidence: 0.5,
            fuzzy_skill_threshold: 0.92,
            min_similarity: None,
        }
    }
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            category_map_path: Self::default_dir().join("category_map.json"),
        }
    }
}

impl TaxonomyConfig {
    fn default_dir() -> PathBuf {
        Config::config_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: TaxonomyConfig::default_dir().join("store.json"),
        }
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            checkpoint_path: TaxonomyConfig::default_dir().join("backfill_checkpoint.json"),
            only_active: true,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            min_active_ids: 10_000,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Console,
            detailed: false,
            color_output: true,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. When no path is given and the default
    /// file is missing, defaults are written there and returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(MatcherError::Configuration(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    let config = Self::default();
                    config.save_to(&default_path)?;
                    config
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MatcherError::Configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            MatcherError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("job-matcher")
            .join("config.toml")
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.processing;
        if p.chunk_chars == 0 || p.chunk_chars <= p.overlap_chars {
            return Err(MatcherError::Configuration(format!(
                "processing.chunk_chars ({}) must be greater than processing.overlap_chars ({})",
                p.chunk_chars, p.overlap_chars
            )));
        }
        if p.max_chunks == 0 {
            return Err(MatcherError::Configuration(
                "processing.max_chunks must be at least 1".to_string(),
            ));
        }

        let e = &self.embedding;
        if e.dimensions == 0 {
            return Err(MatcherError::Configuration(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        if e.batch_size == 0 || e.max_concurrency == 0 {
            return Err(MatcherError::Configuration(
                "embedding.batch_size and embedding.max_concurrency must be positive".to_string(),
            ));
        }
        if e.timeout_secs == 0 {
            return Err(MatcherError::Configuration(
                "embedding.timeout_secs must be finite and positive".to_string(),
            ));
        }

        let m = &self.matching;
        if m.default_radius_km < 0.0 {
            return Err(MatcherError::Configuration(
                "matching.default_radius_km cannot be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&m.fuzzy_skill_threshold) {
            return Err(MatcherError::Configuration(
                "matching.fuzzy_skill_threshold must be within 0..=1".to_string(),
            ));
        }
        if m.max_penalty < 0.0 || m.max_bonus < 0.0 {
            return Err(MatcherError::Configuration(
                "matching penalty and bonus caps cannot be negative".to_string(),
            ));
        }

        if self.geocoding.min_interval_ms < 1000 {
            return Err(MatcherError::Configuration(
                "geocoding.min_interval_ms must be at least 1000".to_string(),
            ));
        }

        if self.backfill.page_size == 0 {
            return Err(MatcherError::Configuration(
                "backfill.page_size must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
