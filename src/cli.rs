//! CLI interface for the job matcher

use crate::config::{OutputFormat, RequirementPolicyKind};
use crate::matching::VectorChoice;
use crate::storage::backfill::BackfillTarget;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "job-matcher")]
#[command(about = "Semantic candidate and job posting matching")]
#[command(long_about = "Extract requirements and categories from job postings, embed jobs and candidates, and rank jobs for a candidate through category, distance, similarity and requirement gates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store snapshot path (overrides storage.snapshot_path)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clean a job description and show its detected sections
    Normalize {
        /// Text file (TXT, MD)
        input: PathBuf,

        /// Output format: console, json
        #[arg(short, long, default_value = "console")]
        output: String,
    },

    /// Extract must-have and nice-to-have requirements
    Requirements {
        /// Stored job id
        #[arg(long, conflicts_with = "text")]
        job: Option<String>,

        /// Description text file instead of a stored job
        #[arg(long)]
        text: Option<PathBuf>,

        #[arg(short, long, default_value = "console")]
        output: String,
    },

    /// Show category tags for a stored job or a free-text profile
    Tag {
        #[arg(long, conflicts_with = "text")]
        job: Option<String>,

        #[arg(long)]
        text: Option<PathBuf>,
    },

    /// Import job and candidate records from JSON files
    Import {
        #[arg(long)]
        jobs: Option<PathBuf>,

        #[arg(long)]
        candidates: Option<PathBuf>,
    },

    /// Create or replace a candidate from a CV document
    Candidate {
        /// Candidate id
        id: String,

        /// CV file (PDF, TXT, MD)
        document: PathBuf,

        /// What the candidate is looking for
        #[arg(long)]
        wish: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        radius_km: Option<f64>,

        /// Allowed occupation fields (repeatable)
        #[arg(long = "field")]
        fields: Vec<String>,
    },

    /// Ingest job feed pages
    Ingest {
        /// Feed page JSON files
        #[arg(required = true)]
        pages: Vec<PathBuf>,

        /// The pages are a complete listing; deactivate stored jobs not in it
        #[arg(long)]
        complete: bool,

        #[arg(short, long, default_value = "console")]
        output: String,
    },

    /// Resolve coordinates for stored jobs with only a city
    Geocode {
        /// Query OpenStreetMap Nominatim for cities missing from the built-in table
        #[arg(long)]
        online: bool,

        #[arg(long, default_value = "https://nominatim.openstreetmap.org/search")]
        endpoint: String,
    },

    /// Recompute vectors and derived metadata for pending rows
    Backfill {
        /// jobs or candidates
        #[arg(value_parser = parse_backfill_target, default_value = "jobs")]
        target: BackfillTarget,

        /// Stop after this many pages, keeping the checkpoint
        #[arg(long)]
        max_pages: Option<usize>,

        /// Hide the progress spinner
        #[arg(long)]
        quiet: bool,

        #[arg(short, long, default_value = "console")]
        output: String,
    },

    /// Rank jobs for a candidate
    Match {
        /// Candidate id
        candidate: String,

        /// Search radius in kilometres
        #[arg(short, long)]
        radius: Option<f64>,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Candidate vector to compare: profile, wish, best
        #[arg(long, value_parser = parse_vector_choice, default_value = "profile")]
        vector: VectorChoice,

        /// Requirement policy: hard, soft, off
        #[arg(long, value_parser = parse_policy)]
        policy: Option<RequirementPolicyKind>,

        /// Minimum cosine similarity
        #[arg(long)]
        min_similarity: Option<f32>,

        /// Skip the category gate
        #[arg(long)]
        no_category_gate: bool,

        /// Admit jobs that carry no category tags
        #[arg(long)]
        bypass_ungated: bool,

        /// Keep jobs without coordinates
        #[arg(long)]
        include_unknown_location: bool,

        /// Include stage counts and extra detail
        #[arg(short, long)]
        detailed: bool,

        /// Output format: console, json
        #[arg(short, long, default_value = "console")]
        output: String,

        /// Save output to file
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Reset configuration to defaults
    Reset,
}

/// Parse and validate output format
pub fn parse_output_format(format: &str) -> Result<OutputFormat, String> {
    match format.to_lowercase().as_str() {
        "console" => Ok(OutputFormat::Console),
        "json" => Ok(OutputFormat::Json),
        _ => Err(format!("Invalid output format: {}. Supported: console, json", format)),
    }
}

fn parse_vector_choice(value: &str) -> Result<VectorChoice, String> {
    value.parse()
}

fn parse_policy(value: &str) -> Result<RequirementPolicyKind, String> {
    match value.to_lowercase().as_str() {
        "hard" => Ok(RequirementPolicyKind::Hard),
        "soft" => Ok(RequirementPolicyKind::Soft),
        "off" => Ok(RequirementPolicyKind::Off),
        _ => Err(format!("Invalid requirement policy: {}. Supported: hard, soft, off", value)),
    }
}

fn parse_backfill_target(value: &str) -> Result<BackfillTarget, String> {
    match value.to_lowercase().as_str() {
        "jobs" => Ok(BackfillTarget::Jobs),
        "candidates" => Ok(BackfillTarget::Candidates),
        _ => Err(format!("Invalid backfill target: {}. Supported: jobs, candidates", value)),
    }
}

/// Validate file extension
pub fn validate_file_extension(path: &Path, allowed_extensions: &[&str]) -> Result<(), String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => {
            if allowed_extensions.contains(&ext.to_lowercase().as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "Unsupported file extension: .{}. Allowed: {}",
                    ext,
                    allowed_extensions.join(", ")
                ))
            }
        }
        None => Err("File has no extension".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_arguments() {
        let cli = Cli::try_parse_from([
            "job-matcher",
            "match",
            "c1",
            "--radius",
            "25",
            "--vector",
            "best",
            "--policy",
            "hard",
            "-o",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Match {
                candidate,
                radius,
                vector,
                policy,
                output,
                ..
            } => {
                assert_eq!(candidate, "c1");
                assert_eq!(radius, Some(25.0));
                assert_eq!(vector, VectorChoice::Best);
                assert_eq!(policy, Some(RequirementPolicyKind::Hard));
                assert_eq!(parse_output_format(&output), Ok(OutputFormat::Json));
            }
            _ => panic!("expected match command"),
        }
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["job-matcher", "match", "c1", "--policy", "strict"]).is_err());
    }

    #[test]
    fn test_extension_validation() {
        assert!(validate_file_extension(Path::new("cv.PDF"), &["pdf", "txt"]).is_ok());
        assert!(validate_file_extension(Path::new("cv.docx"), &["pdf", "txt"]).is_err());
        assert!(validate_file_extension(Path::new("cv"), &["pdf"]).is_err());
    }
}
