//! Query parameters and explainable match results

use crate::config::{MatchingConfig, RequirementPolicyKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which candidate vector drives similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorChoice {
    Profile,
    Wish,
    /// Highest similarity over profile, wish and persona vectors.
    Best,
}

impl VectorChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorChoice::Profile => "profile",
            VectorChoice::Wish => "wish",
            VectorChoice::Best => "best",
        }
    }
}

impl std::str::FromStr for VectorChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profile" => Ok(VectorChoice::Profile),
            "wish" => Ok(VectorChoice::Wish),
            "best" => Ok(VectorChoice::Best),
            other => Err(format!("Unknown vector choice: {}. Use profile, wish or best", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequirementPolicy {
    pub kind: RequirementPolicyKind,
    pub penalty_per_gap: f32,
    pub max_penalty: f32,
    pub bonus_per_nice_match: f32,
    pub max_bonus: f32,
    pub hard_min_confidence: f32,
    pub fuzzy_skill_threshold: f32,
}

impl From<&MatchingConfig> for RequirementPolicy {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            kind: config.requirement_policy,
            penalty_per_gap: config.penalty_per_gap,
            max_penalty: config.max_penalty,
            bonus_per_nice_match: config.bonus_per_nice_match,
            max_bonus: config.max_bonus,
            hard_min_confidence: config.hard_min_confidence,
            fuzzy_skill_threshold: config.fuzzy_skill_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    /// Explicit radius; falls back to the candidate's own radius.
    pub radius_km: Option<f64>,
    /// Used when the candidate has coordinates but no radius anywhere.
    pub default_radius_km: f64,
    pub top_k: usize,
    pub category_gate: bool,
    pub bypass_ungated: bool,
    pub include_unknown_location: bool,
    pub vector_choice: VectorChoice,
    pub min_similarity: Option<f32>,
    pub policy: RequirementPolicy,
    pub now: DateTime<Utc>,
}

impl MatchQuery {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            radius_km: None,
            default_radius_km: config.default_radius_km,
            top_k: config.top_k,
            category_gate: true,
            bypass_ungated: config.bypass_ungated,
            include_unknown_location: config.include_unknown_location,
            vector_choice: VectorChoice::Profile,
            min_similarity: config.min_similarity,
            policy: RequirementPolicy::from(config),
            now: Utc::now(),
        }
    }
}

impl Default for MatchQuery {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFlag {
    /// Passed the category gate only because of the bypass.
    Ungated,
    UnknownLocation,
    /// Hard policy applied as soft because the job's parse confidence was low.
    HardPolicySoftened,
    /// Candidate asserted no attributes, so requirements were not compared.
    RequirementsUnchecked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    Skill,
    License,
    Certification,
    Language,
    Education,
    Experience,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementGap {
    pub kind: GapKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Category,
    Geo,
    Vector,
    Requirement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub job_id: String,
    pub similarity: f32,
    pub adjusted_score: f32,
    pub distance_km: Option<f64>,
    pub gates_passed: Vec<Gate>,
    pub matched_tags: Vec<String>,
    pub requirement_gaps: Vec<RequirementGap>,
    pub nice_matches: usize,
    pub flags: Vec<MatchFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Jobs remaining after each stage, plus skip counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub considered: usize,
    pub inactive: usize,
    pub after_category: usize,
    pub after_geo: usize,
    pub missing_vector: usize,
    pub after_vector: usize,
    pub below_min_similarity: usize,
    pub excluded_by_requirements: usize,
    pub returned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate_id: String,
    pub entries: Vec<MatchEntry>,
    pub counts: StageCounts,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn job_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.job_id.as_str()).collect()
    }
}
