//! Candidate and job posting records shared by every pipeline stage

use crate::processing::requirements::RequirementSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fixed-dimension embedding. Stored vectors are unit length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(pub Vec<f32>);

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn norm(&self) -> f32 {
        crate::processing::reducer::l2_norm(&self.0)
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Sorted set of canonical category tags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTagSet(BTreeSet<String>);

impl CategoryTagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>) {
        self.0.insert(tag.into());
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Tags present in both sets, in sorted order.
    pub fn intersection(&self, other: &CategoryTagSet) -> Vec<String> {
        self.0.intersection(&other.0).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for CategoryTagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateVectors {
    pub profile: Option<EmbeddingVector>,
    pub wish: Option<EmbeddingVector>,
    pub personas: Vec<EmbeddingVector>,
}

impl CandidateVectors {
    pub fn is_empty(&self) -> bool {
        self.profile.is_none() && self.wish.is_none() && self.personas.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &EmbeddingVector> {
        self.profile
            .iter()
            .chain(self.wish.iter())
            .chain(self.personas.iter())
    }
}

/// Skills, credentials and experience held by a candidate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateAttributes {
    pub skills: Vec<String>,
    pub licenses: Vec<String>,
    pub certifications: Vec<String>,
    pub languages: Vec<String>,
    pub education: Vec<String>,
    pub experience_years: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    pub id: String,
    pub source_text: String,
    pub wish_text: Option<String>,
    pub persona_texts: Vec<String>,
    pub vectors: CandidateVectors,
    pub category_tags: CategoryTagSet,
    pub allowed_fields: Vec<String>,
    pub location: Option<GeoPoint>,
    pub city: Option<String>,
    pub radius_km: Option<f64>,
    /// Attributes the candidate asserts about themselves. Never overwritten.
    pub attributes: Option<CandidateAttributes>,
    /// Attributes extracted from the CV text, recomputed on every enrichment.
    pub derived_attributes: Option<CandidateAttributes>,
    pub needs_reembedding: bool,
}

impl CandidateProfile {
    /// True when the texts that derived fields are computed from differ.
    pub fn source_differs(&self, other: &CandidateProfile) -> bool {
        self.source_text.trim() != other.source_text.trim()
            || self.wish_text.as_deref().map(str::trim) != other.wish_text.as_deref().map(str::trim)
            || self.persona_texts != other.persona_texts
    }

    /// Drop vectors, tags and extracted attributes and flag the row for recomputation.
    pub fn invalidate_derived(&mut self) {
        self.vectors = CandidateVectors::default();
        self.category_tags = CategoryTagSet::new();
        self.derived_attributes = None;
        self.needs_reembedding = true;
    }

    /// Asserted attributes merged over the extracted ones.
    ///
    /// `None` only when neither source has anything to compare.
    pub fn requirement_attributes(&self) -> Option<CandidateAttributes> {
        match (&self.attributes, &self.derived_attributes) {
            (None, None) => None,
            (Some(a), None) | (None, Some(a)) => Some(a.clone()),
            (Some(asserted), Some(derived)) => Some(CandidateAttributes {
                skills: merge_labels(&asserted.skills, &derived.skills),
                licenses: merge_labels(&asserted.licenses, &derived.licenses),
                certifications: merge_labels(&asserted.certifications, &derived.certifications),
                languages: merge_labels(&asserted.languages, &derived.languages),
                education: merge_labels(&asserted.education, &derived.education),
                experience_years: asserted.experience_years.or(derived.experience_years),
            }),
        }
    }
}

fn merge_labels(first: &[String], second: &[String]) -> Vec<String> {
    let mut merged = first.to_vec();
    for label in second {
        if !merged.iter().any(|m| m.eq_ignore_ascii_case(label)) {
            merged.push(label.clone());
        }
    }
    merged
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPosting {
    pub id: String,
    pub headline: String,
    pub description_text: String,
    /// Raw structured snapshot from the feed. Parsed leniently.
    pub snapshot: Option<serde_json::Value>,
    pub occupation_field: Option<String>,
    pub occupation_group: Option<String>,
    pub occupation: Option<String>,
    pub employer_name: Option<String>,
    pub city: Option<String>,
    pub location: Option<GeoPoint>,
    pub published_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub driving_license_required: bool,
    pub vector: Option<EmbeddingVector>,
    pub category_tags: Option<CategoryTagSet>,
    pub requirements: Option<RequirementSet>,
    pub needs_reembedding: bool,
}

impl Default for JobPosting {
    fn default() -> Self {
        Self {
            id: String::new(),
            headline: String::new(),
            description_text: String::new(),
            snapshot: None,
            occupation_field: None,
            occupation_group: None,
            occupation: None,
            employer_name: None,
            city: None,
            location: None,
            published_at: None,
            deadline: None,
            is_active: true,
            driving_license_required: false,
            vector: None,
            category_tags: None,
            requirements: None,
            needs_reembedding: false,
        }
    }
}

impl JobPosting {
    /// Active and not past its application deadline.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.deadline.map_or(true, |deadline| deadline >= now)
    }

    /// True when the text that derived fields are computed from differs.
    pub fn source_differs(&self, other: &JobPosting) -> bool {
        self.headline.trim() != other.headline.trim()
            || self.description_text.trim() != other.description_text.trim()
            || self.snapshot != other.snapshot
            || self.occupation_field != other.occupation_field
            || self.occupation_group != other.occupation_group
            || self.occupation != other.occupation
    }

    /// Null every derived field and flag the row for recomputation.
    pub fn invalidate_derived(&mut self) {
        self.vector = None;
        self.requirements = None;
        self.category_tags = None;
        self.needs_reembedding = true;
    }

    pub fn needs_processing(&self) -> bool {
        self.vector.is_none() || self.needs_reembedding
    }

    /// Role text used for whole-word category matching.
    pub fn role_text(&self) -> String {
        [self.occupation.as_deref(), Some(self.headline.as_str())]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Everything recomputed for a job in one pass, written as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedJobData {
    pub vector: EmbeddingVector,
    pub requirements: RequirementSet,
    pub category_tags: CategoryTagSet,
}
