//! Rule-based mapping of taxonomy labels and role text to canonical tags

use crate::error::{MatcherError, Result};
use crate::model::{CategoryTagSet, JobPosting};
use log::info;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Matching rules for a single canonical tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRule {
    /// Substrings of the occupation-field label.
    pub fields: Vec<String>,
    /// Substrings of the occupation-group label.
    pub groups: Vec<String>,
    /// Whole-word keywords in role text.
    pub roles_contains: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRuleTable {
    pub rules: BTreeMap<String, CategoryRule>,
}

impl CategoryRuleTable {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MatcherError::Configuration(format!(
                "Cannot read category map {}: {}",
                path.display(),
                e
            ))
        })?;
        let table = Self::from_json_str(&content)?;
        info!("Loaded {} category rules from {}", table.rules.len(), path.display());
        Ok(table)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| MatcherError::Configuration(format!("Invalid category map: {}", e)))
    }
}

struct CompiledRule {
    tag: String,
    fields: Vec<String>,
    groups: Vec<String>,
    roles: Option<Regex>,
    /// Role, field and group words together, for free-text candidate tagging.
    keywords: Option<Regex>,
}

pub struct CategoryTagger {
    rules: Vec<CompiledRule>,
}

impl CategoryTagger {
    pub fn new(table: &CategoryRuleTable) -> Result<Self> {
        let rules = table
            .rules
            .iter()
            .map(|(tag, rule)| {
                let mut all_words = rule.roles_contains.clone();
                all_words.extend(rule.fields.iter().cloned());
                all_words.extend(rule.groups.iter().cloned());

                Ok(CompiledRule {
                    tag: tag.clone(),
                    fields: lowercase_all(&rule.fields),
                    groups: lowercase_all(&rule.groups),
                    roles: whole_word_regex(&rule.roles_contains)?,
                    keywords: whole_word_regex(&all_words)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn tag_count(&self) -> usize {
        self.rules.len()
    }

    pub fn tag_job(&self, job: &JobPosting) -> CategoryTagSet {
        self.tag_labels(
            job.occupation_field.as_deref(),
            job.occupation_group.as_deref(),
            &job.role_text(),
        )
    }

    /// A tag applies when any of its field, group or role rules hits.
    pub fn tag_labels(&self, field: Option<&str>, group: Option<&str>, role_text: &str) -> CategoryTagSet {
        let field = field.unwrap_or_default().to_lowercase();
        let group = group.unwrap_or_default().to_lowercase();

        self.rules
            .iter()
            .filter(|rule| {
                (!field.is_empty() && rule.fields.iter().any(|f| field.contains(f.as_str())))
                    || (!group.is_empty() && rule.groups.iter().any(|g| group.contains(g.as_str())))
                    || rule.roles.as_ref().map_or(false, |re| re.is_match(role_text))
            })
            .map(|rule| rule.tag.clone())
            .collect()
    }

    /// Tag free candidate text using every rule word as a whole-word keyword.
    pub fn tag_candidate(&self, text: &str) -> CategoryTagSet {
        self.rules
            .iter()
            .filter(|rule| rule.keywords.as_ref().map_or(false, |re| re.is_match(text)))
            .map(|rule| rule.tag.clone())
            .collect()
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn whole_word_regex(words: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }

    RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| MatcherError::Configuration(format!("Invalid category keyword: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"{
        "it": {"fields": ["Data/IT"], "groups": ["Mjukvaru"], "roles_contains": ["utvecklare", "developer"]},
        "logistics": {"fields": ["Transport"], "groups": ["Lager"], "roles_contains": ["lagerarbetare", "truckförare"]},
        "health": {"fields": ["Hälso- och sjukvård"], "roles_contains": ["sjuksköterska"]}
    }"#;

    fn tagger() -> CategoryTagger {
        CategoryTagger::new(&CategoryRuleTable::from_json_str(MAP).unwrap()).unwrap()
    }

    #[test]
    fn test_field_label_substring_hits() {
        let tags = tagger().tag_labels(Some("Data/IT"), None, "");
        assert_eq!(tags.to_vec(), vec!["it"]);
    }

    #[test]
    fn test_role_keyword_requires_whole_word() {
        let tagger = tagger();
        assert!(tagger.tag_labels(None, None, "Vi söker en Utvecklare").contains("it"));
        assert!(tagger.tag_labels(None, None, "Systemutvecklare").is_empty());
    }

    #[test]
    fn test_multiple_tags_sorted() {
        let tags = tagger().tag_labels(
            Some("Transport, distribution, lager"),
            Some("Lagerpersonal"),
            "Sjuksköterska",
        );
        assert_eq!(tags.to_vec(), vec!["health", "logistics"]);
    }

    #[test]
    fn test_tag_job_uses_labels_and_headline() {
        let job = JobPosting {
            id: "1".into(),
            headline: "Truckförare till nattskift".into(),
            ..Default::default()
        };
        assert_eq!(tagger().tag_job(&job).to_vec(), vec!["logistics"]);
    }

    #[test]
    fn test_candidate_text_matches_field_words() {
        let tags = tagger().tag_candidate("Erfaren developer inom data/it och lager");
        assert_eq!(tags.to_vec(), vec!["it", "logistics"]);
    }

    #[test]
    fn test_tagging_is_deterministic() {
        let tagger = tagger();
        let job = JobPosting {
            id: "2".into(),
            headline: "Lagerarbetare".into(),
            occupation_field: Some("Data/IT".into()),
            ..Default::default()
        };
        assert_eq!(tagger.tag_job(&job), tagger.tag_job(&job));
    }

    #[test]
    fn test_unparsable_map_is_configuration_error() {
        assert!(matches!(
            CategoryRuleTable::from_json_str("{not json"),
            Err(MatcherError::Configuration(_))
        ));
        assert!(matches!(
            CategoryRuleTable::load(Path::new("/nonexistent/category_map.json")),
            Err(MatcherError::Configuration(_))
        ));
    }
}
