//! Deterministic must-have / nice-to-have requirement extraction

use crate::error::{MatcherError, Result};
use crate::model::{CandidateAttributes, JobPosting};
use crate::processing::normalizer::fold;
use aho_corasick::{AhoCorasick, MatchKind};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageStrength {
    Required,
    Preferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageRequirement {
    pub language: String,
    pub strength: LanguageStrength,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementBucket {
    pub skills: Vec<String>,
    pub licenses: Vec<String>,
    pub certifications: Vec<String>,
    pub languages: Vec<LanguageRequirement>,
    pub education: Vec<String>,
    /// Occupation labels from structured work-experience fields.
    pub work_experience: Vec<String>,
    pub min_experience_years: Option<u32>,
}

impl RequirementBucket {
    pub fn is_empty(&self) -> bool {
        self.category_count() == 0
    }

    /// Number of distinct non-empty signal categories.
    pub fn category_count(&self) -> usize {
        [
            !self.skills.is_empty(),
            !self.licenses.is_empty(),
            !self.certifications.is_empty(),
            !self.languages.is_empty(),
            !self.education.is_empty(),
            self.min_experience_years.is_some() || !self.work_experience.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn language_names(&self) -> Vec<String> {
        self.languages.iter().map(|l| l.language.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFlag {
    StructuredMustHaveSkillsEmpty,
    StructuredMustHaveEducationEmpty,
    StructuredMustHaveLanguagesEmpty,
    StructuredMustHaveDrivingLicenseEmpty,
    StructuredNiceToHaveSkillsEmpty,
    DescriptionTextMissing,
    StructuredSnapshotMalformed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementSources {
    pub structured_present: bool,
    pub description_used: bool,
    pub must_lines: usize,
    pub nice_lines: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementSet {
    pub must_have: RequirementBucket,
    pub nice_to_have: RequirementBucket,
    pub parse_confidence: f32,
    pub missing_flags: Vec<MissingFlag>,
    pub driving_license_required: bool,
    pub sources: RequirementSources,
}

impl RequirementSet {
    pub fn signal_categories(&self) -> usize {
        self.must_have.category_count() + self.nice_to_have.category_count()
    }
}

/// Confidence grows with the number of signal categories found.
pub fn confidence_for(categories: usize, has_description: bool) -> f32 {
    let confidence = (0.2 + 0.1 * categories as f32).min(1.0);
    if has_description {
        confidence
    } else {
        confidence.min(0.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineBucket {
    Neutral,
    Must,
    Nice,
}

/// Extracts requirement sets from job text and structured snapshots.
pub struct RequirementExtractor {
    must_headings: Vec<Regex>,
    nice_headings: Vec<Regex>,
    licenses: Vec<(Regex, &'static str)>,
    certifications: Vec<(Regex, &'static str)>,
    education: Vec<(Regex, &'static str)>,
    languages: Vec<(Regex, &'static str)>,
    skill_matcher: AhoCorasick,
    skill_labels: Vec<&'static str>,
    years_regex: Regex,
    max_text_chars: usize,
}

impl RequirementExtractor {
    pub fn new(max_text_chars: usize) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                MatcherError::Configuration(format!("Invalid requirement pattern '{}': {}", pattern, e))
            })
        };
        let compile_table = |table: &[(&str, &'static str)]| {
            table
                .iter()
                .map(|(pattern, label)| Ok((compile(pattern)?, *label)))
                .collect::<Result<Vec<_>>>()
        };

        let must_headings = [
            r"^krav\b",
            r"^kvalifikationer\b",
            r"^vi\s+soker\b",
            r"^vi\s+soeker\b",
            r"^du\s+har\b",
            r"^your\s+qualifications\b",
            r"^requirements\b",
            r"^must[\s-]+have\b",
        ]
        .iter()
        .map(|p| compile(p))
        .collect::<Result<Vec<_>>>()?;

        let nice_headings = [
            r"^meriterande\b",
            r"^det\s+ar\s+meriterande\b",
            r"^nice\s+to\s+have\b",
            r"^preferred\b",
            r"^bonus\b",
        ]
        .iter()
        .map(|p| compile(p))
        .collect::<Result<Vec<_>>>()?;

        let (skill_patterns, skill_labels): (Vec<&str>, Vec<&'static str>) =
            Self::skill_vocabulary().into_iter().unzip();
        let skill_matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&skill_patterns)
            .map_err(|e| {
                MatcherError::Configuration(format!("Failed to build skill matcher: {}", e))
            })?;

        Ok(Self {
            must_headings,
            nice_headings,
            licenses: compile_table(&[
                (r"\bb[-\s]?kor[kc]ort\b", "B-körkort"),
                (r"\bkorkort\b", "Körkort"),
                (r"\btruckkort\b", "Truckkort"),
                (r"\btraverskort\b", "Traverskort"),
                (r"\bc[-\s]?korkort\b", "C-körkort"),
                (r"\bce[-\s]?korkort\b", "CE-körkort"),
            ])?,
            certifications: compile_table(&[
                (r"\bheta\s+arbeten\b", "Heta arbeten"),
                (r"\bsaker\s+vatten\b", "Säker vatten"),
                (r"\besa\b", "ESA"),
                (r"\bfallskydd\b", "Fallskydd"),
                (r"\bscada\b", "SCADA"),
                (r"\bplc\b", "PLC"),
                (r"\bhaccp\b", "HACCP"),
                (r"\biso\s*9001\b", "ISO 9001"),
                (r"\biso\s*14001\b", "ISO 14001"),
            ])?,
            education: compile_table(&[
                (r"\bgymnasieutbildning\b", "Gymnasieutbildning"),
                (r"\byrkeshogskola\b", "Yrkeshögskola"),
                (r"\bhogskoleutbildning\b", "Högskoleutbildning"),
                (r"\buniversitetsutbildning\b", "Universitetsutbildning"),
                (r"\bcivilingenjor\b", "Civilingenjör"),
                (r"\bsjukskotersk(e|a)\b", "Sjuksköterskeutbildning"),
            ])?,
            languages: compile_table(&[
                (r"\bsvenska\b", "svenska"),
                (r"\bswedish\b", "svenska"),
                (r"\bengelska\b", "engelska"),
                (r"\benglish\b", "engelska"),
                (r"\btyska\b", "tyska"),
                (r"\bfinska\b", "finska"),
            ])?,
            skill_matcher,
            skill_labels,
            years_regex: compile(r"\b(\d{1,2})\s*\+?\s*(?:ars?|years?)\b")?,
            max_text_chars,
        })
    }

    /// Extract a requirement set for a job posting. Never fails.
    pub fn extract(&self, job: &JobPosting) -> RequirementSet {
        self.extract_parts(
            &job.description_text,
            job.snapshot.as_ref(),
            job.driving_license_required,
        )
    }

    pub fn extract_parts(
        &self,
        description_text: &str,
        snapshot: Option<&Value>,
        driving_license_flag: bool,
    ) -> RequirementSet {
        let mut flags: HashSet<MissingFlag> = HashSet::new();

        let snapshot = match snapshot.map(parse_snapshot).transpose() {
            Ok(snapshot) => snapshot.flatten(),
            Err(e) => {
                warn!("Treating structured snapshot as absent: {}", e);
                flags.insert(MissingFlag::StructuredSnapshotMalformed);
                None
            }
        };

        let must_struct = snapshot.as_ref().and_then(|s| s.get("must_have")).filter(|v| v.is_object());
        let nice_struct = snapshot.as_ref().and_then(|s| s.get("nice_to_have")).filter(|v| v.is_object());

        let structured_description = snapshot
            .as_ref()
            .and_then(|s| s.get("description"))
            .and_then(|d| {
                d.get("text_formatted")
                    .and_then(Value::as_str)
                    .filter(|t| !t.trim().is_empty())
                    .or_else(|| d.get("text").and_then(Value::as_str))
            })
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let raw_text = structured_description.unwrap_or_else(|| description_text.trim());
        let capped: String = raw_text.chars().take(self.max_text_chars).collect();
        let lines = split_lines(&capped);
        let has_description = !lines.is_empty();

        let (must_lines, nice_lines, neutral_lines) = self.classify_lines(&lines);
        let mut must_scan_lines = must_lines.clone();
        must_scan_lines.extend(neutral_lines);
        let must_scan = self.scan_lines(&must_scan_lines, LanguageStrength::Required);
        let nice_scan = self.scan_lines(&nice_lines, LanguageStrength::Preferred);

        let must_have = merge_bucket(
            structured_bucket(must_struct, LanguageStrength::Required),
            must_scan,
        );
        let nice_to_have = merge_bucket(
            structured_bucket(nice_struct, LanguageStrength::Preferred),
            nice_scan,
        );

        if labeled_values(must_struct.and_then(|m| m.get("skills"))).is_empty() {
            flags.insert(MissingFlag::StructuredMustHaveSkillsEmpty);
        }
        if labeled_values(must_struct.and_then(|m| m.get("education"))).is_empty() {
            flags.insert(MissingFlag::StructuredMustHaveEducationEmpty);
        }
        if labeled_values(must_struct.and_then(|m| m.get("languages"))).is_empty() {
            flags.insert(MissingFlag::StructuredMustHaveLanguagesEmpty);
        }
        if labeled_values(must_struct.and_then(|m| m.get("driving_license"))).is_empty() {
            flags.insert(MissingFlag::StructuredMustHaveDrivingLicenseEmpty);
        }
        if labeled_values(nice_struct.and_then(|m| m.get("skills"))).is_empty() {
            flags.insert(MissingFlag::StructuredNiceToHaveSkillsEmpty);
        }
        if !has_description {
            flags.insert(MissingFlag::DescriptionTextMissing);
        }

        let snapshot_flag = snapshot
            .as_ref()
            .and_then(|s| s.get("driving_license_required"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let driving_license_required = driving_license_flag
            || snapshot_flag
            || must_have
                .licenses
                .iter()
                .any(|l| matches!(fold(l).as_str(), "b-korkort" | "korkort"));

        let mut missing_flags: Vec<MissingFlag> = flags.into_iter().collect();
        missing_flags.sort();

        let mut set = RequirementSet {
            must_have,
            nice_to_have,
            parse_confidence: 0.0,
            missing_flags,
            driving_license_required,
            sources: RequirementSources {
                structured_present: must_struct.is_some() || nice_struct.is_some(),
                description_used: has_description,
                must_lines: must_lines.len(),
                nice_lines: nice_lines.len(),
            },
        };
        set.parse_confidence = confidence_for(set.signal_categories(), has_description);

        debug!(
            "Extracted requirements: {} signal categories, confidence {:.2}",
            set.signal_categories(),
            set.parse_confidence
        );
        set
    }

    /// Scan free text with no heading classification, e.g. a CV.
    pub fn scan_text(&self, text: &str) -> RequirementBucket {
        let capped: String = text.chars().take(self.max_text_chars).collect();
        let lines = split_lines(&capped);
        self.scan_lines(&lines, LanguageStrength::Required)
    }

    /// Derive candidate attributes from CV text.
    pub fn candidate_attributes(&self, text: &str) -> CandidateAttributes {
        let bucket = self.scan_text(text);
        CandidateAttributes {
            languages: bucket.language_names(),
            skills: bucket.skills,
            licenses: bucket.licenses,
            certifications: bucket.certifications,
            education: bucket.education,
            experience_years: bucket.min_experience_years,
        }
    }

    fn classify_lines(&self, lines: &[String]) -> (Vec<String>, Vec<String>, Vec<String>) {
        let mut must = Vec::new();
        let mut nice = Vec::new();
        let mut neutral = Vec::new();
        let mut bucket = LineBucket::Neutral;

        for line in lines {
            let folded = fold(line);

            let heading = self
                .nice_headings
                .iter()
                .find_map(|re| re.find(&folded).map(|m| (LineBucket::Nice, m.end())))
                .or_else(|| {
                    self.must_headings
                        .iter()
                        .find_map(|re| re.find(&folded).map(|m| (LineBucket::Must, m.end())))
                });

            let content = match heading {
                Some((next, end)) => {
                    bucket = next;
                    let remainder = folded[end..]
                        .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace())
                        .trim();
                    if remainder.is_empty() {
                        continue;
                    }
                    remainder.to_string()
                }
                None => folded,
            };

            match bucket {
                LineBucket::Must => must.push(content),
                LineBucket::Nice => nice.push(content),
                LineBucket::Neutral => neutral.push(content),
            }
        }

        (must, nice, neutral)
    }

    fn scan_lines(&self, lines: &[String], strength: LanguageStrength) -> RequirementBucket {
        if lines.is_empty() {
            return RequirementBucket::default();
        }
        let text = fold(&lines.join("\n"));

        let scan = |table: &[(Regex, &'static str)]| -> Vec<String> {
            let mut found: Vec<String> = table
                .iter()
                .filter(|(re, _)| re.is_match(&text))
                .map(|(_, label)| label.to_string())
                .collect();
            found.sort();
            found.dedup();
            found
        };

        let mut licenses = scan(&self.licenses);
        // A specific licence class subsumes the generic mention it contains.
        if licenses.len() > 1 {
            licenses.retain(|l| l != "Körkort");
        }

        let languages = scan(&self.languages)
            .into_iter()
            .map(|language| LanguageRequirement { language, strength })
            .collect();

        let min_experience_years = self
            .years_regex
            .captures_iter(&text)
            .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<u32>().ok()))
            .max();

        RequirementBucket {
            skills: self.find_skills(&text),
            licenses,
            certifications: scan(&self.certifications),
            languages,
            education: scan(&self.education),
            work_experience: Vec::new(),
            min_experience_years,
        }
    }

    /// Whole-word skill vocabulary hits, as display labels.
    fn find_skills(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = self
            .skill_matcher
            .find_iter(text)
            .filter(|m| is_word_boundary(text, m.start(), m.end()))
            .map(|m| self.skill_labels[m.pattern().as_usize()].to_string())
            .collect();
        found.sort_by_key(|s| s.to_lowercase());
        found.dedup();
        found
    }

    fn skill_vocabulary() -> Vec<(&'static str, &'static str)> {
        vec![
            ("excel", "Excel"),
            ("sap", "SAP"),
            ("sql", "SQL"),
            ("python", "Python"),
            ("java", "Java"),
            ("javascript", "JavaScript"),
            ("typescript", "TypeScript"),
            ("react", "React"),
            ("next.js", "Next.js"),
            ("node", "Node.js"),
            ("node.js", "Node.js"),
            ("docker", "Docker"),
            ("kubernetes", "Kubernetes"),
            ("linux", "Linux"),
            ("wms", "WMS"),
            ("erp", "ERP"),
            ("scada", "SCADA"),
            ("plc", "PLC"),
            ("autocad", "AutoCAD"),
            ("solidworks", "SolidWorks"),
            ("cad", "CAD"),
            ("svets", "Svetsning"),
            ("cnc", "CNC"),
            ("lean", "Lean"),
            ("kanban", "Kanban"),
            ("scrum", "Scrum"),
            ("rust", "Rust"),
        ]
    }
}

impl Default for RequirementExtractor {
    fn default() -> Self {
        Self::new(12_000).expect("Failed to create default requirement extractor")
    }
}

/// Accept a JSON object or a string holding one; anything else is corrupt.
fn parse_snapshot(value: &Value) -> Result<Option<Value>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(_) => Ok(Some(value.clone())),
        Value::String(raw) if raw.trim().is_empty() => Ok(None),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ Value::Object(_)) => Ok(Some(parsed)),
            Ok(_) => Err(MatcherError::DataIntegrity(
                "snapshot string does not contain an object".to_string(),
            )),
            Err(e) => Err(MatcherError::DataIntegrity(format!(
                "snapshot string is not valid JSON: {}",
                e
            ))),
        },
        other => Err(MatcherError::DataIntegrity(format!(
            "snapshot has unexpected type: {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `label`, then `value`, then bare strings, in input order.
fn labeled_values(items: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = items else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) => map
                .get("label")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .or_else(|| map.get("value").and_then(Value::as_str)),
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn structured_bucket(section: Option<&Value>, strength: LanguageStrength) -> RequirementBucket {
    let Some(section) = section else {
        return RequirementBucket::default();
    };
    RequirementBucket {
        skills: labeled_values(section.get("skills")),
        licenses: labeled_values(section.get("driving_license")),
        certifications: Vec::new(),
        languages: labeled_values(section.get("languages"))
            .into_iter()
            .map(|language| LanguageRequirement { language, strength })
            .collect(),
        education: labeled_values(section.get("education")),
        work_experience: labeled_values(section.get("work_experiences")),
        min_experience_years: None,
    }
}

/// Case-insensitive union keeping the first spelling seen, sorted.
fn union_ci(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = first
        .into_iter()
        .chain(second)
        .filter(|v| seen.insert(fold(v)))
        .collect();
    out.sort_by_key(|v| fold(v));
    out
}

fn merge_bucket(structured: RequirementBucket, scanned: RequirementBucket) -> RequirementBucket {
    let strength = structured
        .languages
        .first()
        .or(scanned.languages.first())
        .map(|l| l.strength)
        .unwrap_or(LanguageStrength::Required);
    let languages = union_ci(structured.language_names(), scanned.language_names())
        .into_iter()
        .map(|language| LanguageRequirement { language, strength })
        .collect();

    RequirementBucket {
        skills: union_ci(structured.skills, scanned.skills),
        licenses: union_ci(structured.licenses, scanned.licenses),
        certifications: union_ci(structured.certifications, scanned.certifications),
        languages,
        education: union_ci(structured.education, scanned.education),
        work_experience: union_ci(structured.work_experience, scanned.work_experience),
        min_experience_years: structured.min_experience_years.max(scanned.min_experience_years),
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.replace('\0', "")
        .replace('\r', "\n")
        .lines()
        .map(|l| l.trim_matches(|c: char| c == '-' || c == '•' || c == '*' || c.is_whitespace()))
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map(char::is_alphanumeric).unwrap_or(false)
        && !after.map(char::is_alphanumeric).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_headings_split_buckets() {
        let extractor = RequirementExtractor::default();
        let set = extractor.extract_parts("Krav: Python, SQL\nMeriterande: Docker", None, false);

        assert_eq!(set.must_have.skills, vec!["Python", "SQL"]);
        assert_eq!(set.nice_to_have.skills, vec!["Docker"]);
        assert!(set.parse_confidence >= 0.3);
        assert_eq!(set.sources.must_lines, 1);
        assert_eq!(set.sources.nice_lines, 1);
    }

    #[test]
    fn test_heading_on_own_line_applies_to_following_lines() {
        let extractor = RequirementExtractor::default();
        let text = "Om jobbet\nDu arbetar i lagret.\nVi söker dig som\n- har B-körkort\n- minst 3 års erfarenhet\n- talar svenska\nDet är meriterande\n- truckkort";
        let set = extractor.extract_parts(text, None, false);

        assert_eq!(set.must_have.licenses, vec!["B-körkort"]);
        assert_eq!(set.must_have.min_experience_years, Some(3));
        assert_eq!(set.must_have.language_names(), vec!["svenska"]);
        assert_eq!(set.nice_to_have.licenses, vec!["Truckkort"]);
        assert!(set.driving_license_required);
    }

    #[test]
    fn test_structured_values_merge_case_insensitively() {
        let extractor = RequirementExtractor::default();
        let snapshot = json!({
            "must_have": {
                "skills": [{"label": "python"}, {"value": "Lagerarbete"}, "Truckvana"],
                "languages": [{"label": "Svenska"}]
            },
            "nice_to_have": {"skills": []}
        });
        let set = extractor.extract_parts("Krav: Python och svenska", Some(&snapshot), false);

        assert_eq!(set.must_have.skills, vec!["Lagerarbete", "python", "Truckvana"]);
        assert_eq!(set.must_have.language_names(), vec!["Svenska"]);
        assert!(set.sources.structured_present);
        assert!(!set.missing_flags.contains(&MissingFlag::StructuredMustHaveSkillsEmpty));
        assert!(set.missing_flags.contains(&MissingFlag::StructuredNiceToHaveSkillsEmpty));
    }

    #[test]
    fn test_structured_description_preferred_over_plain_text() {
        let extractor = RequirementExtractor::default();
        let snapshot = json!({"description": {"text": "Krav: Kubernetes"}});
        let set = extractor.extract_parts("Krav: Excel", Some(&snapshot), false);
        assert_eq!(set.must_have.skills, vec!["Kubernetes"]);
    }

    #[test]
    fn test_no_description_caps_confidence() {
        let extractor = RequirementExtractor::default();
        let snapshot = json!({
            "must_have": {"skills": ["Python", "SQL"], "education": ["Gymnasieutbildning"]}
        });
        let set = extractor.extract_parts("", Some(&snapshot), false);

        assert!(set.parse_confidence <= 0.2);
        assert!(set.missing_flags.contains(&MissingFlag::DescriptionTextMissing));
        assert_eq!(set.must_have.skills.len(), 2);
    }

    #[test]
    fn test_malformed_snapshot_is_flagged_not_fatal() {
        let extractor = RequirementExtractor::default();
        let snapshot = Value::String("{not json".to_string());
        let set = extractor.extract_parts("Krav: SQL", Some(&snapshot), false);

        assert!(set.missing_flags.contains(&MissingFlag::StructuredSnapshotMalformed));
        assert_eq!(set.must_have.skills, vec!["SQL"]);
    }

    #[test]
    fn test_snapshot_as_json_string_is_parsed() {
        let extractor = RequirementExtractor::default();
        let snapshot = Value::String(r#"{"must_have": {"driving_license": [{"label": "B"}]}}"#.to_string());
        let set = extractor.extract_parts("Lagerjobb i Solna.", Some(&snapshot), false);
        assert_eq!(set.must_have.licenses, vec!["B"]);
    }

    #[test]
    fn test_confidence_monotonic_in_categories() {
        let mut previous = confidence_for(0, true);
        assert!(previous <= 0.2 + f32::EPSILON);
        for categories in 1..=12 {
            let next = confidence_for(categories, true);
            assert!(next >= previous);
            assert!(next <= 1.0);
            previous = next;
        }
    }

    #[test]
    fn test_skill_matching_is_whole_word() {
        let extractor = RequirementExtractor::default();
        let bucket = extractor.scan_text("Erfarenhet av JavaScript, autocad och sapling-odling");
        assert_eq!(bucket.skills, vec!["AutoCAD", "JavaScript"]);
    }

    #[test]
    fn test_maximum_years_wins() {
        let extractor = RequirementExtractor::default();
        let bucket = extractor.scan_text("2 års erfarenhet av lager, gärna 5+ år som truckförare");
        assert_eq!(bucket.min_experience_years, Some(5));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = RequirementExtractor::default();
        let text = "Krav: Python, B-körkort\nMeriterande: Docker, engelska";
        assert_eq!(
            extractor.extract_parts(text, None, false),
            extractor.extract_parts(text, None, false)
        );
    }

    #[test]
    fn test_candidate_attributes_from_cv() {
        let extractor = RequirementExtractor::default();
        let attributes =
            extractor.candidate_attributes("Utvecklare med 6 års erfarenhet av Python och Docker. B-körkort.");
        assert_eq!(attributes.skills, vec!["Docker", "Python"]);
        assert_eq!(attributes.licenses, vec!["B-körkort"]);
        assert_eq!(attributes.experience_years, Some(6));
    }
}
