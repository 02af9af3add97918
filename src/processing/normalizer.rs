//! Text cleaning, boilerplate removal and section detection

use crate::config::ProcessingConfig;
use crate::error::{MatcherError, Result};
use log::debug;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Named section of a posting or CV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Requirements,
    Merits,
    Duties,
    AboutRole,
    AboutCompany,
    Benefits,
    Contact,
    Application,
    References,
}

impl SectionKind {
    /// Sections dropped from the normalized body.
    pub fn is_excluded(self) -> bool {
        matches!(
            self,
            SectionKind::Contact | SectionKind::Application | SectionKind::References
        )
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SectionKind::Requirements => "Requirements",
            SectionKind::Merits => "Merits",
            SectionKind::Duties => "Duties",
            SectionKind::AboutRole => "About the role",
            SectionKind::AboutCompany => "About the company",
            SectionKind::Benefits => "Benefits",
            SectionKind::Contact => "Contact",
            SectionKind::Application => "Application",
            SectionKind::References => "References",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSection {
    /// `None` for text before the first heading or when no heading exists.
    pub kind: Option<SectionKind>,
    pub heading: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub control_chars_removed: usize,
    pub noise_lines_removed: usize,
    pub sections_detected: usize,
    pub sections_discarded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub text: String,
    pub sections: Vec<TextSection>,
    pub report: NormalizationReport,
}

impl NormalizedText {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

pub struct TextNormalizer {
    boilerplate: Vec<Regex>,
    whitespace_regex: Regex,
    headings: Vec<(SectionKind, Regex)>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(&ProcessingConfig::default()).expect("Invalid default boilerplate patterns")
    }
}

impl TextNormalizer {
    pub fn new(config: &ProcessingConfig) -> Result<Self> {
        let boilerplate = config
            .boilerplate_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        MatcherError::Configuration(format!(
                            "Invalid boilerplate pattern '{}': {}",
                            pattern, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let whitespace_regex = Regex::new(r"[ \t\u{00A0}]+").expect("Invalid whitespace regex");

        Ok(Self {
            boilerplate,
            whitespace_regex,
            headings: Self::heading_patterns(),
        })
    }

    /// Clean text without section classification.
    ///
    /// The result carries a single unlabeled section holding the whole body.
    pub fn clean(&self, raw: &str) -> NormalizedText {
        let mut report = NormalizationReport::default();
        let lines = self.clean_lines(raw, &mut report);
        let text = join_paragraphs(&lines);

        let sections = if text.is_empty() {
            Vec::new()
        } else {
            vec![TextSection {
                kind: None,
                heading: None,
                content: text.clone(),
            }]
        };

        NormalizedText {
            text,
            sections,
            report,
        }
    }

    /// Clean text and partition it into named sections.
    ///
    /// Contact, application and reference sections are dropped from both
    /// the section list and the returned body.
    pub fn normalize_with_sections(&self, raw: &str) -> NormalizedText {
        let mut report = NormalizationReport::default();
        let lines = self.clean_lines(raw, &mut report);

        let mut sections: Vec<TextSection> = Vec::new();
        let mut current = TextSection {
            kind: None,
            heading: None,
            content: String::new(),
        };
        let mut current_lines: Vec<String> = Vec::new();

        for line in &lines {
            if let Some((kind, inline)) = self.detect_heading(line) {
                current.content = join_paragraphs(&current_lines);
                if current.kind.is_some() || !current.content.is_empty() {
                    sections.push(current);
                }
                current = TextSection {
                    kind: Some(kind),
                    heading: Some(line.clone()),
                    content: String::new(),
                };
                current_lines = inline.into_iter().collect();
                report.sections_detected += 1;
            } else {
                current_lines.push(line.clone());
            }
        }
        current.content = join_paragraphs(&current_lines);
        if current.kind.is_some() || !current.content.is_empty() {
            sections.push(current);
        }

        let (kept, discarded): (Vec<_>, Vec<_>) = sections
            .into_iter()
            .partition(|s| !s.kind.map(SectionKind::is_excluded).unwrap_or(false));
        report.sections_discarded = discarded.len();

        let text = kept
            .iter()
            .map(|s| match (&s.heading, s.content.is_empty()) {
                (Some(heading), true) => heading.clone(),
                (Some(heading), false) if s.content.starts_with(heading.as_str()) => {
                    s.content.clone()
                }
                (Some(heading), false) => format!("{}\n{}", heading, s.content),
                (None, _) => s.content.clone(),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(
            "Normalized text: {} sections detected, {} discarded, {} noise lines removed",
            report.sections_detected, report.sections_discarded, report.noise_lines_removed
        );

        NormalizedText {
            text,
            sections: kept,
            report,
        }
    }

    /// Strip control bytes, normalize whitespace per line and drop boilerplate.
    ///
    /// Blank lines are kept (collapsed to one) so paragraph breaks survive.
    fn clean_lines(&self, raw: &str, report: &mut NormalizationReport) -> Vec<String> {
        let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

        let mut stripped = String::with_capacity(unified.len());
        for c in unified.chars() {
            if c == '\n' || c == '\t' {
                stripped.push(c);
            } else if c.is_control() || c == '\u{FEFF}' || c == '\u{200B}' {
                report.control_chars_removed += 1;
            } else {
                stripped.push(normalize_punctuation(c));
            }
        }

        let mut lines: Vec<String> = Vec::new();
        let mut last_blank = true;
        for line in stripped.lines() {
            let collapsed = self.whitespace_regex.replace_all(line, " ");
            let trimmed = collapsed.trim();

            if trimmed.is_empty() {
                if !last_blank {
                    lines.push(String::new());
                    last_blank = true;
                }
                continue;
            }

            if self.boilerplate.iter().any(|re| re.is_match(trimmed)) {
                report.noise_lines_removed += 1;
                continue;
            }

            lines.push(trimmed.to_string());
            last_blank = false;
        }

        while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            lines.pop();
        }
        lines
    }

    /// Returns the section kind and any text following the heading on the same line.
    fn detect_heading(&self, line: &str) -> Option<(SectionKind, Option<String>)> {
        if line.is_empty() || line.chars().count() > 80 {
            return None;
        }

        let folded = fold(line);
        let folded = folded.trim_start_matches(|c: char| c == '-' || c == '*' || c == '•' || c == '#' || c.is_whitespace());

        for (kind, regex) in &self.headings {
            if let Some(m) = regex.find(folded) {
                let rest = folded[m.end()..].trim();
                if rest.is_empty() {
                    return Some((*kind, None));
                }
                if let Some(after_colon) = rest.strip_prefix(':') {
                    // Slice the original line so inline content keeps its casing.
                    let inline = line
                        .split_once(':')
                        .map(|(_, tail)| tail.trim().to_string())
                        .filter(|s| !s.is_empty());
                    if after_colon.trim().is_empty() {
                        return Some((*kind, None));
                    }
                    return Some((*kind, inline));
                }
            }
        }
        None
    }

    fn heading_patterns() -> Vec<(SectionKind, Regex)> {
        let table: [(SectionKind, &[&str]); 9] = [
            (
                SectionKind::Merits,
                &["det ar meriterande", "meriterande", "nice to have", "preferred qualifications", "bonus"],
            ),
            (
                SectionKind::Requirements,
                &[
                    "krav",
                    "kvalifikationer",
                    "vi soker dig som",
                    "vi soker",
                    "din profil",
                    "du har",
                    "requirements",
                    "your qualifications",
                    "qualifications",
                    "must have",
                    "who you are",
                ],
            ),
            (
                SectionKind::Duties,
                &["dina arbetsuppgifter", "arbetsuppgifter", "ansvarsomraden", "responsibilities", "duties", "what you will do"],
            ),
            (
                SectionKind::AboutRole,
                &["om tjansten", "om rollen", "about the role", "about the job"],
            ),
            (
                SectionKind::AboutCompany,
                &["om foretaget", "om oss", "om arbetsgivaren", "about us", "about the company"],
            ),
            (
                SectionKind::Benefits,
                &["vi erbjuder", "formaner", "benefits", "we offer", "what we offer"],
            ),
            (
                SectionKind::Contact,
                &["kontaktpersoner", "kontaktperson", "kontakt", "fackliga representanter", "contact"],
            ),
            (
                SectionKind::Application,
                &["sa ansoker du", "ansokan", "how to apply", "application"],
            ),
            (SectionKind::References, &["referenser", "references"]),
        ];

        table
            .iter()
            .map(|(kind, synonyms)| {
                let alternation = synonyms
                    .iter()
                    .map(|s| regex::escape(s).replace("\\ ", r"\s+").replace(' ', r"\s+"))
                    .collect::<Vec<_>>()
                    .join("|");
                let regex = Regex::new(&format!(r"^(?:{})\b", alternation))
                    .expect("Invalid heading regex");
                (*kind, regex)
            })
            .collect()
    }
}

/// Lowercase and fold Swedish/common Latin diacritics to ASCII.
///
/// Used for heading and vocabulary matching only; output text keeps
/// its original characters.
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(|c| c.to_lowercase())
        .map(|c| match c {
            'å' | 'ä' | 'à' | 'á' | 'â' => 'a',
            'ö' | 'ø' | 'ó' | 'ò' | 'ô' => 'o',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'ü' | 'ú' | 'ù' => 'u',
            'í' | 'ì' | 'ï' => 'i',
            other => other,
        })
        .collect()
}

fn normalize_punctuation(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        '\u{2013}' | '\u{2014}' => '-',
        '\u{2022}' => '•',
        other => other,
    }
}

fn join_paragraphs(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        if line.is_empty() {
            if !out.is_empty() && !out.ends_with("\n\n") {
                out.push('\n');
            }
            continue;
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(line);
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_empty_output() {
        let normalizer = TextNormalizer::default();
        let result = normalizer.normalize_with_sections("");
        assert!(result.is_empty());
        assert!(result.sections.is_empty());
        assert_eq!(result.report, NormalizationReport::default());
    }

    #[test]
    fn test_strips_control_bytes_and_collapses_whitespace() {
        let normalizer = TextNormalizer::default();
        let result = normalizer.clean("Lager\u{0000}arbetare   i \t Solna\r\n\r\n\r\nHeltid");

        assert_eq!(result.text, "Lagerarbetare i Solna\n\nHeltid");
        assert_eq!(result.report.control_chars_removed, 1);
    }

    #[test]
    fn test_removes_boilerplate_lines() {
        let normalizer = TextNormalizer::default();
        let raw = "Vi söker en truckförare.\nÖppen för alla\nVi fokuserar på din kompetens, inte bakgrund.\nAnsök senast 1 maj";
        let result = normalizer.clean(raw);

        assert_eq!(result.text, "Vi söker en truckförare.");
        assert_eq!(result.report.noise_lines_removed, 3);
    }

    #[test]
    fn test_section_detection_discards_contact() {
        let normalizer = TextNormalizer::default();
        let raw = "Vi växer!\n\nArbetsuppgifter:\nPlocka och packa.\n\nKrav: B-körkort\n\nKontakt\nAnna, 070-123";
        let result = normalizer.normalize_with_sections(raw);

        let kinds: Vec<Option<SectionKind>> = result.sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![None, Some(SectionKind::Duties), Some(SectionKind::Requirements)]
        );
        assert_eq!(result.sections[2].content, "B-körkort");
        assert_eq!(result.report.sections_detected, 3);
        assert_eq!(result.report.sections_discarded, 1);
        assert!(!result.text.contains("070-123"));
        assert!(result.text.contains("Plocka och packa."));
    }

    #[test]
    fn test_no_headings_yields_single_unlabeled_section() {
        let normalizer = TextNormalizer::default();
        let result = normalizer.normalize_with_sections("Just a short body.\nSecond line.");

        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].kind, None);
        assert_eq!(result.sections[0].content, "Just a short body.\nSecond line.");
    }

    #[test]
    fn test_sentence_starting_with_synonym_is_not_heading() {
        let normalizer = TextNormalizer::default();
        let result = normalizer.normalize_with_sections("Kravet på oss är högt och vi levererar.");
        assert_eq!(result.report.sections_detected, 0);
    }

    #[test]
    fn test_fold_diacritics() {
        assert_eq!(fold("Vi SÖKER Förmåner"), "vi soker formaner");
    }

    #[test]
    fn test_invalid_custom_pattern_is_configuration_error() {
        let config = ProcessingConfig {
            boilerplate_patterns: vec!["(unclosed".to_string()],
            ..ProcessingConfig::default()
        };
        assert!(matches!(
            TextNormalizer::new(&config),
            Err(MatcherError::Configuration(_))
        ));
    }
}
