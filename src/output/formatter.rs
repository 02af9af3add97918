//! Output formatters for match results, requirement sets and pipeline reports

use crate::config::{OutputConfig, OutputFormat};
use crate::error::Result;
use crate::geocoding::GeocodeReport;
use crate::matching::types::{GapKind, MatchEntry, MatchFlag, MatchResult};
use crate::processing::normalizer::NormalizedText;
use crate::processing::requirements::{RequirementBucket, RequirementSet};
use crate::storage::backfill::BackfillReport;
use crate::storage::feed::IngestReport;
use colored::{Color, Colorize};
use serde::Serialize;
use std::path::Path;

pub trait OutputFormatter {
    fn format_match(&self, result: &MatchResult) -> Result<String>;
    fn format_requirements(&self, job_id: &str, requirements: &RequirementSet) -> Result<String>;
    fn format_normalized(&self, normalized: &NormalizedText) -> Result<String>;
    fn format_backfill(&self, report: &BackfillReport) -> Result<String>;
    fn format_ingest(&self, report: &IngestReport) -> Result<String>;
    fn format_geocode(&self, report: &GeocodeReport) -> Result<String>;
    fn supports_format(&self) -> OutputFormat;
}

/// Colored terminal output.
pub struct ConsoleFormatter {
    use_colors: bool,
    detailed: bool,
}

pub struct JsonFormatter {
    pretty: bool,
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool, detailed: bool) -> Self {
        Self { use_colors, detailed }
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_header(&self, title: &str, level: u8) -> String {
        let prefix = match level {
            1 => "█",
            2 => "▓",
            _ => "▒",
        };
        let color = match level {
            1 => Color::Blue,
            2 => Color::Green,
            _ => Color::Yellow,
        };

        if self.use_colors {
            format!("\n{} {}\n", prefix.color(color).bold(), title.color(color).bold())
        } else {
            format!("\n{} {}\n", prefix, title)
        }
    }

    fn format_score_badge(&self, score: f32) -> String {
        let (badge, color) = match score {
            s if s >= 0.85 => ("STRONG", Color::Green),
            s if s >= 0.7 => ("GOOD", Color::BrightGreen),
            s if s >= 0.55 => ("FAIR", Color::Yellow),
            _ => ("WEAK", Color::Red),
        };

        if self.use_colors {
            format!("[{}]", badge.color(color).bold())
        } else {
            format!("[{}]", badge)
        }
    }

    fn format_flag(flag: &MatchFlag) -> &'static str {
        match flag {
            MatchFlag::Ungated => "ungated",
            MatchFlag::UnknownLocation => "unknown location",
            MatchFlag::HardPolicySoftened => "hard policy softened",
            MatchFlag::RequirementsUnchecked => "requirements unchecked",
        }
    }

    fn format_gap_kind(kind: &GapKind) -> &'static str {
        match kind {
            GapKind::Skill => "skill",
            GapKind::License => "license",
            GapKind::Certification => "certification",
            GapKind::Language => "language",
            GapKind::Education => "education",
            GapKind::Experience => "experience",
        }
    }

    fn format_entry(&self, rank: usize, entry: &MatchEntry) -> String {
        let mut output = format!(
            "{}. {} {} {:.3} {}\n",
            rank,
            self.colorize(&entry.job_id, Color::Cyan),
            entry.headline.as_deref().unwrap_or(""),
            entry.adjusted_score,
            self.format_score_badge(entry.adjusted_score)
        );

        let mut details = vec![format!("similarity {:.3}", entry.similarity)];
        if let Some(distance) = entry.distance_km {
            details.push(format!("{:.1} km", distance));
        }
        if !entry.matched_tags.is_empty() {
            details.push(format!("tags: {}", entry.matched_tags.join(", ")));
        }
        output.push_str(&format!("   {}\n", self.colorize(&details.join(" | "), Color::BrightBlack)));

        if !entry.requirement_gaps.is_empty() {
            let gaps: Vec<String> = entry
                .requirement_gaps
                .iter()
                .map(|g| format!("{} ({})", g.value, Self::format_gap_kind(&g.kind)))
                .collect();
            output.push_str(&format!("   Missing: {}\n", self.colorize(&gaps.join(", "), Color::Yellow)));
        }
        if self.detailed && entry.nice_matches > 0 {
            output.push_str(&format!("   Meriting matches: {}\n", entry.nice_matches));
        }
        if !entry.flags.is_empty() {
            let flags: Vec<&str> = entry.flags.iter().map(Self::format_flag).collect();
            output.push_str(&format!("   Flags: {}\n", flags.join(", ")));
        }
        output
    }

    fn format_bucket(&self, title: &str, bucket: &RequirementBucket) -> String {
        let mut output = self.format_header(title, 3);
        if bucket.is_empty() {
            output.push_str("  (none)\n");
            return output;
        }

        let rows: [(&str, Vec<String>); 6] = [
            ("Skills", bucket.skills.clone()),
            ("Licenses", bucket.licenses.clone()),
            ("Certifications", bucket.certifications.clone()),
            ("Languages", bucket.language_names()),
            ("Education", bucket.education.clone()),
            ("Work experience", bucket.work_experience.clone()),
        ];
        for (label, values) in rows.iter().filter(|(_, v)| !v.is_empty()) {
            output.push_str(&format!("  {}: {}\n", label, values.join(", ")));
        }
        if let Some(years) = bucket.min_experience_years {
            output.push_str(&format!("  Experience: {}+ years\n", years));
        }
        output
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_match(&self, result: &MatchResult) -> Result<String> {
        let mut output = self.format_header(&format!("Matches for candidate {}", result.candidate_id), 1);

        if result.is_empty() {
            output.push_str(&self.colorize("No jobs passed every gate.\n", Color::Yellow));
        }
        for (i, entry) in result.entries.iter().enumerate() {
            output.push_str(&self.format_entry(i + 1, entry));
        }

        if self.detailed {
            let c = &result.counts;
            output.push_str(&self.format_header("Stage counts", 2));
            output.push_str(&format!("  Considered:        {}\n", c.considered));
            output.push_str(&format!("  Inactive/expired:  {}\n", c.inactive));
            output.push_str(&format!("  After category:    {}\n", c.after_category));
            output.push_str(&format!("  After geo:         {}\n", c.after_geo));
            output.push_str(&format!("  Missing vector:    {}\n", c.missing_vector));
            output.push_str(&format!("  After vector:      {}\n", c.after_vector));
            output.push_str(&format!("  Below similarity:  {}\n", c.below_min_similarity));
            output.push_str(&format!("  Excluded by reqs:  {}\n", c.excluded_by_requirements));
            output.push_str(&format!("  Returned:          {}\n", c.returned));
        }
        Ok(output)
    }

    fn format_requirements(&self, job_id: &str, requirements: &RequirementSet) -> Result<String> {
        let mut output = self.format_header(&format!("Requirements for job {}", job_id), 1);
        output.push_str(&format!(
            "Parse confidence: {:.2}{}\n",
            requirements.parse_confidence,
            if requirements.driving_license_required {
                " | driving license required"
            } else {
                ""
            }
        ));
        output.push_str(&self.format_bucket("Must have", &requirements.must_have));
        output.push_str(&self.format_bucket("Nice to have", &requirements.nice_to_have));

        if self.detailed && !requirements.missing_flags.is_empty() {
            output.push_str(&self.format_header("Missing signals", 3));
            for flag in &requirements.missing_flags {
                output.push_str(&format!("  • {:?}\n", flag));
            }
        }
        Ok(output)
    }

    fn format_normalized(&self, normalized: &NormalizedText) -> Result<String> {
        let mut output = String::new();
        for section in &normalized.sections {
            if let Some(kind) = &section.kind {
                let label = format!("[{}] {}", kind, section.heading.as_deref().unwrap_or(""));
                output.push_str(&format!("{}\n", self.colorize(label.trim_end(), Color::Cyan)));
            }
            output.push_str(&section.content);
            output.push_str("\n\n");
        }

        if self.detailed {
            let r = &normalized.report;
            output.push_str(&self.colorize(
                &format!(
                    "{} chars | {} control chars removed | {} noise lines removed | {} sections ({} discarded)\n",
                    normalized.char_count(),
                    r.control_chars_removed,
                    r.noise_lines_removed,
                    r.sections_detected,
                    r.sections_discarded
                ),
                Color::BrightBlack,
            ));
        }
        Ok(output)
    }

    fn format_backfill(&self, report: &BackfillReport) -> Result<String> {
        let mut output = self.format_header("Backfill", 1);
        if let Some(cursor) = &report.resumed_from {
            output.push_str(&format!("Resumed after: {}\n", cursor));
        }
        output.push_str(&format!(
            "Pages: {} | Processed: {} | Updated: {}\n",
            report.pages, report.processed, report.updated
        ));
        if !report.failed.is_empty() {
            output.push_str(&self.colorize(
                &format!("Failed ({}): {}\n", report.failed.len(), report.failed.join(", ")),
                Color::Red,
            ));
        }
        Ok(output)
    }

    fn format_ingest(&self, report: &IngestReport) -> Result<String> {
        let mut output = self.format_header("Feed ingestion", 1);
        output.push_str(&format!(
            "New: {} | Changed: {} | Unchanged: {} | Expired: {} | Deactivated: {}\n",
            report.inserted, report.text_changed, report.unchanged, report.expired, report.deactivated
        ));
        Ok(output)
    }

    fn format_geocode(&self, report: &GeocodeReport) -> Result<String> {
        let mut output = self.format_header("Geocoding", 1);
        output.push_str(&format!(
            "Resolved: {} | Unknown: {} | Failed: {}\n",
            report.resolved, report.unresolved, report.failed
        ));
        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Console
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(value)?)
        } else {
            Ok(serde_json::to_string(value)?)
        }
    }
}

#[derive(Serialize)]
struct RequirementsDocument<'a> {
    job_id: &'a str,
    #[serde(flatten)]
    requirements: &'a RequirementSet,
}

impl OutputFormatter for JsonFormatter {
    fn format_match(&self, result: &MatchResult) -> Result<String> {
        self.to_json(result)
    }

    fn format_requirements(&self, job_id: &str, requirements: &RequirementSet) -> Result<String> {
        self.to_json(&RequirementsDocument { job_id, requirements })
    }

    fn format_normalized(&self, normalized: &NormalizedText) -> Result<String> {
        self.to_json(normalized)
    }

    fn format_backfill(&self, report: &BackfillReport) -> Result<String> {
        self.to_json(report)
    }

    fn format_ingest(&self, report: &IngestReport) -> Result<String> {
        self.to_json(report)
    }

    fn format_geocode(&self, report: &GeocodeReport) -> Result<String> {
        self.to_json(report)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

/// Picks the formatter for a configured output format.
pub struct ReportGenerator {
    console_formatter: ConsoleFormatter,
    json_formatter: JsonFormatter,
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self {
            console_formatter: ConsoleFormatter::new(true, false),
            json_formatter: JsonFormatter::new(true),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            console_formatter: ConsoleFormatter::new(config.color_output, config.detailed),
            json_formatter: JsonFormatter::new(true),
        }
    }

    pub fn formatter(&self, format: OutputFormat) -> &dyn OutputFormatter {
        match format {
            OutputFormat::Console => &self.console_formatter,
            OutputFormat::Json => &self.json_formatter,
        }
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn save_report_to_file(content: &str, file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::types::{Gate, RequirementGap, StageCounts};

    fn sample_result() -> MatchResult {
        MatchResult {
            candidate_id: "c1".into(),
            entries: vec![MatchEntry {
                job_id: "j1".into(),
                similarity: 0.82,
                adjusted_score: 0.77,
                distance_km: Some(4.2),
                gates_passed: vec![Gate::Category, Gate::Geo, Gate::Vector, Gate::Requirement],
                matched_tags: vec!["it".into()],
                requirement_gaps: vec![RequirementGap {
                    kind: GapKind::Skill,
                    value: "SQL".into(),
                }],
                nice_matches: 1,
                flags: vec![MatchFlag::HardPolicySoftened],
                headline: Some("Backendutvecklare".into()),
                published_at: None,
            }],
            counts: StageCounts {
                considered: 3,
                returned: 1,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_console_match_without_colors() {
        let output = ConsoleFormatter::new(false, true)
            .format_match(&sample_result())
            .unwrap();
        assert!(output.contains("1. j1 Backendutvecklare 0.770 [GOOD]"));
        assert!(output.contains("Missing: SQL (skill)"));
        assert!(output.contains("Flags: hard policy softened"));
        assert!(output.contains("Returned:          1"));
    }

    #[test]
    fn test_json_match_omits_publication_time() {
        let output = JsonFormatter::new(false).format_match(&sample_result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["entries"][0]["job_id"], "j1");
        assert_eq!(value["entries"][0]["flags"][0], "hard_policy_softened");
        assert!(value["entries"][0].get("published_at").is_none());
    }

    #[test]
    fn test_json_requirements_carry_job_id() {
        let output = JsonFormatter::new(false)
            .format_requirements("j9", &RequirementSet::default())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["job_id"], "j9");
        assert!(value.get("must_have").is_some());
    }
}
