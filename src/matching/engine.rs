//! Multi-stage filter and rank over a job corpus

use crate::config::RequirementPolicyKind;
use crate::error::{MatchError, MatchStage};
use crate::matching::geo::{haversine_km, is_valid};
use crate::matching::types::{
    Gate, GapKind, MatchEntry, MatchFlag, MatchQuery, MatchResult, RequirementGap,
    RequirementPolicy, StageCounts, VectorChoice,
};
use crate::model::{CandidateAttributes, CandidateProfile, EmbeddingVector, GeoPoint, JobPosting};
use crate::processing::normalizer::fold;
use crate::processing::reducer::dot;
use crate::processing::requirements::{RequirementBucket, RequirementSet};
use log::debug;
use std::cmp::Ordering;
use strsim::jaro_winkler;

/// Stateless matching pipeline.
pub struct MatchEngine;

struct Survivor<'a> {
    job: &'a JobPosting,
    distance_km: Option<f64>,
    matched_tags: Vec<String>,
    flags: Vec<MatchFlag>,
    gates: Vec<Gate>,
}

impl MatchEngine {
    pub fn run(
        candidate: &CandidateProfile,
        jobs: &[JobPosting],
        query: &MatchQuery,
    ) -> std::result::Result<MatchResult, MatchError> {
        let mut counts = StageCounts {
            considered: jobs.len(),
            ..Default::default()
        };

        let allowed_fields: Vec<String> = candidate
            .allowed_fields
            .iter()
            .map(|f| fold(f.trim()))
            .filter(|f| !f.is_empty())
            .collect();
        if query.category_gate && candidate.category_tags.is_empty() && allowed_fields.is_empty() {
            return Err(MatchError::insufficient_profile(
                MatchStage::Category,
                format!("candidate {} has no category tags or allowed fields", candidate.id),
            ));
        }

        let origin = Self::geo_origin(candidate, query)?;
        let candidate_vectors = Self::candidate_vectors(candidate, query.vector_choice)?;

        let live: Vec<&JobPosting> = jobs.iter().filter(|job| job.is_live(query.now)).collect();
        counts.inactive = jobs.len() - live.len();

        // Stage A
        let gated: Vec<Survivor> = live
            .into_iter()
            .filter_map(|job| Self::category_gate(candidate, &allowed_fields, job, query))
            .collect();
        counts.after_category = gated.len();

        // Stage B
        let located: Vec<Survivor> = match origin {
            Some((point, radius)) => gated
                .into_iter()
                .filter_map(|c| Self::geo_filter(c, point, radius, query.include_unknown_location))
                .collect(),
            None => gated,
        };
        counts.after_geo = located.len();

        // Stage C
        let mut scored: Vec<(Survivor, f32)> = Vec::with_capacity(located.len());
        for c in located {
            match Self::similarity(&candidate_vectors, c.job.vector.as_ref()) {
                Some(similarity) => {
                    if query.min_similarity.map_or(false, |floor| similarity < floor) {
                        counts.below_min_similarity += 1;
                        continue;
                    }
                    scored.push((c, similarity));
                }
                None => counts.missing_vector += 1,
            }
        }
        counts.after_vector = scored.len();

        // Stage D
        let attributes = candidate.requirement_attributes();
        let mut entries: Vec<MatchEntry> = Vec::with_capacity(scored.len());
        for (mut c, similarity) in scored {
            c.gates.push(Gate::Vector);
            match Self::score_requirements(attributes.as_ref(), c.job, similarity, &query.policy) {
                RequirementOutcome::Excluded => counts.excluded_by_requirements += 1,
                RequirementOutcome::Scored {
                    adjusted,
                    gaps,
                    nice_matches,
                    flags,
                } => {
                    c.flags.extend(flags);
                    c.flags.sort();
                    c.flags.dedup();
                    c.gates.push(Gate::Requirement);
                    entries.push(MatchEntry {
                        job_id: c.job.id.clone(),
                        similarity,
                        adjusted_score: adjusted,
                        distance_km: c.distance_km,
                        gates_passed: c.gates,
                        matched_tags: c.matched_tags,
                        requirement_gaps: gaps,
                        nice_matches,
                        flags: c.flags,
                        headline: Some(c.job.headline.clone()).filter(|h| !h.is_empty()),
                        published_at: c.job.published_at,
                    });
                }
            }
        }

        // Stage E
        entries.sort_by(rank_order);
        entries.truncate(query.top_k);
        counts.returned = entries.len();

        debug!("Match for {}: {:?}", candidate.id, counts);
        Ok(MatchResult {
            candidate_id: candidate.id.clone(),
            entries,
            counts,
        })
    }

    /// Candidate coordinates and effective radius, or `None` when no geo filter applies.
    fn geo_origin(
        candidate: &CandidateProfile,
        query: &MatchQuery,
    ) -> std::result::Result<Option<(GeoPoint, f64)>, MatchError> {
        let explicit_radius = query.radius_km.or(candidate.radius_km);
        if let Some(radius) = explicit_radius {
            if !radius.is_finite() || radius < 0.0 {
                return Err(MatchError::invalid_query(
                    MatchStage::Geo,
                    format!("radius must be a non-negative number, got {}", radius),
                ));
            }
        }

        match (candidate.location.filter(|p| is_valid(*p)), explicit_radius) {
            (Some(point), Some(radius)) => Ok(Some((point, radius))),
            (Some(point), None) => Ok(Some((point, query.default_radius_km))),
            (None, Some(radius)) => Err(MatchError::incomplete_location(format!(
                "radius {} km requested but candidate {} has no coordinates",
                radius, candidate.id
            ))),
            (None, None) => Ok(None),
        }
    }

    fn candidate_vectors(
        candidate: &CandidateProfile,
        choice: VectorChoice,
    ) -> std::result::Result<Vec<&EmbeddingVector>, MatchError> {
        let vectors: Vec<&EmbeddingVector> = match choice {
            VectorChoice::Profile => candidate.vectors.profile.iter().collect(),
            VectorChoice::Wish => candidate.vectors.wish.iter().collect(),
            VectorChoice::Best => candidate.vectors.all().collect(),
        };
        let vectors: Vec<&EmbeddingVector> = vectors.into_iter().filter(|v| v.dim() > 0).collect();

        if vectors.is_empty() {
            return Err(MatchError::insufficient_profile(
                MatchStage::Vector,
                format!("candidate {} has no {} vector", candidate.id, choice.as_str()),
            ));
        }
        Ok(vectors)
    }

    fn category_gate<'a>(
        candidate: &CandidateProfile,
        allowed_fields: &[String],
        job: &'a JobPosting,
        query: &MatchQuery,
    ) -> Option<Survivor<'a>> {
        let mut c = Survivor {
            job,
            distance_km: None,
            matched_tags: Vec::new(),
            flags: Vec::new(),
            gates: Vec::new(),
        };

        if !query.category_gate {
            return Some(c);
        }

        let job_tags = job.category_tags.as_ref().filter(|t| !t.is_empty());
        let field = job
            .occupation_field
            .as_deref()
            .map(|f| fold(f.trim()))
            .filter(|f| !f.is_empty());

        if job_tags.is_none() && field.is_none() {
            if query.bypass_ungated {
                c.flags.push(MatchFlag::Ungated);
                return Some(c);
            }
            return None;
        }

        c.matched_tags = job_tags
            .map(|tags| candidate.category_tags.intersection(tags))
            .unwrap_or_default();
        let field_allowed = field
            .map(|f| allowed_fields.iter().any(|allowed| *allowed == f))
            .unwrap_or(false);

        if c.matched_tags.is_empty() && !field_allowed {
            return None;
        }
        c.gates.push(Gate::Category);
        Some(c)
    }

    fn geo_filter(
        mut c: Survivor<'_>,
        origin: GeoPoint,
        radius_km: f64,
        include_unknown: bool,
    ) -> Option<Survivor<'_>> {
        match c.job.location.filter(|p| is_valid(*p)) {
            Some(point) => {
                let distance = haversine_km(origin, point);
                if distance > radius_km {
                    return None;
                }
                c.distance_km = Some(distance);
                c.gates.push(Gate::Geo);
                Some(c)
            }
            None if include_unknown => {
                c.flags.push(MatchFlag::UnknownLocation);
                Some(c)
            }
            None => None,
        }
    }

    /// Dot product against the best usable candidate vector.
    ///
    /// `None` when the job has no vector of a matching dimension.
    fn similarity(candidate_vectors: &[&EmbeddingVector], job_vector: Option<&EmbeddingVector>) -> Option<f32> {
        let job_vector = job_vector?;
        candidate_vectors
            .iter()
            .filter_map(|v| dot(v.as_slice(), job_vector.as_slice()).ok())
            .filter(|s| s.is_finite())
            .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))))
    }

    fn score_requirements(
        attributes: Option<&CandidateAttributes>,
        job: &JobPosting,
        similarity: f32,
        policy: &RequirementPolicy,
    ) -> RequirementOutcome {
        let unchanged = |flags: Vec<MatchFlag>| RequirementOutcome::Scored {
            adjusted: similarity,
            gaps: Vec::new(),
            nice_matches: 0,
            flags,
        };

        if policy.kind == RequirementPolicyKind::Off {
            return unchanged(Vec::new());
        }
        let Some(requirements) = job.requirements.as_ref() else {
            return unchanged(Vec::new());
        };
        let Some(attributes) = attributes else {
            return unchanged(vec![MatchFlag::RequirementsUnchecked]);
        };

        let gaps = requirement_gaps(attributes, requirements, policy.fuzzy_skill_threshold);
        let nice_matches = nice_match_count(attributes, &requirements.nice_to_have, policy.fuzzy_skill_threshold);

        let mut flags = Vec::new();
        if policy.kind == RequirementPolicyKind::Hard && !gaps.is_empty() {
            if requirements.parse_confidence >= policy.hard_min_confidence {
                return RequirementOutcome::Excluded;
            }
            flags.push(MatchFlag::HardPolicySoftened);
        }

        let penalty = (gaps.len() as f32 * policy.penalty_per_gap).min(policy.max_penalty);
        let bonus = (nice_matches as f32 * policy.bonus_per_nice_match).min(policy.max_bonus);

        RequirementOutcome::Scored {
            adjusted: similarity - penalty + bonus,
            gaps,
            nice_matches,
            flags,
        }
    }
}

enum RequirementOutcome {
    Excluded,
    Scored {
        adjusted: f32,
        gaps: Vec<RequirementGap>,
        nice_matches: usize,
        flags: Vec<MatchFlag>,
    },
}

/// Adjusted score descending, then newest, then nearest, then id.
fn rank_order(a: &MatchEntry, b: &MatchEntry) -> Ordering {
    b.adjusted_score
        .partial_cmp(&a.adjusted_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| match (a.published_at, b.published_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.job_id.cmp(&b.job_id))
}

/// Case-insensitive equality with a Jaro-Winkler fallback.
fn has_match(have: &[String], wanted: &str, threshold: f32) -> bool {
    let wanted = fold(wanted.trim());
    have.iter().any(|h| {
        let h = fold(h.trim());
        h == wanted || jaro_winkler(&h, &wanted) as f32 >= threshold
    })
}

fn requirement_gaps(
    attributes: &CandidateAttributes,
    requirements: &RequirementSet,
    threshold: f32,
) -> Vec<RequirementGap> {
    let must = &requirements.must_have;
    let mut gaps = Vec::new();

    let mut check = |kind: GapKind, have: &[String], wanted: &[String]| {
        for value in wanted {
            if !has_match(have, value, threshold) {
                gaps.push(RequirementGap {
                    kind,
                    value: value.clone(),
                });
            }
        }
    };
    check(GapKind::Skill, &attributes.skills, &must.skills);
    check(GapKind::License, &attributes.licenses, &must.licenses);
    check(GapKind::Certification, &attributes.certifications, &must.certifications);
    check(GapKind::Language, &attributes.languages, &must.language_names());
    check(GapKind::Education, &attributes.education, &must.education);

    if requirements.driving_license_required && must.licenses.is_empty() && attributes.licenses.is_empty() {
        gaps.push(RequirementGap {
            kind: GapKind::License,
            value: "Körkort".to_string(),
        });
    }

    if let Some(min_years) = must.min_experience_years {
        if attributes.experience_years.map_or(true, |years| years < min_years) {
            gaps.push(RequirementGap {
                kind: GapKind::Experience,
                value: format!("{}+ years", min_years),
            });
        }
    }

    gaps
}

fn nice_match_count(attributes: &CandidateAttributes, nice: &RequirementBucket, threshold: f32) -> usize {
    let count = |have: &[String], wanted: &[String]| {
        wanted.iter().filter(|w| has_match(have, w, threshold)).count()
    };
    count(&attributes.skills, &nice.skills)
        + count(&attributes.licenses, &nice.licenses)
        + count(&attributes.certifications, &nice.certifications)
        + count(&attributes.languages, &nice.language_names())
        + count(&attributes.education, &nice.education)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatchFailure;
    use crate::model::{CandidateVectors, CategoryTagSet};
    use chrono::{Duration, TimeZone, Utc};

    fn unit(values: &[f32]) -> EmbeddingVector {
        EmbeddingVector::new(values.to_vec())
    }

    fn candidate() -> CandidateProfile {
        CandidateProfile {
            id: "c1".into(),
            vectors: CandidateVectors {
                profile: Some(unit(&[0.6, 0.8])),
                ..Default::default()
            },
            category_tags: ["it"].into_iter().collect(),
            ..Default::default()
        }
    }

    fn job(id: &str, vector: &[f32]) -> JobPosting {
        JobPosting {
            id: id.into(),
            vector: Some(unit(vector)),
            category_tags: Some(["it"].into_iter().collect()),
            ..Default::default()
        }
    }

    fn query() -> MatchQuery {
        MatchQuery {
            now: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            ..MatchQuery::default()
        }
    }

    #[test]
    fn test_similarity_is_dot_product() {
        let jobs = vec![job("same", &[0.6, 0.8]), job("orthogonal", &[0.8, -0.6])];
        let result = MatchEngine::run(&candidate(), &jobs, &query()).unwrap();

        assert_eq!(result.job_ids(), vec!["same", "orthogonal"]);
        assert!((result.entries[0].similarity - 1.0).abs() < 1e-6);
        assert!(result.entries[1].similarity.abs() < 1e-6);
    }

    #[test]
    fn test_category_gate_excludes_disjoint_tags() {
        let mut other = job("other", &[0.6, 0.8]);
        other.category_tags = Some(["health"].into_iter().collect());
        let result = MatchEngine::run(&candidate(), &[other, job("it", &[0.6, 0.8])], &query()).unwrap();

        assert_eq!(result.job_ids(), vec!["it"]);
        assert_eq!(result.entries[0].matched_tags, vec!["it"]);
        assert_eq!(result.counts.after_category, 1);
    }

    #[test]
    fn test_allowed_field_passes_gate() {
        let mut c = candidate();
        c.category_tags = CategoryTagSet::new();
        c.allowed_fields = vec!["Data/IT".into()];
        let mut j = job("field", &[0.6, 0.8]);
        j.category_tags = None;
        j.occupation_field = Some("data/it".into());

        let result = MatchEngine::run(&c, &[j], &query()).unwrap();
        assert_eq!(result.job_ids(), vec!["field"]);
        assert!(result.entries[0].gates_passed.contains(&Gate::Category));
    }

    #[test]
    fn test_ungated_job_needs_bypass() {
        let mut ungated = job("ungated", &[0.6, 0.8]);
        ungated.category_tags = None;

        let result = MatchEngine::run(&candidate(), &[ungated.clone()], &query()).unwrap();
        assert!(result.is_empty());

        let bypass = MatchQuery {
            bypass_ungated: true,
            ..query()
        };
        let result = MatchEngine::run(&candidate(), &[ungated], &bypass).unwrap();
        assert_eq!(result.job_ids(), vec!["ungated"]);
        assert_eq!(result.entries[0].flags, vec![MatchFlag::Ungated]);
    }

    #[test]
    fn test_candidate_without_tags_is_insufficient() {
        let mut c = candidate();
        c.category_tags = CategoryTagSet::new();
        let err = MatchEngine::run(&c, &[job("a", &[0.6, 0.8])], &query()).unwrap_err();
        assert_eq!(err.stage, MatchStage::Category);

        let open = MatchQuery {
            category_gate: false,
            ..query()
        };
        assert!(MatchEngine::run(&c, &[job("a", &[0.6, 0.8])], &open).is_ok());
    }

    #[test]
    fn test_geo_radius() {
        let mut c = candidate();
        c.location = Some(GeoPoint::new(59.33, 18.07));
        let mut near = job("near", &[0.6, 0.8]);
        near.location = Some(GeoPoint::new(59.33 + 5.0 / 111.0, 18.07));
        let mut far = job("far", &[0.6, 0.8]);
        far.location = Some(GeoPoint::new(59.33 + 50.0 / 111.0, 18.07));

        let q = MatchQuery {
            radius_km: Some(10.0),
            ..query()
        };
        let result = MatchEngine::run(&c, &[near, far], &q).unwrap();
        assert_eq!(result.job_ids(), vec!["near"]);
        let distance = result.entries[0].distance_km.unwrap();
        assert!((distance - 5.0).abs() < 0.1);
    }

    #[test]
    fn test_unknown_location_excluded_unless_included() {
        let mut c = candidate();
        c.location = Some(GeoPoint::new(59.33, 18.07));
        let nowhere = job("nowhere", &[0.6, 0.8]);
        let q = MatchQuery {
            radius_km: Some(10.0),
            ..query()
        };
        assert!(MatchEngine::run(&c, &[nowhere.clone()], &q).unwrap().is_empty());

        let q = MatchQuery {
            include_unknown_location: true,
            ..q
        };
        let result = MatchEngine::run(&c, &[nowhere], &q).unwrap();
        assert_eq!(result.entries[0].flags, vec![MatchFlag::UnknownLocation]);
        assert!(result.entries[0].distance_km.is_none());
    }

    #[test]
    fn test_radius_without_coordinates_is_incomplete_location() {
        let q = MatchQuery {
            radius_km: Some(10.0),
            ..query()
        };
        let err = MatchEngine::run(&candidate(), &[job("a", &[0.6, 0.8])], &q).unwrap_err();
        assert_eq!(err.stage, MatchStage::Geo);
        assert!(matches!(err.failure, MatchFailure::IncompleteLocation(_)));
    }

    #[test]
    fn test_missing_candidate_vector() {
        let mut c = candidate();
        c.vectors = CandidateVectors::default();
        let err = MatchEngine::run(&c, &[], &query()).unwrap_err();
        assert_eq!(err.stage, MatchStage::Vector);
    }

    #[test]
    fn test_jobs_without_vectors_are_counted() {
        let mut no_vector = job("nv", &[0.6, 0.8]);
        no_vector.vector = None;
        let wrong_dim = job("wd", &[1.0, 0.0, 0.0]);
        let result = MatchEngine::run(&candidate(), &[no_vector, wrong_dim], &query()).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.counts.missing_vector, 2);
    }

    #[test]
    fn test_inactive_and_expired_dropped() {
        let q = query();
        let mut inactive = job("inactive", &[0.6, 0.8]);
        inactive.is_active = false;
        let mut expired = job("expired", &[0.6, 0.8]);
        expired.deadline = Some(q.now - Duration::days(1));

        let result = MatchEngine::run(&candidate(), &[inactive, expired, job("live", &[0.6, 0.8])], &q).unwrap();
        assert_eq!(result.job_ids(), vec!["live"]);
        assert_eq!(result.counts.inactive, 2);
    }

    #[test]
    fn test_tie_break_by_recency_then_id() {
        let q = query();
        let mut older = job("b-older", &[0.6, 0.8]);
        older.published_at = Some(q.now - Duration::days(5));
        let mut newer = job("c-newer", &[0.6, 0.8]);
        newer.published_at = Some(q.now - Duration::days(1));
        let undated = job("a-undated", &[0.6, 0.8]);
        let undated_too = job("a-undated-2", &[0.6, 0.8]);

        let result = MatchEngine::run(&candidate(), &[undated_too, older, undated, newer], &q).unwrap();
        assert_eq!(result.job_ids(), vec!["c-newer", "b-older", "a-undated", "a-undated-2"]);
    }

    #[test]
    fn test_tie_break_by_distance_before_id() {
        let q = query();
        let mut c = candidate();
        c.location = Some(GeoPoint::new(59.3293, 18.0686));
        c.radius_km = Some(50.0);

        let published = Some(q.now - Duration::days(2));
        let mut far = job("a-far", &[0.6, 0.8]);
        far.location = Some(GeoPoint::new(59.6293, 18.0686));
        far.published_at = published;
        let mut near = job("z-near", &[0.6, 0.8]);
        near.location = Some(GeoPoint::new(59.3793, 18.0686));
        near.published_at = published;

        let result = MatchEngine::run(&c, &[far, near], &q).unwrap();
        assert_eq!(result.job_ids(), vec!["z-near", "a-far"]);
        assert!(result.entries[0].distance_km < result.entries[1].distance_km);
    }

    #[test]
    fn test_top_k_truncates() {
        let q = MatchQuery { top_k: 2, ..query() };
        let jobs: Vec<JobPosting> = (0..5).map(|i| job(&format!("j{}", i), &[0.6, 0.8])).collect();
        let result = MatchEngine::run(&candidate(), &jobs, &q).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.counts.after_vector, 5);
    }

    #[test]
    fn test_extracted_attributes_count_toward_requirements() {
        let mut c = candidate();
        c.derived_attributes = Some(CandidateAttributes {
            skills: vec!["Python".into(), "Kubernetes".into()],
            ..Default::default()
        });

        let result = MatchEngine::run(&c, &[job_with_requirements("j1", 0.9)], &query()).unwrap();
        let entry = &result.entries[0];
        assert!(entry.requirement_gaps.is_empty());
        assert!(!entry.flags.contains(&MatchFlag::RequirementsUnchecked));
    }

    fn job_with_requirements(id: &str, confidence: f32) -> JobPosting {
        let mut j = job(id, &[0.6, 0.8]);
        j.requirements = Some(RequirementSet {
            must_have: RequirementBucket {
                skills: vec!["Python".into(), "Kubernetes".into()],
                ..Default::default()
            },
            nice_to_have: RequirementBucket {
                skills: vec!["Docker".into()],
                ..Default::default()
            },
            parse_confidence: confidence,
            ..Default::default()
        });
        j
    }

    fn skilled_candidate() -> CandidateProfile {
        let mut c = candidate();
        c.attributes = Some(CandidateAttributes {
            skills: vec!["python".into(), "Docker".into()],
            ..Default::default()
        });
        c
    }

    #[test]
    fn test_soft_policy_penalises_gaps_and_rewards_nice() {
        let result = MatchEngine::run(&skilled_candidate(), &[job_with_requirements("r", 0.6)], &query()).unwrap();
        let entry = &result.entries[0];

        assert_eq!(
            entry.requirement_gaps,
            vec![RequirementGap {
                kind: GapKind::Skill,
                value: "Kubernetes".into()
            }]
        );
        assert_eq!(entry.nice_matches, 1);
        assert!((entry.adjusted_score - (1.0 - 0.05 + 0.02)).abs() < 1e-5);
    }

    #[test]
    fn test_hard_policy_excludes_confident_gaps_only() {
        let mut q = query();
        q.policy.kind = RequirementPolicyKind::Hard;

        let result = MatchEngine::run(
            &skilled_candidate(),
            &[job_with_requirements("confident", 0.8), job_with_requirements("vague", 0.3)],
            &q,
        )
        .unwrap();

        assert_eq!(result.job_ids(), vec!["vague"]);
        assert_eq!(result.counts.excluded_by_requirements, 1);
        assert!(result.entries[0].flags.contains(&MatchFlag::HardPolicySoftened));
    }

    #[test]
    fn test_off_policy_ignores_requirements() {
        let mut q = query();
        q.policy.kind = RequirementPolicyKind::Off;
        let result = MatchEngine::run(&skilled_candidate(), &[job_with_requirements("r", 0.9)], &q).unwrap();
        assert!(result.entries[0].requirement_gaps.is_empty());
        assert!((result.entries[0].adjusted_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fuzzy_skill_match() {
        assert!(has_match(&["Kubernets".to_string()], "Kubernetes", 0.92));
        assert!(!has_match(&["Java".to_string()], "Python", 0.92));
    }

    #[test]
    fn test_best_vector_choice_uses_max() {
        let mut c = candidate();
        c.vectors.personas = vec![unit(&[1.0, 0.0])];
        let q = MatchQuery {
            vector_choice: VectorChoice::Best,
            ..query()
        };
        let result = MatchEngine::run(&c, &[job("x", &[1.0, 0.0])], &q).unwrap();
        assert!((result.entries[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_min_similarity_floor() {
        let q = MatchQuery {
            min_similarity: Some(0.5),
            ..query()
        };
        let result = MatchEngine::run(&candidate(), &[job("low", &[0.8, -0.6])], &q).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.counts.below_min_similarity, 1);
    }

    #[test]
    fn test_results_are_deterministic() {
        let jobs: Vec<JobPosting> = (0..10)
            .map(|i| job(&format!("j{}", i), &[0.6 + i as f32 * 0.01, 0.8]))
            .collect();
        let a = MatchEngine::run(&candidate(), &jobs, &query()).unwrap();
        let b = MatchEngine::run(&candidate(), &jobs, &query()).unwrap();
        assert_eq!(a, b);
    }
}
