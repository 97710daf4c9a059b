//! Candidate scoring and the filter/rank pipeline.
//!
//! Everything here is pure and synchronous: same inputs, same ranked output.

use serde::Deserialize;

use crate::models::{Availability, Profile};

/// Weights of the four score terms. They sum to 100.
const WEIGHT_SKILL_OVERLAP: f64 = 40.0;
const WEIGHT_AVAILABILITY: f64 = 20.0;
const WEIGHT_RATING: f64 = 20.0;
const WEIGHT_EXPERIENCE: f64 = 20.0;

/// Completed swaps at which the experience term saturates.
const EXPERIENCE_CEILING: f64 = 50.0;

/// Compatibility score between a candidate and the viewing user, 0 to 100.
///
/// The skill-overlap term is directional: it is normalized by the candidate's
/// own skill count, so `score(a, b)` and `score(b, a)` generally differ.
pub fn match_score(candidate: &Profile, viewer: &Profile) -> u8 {
    let mut score = 0.0;

    let overlap = candidate
        .skills_offered
        .iter()
        .filter(|skill| viewer.skills_wanted.contains(skill))
        .count()
        + viewer
            .skills_offered
            .iter()
            .filter(|skill| candidate.skills_wanted.contains(skill))
            .count();

    let total_skills = candidate.skills_offered.len() + candidate.skills_wanted.len();
    if total_skills > 0 {
        score += overlap as f64 / total_skills as f64 * WEIGHT_SKILL_OVERLAP;
    }

    if candidate.availability.compatible_with(viewer.availability) {
        score += WEIGHT_AVAILABILITY;
    }

    score += candidate.rating / 5.0 * WEIGHT_RATING;
    score += (candidate.completed_swaps as f64 / EXPERIENCE_CEILING).min(1.0) * WEIGHT_EXPERIENCE;

    score.round() as u8
}

/// Filter criteria for the candidate list. Every field is optional; a
/// missing or malformed value means "no constraint".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    /// Free-text query matched against name and skill names.
    #[serde(default)]
    pub q: Option<String>,
    /// Exact availability tag.
    #[serde(default)]
    pub availability: Option<String>,
    /// Substring matched against offered or wanted skills.
    #[serde(default)]
    pub skill: Option<String>,
    /// Substring matched against the profile location.
    #[serde(default)]
    pub location: Option<String>,
    /// Minimum rating.
    #[serde(default)]
    pub min_rating: Option<f64>,
    /// Comma-separated category tags; a profile passes if any tag matches
    /// any of its skills.
    #[serde(default)]
    pub categories: Option<String>,
}

/// Apply the criteria to `candidates`, annotate survivors with their match
/// score relative to `viewer`, and sort descending by score.
///
/// The viewer never appears in the result. The sort is stable, so equal
/// scores keep their input order.
pub fn rank(candidates: Vec<Profile>, viewer: &Profile, criteria: &MatchCriteria) -> Vec<Profile> {
    let query = normalized(criteria.q.as_deref());
    let skill = normalized(criteria.skill.as_deref());
    let location = normalized(criteria.location.as_deref());
    let availability = criteria
        .availability
        .as_deref()
        .map(str::trim)
        .and_then(Availability::from_str);
    let tags: Vec<String> = criteria
        .categories
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let mut ranked: Vec<Profile> = candidates
        .into_iter()
        .filter(|candidate| candidate.id != viewer.id)
        .filter(|candidate| {
            query
                .as_deref()
                .map(|q| matches_text(candidate, q))
                .unwrap_or(true)
        })
        .filter(|candidate| {
            availability
                .map(|a| candidate.availability == a)
                .unwrap_or(true)
        })
        .filter(|candidate| {
            skill
                .as_deref()
                .map(|s| matches_skill(candidate, s))
                .unwrap_or(true)
        })
        .filter(|candidate| {
            location
                .as_deref()
                .map(|l| candidate.location.to_lowercase().contains(l))
                .unwrap_or(true)
        })
        .filter(|candidate| {
            criteria
                .min_rating
                .map(|min| candidate.rating >= min)
                .unwrap_or(true)
        })
        .filter(|candidate| tags.is_empty() || tags.iter().any(|t| matches_skill(candidate, t)))
        .map(|mut candidate| {
            candidate.match_score = Some(match_score(&candidate, viewer));
            candidate
        })
        .collect();

    ranked.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    ranked
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

/// Case-insensitive substring match against name, offered and wanted skills.
fn matches_text(profile: &Profile, needle: &str) -> bool {
    profile.name.to_lowercase().contains(needle) || matches_skill(profile, needle)
}

fn matches_skill(profile: &Profile, needle: &str) -> bool {
    profile
        .skills_offered
        .iter()
        .chain(profile.skills_wanted.iter())
        .any(|skill| skill.to_lowercase().contains(needle))
}
