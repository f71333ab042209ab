//! Prompt and output-schema builders for the three pipeline stages.
//!
//! Prompts are assembled from a compact profile snapshot rather than the
//! raw profile, keeping triage cheap. Schemas are strict JSON schemas
//! handed to the adapter so providers return machine-parseable output.

use crate::types::{AnalysisDepth, BusinessContext, PipelineContext, Profile};

const BIO_MAX_CHARS: usize = 300;
const CAPTION_MAX_CHARS: usize = 140;
const SNAPSHOT_CAPTIONS: usize = 3;

/// Truncate on a character boundary, appending an ellipsis when cut.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}…")
}

/// Host of the profile's external link, when present and parseable.
fn external_domain(profile: &Profile) -> Option<String> {
    let url = profile.external_url.as_deref()?;
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed.host_str().map(ToString::to_string)
}

/// Compact, human-readable profile summary used by triage and analysis.
#[must_use]
pub fn profile_snapshot(profile: &Profile) -> String {
    let mut lines = vec![
        format!("subject: {}", profile.subject_id),
        format!(
            "followers: {} / following: {} / posts: {}",
            profile.follower_count, profile.following_count, profile.post_count
        ),
        format!(
            "verified: {} / private: {}",
            profile.verified, profile.private
        ),
    ];

    if !profile.bio.is_empty() {
        lines.push(format!("bio: {}", truncate(&profile.bio, BIO_MAX_CHARS)));
    }
    if let Some(domain) = external_domain(profile) {
        lines.push(format!("external domain: {domain}"));
    }
    if let Some(engagement) = &profile.engagement {
        lines.push(format!(
            "engagement: avg {:.1} likes, avg {:.1} comments, rate {:.4} over {} posts",
            engagement.avg_likes, engagement.avg_comments, engagement.rate, engagement.sample_size
        ));
    }

    lines.push(format!("recent posts: {}", profile.recent_posts.len()));
    for post in profile.recent_posts.iter().take(SNAPSHOT_CAPTIONS) {
        lines.push(format!(
            "- [{} likes, {} comments] {}",
            post.likes,
            post.comments,
            truncate(&post.caption, CAPTION_MAX_CHARS)
        ));
    }

    lines.join("\n")
}

/// One line describing the requesting business; uses the pre-generated
/// pitch when available to keep the triage prompt short.
fn business_line(business: &BusinessContext) -> String {
    match &business.pitch {
        Some(pitch) => format!("{}: {}", business.name, pitch),
        None => format!(
            "{} ({}) targets {}; value proposition: {}",
            business.name, business.industry, business.target_audience, business.value_proposition
        ),
    }
}

#[must_use]
pub fn triage_prompt(profile: &Profile, business: &BusinessContext) -> String {
    format!(
        "You are screening a social-media profile as a potential partner for a business.\n\
         Business: {}\n\n\
         Profile snapshot:\n{}\n\n\
         Score the profile as a partnership lead (lead_score, 0-100) and rate how much \
         analyzable data it exposes (data_richness, 0-100). Give your confidence (0-1), \
         2 to 4 short focus observations for deeper analysis, and whether analysis could \
         stop here (early_exit). Respond with JSON matching the provided schema.",
        business_line(business),
        profile_snapshot(profile)
    )
}

#[must_use]
pub fn triage_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "lead_score": { "type": "integer", "minimum": 0, "maximum": 100 },
            "data_richness": { "type": "integer", "minimum": 0, "maximum": 100 },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "observations": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 2,
                "maxItems": 4
            },
            "early_exit": { "type": "boolean" }
        },
        "required": ["lead_score", "data_richness", "confidence", "observations", "early_exit"],
        "additionalProperties": false
    })
}

#[must_use]
pub fn extraction_prompt(profile: &Profile) -> String {
    let captions: Vec<String> = profile
        .recent_posts
        .iter()
        .map(|p| format!("- {}", truncate(&p.caption, CAPTION_MAX_CHARS)))
        .collect();
    format!(
        "Extract structured facts from this profile's recent content.\n\n\
         Profile snapshot:\n{}\n\nAll recent captions:\n{}\n\n\
         Derive: posting_cadence (one phrase), content_themes, audience_signals, \
         brand_mentions, and collaboration_evidence. Respond with JSON matching the \
         provided schema. Use empty arrays where nothing is evident.",
        profile_snapshot(profile),
        captions.join("\n")
    )
}

#[must_use]
pub fn extraction_schema() -> serde_json::Value {
    let string_array = serde_json::json!({ "type": "array", "items": { "type": "string" } });
    serde_json::json!({
        "type": "object",
        "properties": {
            "posting_cadence": { "type": "string" },
            "content_themes": string_array,
            "audience_signals": string_array,
            "brand_mentions": string_array,
            "collaboration_evidence": string_array
        },
        "required": [
            "posting_cadence",
            "content_themes",
            "audience_signals",
            "brand_mentions",
            "collaboration_evidence"
        ],
        "additionalProperties": false
    })
}

#[must_use]
pub fn analysis_prompt(
    depth: AnalysisDepth,
    profile: &Profile,
    business: &BusinessContext,
    ctx: &PipelineContext,
) -> String {
    let mut sections = vec![
        format!("Assess this profile's fit as a business partner ({depth} analysis)."),
        format!("Business: {}", business_line(business)),
        format!("Profile snapshot:\n{}", profile_snapshot(profile)),
    ];

    if let Some(triage) = &ctx.triage {
        sections.push(format!(
            "Triage: lead score {}, data richness {}, focus: {}",
            triage.lead_score,
            triage.data_richness,
            triage.observations.join("; ")
        ));
    }
    // Degrade gracefully: when extraction failed or was skipped, this
    // context block is simply omitted.
    if let Some(extraction) = &ctx.extraction {
        sections.push(format!(
            "Extracted facts: cadence {}; themes: {}; audience: {}; brands: {}; collaborations: {}",
            extraction.posting_cadence,
            extraction.content_themes.join(", "),
            extraction.audience_signals.join(", "),
            extraction.brand_mentions.join(", "),
            extraction.collaboration_evidence.join(", ")
        ));
    }

    sections.push("Respond with JSON matching the provided schema.".to_string());
    sections.join("\n\n")
}

/// Depth-specific output schema for the main analysis stage. Each depth has
/// its own shape: light is a score and summary, deep adds strengths/risks
/// and audience fit, xray adds outreach and collaboration projections.
#[must_use]
pub fn analysis_schema(depth: AnalysisDepth) -> serde_json::Value {
    let string_array = serde_json::json!({ "type": "array", "items": { "type": "string" } });
    match depth {
        AnalysisDepth::Light => serde_json::json!({
            "type": "object",
            "properties": {
                "fit_score": { "type": "integer", "minimum": 0, "maximum": 100 },
                "summary": { "type": "string" },
                "recommended_action": { "type": "string" }
            },
            "required": ["fit_score", "summary", "recommended_action"],
            "additionalProperties": false
        }),
        AnalysisDepth::Deep => serde_json::json!({
            "type": "object",
            "properties": {
                "fit_score": { "type": "integer", "minimum": 0, "maximum": 100 },
                "summary": { "type": "string" },
                "strengths": string_array,
                "risks": string_array,
                "audience_fit": { "type": "string" },
                "recommended_action": { "type": "string" }
            },
            "required": [
                "fit_score", "summary", "strengths", "risks",
                "audience_fit", "recommended_action"
            ],
            "additionalProperties": false
        }),
        AnalysisDepth::Xray => serde_json::json!({
            "type": "object",
            "properties": {
                "fit_score": { "type": "integer", "minimum": 0, "maximum": 100 },
                "summary": { "type": "string" },
                "strengths": string_array,
                "risks": string_array,
                "audience_fit": { "type": "string" },
                "collaboration_angles": string_array,
                "estimated_reach": { "type": "string" },
                "outreach_draft": { "type": "string" },
                "recommended_action": { "type": "string" }
            },
            "required": [
                "fit_score", "summary", "strengths", "risks", "audience_fit",
                "collaboration_angles", "estimated_reach", "outreach_draft",
                "recommended_action"
            ],
            "additionalProperties": false
        }),
    }
}
