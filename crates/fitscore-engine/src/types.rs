//! Domain types threaded through the analysis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::StageKind;

/// Requested analysis thoroughness. Controls which stages run and which
/// output schema the main analysis stage uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Light,
    Deep,
    Xray,
}

impl std::fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisDepth::Light => write!(f, "light"),
            AnalysisDepth::Deep => write!(f, "deep"),
            AnalysisDepth::Xray => write!(f, "xray"),
        }
    }
}

impl std::str::FromStr for AnalysisDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(AnalysisDepth::Light),
            "deep" => Ok(AnalysisDepth::Deep),
            "xray" => Ok(AnalysisDepth::Xray),
            other => Err(format!(
                "unknown depth '{other}'; expected light, deep, or xray"
            )),
        }
    }
}

/// One recent post on the subject's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentPost {
    pub id: String,
    pub caption: String,
    pub likes: u64,
    pub comments: u64,
}

/// Pre-computed engagement summary, when the profile source provides one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub avg_likes: f64,
    pub avg_comments: f64,
    /// Engagement rate as a fraction of followers, e.g. `0.031`.
    pub rate: f64,
    pub sample_size: u32,
}

/// Normalized subject-of-analysis record. Immutable input to the pipeline;
/// produced by the external profile source and never mutated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub subject_id: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    pub verified: bool,
    pub private: bool,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub recent_posts: Vec<RecentPost>,
    #[serde(default)]
    pub engagement: Option<EngagementSummary>,
}

/// The requesting business. Immutable input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessContext {
    pub name: String,
    pub industry: String,
    pub target_audience: String,
    pub value_proposition: String,
    /// Optional pre-generated one-line pitch, used to cheapen the triage prompt.
    #[serde(default)]
    pub pitch: Option<String>,
}

/// Output of the triage stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageResult {
    /// 0–100 partnership lead score.
    pub lead_score: u8,
    /// 0–100 score for how much analyzable data the profile carries.
    pub data_richness: u8,
    /// Model confidence in its own triage, `0.0..=1.0`.
    pub confidence: f64,
    /// 2–4 short observations to focus later stages on.
    pub observations: Vec<String>,
    /// Computed by the model but deliberately disabled: stage gating is
    /// driven by depth and `data_richness` alone, never by this flag.
    #[serde(default)]
    pub early_exit: bool,
}

/// Structured facts derived from raw profile content by the extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub posting_cadence: String,
    pub content_themes: Vec<String>,
    pub audience_signals: Vec<String>,
    pub brand_mentions: Vec<String>,
    pub collaboration_evidence: Vec<String>,
}

/// Mutable accumulator threaded through stage execution. Later stages read
/// earlier stages' parsed results, never their raw request/response bytes.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub triage: Option<TriageResult>,
    pub extraction: Option<ExtractionResult>,
}

/// Metered cost of one executed stage. Cache hits produce an explicit
/// zero-cost detail with `model_used = "cached"`, never an absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCostDetail {
    pub stage: StageKind,
    pub model_used: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub actual_cost_usd: f64,
}

/// Sum of all stage cost details for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedCost {
    pub total_cost_usd: f64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    /// Stage kinds that completed, in execution order.
    pub stages_executed: Vec<StageKind>,
}

/// Wall-clock duration of one stage attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: StageKind,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Success,
    Error,
}

/// Terminal result of one orchestration run. Callers branch on `verdict`,
/// never on exceptions: fatal stage failures are folded into an `Error`
/// verdict with whatever cost and timing data was collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub verdict: Verdict,
    /// Depth-specific scoring payload on success.
    pub scoring: Option<serde_json::Value>,
    /// Human-readable failure detail on error.
    pub error: Option<String>,
    pub cost: AggregatedCost,
    pub stage_timings_ms: Vec<StageTiming>,
    pub completed_at: DateTime<Utc>,
}
