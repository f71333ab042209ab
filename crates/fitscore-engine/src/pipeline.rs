//! Stage pipeline orchestration.
//!
//! Runs the workflow bound to the requested depth strictly sequentially:
//! triage (fatal on failure), a gated extraction stage (recoverable), and
//! the main analysis stage (fatal). Fatal failures never escape
//! [`Orchestrator::run_analysis`]: the caller always receives a well-formed
//! [`OrchestrationResult`] carrying the partial cost and timing data
//! collected before the failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::Instrument;
use uuid::Uuid;

use fitscore_core::{AppConfig, SecretProvider};

use crate::adapter::{AiClient, ModelResponse};
use crate::cache::{extraction_fingerprint, ExtractionCache};
use crate::catalog::{CostTier, Gate, ModelCatalog, StageKind};
use crate::cost::{aggregate, call_cost_usd};
use crate::error::EngineError;
use crate::prompts;
use crate::router::ModelRouter;
use crate::types::{
    AnalysisDepth, BusinessContext, ExtractionResult, OrchestrationResult, PipelineContext,
    Profile, StageCostDetail, StageTiming, TriageResult, Verdict,
};

/// Output budget handed to the model per stage, additionally capped by the
/// selected model's own `max_tokens`.
const TRIAGE_MAX_TOKENS: u32 = 500;
const EXTRACTION_MAX_TOKENS: u32 = 1000;
const ANALYSIS_MAX_TOKENS: u32 = 2000;

/// Marker used as `model_used` for cache hits.
const CACHED_MODEL: &str = "cached";

/// Runtime knobs for the engine, derived from [`AppConfig`] in production
/// and built directly in tests.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Provider name → API base URL.
    pub base_urls: HashMap<String, String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub triage_timeout: Duration,
    pub extraction_timeout: Duration,
    pub analysis_timeout: Duration,
    pub cache_ttl: Duration,
}

impl EngineConfig {
    #[must_use]
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        let base_urls = HashMap::from([
            ("openai".to_string(), cfg.openai_base_url.clone()),
            ("anthropic".to_string(), cfg.anthropic_base_url.clone()),
        ]);
        Self {
            base_urls,
            user_agent: cfg.user_agent.clone(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            triage_timeout: Duration::from_secs(cfg.triage_timeout_secs),
            extraction_timeout: Duration::from_secs(cfg.extraction_timeout_secs),
            analysis_timeout: Duration::from_secs(cfg.analysis_timeout_secs),
            cache_ttl: Duration::from_secs(cfg.cache_ttl_secs),
        }
    }
}

/// The analysis orchestration engine. One instance serves many concurrent
/// requests; the catalog is read-only and the cache is safe for concurrent
/// use by construction.
pub struct Orchestrator {
    catalog: Arc<ModelCatalog>,
    router: ModelRouter,
    client: AiClient,
    cache: Arc<dyn ExtractionCache>,
    config: EngineConfig,
}

impl Orchestrator {
    /// Builds an orchestrator over a loaded catalog.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if the HTTP client cannot be built.
    pub fn new(
        catalog: Arc<ModelCatalog>,
        secrets: Arc<dyn SecretProvider>,
        cache: Arc<dyn ExtractionCache>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let client = AiClient::new(
            Arc::clone(&catalog),
            secrets,
            config.base_urls.clone(),
            &config.user_agent,
            config.connect_timeout,
        )?;
        Ok(Self {
            router: ModelRouter::new(Arc::clone(&catalog)),
            catalog,
            client,
            cache,
            config,
        })
    }

    /// Run the full pipeline for one profile. Sole entry point.
    ///
    /// Never returns an error: callers branch on
    /// [`OrchestrationResult::verdict`].
    pub async fn run_analysis(
        &self,
        profile: &Profile,
        business: &BusinessContext,
        depth: AnalysisDepth,
    ) -> OrchestrationResult {
        let span = tracing::info_span!(
            "analysis",
            request_id = %Uuid::new_v4(),
            subject = %profile.subject_id,
            %depth
        );
        self.run_pipeline(profile, business, depth)
            .instrument(span)
            .await
    }

    async fn run_pipeline(
        &self,
        profile: &Profile,
        business: &BusinessContext,
        depth: AnalysisDepth,
    ) -> OrchestrationResult {
        let workflow = self.catalog.workflow_for(depth);
        let mut ctx = PipelineContext::default();
        let mut details: Vec<StageCostDetail> = Vec::new();
        let mut timings: Vec<StageTiming> = Vec::new();
        let mut scoring: Option<serde_json::Value> = None;

        for slot in &workflow.stages {
            match slot.stage {
                StageKind::Triage => {
                    let started = Instant::now();
                    let outcome = self.run_triage(profile, business, slot.tier).await;
                    timings.push(timing(StageKind::Triage, started));
                    match outcome {
                        Ok((triage, detail)) => {
                            tracing::info!(
                                lead_score = triage.lead_score,
                                data_richness = triage.data_richness,
                                "triage complete"
                            );
                            details.push(detail);
                            ctx.triage = Some(triage);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "triage failed, aborting run");
                            return error_result(&e, &details, timings);
                        }
                    }
                }
                StageKind::Extraction => {
                    if !gate_allows(slot.gate, ctx.triage.as_ref()) {
                        tracing::debug!("extraction gated off, skipping");
                        continue;
                    }
                    let started = Instant::now();
                    let outcome = self
                        .run_extraction(profile, slot.tier, ctx.triage.as_ref())
                        .await;
                    timings.push(timing(StageKind::Extraction, started));
                    match outcome {
                        Ok((extraction, detail)) => {
                            details.push(detail);
                            ctx.extraction = Some(extraction);
                        }
                        Err(e) => {
                            // Recoverable: downstream prompts degrade by
                            // omitting the extraction context block.
                            tracing::warn!(error = %e, "extraction failed, continuing without it");
                            ctx.extraction = None;
                        }
                    }
                }
                StageKind::Analysis => {
                    let started = Instant::now();
                    let outcome = self
                        .run_main_analysis(depth, profile, business, slot.tier, &ctx)
                        .await;
                    timings.push(timing(StageKind::Analysis, started));
                    match outcome {
                        Ok((payload, detail)) => {
                            details.push(detail);
                            scoring = Some(payload);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "main analysis failed, aborting run");
                            return error_result(&e, &details, timings);
                        }
                    }
                }
            }
        }

        OrchestrationResult {
            verdict: Verdict::Success,
            scoring,
            error: None,
            cost: aggregate(&details),
            stage_timings_ms: timings,
            completed_at: chrono::Utc::now(),
        }
    }

    async fn run_triage(
        &self,
        profile: &Profile,
        business: &BusinessContext,
        tier: CostTier,
    ) -> Result<(TriageResult, StageCostDetail), EngineError> {
        let model = self.router.select_model(StageKind::Triage, tier, None)?;
        let prompt = prompts::triage_prompt(profile, business);
        let schema = prompts::triage_schema();
        let response = self
            .client
            .execute(
                model,
                &prompt,
                TRIAGE_MAX_TOKENS.min(model.max_tokens),
                Some(&schema),
                self.config.triage_timeout,
            )
            .await?;

        let mut triage: TriageResult = parse_stage_json(&response.content, "triage result")?;
        // Early exit is disabled: stage gating reads depth and data
        // richness only, never this flag.
        triage.early_exit = false;

        let detail = self.cost_detail(StageKind::Triage, &response)?;
        Ok((triage, detail))
    }

    async fn run_extraction(
        &self,
        profile: &Profile,
        tier: CostTier,
        triage: Option<&TriageResult>,
    ) -> Result<(ExtractionResult, StageCostDetail), EngineError> {
        let key = extraction_fingerprint(profile);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => {
                tracing::debug!(%key, "extraction cache hit");
                let detail = StageCostDetail {
                    stage: StageKind::Extraction,
                    model_used: CACHED_MODEL.to_string(),
                    tokens_in: 0,
                    tokens_out: 0,
                    actual_cost_usd: 0.0,
                };
                return Ok((cached, detail));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "extraction cache read failed, treating as miss");
            }
        }

        let model = self
            .router
            .select_model(StageKind::Extraction, tier, triage)?;
        let prompt = prompts::extraction_prompt(profile);
        let schema = prompts::extraction_schema();
        let response = self
            .client
            .execute(
                model,
                &prompt,
                EXTRACTION_MAX_TOKENS.min(model.max_tokens),
                Some(&schema),
                self.config.extraction_timeout,
            )
            .await?;

        let extraction: ExtractionResult =
            parse_stage_json(&response.content, "extraction result")?;

        // Best-effort write: a cache failure never fails the stage.
        if let Err(e) = self
            .cache
            .put(&key, &extraction, self.config.cache_ttl)
            .await
        {
            tracing::warn!(error = %e, "extraction cache write failed");
        }

        let detail = self.cost_detail(StageKind::Extraction, &response)?;
        Ok((extraction, detail))
    }

    async fn run_main_analysis(
        &self,
        depth: AnalysisDepth,
        profile: &Profile,
        business: &BusinessContext,
        tier: CostTier,
        ctx: &PipelineContext,
    ) -> Result<(serde_json::Value, StageCostDetail), EngineError> {
        let model = self
            .router
            .select_model(StageKind::Analysis, tier, ctx.triage.as_ref())?;
        let prompt = prompts::analysis_prompt(depth, profile, business, ctx);
        let schema = prompts::analysis_schema(depth);
        let response = self
            .client
            .execute(
                model,
                &prompt,
                ANALYSIS_MAX_TOKENS.min(model.max_tokens),
                Some(&schema),
                self.config.analysis_timeout,
            )
            .await?;

        let payload: serde_json::Value = parse_stage_json(&response.content, "analysis result")?;
        let detail = self.cost_detail(StageKind::Analysis, &response)?;
        Ok((payload, detail))
    }

    /// Price a stage by the model that actually answered it.
    fn cost_detail(
        &self,
        stage: StageKind,
        response: &ModelResponse,
    ) -> Result<StageCostDetail, EngineError> {
        let model = self.catalog.lookup_model(&response.model_used)?;
        Ok(StageCostDetail {
            stage,
            model_used: response.model_used.clone(),
            tokens_in: response.tokens_in,
            tokens_out: response.tokens_out,
            actual_cost_usd: call_cost_usd(model, response.tokens_in, response.tokens_out),
        })
    }
}

fn gate_allows(gate: Option<Gate>, triage: Option<&TriageResult>) -> bool {
    match gate {
        None => true,
        Some(gate) => {
            triage.is_some_and(|t| t.data_richness >= gate.data_richness_at_least)
        }
    }
}

fn timing(stage: StageKind, started: Instant) -> StageTiming {
    StageTiming {
        stage,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

fn error_result(
    error: &EngineError,
    details: &[StageCostDetail],
    timings: Vec<StageTiming>,
) -> OrchestrationResult {
    OrchestrationResult {
        verdict: Verdict::Error,
        scoring: None,
        error: Some(error.to_string()),
        cost: aggregate(details),
        stage_timings_ms: timings,
        completed_at: chrono::Utc::now(),
    }
}

fn parse_stage_json<T: DeserializeOwned>(content: &str, context: &str) -> Result<T, EngineError> {
    serde_json::from_str(content).map_err(|e| EngineError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}
