//! Analysis orchestration engine for fitscore.
//!
//! Scores social-media profiles for business-partnership fit by running a
//! sequential triage → extraction → analysis pipeline against external AI
//! providers, accumulating the metered token cost of each stage and
//! converting it into a billable credit charge.
//!
//! The engine owns the decision logic only: which stages run for a requested
//! depth, which model serves each stage (with a single backup-model retry),
//! what each call cost, and what to charge for the run. Persistence, billing
//! debits, and transport concerns belong to callers.

pub mod adapter;
pub mod cache;
pub mod catalog;
pub mod cost;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod router;
pub mod source;
pub mod types;

pub use adapter::{AiClient, ModelResponse};
pub use cache::{extraction_fingerprint, ExtractionCache, MemoryCache};
pub use catalog::{
    Billing, CostTier, Gate, ModelCatalog, ModelDescriptor, StageKind, WireFormat, Workflow,
    WorkflowStage,
};
pub use cost::{aggregate, call_cost_usd, to_credit_charge};
pub use error::EngineError;
pub use pipeline::{EngineConfig, Orchestrator};
pub use router::ModelRouter;
pub use source::{ProfileSource, ProfileSourceError};
pub use types::{
    AggregatedCost, AnalysisDepth, BusinessContext, ExtractionResult, OrchestrationResult,
    PipelineContext, Profile, StageCostDetail, StageTiming, TriageResult, Verdict,
};
