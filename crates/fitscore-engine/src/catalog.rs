//! Model catalog: the read-only table of models, stage/tier mappings,
//! workflows, and billing constants.
//!
//! Loaded once at process start from a YAML data file and shared immutably.
//! Everything tunable (tier names, stage mappings, workflow gating, fees)
//! lives in the file, not in code. Construction fails fast on any dangling
//! or cyclic reference so the rest of the engine can trust lookups.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::AnalysisDepth;

/// Pipeline stage kinds, in causal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Triage,
    Extraction,
    Analysis,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Triage => write!(f, "triage"),
            StageKind::Extraction => write!(f, "extraction"),
            StageKind::Analysis => write!(f, "analysis"),
        }
    }
}

/// Cost/quality class used to pick a model for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Economy,
    Balanced,
    Premium,
}

impl std::fmt::Display for CostTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostTier::Economy => write!(f, "economy"),
            CostTier::Balanced => write!(f, "balanced"),
            CostTier::Premium => write!(f, "premium"),
        }
    }
}

/// The two provider wire formats the adapter knows how to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// OpenAI-style chat completions.
    Chat,
    /// Anthropic-style messages with structured output.
    StructuredResponse,
}

/// Static catalog entry for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub provider: String,
    pub intelligence_score: u8,
    pub price_per_1k_input_tokens: f64,
    pub price_per_1k_output_tokens: f64,
    pub max_tokens: u32,
    pub wire_format: WireFormat,
    #[serde(default)]
    pub backup_model_id: Option<String>,
}

/// Gating condition for a workflow stage. Absence of a gate means the stage
/// always runs; a stage absent from the workflow never runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Gate {
    /// Run the stage only when triage data-richness is at least this value
    /// (boundary inclusive).
    pub data_richness_at_least: u8,
}

/// One stage slot in a workflow: the stage kind, the cost tier it requests,
/// and an optional gate evaluated against the triage result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub stage: StageKind,
    pub tier: CostTier,
    #[serde(default)]
    pub gate: Option<Gate>,
}

/// Named, ordered sequence of stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub stages: Vec<WorkflowStage>,
}

/// Per-depth base fees for the credit formula.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BaseFees {
    pub light: f64,
    pub deep: f64,
    pub xray: f64,
}

/// Billing constants for [`crate::cost::to_credit_charge`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Billing {
    pub base_fees: BaseFees,
    pub margin_target: f64,
    pub minimum_charge: f64,
    pub token_cap: u64,
}

impl Billing {
    #[must_use]
    pub fn base_fee(&self, depth: AnalysisDepth) -> f64 {
        match depth {
            AnalysisDepth::Light => self.base_fees.light,
            AnalysisDepth::Deep => self.base_fees.deep,
            AnalysisDepth::Xray => self.base_fees.xray,
        }
    }
}

/// On-disk shape of the catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: Vec<ModelDescriptor>,
    stage_mappings: HashMap<StageKind, HashMap<CostTier, String>>,
    workflows: HashMap<String, Vec<WorkflowStage>>,
    depth_workflows: HashMap<AnalysisDepth, String>,
    billing: Billing,
}

/// Validated, process-lifetime model catalog. No I/O after load.
#[derive(Debug)]
pub struct ModelCatalog {
    models: HashMap<String, ModelDescriptor>,
    stage_mappings: HashMap<StageKind, HashMap<CostTier, String>>,
    workflows: HashMap<String, Workflow>,
    depth_workflows: HashMap<AnalysisDepth, String>,
    billing: Billing,
}

impl ModelCatalog {
    /// Load and validate the catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Catalog`] if the file cannot be read, parsed,
    /// or fails validation.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Catalog(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate the catalog from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Catalog`] on parse failure or any of:
    /// duplicate model id, dangling backup id, backup cycle, stage mapping
    /// to an unknown model, non-positive price, malformed workflow, or a
    /// depth without a workflow.
    pub fn from_yaml(content: &str) -> Result<Self, EngineError> {
        let file: CatalogFile = serde_yaml::from_str(content)
            .map_err(|e| EngineError::Catalog(format!("parse error: {e}")))?;

        let mut models = HashMap::new();
        for model in file.models {
            let id = model.id.clone();
            if models.insert(id.clone(), model).is_some() {
                return Err(EngineError::Catalog(format!("duplicate model id '{id}'")));
            }
        }

        let workflows = file
            .workflows
            .into_iter()
            .map(|(name, stages)| (name, Workflow { stages }))
            .collect();

        let catalog = Self {
            models,
            stage_mappings: file.stage_mappings,
            workflows,
            depth_workflows: file.depth_workflows,
            billing: file.billing,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), EngineError> {
        for model in self.models.values() {
            if model.price_per_1k_input_tokens <= 0.0 || model.price_per_1k_output_tokens <= 0.0 {
                return Err(EngineError::Catalog(format!(
                    "model '{}' has a non-positive price",
                    model.id
                )));
            }

            // Every backup must resolve, and no backup chain may cycle.
            let mut visited = HashSet::new();
            visited.insert(model.id.as_str());
            let mut current = model;
            while let Some(backup_id) = &current.backup_model_id {
                let Some(backup) = self.models.get(backup_id) else {
                    return Err(EngineError::Catalog(format!(
                        "model '{}' names unknown backup '{}'",
                        current.id, backup_id
                    )));
                };
                if !visited.insert(backup.id.as_str()) {
                    return Err(EngineError::Catalog(format!(
                        "backup chain starting at '{}' cycles through '{}'",
                        model.id, backup.id
                    )));
                }
                current = backup;
            }
        }

        for (stage, tiers) in &self.stage_mappings {
            for (tier, model_id) in tiers {
                if !self.models.contains_key(model_id) {
                    return Err(EngineError::Catalog(format!(
                        "stage mapping {stage}/{tier} names unknown model '{model_id}'"
                    )));
                }
            }
        }

        for (name, workflow) in &self.workflows {
            let kinds: Vec<StageKind> = workflow.stages.iter().map(|s| s.stage).collect();
            if kinds.first() != Some(&StageKind::Triage) {
                return Err(EngineError::Catalog(format!(
                    "workflow '{name}' must start with triage"
                )));
            }
            if kinds.last() != Some(&StageKind::Analysis) {
                return Err(EngineError::Catalog(format!(
                    "workflow '{name}' must end with analysis"
                )));
            }
            for slot in &workflow.stages {
                if slot.gate.is_some() && slot.stage != StageKind::Extraction {
                    return Err(EngineError::Catalog(format!(
                        "workflow '{name}' gates stage {}, but only extraction may be gated",
                        slot.stage
                    )));
                }
            }
        }

        for depth in [AnalysisDepth::Light, AnalysisDepth::Deep, AnalysisDepth::Xray] {
            let Some(name) = self.depth_workflows.get(&depth) else {
                return Err(EngineError::Catalog(format!(
                    "no workflow bound to depth {depth}"
                )));
            };
            if !self.workflows.contains_key(name) {
                return Err(EngineError::Catalog(format!(
                    "depth {depth} is bound to unknown workflow '{name}'"
                )));
            }
        }

        Ok(())
    }

    /// Look up a model by id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownModel`] when the id is not in the catalog.
    pub fn lookup_model(&self, id: &str) -> Result<&ModelDescriptor, EngineError> {
        self.models
            .get(id)
            .ok_or_else(|| EngineError::UnknownModel(id.to_string()))
    }

    /// Resolve the configured model for a stage at a tier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownStageMapping`] when the pair has no mapping.
    pub fn stage_mapping(
        &self,
        stage: StageKind,
        tier: CostTier,
    ) -> Result<&ModelDescriptor, EngineError> {
        let model_id = self.mapping_id(stage, tier).ok_or_else(|| {
            EngineError::UnknownStageMapping {
                stage: stage.to_string(),
                tier: tier.to_string(),
            }
        })?;
        self.lookup_model(model_id)
    }

    /// The raw mapped model id for a stage/tier pair, if any. The router
    /// uses this to probe for a premium mapping before committing.
    #[must_use]
    pub fn mapping_id(&self, stage: StageKind, tier: CostTier) -> Option<&str> {
        self.stage_mappings
            .get(&stage)
            .and_then(|tiers| tiers.get(&tier))
            .map(String::as_str)
    }

    /// The workflow bound to a depth. Total because load-time validation
    /// guarantees a binding for every depth.
    #[must_use]
    pub fn workflow_for(&self, depth: AnalysisDepth) -> &Workflow {
        let name = &self.depth_workflows[&depth];
        &self.workflows[name]
    }

    #[must_use]
    pub fn billing(&self) -> &Billing {
        &self.billing
    }

    /// Number of models in the catalog.
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}
