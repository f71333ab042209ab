//! Model selection: maps (stage, requested tier, live context) to a
//! concrete catalog entry.

use std::sync::Arc;

use crate::catalog::{CostTier, ModelCatalog, ModelDescriptor, StageKind};
use crate::error::EngineError;
use crate::types::TriageResult;

/// Triage lead scores above this value upgrade a balanced request to the
/// stage's premium mapping.
const UPGRADE_LEAD_SCORE: u8 = 70;

/// Stateless selector over the catalog's stage mappings.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    catalog: Arc<ModelCatalog>,
}

impl ModelRouter {
    #[must_use]
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self { catalog }
    }

    /// Resolve the model for a stage at the requested tier.
    ///
    /// The single context-sensitive branch: when live triage reports a lead
    /// score above 70 and the caller asked for `balanced`, the stage's
    /// `premium` mapping is substituted, falling back to `balanced` when
    /// the stage has no premium mapping. Every other stage/tier pair
    /// resolves statically.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownStageMapping`] when the stage has no
    /// mapping at the resolved tier; selection never silently defaults.
    pub fn select_model(
        &self,
        stage: StageKind,
        requested: CostTier,
        live: Option<&TriageResult>,
    ) -> Result<&ModelDescriptor, EngineError> {
        let upgrade = requested == CostTier::Balanced
            && live.is_some_and(|t| t.lead_score > UPGRADE_LEAD_SCORE);

        let tier = if upgrade && self.catalog.mapping_id(stage, CostTier::Premium).is_some() {
            tracing::debug!(%stage, "high lead score, upgrading balanced request to premium");
            CostTier::Premium
        } else {
            requested
        };

        self.catalog.stage_mapping(stage, tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Arc<ModelCatalog> {
        let yaml = r"
models:
  - id: cheap
    provider: openai
    intelligence_score: 40
    price_per_1k_input_tokens: 0.0003
    price_per_1k_output_tokens: 0.0012
    max_tokens: 16384
    wire_format: chat
  - id: smart
    provider: anthropic
    intelligence_score: 80
    price_per_1k_input_tokens: 0.003
    price_per_1k_output_tokens: 0.015
    max_tokens: 8192
    wire_format: structured_response
stage_mappings:
  triage:
    economy: cheap
    balanced: cheap
  extraction:
    balanced: cheap
  analysis:
    balanced: cheap
    premium: smart
workflows:
  micro_only:
    - { stage: triage, tier: economy }
    - { stage: analysis, tier: balanced }
  auto:
    - { stage: triage, tier: economy }
    - { stage: extraction, tier: balanced, gate: { data_richness_at_least: 70 } }
    - { stage: analysis, tier: balanced }
  full:
    - { stage: triage, tier: economy }
    - { stage: extraction, tier: balanced }
    - { stage: analysis, tier: balanced }
depth_workflows:
  light: micro_only
  deep: auto
  xray: full
billing:
  base_fees: { light: 0.5, deep: 1.0, xray: 2.0 }
  margin_target: 0.3
  minimum_charge: 0.1
  token_cap: 2200
";
        Arc::new(ModelCatalog::from_yaml(yaml).unwrap())
    }

    fn triage_with_lead(lead_score: u8) -> TriageResult {
        TriageResult {
            lead_score,
            data_richness: 50,
            confidence: 0.8,
            observations: vec!["test".to_string()],
            early_exit: false,
        }
    }

    #[test]
    fn high_lead_score_upgrades_balanced_to_premium() {
        let router = ModelRouter::new(catalog());
        let triage = triage_with_lead(85);
        let model = router
            .select_model(StageKind::Analysis, CostTier::Balanced, Some(&triage))
            .unwrap();
        assert_eq!(model.id, "smart");
    }

    #[test]
    fn lead_score_at_threshold_does_not_upgrade() {
        let router = ModelRouter::new(catalog());
        let triage = triage_with_lead(70);
        let model = router
            .select_model(StageKind::Analysis, CostTier::Balanced, Some(&triage))
            .unwrap();
        assert_eq!(model.id, "cheap");
    }

    #[test]
    fn upgrade_does_not_apply_to_economy_requests() {
        let router = ModelRouter::new(catalog());
        let triage = triage_with_lead(95);
        let model = router
            .select_model(StageKind::Triage, CostTier::Economy, Some(&triage))
            .unwrap();
        assert_eq!(model.id, "cheap");
    }

    #[test]
    fn upgrade_falls_back_to_balanced_without_premium_mapping() {
        let router = ModelRouter::new(catalog());
        let triage = triage_with_lead(90);
        // Extraction has no premium mapping, so balanced wins even at lead 90.
        let model = router
            .select_model(StageKind::Extraction, CostTier::Balanced, Some(&triage))
            .unwrap();
        assert_eq!(model.id, "cheap");
    }

    #[test]
    fn no_live_context_resolves_statically() {
        let router = ModelRouter::new(catalog());
        let model = router
            .select_model(StageKind::Analysis, CostTier::Balanced, None)
            .unwrap();
        assert_eq!(model.id, "cheap");
    }

    #[test]
    fn missing_mapping_is_an_error_not_a_default() {
        let router = ModelRouter::new(catalog());
        let err = router
            .select_model(StageKind::Triage, CostTier::Premium, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownStageMapping { .. }));
    }
}
