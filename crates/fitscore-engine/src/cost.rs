//! Cost accounting: token usage → USD, USD → billable credits.
//!
//! Everything here is pure arithmetic. Debiting the computed charge is the
//! caller's job; the engine never touches a billing ledger.

use crate::catalog::{Billing, ModelDescriptor};
use crate::types::{AggregatedCost, AnalysisDepth, StageCostDetail};

/// Charge multiplier applied to the base fee when a run blows past the
/// token cap, bypassing the margin formula entirely.
const TOKEN_CAP_MULTIPLIER: f64 = 1.5;

/// Actual dollar cost of one call, priced by the model that answered
/// (primary or backup), never the one originally requested.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn call_cost_usd(model: &ModelDescriptor, tokens_in: u64, tokens_out: u64) -> f64 {
    tokens_in as f64 / 1000.0 * model.price_per_1k_input_tokens
        + tokens_out as f64 / 1000.0 * model.price_per_1k_output_tokens
}

/// Sum per-stage details into one run-level cost record, preserving the
/// order stages executed in.
#[must_use]
pub fn aggregate(details: &[StageCostDetail]) -> AggregatedCost {
    let mut total = AggregatedCost::default();
    for detail in details {
        total.total_cost_usd += detail.actual_cost_usd;
        total.total_tokens_in += detail.tokens_in;
        total.total_tokens_out += detail.tokens_out;
        total.stages_executed.push(detail.stage);
    }
    total
}

/// Convert a run's aggregated actual cost into a billable credit amount.
///
/// - Over the token cap: `base_fee * 1.5`, regardless of actual cost.
/// - Otherwise: `max(base_fee + actual_cost * (1 + margin_target), minimum_charge)`,
///   rounded to 2 decimal places.
#[must_use]
pub fn to_credit_charge(
    depth: AnalysisDepth,
    actual_cost_usd: f64,
    total_tokens: u64,
    billing: &Billing,
) -> f64 {
    let base_fee = billing.base_fee(depth);
    if total_tokens > billing.token_cap {
        return round2(base_fee * TOKEN_CAP_MULTIPLIER);
    }
    let charge = base_fee + actual_cost_usd * (1.0 + billing.margin_target);
    round2(charge.max(billing.minimum_charge))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BaseFees, StageKind, WireFormat};

    fn billing() -> Billing {
        Billing {
            base_fees: BaseFees {
                light: 0.5,
                deep: 1.0,
                xray: 2.0,
            },
            margin_target: 0.3,
            minimum_charge: 0.1,
            token_cap: 2200,
        }
    }

    fn model(price_in: f64, price_out: f64) -> ModelDescriptor {
        ModelDescriptor {
            id: "m".to_string(),
            provider: "openai".to_string(),
            intelligence_score: 50,
            price_per_1k_input_tokens: price_in,
            price_per_1k_output_tokens: price_out,
            max_tokens: 4096,
            wire_format: WireFormat::Chat,
            backup_model_id: None,
        }
    }

    fn detail(stage: StageKind, cost: f64, tokens_in: u64, tokens_out: u64) -> StageCostDetail {
        StageCostDetail {
            stage,
            model_used: "m".to_string(),
            tokens_in,
            tokens_out,
            actual_cost_usd: cost,
        }
    }

    #[test]
    fn call_cost_prices_both_directions() {
        let m = model(0.003, 0.015);
        let cost = call_cost_usd(&m, 2000, 1000);
        assert!((cost - (0.006 + 0.015)).abs() < 1e-12, "got {cost}");
    }

    #[test]
    fn aggregate_sums_and_preserves_order() {
        let details = vec![
            detail(StageKind::Triage, 0.01, 100, 50),
            detail(StageKind::Extraction, 0.0, 0, 0),
            detail(StageKind::Analysis, 0.05, 900, 400),
        ];
        let total = aggregate(&details);
        assert!((total.total_cost_usd - 0.06).abs() < 1e-12);
        assert_eq!(total.total_tokens_in, 1000);
        assert_eq!(total.total_tokens_out, 450);
        assert_eq!(
            total.stages_executed,
            vec![StageKind::Triage, StageKind::Extraction, StageKind::Analysis]
        );
    }

    #[test]
    fn aggregate_of_nothing_is_zero() {
        let total = aggregate(&[]);
        assert!(total.total_cost_usd.abs() < f64::EPSILON);
        assert!(total.stages_executed.is_empty());
    }

    #[test]
    fn charge_applies_margin_and_rounds() {
        // 1.0 + 0.02 * 1.3 = 1.026 → 1.03
        let charge = to_credit_charge(AnalysisDepth::Deep, 0.02, 500, &billing());
        assert!((charge - 1.03).abs() < f64::EPSILON, "got {charge}");
    }

    #[test]
    fn charge_over_token_cap_is_flat_multiple_of_base_fee() {
        let charge = to_credit_charge(AnalysisDepth::Deep, 0.02, 2500, &billing());
        assert!((charge - 1.5).abs() < f64::EPSILON, "got {charge}");
        // Actual cost is irrelevant past the cap.
        let expensive = to_credit_charge(AnalysisDepth::Deep, 9.99, 2500, &billing());
        assert!((expensive - 1.5).abs() < f64::EPSILON, "got {expensive}");
    }

    #[test]
    fn charge_at_token_cap_boundary_uses_margin_formula() {
        // Exactly at the cap is not over it.
        let charge = to_credit_charge(AnalysisDepth::Deep, 0.02, 2200, &billing());
        assert!((charge - 1.03).abs() < f64::EPSILON, "got {charge}");
    }

    #[test]
    fn charge_never_falls_below_minimum() {
        let mut b = billing();
        b.base_fees.light = 0.0;
        let charge = to_credit_charge(AnalysisDepth::Light, 0.0, 100, &b);
        assert!((charge - 0.1).abs() < f64::EPSILON, "got {charge}");
    }

    #[test]
    fn charge_is_monotonic_in_actual_cost_below_cap() {
        let b = billing();
        let mut previous = 0.0;
        for step in 0..50 {
            let cost = f64::from(step) * 0.01;
            let charge = to_credit_charge(AnalysisDepth::Xray, cost, 1000, &b);
            assert!(
                charge >= previous,
                "charge decreased: {previous} -> {charge} at cost {cost}"
            );
            previous = charge;
        }
    }

    #[test]
    fn base_fees_order_light_deep_xray() {
        let b = billing();
        assert!(b.base_fee(AnalysisDepth::Light) < b.base_fee(AnalysisDepth::Deep));
        assert!(b.base_fee(AnalysisDepth::Deep) < b.base_fee(AnalysisDepth::Xray));
    }
}
