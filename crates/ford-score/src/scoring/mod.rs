//! FORD score engine: validated rule table in, clamped score with an auditable breakdown out.

mod record;
pub mod router;
mod rules;
mod table;
mod tiers;
mod variables;

#[cfg(test)]
mod tests;

pub use record::{InputRecord, InputValue, ValidationError};
pub use router::scoring_router;
pub use rules::{Criterion, ScoringRule};
pub use table::{ConfigurationError, RuleTable, RuleTableDocument, MODEL_NAME};
pub use tiers::{
    RiskColor, RiskLevel, RiskLevelReference, RiskTier, RiskTierTable, ScoreRate, ScoreRateTable,
    MAX_SCORE,
};
pub use variables::{
    body_mass_index, VariableDefinition, VariableKind, ED_VITAL_SIGNS, INJURY_CHARACTERISTICS,
    PATIENT_DEMOGRAPHICS, PREHOSPITAL_AND_INSURANCE,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stateless scorer over a validated rule table. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    table: RuleTable,
}

impl ScoringEngine {
    pub fn new(table: RuleTable) -> Self {
        Self { table }
    }

    /// Engine over the embedded FORD table.
    pub fn standard() -> Result<Self, ConfigurationError> {
        RuleTable::standard().map(Self::new)
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn compute_prediction(
        &self,
        record: &InputRecord,
    ) -> Result<PredictionResult, ValidationError> {
        record::validate_record(self.table.variables(), record)?;

        let components: Vec<ScoreComponent> = self
            .table
            .rules()
            .iter()
            .map(|rule| rule.evaluate(record))
            .collect();
        let raw_score: i32 = components.iter().map(|component| component.points).sum();
        let total_score = clamp_score(raw_score);

        let risk_tier = self.table.tiers().classify(total_score).clone();
        let score_discharge_rate = self.table.score_rates().rate_for(total_score);

        debug!(
            raw_score,
            total_score,
            risk_level = risk_tier.level.label(),
            "computed FORD prediction"
        );

        Ok(PredictionResult {
            total_score,
            raw_score,
            discharge_rate: risk_tier.discharge_rate,
            score_discharge_rate,
            risk_tier,
            components,
        })
    }

    /// Same as [`compute_prediction`](Self::compute_prediction), with variables the caller
    /// left out taking their declared defaults.
    pub fn compute_with_defaults(
        &self,
        partial: &InputRecord,
    ) -> Result<PredictionResult, ValidationError> {
        let mut record = self.table.default_record();
        record.merge(partial.clone());
        self.compute_prediction(&record)
    }
}

/// Raw sums may leave the nominal scale; clamp once, after all rules are summed.
pub fn clamp_score(raw_score: i32) -> u8 {
    raw_score.clamp(0, i32::from(MAX_SCORE)) as u8
}

/// Discrete contribution to a prediction, allowing transparent audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub label: String,
    pub condition: String,
    pub met: bool,
    /// Points the rule carries when met.
    pub weight: i32,
    /// Points actually contributed: `weight` when met, otherwise 0.
    pub points: i32,
}

/// Prediction output describing the clamped score, tier, and rule-by-rule trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub total_score: u8,
    pub raw_score: i32,
    pub components: Vec<ScoreComponent>,
    pub risk_tier: RiskTier,
    pub discharge_rate: f64,
    pub score_discharge_rate: f64,
}

impl PredictionResult {
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_tier.level
    }

    /// Met components, largest absolute contribution first.
    pub fn active_components(&self) -> Vec<&ScoreComponent> {
        let mut active: Vec<&ScoreComponent> = self
            .components
            .iter()
            .filter(|component| component.met)
            .collect();
        active.sort_by_key(|component| std::cmp::Reverse(component.points.abs()));
        active
    }

    pub fn summary(&self) -> String {
        format!(
            "FORD score {} ({} risk, {:.1}% non-home discharge)",
            self.total_score,
            self.risk_tier.level.label(),
            self.score_discharge_rate
        )
    }
}
