use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::record::{check_value, InputRecord};
use super::rules::{standard_rules, Criterion, ScoringRule};
use super::tiers::{standard_tiers, RiskLevel, RiskTierTable, ScoreRateTable};
use super::variables::{standard_variables, VariableDefinition, VariableKind};

/// Rule table failed its load-time consistency checks. Fatal: no engine is built.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("failed to read rule table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rule table document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("variable '{0}' is declared more than once")]
    DuplicateVariable(String),
    #[error("variable '{variable}' has an invalid domain: {reason}")]
    InvalidDomain { variable: String, reason: String },
    #[error("rule '{rule}' references undeclared variable '{variable}'")]
    UndefinedVariable { rule: String, variable: String },
    #[error("rule '{rule}' cannot apply a {criterion} test to {kind} variable '{variable}'")]
    CriterionMismatch {
        rule: String,
        variable: String,
        criterion: &'static str,
        kind: &'static str,
    },
    #[error("rule '{rule}' is malformed: {reason}")]
    InvalidRule { rule: String, reason: String },
    #[error("rule table declares no scoring rules")]
    NoRules,
    #[error("tier {level:?} range {min_score}..={max_score} falls outside 0..=10")]
    TierOutOfBounds {
        level: RiskLevel,
        min_score: u8,
        max_score: u8,
    },
    #[error("score {score} is covered by more than one risk tier")]
    TierOverlap { score: u8 },
    #[error("score {score} is not covered by any risk tier")]
    TierGap { score: u8 },
    #[error("risk level {level:?} is assigned to more than one tier")]
    DuplicateTierLevel { level: RiskLevel },
    #[error("expected {expected} risk tiers, found {found}")]
    TierCount { expected: usize, found: usize },
    #[error("{context} has invalid discharge rate {rate}")]
    InvalidRate { context: String, rate: f64 },
    #[error("score rate given for {score}, outside 0..=10")]
    ScoreRateOutOfBounds { score: u8 },
    #[error("score {score} has more than one discharge rate")]
    DuplicateScoreRate { score: u8 },
    #[error("score {score} has no discharge rate")]
    MissingScoreRate { score: u8 },
}

/// Serialized shape of a rule table. Tiers and score rates validate while deserializing;
/// variables and rules validate in [`RuleTable::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTableDocument {
    pub model_name: String,
    pub variables: Vec<VariableDefinition>,
    pub rules: Vec<ScoringRule>,
    pub tiers: RiskTierTable,
    pub score_rates: ScoreRateTable,
}

/// Immutable, validated scoring configuration. Only constructible through validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTable {
    model_name: String,
    variables: Vec<VariableDefinition>,
    rules: Vec<ScoringRule>,
    tiers: RiskTierTable,
    score_rates: ScoreRateTable,
}

pub const MODEL_NAME: &str = "FORD Score";

impl RuleTable {
    pub fn new(
        model_name: impl Into<String>,
        variables: Vec<VariableDefinition>,
        rules: Vec<ScoringRule>,
        tiers: RiskTierTable,
        score_rates: ScoreRateTable,
    ) -> Result<Self, ConfigurationError> {
        validate_variables(&variables)?;
        validate_rules(&variables, &rules)?;

        Ok(Self {
            model_name: model_name.into(),
            variables,
            rules,
            tiers,
            score_rates,
        })
    }

    /// The embedded FORD table.
    pub fn standard() -> Result<Self, ConfigurationError> {
        Self::new(
            MODEL_NAME,
            standard_variables(),
            standard_rules(),
            RiskTierTable::new(standard_tiers())?,
            ScoreRateTable::standard(),
        )
    }

    pub fn from_document(document: RuleTableDocument) -> Result<Self, ConfigurationError> {
        let RuleTableDocument {
            model_name,
            variables,
            rules,
            tiers,
            score_rates,
        } = document;
        Self::new(model_name, variables, rules, tiers, score_rates)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ConfigurationError> {
        let document: RuleTableDocument = serde_json::from_reader(reader)?;
        Self::from_document(document)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let table = Self::from_json_reader(std::io::BufReader::new(file))?;
        info!(
            path = %path.display(),
            model = %table.model_name,
            rules = table.rules.len(),
            "loaded rule table"
        );
        Ok(table)
    }

    /// Load from `path` when given, otherwise use the embedded table.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::standard(),
        }
    }

    pub fn to_document(&self) -> RuleTableDocument {
        RuleTableDocument {
            model_name: self.model_name.clone(),
            variables: self.variables.clone(),
            rules: self.rules.clone(),
            tiers: self.tiers.clone(),
            score_rates: self.score_rates.clone(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn variables(&self) -> &[VariableDefinition] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub fn rules(&self) -> &[ScoringRule] {
        &self.rules
    }

    pub fn tiers(&self) -> &RiskTierTable {
        &self.tiers
    }

    pub fn score_rates(&self) -> &ScoreRateTable {
        &self.score_rates
    }

    /// Variables bucketed by display group. Groups appear in the order their first member is
    /// declared; members keep declaration order.
    pub fn variables_by_group(&self) -> Vec<(&str, Vec<&VariableDefinition>)> {
        let mut groups: Vec<(&str, Vec<&VariableDefinition>)> = Vec::new();

        for variable in &self.variables {
            match groups
                .iter_mut()
                .find(|(group, _)| *group == variable.group)
            {
                Some((_, members)) => members.push(variable),
                None => groups.push((variable.group.as_str(), vec![variable])),
            }
        }

        groups
    }

    /// Every variable at its declared default, as an untouched intake form submits it.
    pub fn default_record(&self) -> InputRecord {
        self.variables
            .iter()
            .filter_map(|variable| {
                variable
                    .default_value()
                    .map(|value| (variable.name.clone(), value))
            })
            .collect()
    }
}

fn invalid_domain(variable: &VariableDefinition, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidDomain {
        variable: variable.name.clone(),
        reason: reason.into(),
    }
}

fn validate_variables(variables: &[VariableDefinition]) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();

    for variable in variables {
        if !seen.insert(variable.name.as_str()) {
            return Err(ConfigurationError::DuplicateVariable(variable.name.clone()));
        }

        match &variable.kind {
            VariableKind::Boolean => {}
            VariableKind::Numeric { min, max, step, .. } => {
                if !(min.is_finite() && max.is_finite()) || min > max {
                    return Err(invalid_domain(variable, format!("bounds [{min}, {max}]")));
                }
                if !(step.is_finite() && *step > 0.0) {
                    return Err(invalid_domain(variable, format!("step {step}")));
                }
            }
            VariableKind::Categorical { options } => {
                if options.is_empty() {
                    return Err(invalid_domain(variable, "no options"));
                }
                let mut unique = HashSet::new();
                if let Some(repeated) = options.iter().find(|option| !unique.insert(option.as_str()))
                {
                    return Err(invalid_domain(variable, format!("option '{repeated}' repeats")));
                }
            }
        }

        if variable.group.trim().is_empty() {
            return Err(invalid_domain(variable, "blank display group"));
        }

        if let Some(default) = variable.default_value() {
            if check_value(variable, &default).is_err() {
                return Err(invalid_domain(
                    variable,
                    format!("default {default} lies outside the domain"),
                ));
            }
        }
    }

    Ok(())
}

fn criterion_name(criterion: &Criterion) -> &'static str {
    match criterion {
        Criterion::AtMost { .. } => "at_most",
        Criterion::Below { .. } => "below",
        Criterion::AtLeast { .. } => "at_least",
        Criterion::Above { .. } => "above",
        Criterion::Between { .. } => "between",
        Criterion::OneOf { .. } => "one_of",
        Criterion::Flag { .. } => "flag",
    }
}

fn validate_rules(
    variables: &[VariableDefinition],
    rules: &[ScoringRule],
) -> Result<(), ConfigurationError> {
    if rules.is_empty() {
        return Err(ConfigurationError::NoRules);
    }

    for rule in rules {
        let name = rule.criterion.variable();
        let variable = variables
            .iter()
            .find(|variable| variable.name == name)
            .ok_or_else(|| ConfigurationError::UndefinedVariable {
                rule: rule.label.clone(),
                variable: name.to_string(),
            })?;

        if !rule.criterion.applies_to(&variable.kind) {
            return Err(ConfigurationError::CriterionMismatch {
                rule: rule.label.clone(),
                variable: variable.name.clone(),
                criterion: criterion_name(&rule.criterion),
                kind: variable.kind.type_name(),
            });
        }

        let malformed = |reason: String| ConfigurationError::InvalidRule {
            rule: rule.label.clone(),
            reason,
        };

        match (&rule.criterion, &variable.kind) {
            (Criterion::Between { min, max, .. }, _) if !(min <= max) => {
                return Err(malformed(format!("empty range [{min}, {max}]")));
            }
            (
                Criterion::AtMost { threshold, .. }
                | Criterion::Below { threshold, .. }
                | Criterion::AtLeast { threshold, .. }
                | Criterion::Above { threshold, .. },
                _,
            ) if !threshold.is_finite() => {
                return Err(malformed(format!("threshold {threshold}")));
            }
            (Criterion::OneOf { values, .. }, VariableKind::Categorical { options }) => {
                if values.is_empty() {
                    return Err(malformed("no values to match".to_string()));
                }
                if let Some(unknown) = values.iter().find(|value| !options.contains(value)) {
                    return Err(malformed(format!(
                        "'{unknown}' is not an option of '{}'",
                        variable.name
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(())
}
