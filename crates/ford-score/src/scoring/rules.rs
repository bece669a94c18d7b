use serde::{Deserialize, Serialize};

use super::record::InputRecord;
use super::variables::VariableKind;
use super::ScoreComponent;

/// Predicate over a single variable. Kept as data so tables stay serializable and auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    /// value <= threshold
    AtMost { variable: String, threshold: f64 },
    /// value < threshold
    Below { variable: String, threshold: f64 },
    /// value >= threshold
    AtLeast { variable: String, threshold: f64 },
    /// value > threshold
    Above { variable: String, threshold: f64 },
    /// min <= value <= max
    Between { variable: String, min: f64, max: f64 },
    OneOf { variable: String, values: Vec<String> },
    Flag { variable: String },
}

impl Criterion {
    pub fn variable(&self) -> &str {
        match self {
            Criterion::AtMost { variable, .. }
            | Criterion::Below { variable, .. }
            | Criterion::AtLeast { variable, .. }
            | Criterion::Above { variable, .. }
            | Criterion::Between { variable, .. }
            | Criterion::OneOf { variable, .. }
            | Criterion::Flag { variable } => variable,
        }
    }

    /// Whether this criterion can be evaluated against a variable of `kind`.
    pub(crate) fn applies_to(&self, kind: &VariableKind) -> bool {
        match self {
            Criterion::AtMost { .. }
            | Criterion::Below { .. }
            | Criterion::AtLeast { .. }
            | Criterion::Above { .. }
            | Criterion::Between { .. } => matches!(kind, VariableKind::Numeric { .. }),
            Criterion::OneOf { .. } => matches!(kind, VariableKind::Categorical { .. }),
            Criterion::Flag { .. } => matches!(kind, VariableKind::Boolean),
        }
    }

    /// Evaluate against a record that already passed validation. A value of the wrong
    /// shape never satisfies the criterion.
    pub fn is_met(&self, record: &InputRecord) -> bool {
        let Some(value) = record.get(self.variable()) else {
            return false;
        };

        match self {
            Criterion::AtMost { threshold, .. } => {
                value.as_number().is_some_and(|number| number <= *threshold)
            }
            Criterion::Below { threshold, .. } => {
                value.as_number().is_some_and(|number| number < *threshold)
            }
            Criterion::AtLeast { threshold, .. } => {
                value.as_number().is_some_and(|number| number >= *threshold)
            }
            Criterion::Above { threshold, .. } => {
                value.as_number().is_some_and(|number| number > *threshold)
            }
            Criterion::Between { min, max, .. } => value
                .as_number()
                .is_some_and(|number| *min <= number && number <= *max),
            Criterion::OneOf { values, .. } => value
                .as_text()
                .is_some_and(|text| values.iter().any(|candidate| candidate == text)),
            Criterion::Flag { .. } => value.as_bool().unwrap_or(false),
        }
    }
}

/// One weighted clinical criterion of the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub label: String,
    pub condition: String,
    pub criterion: Criterion,
    pub points: i32,
}

impl ScoringRule {
    pub fn new(label: &str, condition: &str, criterion: Criterion, points: i32) -> Self {
        Self {
            label: label.to_string(),
            condition: condition.to_string(),
            criterion,
            points,
        }
    }

    pub(crate) fn evaluate(&self, record: &InputRecord) -> ScoreComponent {
        let met = self.criterion.is_met(record);
        ScoreComponent {
            label: self.label.clone(),
            condition: self.condition.clone(),
            met,
            weight: self.points,
            points: if met { self.points } else { 0 },
        }
    }
}

fn at_most(variable: &str, threshold: f64) -> Criterion {
    Criterion::AtMost {
        variable: variable.to_string(),
        threshold,
    }
}

fn below(variable: &str, threshold: f64) -> Criterion {
    Criterion::Below {
        variable: variable.to_string(),
        threshold,
    }
}

fn at_least(variable: &str, threshold: f64) -> Criterion {
    Criterion::AtLeast {
        variable: variable.to_string(),
        threshold,
    }
}

fn above(variable: &str, threshold: f64) -> Criterion {
    Criterion::Above {
        variable: variable.to_string(),
        threshold,
    }
}

fn between(variable: &str, min: f64, max: f64) -> Criterion {
    Criterion::Between {
        variable: variable.to_string(),
        min,
        max,
    }
}

fn one_of(variable: &str, values: &[&str]) -> Criterion {
    Criterion::OneOf {
        variable: variable.to_string(),
        values: values.iter().map(|value| value.to_string()).collect(),
    }
}

/// FORD rules in published weight order; the breakdown is reported in this order.
pub(crate) fn standard_rules() -> Vec<ScoringRule> {
    vec![
        ScoringRule::new("GCS Severe (\u{2264} 8)", "GCS \u{2264} 8", at_most("gcs", 8.0), 6),
        ScoringRule::new(
            "Hip/Femur Fracture",
            "Fracture site is Hip/Femur or Both",
            one_of("fracture_site", &["Hip/Femur", "Both"]),
            5,
        ),
        ScoringRule::new("Resp Rate Low (< 12)", "RR < 12", below("rr", 12.0), 5),
        ScoringRule::new(
            "Insurance: Medicare",
            "Insurance = Medicare",
            one_of("insurance", &["Medicare"]),
            4,
        ),
        ScoringRule::new("SBP Hypotensive (< 90)", "SBP < 90", below("sbp", 90.0), 4),
        ScoringRule::new(
            "Insurance: Other",
            "Insurance = Other",
            one_of("insurance", &["Other"]),
            4,
        ),
        ScoringRule::new("Age \u{2265} 75", "Age \u{2265} 75", at_least("age", 75.0), 3),
        ScoringRule::new(
            "Axial Fracture (Spine/Rib/Pelvis)",
            "Fracture site is Axial or Both",
            one_of("fracture_site", &["Axial (Spine/Rib/Pelvis)", "Both"]),
            3,
        ),
        ScoringRule::new(
            "Insurance: Private",
            "Insurance = Private",
            one_of("insurance", &["Private"]),
            3,
        ),
        ScoringRule::new(
            "Insurance: Charity",
            "Insurance = Charity",
            one_of("insurance", &["Charity"]),
            3,
        ),
        ScoringRule::new(
            "GCS Moderate (9-12)",
            "9 \u{2264} GCS \u{2264} 12",
            between("gcs", 9.0, 12.0),
            3,
        ),
        ScoringRule::new(
            "BMI \u{2265} 40 (Class III Obesity)",
            "BMI \u{2265} 40",
            at_least("bmi", 40.0),
            2,
        ),
        ScoringRule::new(
            "Age 65-74",
            "65 \u{2264} Age \u{2264} 74",
            between("age", 65.0, 74.0),
            1,
        ),
        ScoringRule::new("Female", "Sex = Female", one_of("sex", &["Female"]), 1),
        ScoringRule::new("Resp Rate High (> 20)", "RR > 20", above("rr", 20.0), 1),
        ScoringRule::new(
            "Heart Rate Tachycardic (\u{2265} 100)",
            "HR \u{2265} 100",
            at_least("hr", 100.0),
            1,
        ),
        ScoringRule::new(
            "Transport: Private Vehicle",
            "Transport = Private Vehicle",
            one_of("transport", &["Private Vehicle"]),
            -2,
        ),
        ScoringRule::new(
            "Mechanism: Assault",
            "Mechanism = Assault",
            one_of("mechanism", &["Assault"]),
            -3,
        ),
        ScoringRule::new(
            "Transport: Walk-in",
            "Transport = Walk-in",
            one_of("transport", &["Walk-in"]),
            -4,
        ),
    ]
}
