use serde::{Deserialize, Serialize};

use super::record::InputValue;

/// Display groups of the standard FORD intake form. Custom tables may use any label.
pub const PATIENT_DEMOGRAPHICS: &str = "Patient Demographics";
pub const ED_VITAL_SIGNS: &str = "ED Vital Signs";
pub const INJURY_CHARACTERISTICS: &str = "Injury Characteristics";
pub const PREHOSPITAL_AND_INSURANCE: &str = "Prehospital & Insurance";

/// Declared type and valid domain of a clinical input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariableKind {
    Boolean,
    Categorical {
        options: Vec<String>,
    },
    Numeric {
        min: f64,
        max: f64,
        step: f64,
        default: f64,
    },
}

impl VariableKind {
    pub const fn type_name(&self) -> &'static str {
        match self {
            VariableKind::Boolean => "boolean",
            VariableKind::Categorical { .. } => "categorical",
            VariableKind::Numeric { .. } => "numeric",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: VariableKind,
    /// Display label grouping variables on a form. Scoring never looks at it.
    pub group: String,
}

impl VariableDefinition {
    pub fn numeric(
        name: &str,
        label: &str,
        (min, max): (f64, f64),
        step: f64,
        default: f64,
        group: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: VariableKind::Numeric {
                min,
                max,
                step,
                default,
            },
            group: group.to_string(),
        }
    }

    pub fn categorical(name: &str, label: &str, options: &[&str], group: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: VariableKind::Categorical {
                options: options.iter().map(|option| option.to_string()).collect(),
            },
            group: group.to_string(),
        }
    }

    pub fn boolean(name: &str, label: &str, group: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: VariableKind::Boolean,
            group: group.to_string(),
        }
    }

    /// Value an untouched form would submit: the numeric default, the first option, or `false`.
    /// Returns `None` only for a categorical variable without options, which table validation
    /// rejects.
    pub fn default_value(&self) -> Option<InputValue> {
        match &self.kind {
            VariableKind::Boolean => Some(InputValue::Bool(false)),
            VariableKind::Categorical { options } => {
                options.first().cloned().map(InputValue::Text)
            }
            VariableKind::Numeric { default, .. } => Some(InputValue::Number(*default)),
        }
    }
}

pub(crate) fn standard_variables() -> Vec<VariableDefinition> {
    vec![
        VariableDefinition::numeric(
            "age",
            "Age (years)",
            (18.0, 110.0),
            1.0,
            50.0,
            PATIENT_DEMOGRAPHICS,
        ),
        VariableDefinition::categorical("sex", "Sex", &["Male", "Female"], PATIENT_DEMOGRAPHICS),
        VariableDefinition::numeric(
            "bmi",
            "BMI (kg/m\u{b2})",
            (10.0, 80.0),
            0.1,
            25.0,
            PATIENT_DEMOGRAPHICS,
        ),
        VariableDefinition::numeric(
            "gcs",
            "Glasgow Coma Scale (3-15)",
            (3.0, 15.0),
            1.0,
            15.0,
            ED_VITAL_SIGNS,
        ),
        VariableDefinition::numeric(
            "sbp",
            "Systolic Blood Pressure (mmHg)",
            (40.0, 260.0),
            1.0,
            120.0,
            ED_VITAL_SIGNS,
        ),
        VariableDefinition::numeric(
            "hr",
            "Heart Rate (bpm)",
            (20.0, 220.0),
            1.0,
            75.0,
            ED_VITAL_SIGNS,
        ),
        VariableDefinition::numeric(
            "rr",
            "Respiratory Rate (breaths/min)",
            (4.0, 50.0),
            1.0,
            16.0,
            ED_VITAL_SIGNS,
        ),
        VariableDefinition::categorical(
            "fracture_site",
            "Fracture Site",
            &["Other", "Hip/Femur", "Axial (Spine/Rib/Pelvis)", "Both"],
            INJURY_CHARACTERISTICS,
        ),
        VariableDefinition::categorical(
            "mechanism",
            "Mechanism of Injury",
            &["Fall", "MVC", "Assault", "Other"],
            INJURY_CHARACTERISTICS,
        ),
        VariableDefinition::categorical(
            "transport",
            "Transport Mode",
            &["Ambulance/Air", "Private Vehicle", "Walk-in", "Other"],
            PREHOSPITAL_AND_INSURANCE,
        ),
        VariableDefinition::categorical(
            "insurance",
            "Insurance",
            &["Self-pay", "Medicare", "Medicaid", "Private", "Charity", "Other"],
            PREHOSPITAL_AND_INSURANCE,
        ),
    ]
}

/// Body-mass index from imperial height and weight, as bedside charts record them.
pub fn body_mass_index(height_in: f64, weight_lb: f64) -> Option<f64> {
    if !(height_in.is_finite() && weight_lb.is_finite()) || height_in <= 0.0 || weight_lb <= 0.0 {
        return None;
    }
    Some(weight_lb / (height_in * height_in) * 703.0)
}
