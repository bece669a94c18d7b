use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::variables::{VariableDefinition, VariableKind};

/// Concrete value captured for one clinical variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl InputValue {
    pub const fn kind_name(&self) -> &'static str {
        match self {
            InputValue::Bool(_) => "boolean",
            InputValue::Number(_) => "number",
            InputValue::Text(_) => "text",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            InputValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            InputValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            InputValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Bool(value) => write!(f, "{value}"),
            InputValue::Number(value) => write!(f, "{value}"),
            InputValue::Text(value) => write!(f, "'{value}'"),
        }
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Patient inputs keyed by variable name, as submitted by a form or API caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputRecord {
    values: BTreeMap<String, InputValue>,
}

impl InputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for fixtures and CLI wiring.
    pub fn with(mut self, name: &str, value: impl Into<InputValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<InputValue>) -> Option<InputValue> {
        self.values.insert(name.to_string(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<InputValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InputValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Copy every entry of `overrides` over this record.
    pub fn merge(&mut self, overrides: InputRecord) {
        self.values.extend(overrides.values);
    }
}

impl FromIterator<(String, InputValue)> for InputRecord {
    fn from_iter<T: IntoIterator<Item = (String, InputValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Input rejected before scoring. Every variant names the offending variable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing value for '{variable}'")]
    MissingVariable { variable: String },
    #[error("'{variable}' is not a variable of this rule table")]
    UnknownVariable { variable: String },
    #[error("'{variable}' expects a {expected} value, found {found}")]
    TypeMismatch {
        variable: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("'{variable}' must be a finite number")]
    NotFinite { variable: String },
    #[error("'{variable}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        variable: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("'{variable}' value '{value}' is not one of: {}", .options.join(", "))]
    InvalidOption {
        variable: String,
        value: String,
        options: Vec<String>,
    },
}

impl ValidationError {
    pub fn variable(&self) -> &str {
        match self {
            ValidationError::MissingVariable { variable }
            | ValidationError::UnknownVariable { variable }
            | ValidationError::TypeMismatch { variable, .. }
            | ValidationError::NotFinite { variable }
            | ValidationError::OutOfRange { variable, .. }
            | ValidationError::InvalidOption { variable, .. } => variable,
        }
    }
}

pub(crate) fn check_value(
    definition: &VariableDefinition,
    value: &InputValue,
) -> Result<(), ValidationError> {
    let mismatch = || ValidationError::TypeMismatch {
        variable: definition.name.clone(),
        expected: definition.kind.type_name(),
        found: value.kind_name(),
    };

    match &definition.kind {
        VariableKind::Boolean => value.as_bool().map(|_| ()).ok_or_else(mismatch),
        VariableKind::Numeric { min, max, .. } => {
            let number = value.as_number().ok_or_else(mismatch)?;
            if !number.is_finite() {
                return Err(ValidationError::NotFinite {
                    variable: definition.name.clone(),
                });
            }
            if number < *min || number > *max {
                return Err(ValidationError::OutOfRange {
                    variable: definition.name.clone(),
                    value: number,
                    min: *min,
                    max: *max,
                });
            }
            Ok(())
        }
        VariableKind::Categorical { options } => {
            let text = value.as_text().ok_or_else(mismatch)?;
            if options.iter().any(|option| option == text) {
                Ok(())
            } else {
                Err(ValidationError::InvalidOption {
                    variable: definition.name.clone(),
                    value: text.to_string(),
                    options: options.clone(),
                })
            }
        }
    }
}

/// Check a record against the declared variables, in declaration order, then reject
/// names the table does not know.
pub(crate) fn validate_record(
    variables: &[VariableDefinition],
    record: &InputRecord,
) -> Result<(), ValidationError> {
    for definition in variables {
        let value = record
            .get(&definition.name)
            .ok_or_else(|| ValidationError::MissingVariable {
                variable: definition.name.clone(),
            })?;
        check_value(definition, value)?;
    }

    if let Some((name, _)) = record
        .iter()
        .find(|(name, _)| !variables.iter().any(|definition| definition.name == *name))
    {
        return Err(ValidationError::UnknownVariable {
            variable: name.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definitions() -> Vec<VariableDefinition> {
        vec![
            VariableDefinition::numeric(
                "gcs",
                "GCS",
                (3.0, 15.0),
                1.0,
                15.0,
                "ED Vital Signs",
            ),
            VariableDefinition::categorical(
                "sex",
                "Sex",
                &["Male", "Female"],
                "Patient Demographics",
            ),
            VariableDefinition::boolean(
                "anticoagulated",
                "Anticoagulated",
                "ED Vital Signs",
            ),
        ]
    }

    fn complete() -> InputRecord {
        InputRecord::new()
            .with("gcs", 14.0)
            .with("sex", "Female")
            .with("anticoagulated", false)
    }

    #[test]
    fn accepts_complete_record() {
        assert_eq!(validate_record(&definitions(), &complete()), Ok(()));
    }

    #[test]
    fn reports_first_missing_variable_in_declaration_order() {
        let record = InputRecord::new().with("anticoagulated", true);
        let err = validate_record(&definitions(), &record).expect_err("gcs missing");
        assert_eq!(
            err,
            ValidationError::MissingVariable {
                variable: "gcs".to_string()
            }
        );
    }

    #[test]
    fn rejects_non_boolean_for_boolean_variable() {
        let record = complete().with("anticoagulated", "yes");
        let err = validate_record(&definitions(), &record).expect_err("type mismatch");
        assert_eq!(err.variable(), "anticoagulated");
        assert!(matches!(
            err,
            ValidationError::TypeMismatch {
                expected: "boolean",
                found: "text",
                ..
            }
        ));
    }

    #[test]
    fn rejects_out_of_range_and_non_finite_numbers() {
        let err = validate_record(&definitions(), &complete().with("gcs", 2.0))
            .expect_err("below minimum");
        assert!(matches!(err, ValidationError::OutOfRange { value, .. } if value == 2.0));

        let err = validate_record(&definitions(), &complete().with("gcs", f64::NAN))
            .expect_err("nan rejected");
        assert_eq!(
            err,
            ValidationError::NotFinite {
                variable: "gcs".to_string()
            }
        );
    }

    #[test]
    fn categorical_options_are_case_sensitive() {
        let err = validate_record(&definitions(), &complete().with("sex", "female"))
            .expect_err("no coercion");
        assert_eq!(err.variable(), "sex");
        assert!(err.to_string().contains("Male, Female"));
    }

    #[test]
    fn rejects_unknown_variables() {
        let record = complete().with("shoe_size", 42.0);
        let err = validate_record(&definitions(), &record).expect_err("unknown name");
        assert_eq!(
            err,
            ValidationError::UnknownVariable {
                variable: "shoe_size".to_string()
            }
        );
    }

    #[test]
    fn record_deserializes_from_plain_json_object() {
        let record: InputRecord = serde_json::from_str(
            r#"{"gcs": 9, "sex": "Male", "anticoagulated": true}"#,
        )
        .expect("json record");

        assert_eq!(record.get("gcs"), Some(&InputValue::Number(9.0)));
        assert_eq!(record.get("anticoagulated"), Some(&InputValue::Bool(true)));
        assert_eq!(record.len(), 3);
    }
}
