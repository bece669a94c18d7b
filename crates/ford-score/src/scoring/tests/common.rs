use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::scoring::{
    Criterion, InputRecord, RiskTierTable, RuleTable, ScoreRateTable, ScoringEngine, ScoringRule,
    VariableDefinition, MODEL_NAME,
};

pub(super) fn engine() -> ScoringEngine {
    ScoringEngine::standard().expect("standard table is valid")
}

pub(super) fn shared_engine() -> Arc<ScoringEngine> {
    Arc::new(engine())
}

/// Every risk factor absent and every vital at its lowest-risk value.
pub(super) fn baseline() -> InputRecord {
    InputRecord::new()
        .with("age", 50.0)
        .with("sex", "Male")
        .with("bmi", 25.0)
        .with("gcs", 15.0)
        .with("sbp", 120.0)
        .with("hr", 75.0)
        .with("rr", 16.0)
        .with("fracture_site", "Other")
        .with("mechanism", "Fall")
        .with("transport", "Ambulance/Air")
        .with("insurance", "Self-pay")
}

/// Elderly Medicare hip fracture with a tachycardic presentation.
pub(super) fn elderly_hip_fracture() -> InputRecord {
    baseline()
        .with("age", 82.0)
        .with("sex", "Female")
        .with("fracture_site", "Hip/Femur")
        .with("insurance", "Medicare")
        .with("hr", 104.0)
}

/// Small custom table with a boolean input, for properties the FORD table has no
/// boolean variable to exercise.
pub(super) fn flag_table() -> RuleTable {
    RuleTable::new(
        MODEL_NAME,
        vec![
            VariableDefinition::boolean(
                "anticoagulated",
                "On anticoagulation",
                "ED Vital Signs",
            ),
            VariableDefinition::numeric(
                "age",
                "Age (years)",
                (18.0, 110.0),
                1.0,
                50.0,
                "Patient Demographics",
            ),
        ],
        vec![
            ScoringRule::new(
                "Anticoagulated",
                "On anticoagulation",
                Criterion::Flag {
                    variable: "anticoagulated".to_string(),
                },
                2,
            ),
            ScoringRule::new(
                "Age \u{2265} 75",
                "Age \u{2265} 75",
                Criterion::AtLeast {
                    variable: "age".to_string(),
                    threshold: 75.0,
                },
                9,
            ),
        ],
        RiskTierTable::standard(),
        ScoreRateTable::standard(),
    )
    .expect("flag table is valid")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
