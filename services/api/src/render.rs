use ford_score::scoring::{PredictionResult, RiskLevel, RuleTable, VariableKind, MAX_SCORE};

/// Text report for one prediction, as printed by `score`.
pub(crate) fn prediction(table: &RuleTable, result: &PredictionResult) -> String {
    let mut lines = vec![
        table.model_name().to_string(),
        format!("- Score: {} / {}", result.total_score, MAX_SCORE),
    ];
    if i32::from(result.total_score) != result.raw_score {
        lines.push(format!("  (unclamped sum {})", result.raw_score));
    }
    lines.push(format!("- Risk level: {}", result.risk_level().label()));
    lines.push(format!(
        "- Non-home discharge risk: {:.1}%",
        result.score_discharge_rate
    ));

    lines.push(String::new());
    lines.extend(risk_level_lines(table, Some(result.risk_level())));

    lines.push(String::new());
    lines.push("Component breakdown".to_string());
    let width = result
        .components
        .iter()
        .map(|component| component.label.chars().count())
        .max()
        .unwrap_or(0);
    for component in &result.components {
        lines.push(format!(
            "  {:<width$}  {:<4} {:>3}  {}",
            component.label,
            if component.met { "Yes" } else { "No" },
            component.points,
            component.condition,
        ));
    }

    let active = result.active_components();
    lines.push(String::new());
    lines.push("Active components".to_string());
    if active.is_empty() {
        lines.push("  No risk factors are present with the current inputs.".to_string());
    }
    for component in active {
        lines.push(format!("  {:+} {}", component.points, component.label));
    }

    join_lines(lines)
}

/// Reference rows; the row for `current`, when given, is marked with `>`.
pub(crate) fn risk_levels(table: &RuleTable, current: Option<RiskLevel>) -> String {
    join_lines(risk_level_lines(table, current))
}

fn risk_level_lines(table: &RuleTable, current: Option<RiskLevel>) -> Vec<String> {
    let mut lines = vec!["Risk level reference".to_string()];
    for row in table.tiers().reference() {
        let marker = if Some(row.level) == current { '>' } else { ' ' };
        lines.push(format!(
            "{marker} {:<6} {:<14} {:.1}%",
            row.score_range, row.label, row.discharge_rate
        ));
    }
    lines
}

pub(crate) fn variables(table: &RuleTable) -> String {
    let mut lines = Vec::new();

    for (group, members) in table.variables_by_group() {
        lines.push(group.to_string());
        for variable in members {
            let domain = match &variable.kind {
                VariableKind::Boolean => "true | false".to_string(),
                VariableKind::Categorical { options } => options.join(" | "),
                VariableKind::Numeric {
                    min, max, default, ..
                } => format!("{min} to {max} (default {default})"),
            };
            lines.push(format!(
                "  {:<14} {}: {}",
                variable.name, variable.label, domain
            ));
        }
    }

    join_lines(lines)
}

fn join_lines(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
