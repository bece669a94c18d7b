use ford_score::config::AppConfig;
use ford_score::error::AppError;
use ford_score::scoring::{InputRecord, RuleTable, ScoringEngine};
use ford_score::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Load configuration, install logging, and build the engine every command scores with.
/// A `--rule-table` flag takes precedence over `APP_RULE_TABLE`.
pub(crate) fn prepare(
    rule_table: Option<PathBuf>,
) -> Result<(AppConfig, Arc<ScoringEngine>), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let engine = load_engine(rule_table.or_else(|| config.scoring.rule_table_path.clone()))?;
    Ok((config, engine))
}

pub(crate) fn load_engine(path: Option<PathBuf>) -> Result<Arc<ScoringEngine>, AppError> {
    let table = RuleTable::load(path.as_deref())?;
    Ok(Arc::new(ScoringEngine::new(table)))
}

/// JSON object of variable values, as accepted under `inputs` by the HTTP API.
pub(crate) fn read_record(path: &Path) -> Result<InputRecord, AppError> {
    let file = std::fs::File::open(path)?;
    let record = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(std::io::Error::from)?;
    Ok(record)
}
