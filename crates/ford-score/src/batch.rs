//! CSV batch scoring: one patient per row, header cells naming the variables.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::scoring::{
    InputRecord, InputValue, PredictionResult, RuleTable, ScoringEngine, ValidationError,
    VariableKind,
};

/// Optional identifier column carried through to the output untouched.
pub const PATIENT_ID_COLUMN: &str = "patient_id";

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("failed to access batch file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid batch CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("column '{0}' is not a variable of this rule table")]
    UnknownColumn(String),
    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),
}

/// Why a single row could not be scored. The rest of the batch is unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("row has {found} cells but the header names {expected} columns")]
    ExtraCells { expected: usize, found: usize },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Blank or absent cells take the variable's declared default.
    pub fill_defaults: bool,
}

/// Outcome for one data row. `row` counts data rows from 1, header excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    pub row: usize,
    pub patient_id: Option<String>,
    pub outcome: Result<PredictionResult, RowError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub rows: Vec<BatchRow>,
}

impl BatchReport {
    pub fn scored(&self) -> usize {
        self.rows.iter().filter(|row| row.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.rows.len() - self.scored()
    }

    /// Write one output row per input row; failed rows carry only the error message.
    /// The header row is always written, so an empty batch still yields a valid document.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), BatchError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(OUTPUT_COLUMNS)?;

        for row in &self.rows {
            csv_writer.serialize(OutputRow::from(row))?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

const OUTPUT_COLUMNS: [&str; 8] = [
    "row",
    "patient_id",
    "total_score",
    "raw_score",
    "risk_level",
    "discharge_rate",
    "score_discharge_rate",
    "error",
];

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    row: usize,
    patient_id: Option<&'a str>,
    total_score: Option<u8>,
    raw_score: Option<i32>,
    risk_level: Option<&'static str>,
    discharge_rate: Option<f64>,
    score_discharge_rate: Option<f64>,
    error: Option<String>,
}

impl<'a> From<&'a BatchRow> for OutputRow<'a> {
    fn from(row: &'a BatchRow) -> Self {
        let patient_id = row.patient_id.as_deref();
        match &row.outcome {
            Ok(result) => Self {
                row: row.row,
                patient_id,
                total_score: Some(result.total_score),
                raw_score: Some(result.raw_score),
                risk_level: Some(result.risk_level().label()),
                discharge_rate: Some(result.discharge_rate),
                score_discharge_rate: Some(result.score_discharge_rate),
                error: None,
            },
            Err(err) => Self {
                row: row.row,
                patient_id,
                total_score: None,
                raw_score: None,
                risk_level: None,
                discharge_rate: None,
                score_discharge_rate: None,
                error: Some(err.to_string()),
            },
        }
    }
}

pub struct BatchScorer<'a> {
    engine: &'a ScoringEngine,
    options: BatchOptions,
}

impl<'a> BatchScorer<'a> {
    pub fn new(engine: &'a ScoringEngine, options: BatchOptions) -> Self {
        Self { engine, options }
    }

    pub fn score_path<P: AsRef<Path>>(&self, path: P) -> Result<BatchReport, BatchError> {
        let file = std::fs::File::open(path)?;
        self.score_reader(file)
    }

    /// Score every row of a CSV document. Header problems abort the batch; a row that
    /// fails validation is recorded and the batch continues. Short rows leave their
    /// trailing variables missing.
    pub fn score_reader<R: Read>(&self, reader: R) -> Result<BatchReport, BatchError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let columns = resolve_columns(self.engine.table(), &headers)?;

        let mut report = BatchReport::default();
        for (index, record) in csv_reader.records().enumerate() {
            let record = record?;
            let row = index + 1;
            let mut patient_id = None;
            let mut inputs = InputRecord::new();

            for (column, cell) in columns.iter().zip(record.iter()) {
                match column {
                    Column::PatientId => {
                        patient_id = (!cell.is_empty()).then(|| cell.to_string());
                    }
                    Column::Variable { name, kind } => {
                        if let Some(value) = parse_cell(kind, cell) {
                            inputs.set(name, value);
                        }
                    }
                }
            }

            let outcome = if record.len() > columns.len() {
                Err(RowError::ExtraCells {
                    expected: columns.len(),
                    found: record.len(),
                })
            } else if self.options.fill_defaults {
                self.engine
                    .compute_with_defaults(&inputs)
                    .map_err(RowError::from)
            } else {
                self.engine
                    .compute_prediction(&inputs)
                    .map_err(RowError::from)
            };
            report.rows.push(BatchRow {
                row,
                patient_id,
                outcome,
            });
        }

        info!(
            rows = report.rows.len(),
            scored = report.scored(),
            failed = report.failed(),
            "scored batch"
        );
        Ok(report)
    }
}

enum Column<'t> {
    PatientId,
    Variable { name: &'t str, kind: &'t VariableKind },
}

fn resolve_columns<'t>(
    table: &'t RuleTable,
    headers: &csv::StringRecord,
) -> Result<Vec<Column<'t>>, BatchError> {
    let mut seen = HashSet::new();

    headers
        .iter()
        .map(|header| {
            if !seen.insert(header.to_string()) {
                return Err(BatchError::DuplicateColumn(header.to_string()));
            }
            if header == PATIENT_ID_COLUMN {
                return Ok(Column::PatientId);
            }
            table
                .variable(header)
                .map(|variable| Column::Variable {
                    name: &variable.name,
                    kind: &variable.kind,
                })
                .ok_or_else(|| BatchError::UnknownColumn(header.to_string()))
        })
        .collect()
}

/// Blank cells count as missing. Cells that do not parse as the declared kind are kept as
/// text so validation reports the mismatch against the variable.
fn parse_cell(kind: &VariableKind, cell: &str) -> Option<InputValue> {
    if cell.is_empty() {
        return None;
    }

    let value = match kind {
        VariableKind::Numeric { .. } => cell
            .parse::<f64>()
            .map(InputValue::Number)
            .unwrap_or_else(|_| InputValue::Text(cell.to_string())),
        VariableKind::Boolean => match cell.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => InputValue::Bool(true),
            "false" | "no" | "n" | "0" => InputValue::Bool(false),
            _ => InputValue::Text(cell.to_string()),
        },
        VariableKind::Categorical { .. } => InputValue::Text(cell.to_string()),
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "patient_id,age,sex,bmi,gcs,sbp,hr,rr,fracture_site,mechanism,transport,insurance";

    fn engine() -> ScoringEngine {
        ScoringEngine::standard().expect("standard table")
    }

    fn batch(rows: &[&str]) -> String {
        let mut csv = HEADER.to_string();
        for row in rows {
            csv.push('\n');
            csv.push_str(row);
        }
        csv
    }

    #[test]
    fn scores_valid_rows_and_records_failures() {
        let engine = engine();
        let input = batch(&[
            "P-1,50,Male,25,15,120,75,16,Other,Fall,Ambulance/Air,Self-pay",
            "P-2,82,Female,25,15,120,104,16,Hip/Femur,Fall,Ambulance/Air,Medicare",
            "P-3,50,Male,25,15,120,75,16,Knee,Fall,Ambulance/Air,Self-pay",
            "P-4,50,Male,25,,120,75,16,Other,Fall,Ambulance/Air,Self-pay",
        ]);

        let report = BatchScorer::new(&engine, BatchOptions::default())
            .score_reader(Cursor::new(input))
            .expect("batch parses");

        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.scored(), 2);
        assert_eq!(report.failed(), 2);

        let first = report.rows[0].outcome.as_ref().expect("P-1 scores");
        assert_eq!(first.total_score, 0);
        let second = report.rows[1].outcome.as_ref().expect("P-2 scores");
        assert_eq!(second.total_score, 10);

        let third = report.rows[2].outcome.as_ref().expect_err("unknown site");
        assert!(matches!(third, RowError::Invalid(err) if err.variable() == "fracture_site"));
        let fourth = report.rows[3].outcome.as_ref().expect_err("blank gcs");
        assert!(matches!(
            fourth,
            RowError::Invalid(ValidationError::MissingVariable { .. })
        ));
        assert_eq!(report.rows[3].patient_id.as_deref(), Some("P-4"));
        assert_eq!(report.rows[3].row, 4);
    }

    #[test]
    fn blank_cells_take_defaults_when_requested() {
        let engine = engine();
        let input = "gcs,fracture_site\n7,\n,Both\n";

        let report = BatchScorer::new(
            &engine,
            BatchOptions {
                fill_defaults: true,
            },
        )
        .score_reader(Cursor::new(input))
        .expect("batch parses");

        let scores: Vec<u8> = report
            .rows
            .iter()
            .map(|row| row.outcome.as_ref().expect("scores").total_score)
            .collect();
        assert_eq!(scores, [6, 8]);
        assert!(report.rows.iter().all(|row| row.patient_id.is_none()));
    }

    #[test]
    fn non_numeric_cells_surface_as_type_mismatch() {
        let engine = engine();
        let input = batch(&["P-1,fifty,Male,25,15,120,75,16,Other,Fall,Ambulance/Air,Self-pay"]);

        let report = BatchScorer::new(&engine, BatchOptions::default())
            .score_reader(Cursor::new(input))
            .expect("batch parses");

        let err = report.rows[0].outcome.as_ref().expect_err("age is text");
        assert!(matches!(
            err,
            RowError::Invalid(ValidationError::TypeMismatch { variable, .. }) if variable == "age"
        ));
    }

    #[test]
    fn ragged_rows_fail_alone() {
        let engine = engine();
        let input = "patient_id,gcs\nP-1,7\nP-2\nP-3,15\nP-4,15,extra\n";

        let with_defaults = BatchScorer::new(
            &engine,
            BatchOptions {
                fill_defaults: true,
            },
        )
        .score_reader(Cursor::new(input))
        .expect("batch parses");

        assert_eq!(with_defaults.rows.len(), 4);
        let scores: Vec<Option<u8>> = with_defaults
            .rows
            .iter()
            .map(|row| row.outcome.as_ref().ok().map(|result| result.total_score))
            .collect();
        assert_eq!(scores, [Some(6), Some(0), Some(0), None]);
        assert_eq!(with_defaults.rows[1].patient_id.as_deref(), Some("P-2"));
        assert_eq!(
            with_defaults.rows[3].outcome,
            Err(RowError::ExtraCells {
                expected: 2,
                found: 3
            })
        );

        let input = batch(&[
            "P-1,50,Male,25,15,120,75,16,Other,Fall,Ambulance/Air",
            "P-2,50,Male,25,15,120,75,16,Other,Fall,Ambulance/Air,Self-pay",
        ]);
        let strict = BatchScorer::new(&engine, BatchOptions::default())
            .score_reader(Cursor::new(input))
            .expect("batch parses");

        assert_eq!(strict.rows.len(), 2);
        let short = strict.rows[0].outcome.as_ref().expect_err("insurance absent");
        assert!(matches!(
            short,
            RowError::Invalid(ValidationError::MissingVariable { variable }) if variable == "insurance"
        ));
        assert!(strict.rows[1].outcome.is_ok());
    }

    #[test]
    fn unknown_or_repeated_columns_abort_the_batch() {
        let engine = engine();
        let scorer = BatchScorer::new(&engine, BatchOptions::default());

        let err = scorer
            .score_reader(Cursor::new("age,lactate\n50,2.0\n"))
            .expect_err("lactate is not scored");
        assert!(matches!(err, BatchError::UnknownColumn(ref column) if column == "lactate"));

        let err = scorer
            .score_reader(Cursor::new("age,age\n50,60\n"))
            .expect_err("age twice");
        assert!(matches!(err, BatchError::DuplicateColumn(_)));
    }

    #[test]
    fn boolean_cells_accept_common_spellings() {
        let kind = VariableKind::Boolean;
        assert_eq!(parse_cell(&kind, "Yes"), Some(InputValue::Bool(true)));
        assert_eq!(parse_cell(&kind, "0"), Some(InputValue::Bool(false)));
        assert_eq!(
            parse_cell(&kind, "maybe"),
            Some(InputValue::Text("maybe".to_string()))
        );
        assert_eq!(parse_cell(&kind, ""), None);
    }

    #[test]
    fn report_writes_scores_and_errors() {
        let engine = engine();
        let input = batch(&[
            "P-1,50,Male,25,15,120,75,16,Hip/Femur,Fall,Ambulance/Air,Self-pay",
            "P-2,50,Male,25,15,120,75,3,Other,Fall,Ambulance/Air,Self-pay",
        ]);
        let report = BatchScorer::new(&engine, BatchOptions::default())
            .score_reader(Cursor::new(input))
            .expect("batch parses");

        let mut output = Vec::new();
        report.write_csv(&mut output).expect("writes csv");
        let text = String::from_utf8(output).expect("utf8 output");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "row,patient_id,total_score,raw_score,risk_level,discharge_rate,score_discharge_rate,error"
        );
        assert_eq!(lines[1], "1,P-1,5,5,Moderate-High,7.0,9.6,");
        assert!(lines[2].starts_with("2,P-2,,,,,,"));
        assert!(lines[2].contains("rr"));
    }

    #[test]
    fn empty_batch_still_writes_header() {
        let engine = engine();
        let report = BatchScorer::new(&engine, BatchOptions::default())
            .score_reader(Cursor::new(HEADER))
            .expect("header only");
        assert!(report.rows.is_empty());

        let mut output = Vec::new();
        report.write_csv(&mut output).expect("writes csv");

        assert_eq!(
            String::from_utf8(output).expect("utf8 output"),
            "row,patient_id,total_score,raw_score,risk_level,discharge_rate,score_discharge_rate,error\n"
        );
    }
}
