use crate::infra;
use crate::{render, server};
use clap::{Args, Parser, Subcommand};
use ford_score::batch::{BatchOptions, BatchScorer};
use ford_score::error::AppError;
use ford_score::scoring::{body_mass_index, InputRecord};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ford-score-api",
    about = "Score non-home discharge risk for orthopedic trauma patients (FORD score)",
    version
)]
struct Cli {
    /// JSON rule table to load instead of the embedded FORD table (overrides APP_RULE_TABLE)
    #[arg(long, global = true)]
    rule_table: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a single patient and print the breakdown
    Score(ScoreArgs),
    /// Score every row of a CSV file
    Batch(BatchArgs),
    /// List the scored variables with their domains and defaults
    Variables,
    /// Print the risk-level reference table
    RiskLevels,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ScoreArgs {
    /// JSON object of variable values; flags override its entries
    #[arg(long)]
    pub(crate) input: Option<PathBuf>,
    #[arg(long)]
    pub(crate) age: Option<f64>,
    #[arg(long)]
    pub(crate) sex: Option<String>,
    #[arg(long)]
    pub(crate) bmi: Option<f64>,
    /// Height in inches, used with --weight-lb to derive BMI when --bmi is absent
    #[arg(long, requires = "weight_lb", value_parser = positive)]
    pub(crate) height_in: Option<f64>,
    /// Weight in pounds, used with --height-in to derive BMI when --bmi is absent
    #[arg(long, requires = "height_in", value_parser = positive)]
    pub(crate) weight_lb: Option<f64>,
    /// Glasgow Coma Scale
    #[arg(long)]
    pub(crate) gcs: Option<f64>,
    /// Systolic blood pressure (mmHg)
    #[arg(long)]
    pub(crate) sbp: Option<f64>,
    /// Heart rate (bpm)
    #[arg(long)]
    pub(crate) hr: Option<f64>,
    /// Respiratory rate (breaths/min)
    #[arg(long)]
    pub(crate) rr: Option<f64>,
    #[arg(long)]
    pub(crate) fracture_site: Option<String>,
    #[arg(long)]
    pub(crate) mechanism: Option<String>,
    #[arg(long)]
    pub(crate) transport: Option<String>,
    #[arg(long)]
    pub(crate) insurance: Option<String>,
    /// Print the prediction as JSON instead of a text report
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// CSV file with a header row of variable names and an optional patient_id column
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Where to write scored rows (defaults to stdout)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Score rows with blank cells using the declared defaults
    #[arg(long)]
    pub(crate) fill_defaults: bool,
}

impl ScoreArgs {
    /// Record from `--input` overlaid with the flags given. BMI is derived from height and
    /// weight only when neither source supplies it.
    fn into_record(self) -> Result<InputRecord, AppError> {
        let mut record = match &self.input {
            Some(path) => infra::read_record(path)?,
            None => InputRecord::new(),
        };

        let numeric = [
            ("age", self.age),
            ("bmi", self.bmi),
            ("gcs", self.gcs),
            ("sbp", self.sbp),
            ("hr", self.hr),
            ("rr", self.rr),
        ];
        for (name, value) in numeric {
            if let Some(value) = value {
                record.set(name, value);
            }
        }

        let categorical = [
            ("sex", self.sex),
            ("fracture_site", self.fracture_site),
            ("mechanism", self.mechanism),
            ("transport", self.transport),
            ("insurance", self.insurance),
        ];
        for (name, value) in categorical {
            if let Some(value) = value {
                record.set(name, value);
            }
        }

        if !record.contains("bmi") {
            if let Some(bmi) = self
                .height_in
                .zip(self.weight_lb)
                .and_then(|(height, weight)| body_mass_index(height, weight))
            {
                record.set("bmi", bmi);
            }
        }

        Ok(record)
    }
}

fn positive(raw: &str) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        Ok(value) => Err(format!("{value} must be a positive number")),
        Err(err) => Err(format!("failed to parse '{raw}' as a number ({err})")),
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args, cli.rule_table).await,
        Command::Score(args) => run_score(args, cli.rule_table),
        Command::Batch(args) => run_batch(args, cli.rule_table),
        Command::Variables => {
            let engine = infra::prepare(cli.rule_table)?.1;
            print!("{}", render::variables(engine.table()));
            Ok(())
        }
        Command::RiskLevels => {
            let engine = infra::prepare(cli.rule_table)?.1;
            print!("{}", render::risk_levels(engine.table(), None));
            Ok(())
        }
    }
}

fn run_score(args: ScoreArgs, rule_table: Option<PathBuf>) -> Result<(), AppError> {
    let (_, engine) = infra::prepare(rule_table)?;
    let json = args.json;
    let record = args.into_record()?;
    let result = engine.compute_with_defaults(&record)?;

    if json {
        let payload = serde_json::to_string_pretty(&result).map_err(std::io::Error::from)?;
        println!("{payload}");
    } else {
        print!("{}", render::prediction(engine.table(), &result));
    }
    Ok(())
}

fn run_batch(args: BatchArgs, rule_table: Option<PathBuf>) -> Result<(), AppError> {
    let (_, engine) = infra::prepare(rule_table)?;
    let scorer = BatchScorer::new(
        &engine,
        BatchOptions {
            fill_defaults: args.fill_defaults,
        },
    );
    let report = scorer.score_path(&args.input)?;

    match args.output {
        Some(path) => report.write_csv(std::fs::File::create(path)?)?,
        None => report.write_csv(std::io::stdout().lock())?,
    }

    eprintln!(
        "scored {} of {} rows ({} rejected)",
        report.scored(),
        report.rows.len(),
        report.failed()
    );
    Ok(())
}
