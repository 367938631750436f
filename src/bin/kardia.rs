//! Kardia CLI - Command-line interface for Kardia
//!
//! Commands:
//! - evaluate: Score readings without storing them
//! - ingest: Evaluate device payloads and append them to a store file
//! - insight: Daily, weekly and per-metric summaries from a store file
//! - prompt: Print the language-model insight prompt for stored readings
//! - measure: Request a measurement from the device
//! - doctor: Diagnose store health and configuration

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kardia::assistant::InsightRequest;
use kardia::ingest;
use kardia::insight::{day_hint, today_for_user, DaySummary, MetricsOverview, WeeklyTrend};
use kardia::types::{Measurement, MeasurementInput};
use kardia::{evaluate, KardiaError, KardiaProcessor, KARDIA_VERSION, PRODUCER_NAME};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Kardia - heuristic heart-health scoring for biometric readings
#[derive(Parser)]
#[command(name = "kardia")]
#[command(version = KARDIA_VERSION)]
#[command(about = "Score biometric readings and summarize them into insights", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score readings without storing them
    Evaluate {
        /// NDJSON/JSON file of readings (use - for stdin); overrides the flags below
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Heart rate (bpm)
        #[arg(long, required_unless_present = "input")]
        heart_rate: Option<f64>,

        /// Blood oxygen saturation (%)
        #[arg(long, required_unless_present = "input")]
        spo2: Option<f64>,

        /// Ambient temperature (°C)
        #[arg(long, required_unless_present = "input")]
        temperature: Option<f64>,

        /// Motion level (fraction, 0-1)
        #[arg(long, required_unless_present = "input")]
        motion_level: Option<f64>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Evaluate device payloads and append them to the store
    Ingest {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Store file
        #[arg(long, env = "KARDIA_STORE", default_value = "kardia-store.json")]
        store: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Summaries from the store
    Insight {
        /// Kind of summary
        #[arg(value_enum)]
        kind: InsightKind,

        /// User to summarize (today)
        #[arg(long, default_value = "1")]
        user_id: u64,

        /// Day to summarize (YYYY-MM-DD, default today in UTC)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Store file
        #[arg(long, env = "KARDIA_STORE", default_value = "kardia-store.json")]
        store: PathBuf,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the language-model insight prompt for recent readings
    Prompt {
        /// Store file
        #[arg(long, env = "KARDIA_STORE", default_value = "kardia-store.json")]
        store: PathBuf,

        /// Print the chat completion body instead of plain prompts
        #[arg(long)]
        json: bool,
    },

    /// Request a measurement from the device
    Measure {
        /// Store file
        #[arg(long, env = "KARDIA_STORE", default_value = "kardia-store.json")]
        store: PathBuf,

        /// Clear a pending request instead
        #[arg(long)]
        cancel: bool,
    },

    /// Diagnose store health and configuration
    Doctor {
        /// Store file
        #[arg(long, env = "KARDIA_STORE", default_value = "kardia-store.json")]
        store: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one result per line)
    Ndjson,
    /// JSON array of results
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum InsightKind {
    /// Today's insight for a user
    Today,
    /// Day summary with a rule-based hint
    Day,
    /// Week-over-week heart rate trend
    Week,
    /// Average/min/max per metric over all readings
    Summary,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kardia=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), KardiaCliError> {
    match cli.command {
        Commands::Evaluate {
            input,
            input_format,
            heart_rate,
            spo2,
            temperature,
            motion_level,
            output_format,
        } => {
            let readings = match input {
                Some(path) => read_readings(&path, &input_format)?,
                None => match (heart_rate, spo2, temperature, motion_level) {
                    (Some(hr), Some(o2), Some(t), Some(m)) => {
                        vec![MeasurementInput::new(hr, o2, t, m)]
                    }
                    _ => return Err(KardiaCliError::MissingReading),
                },
            };
            cmd_evaluate(&readings, &output_format)
        }

        Commands::Ingest {
            input,
            input_format,
            store,
            output_format,
        } => cmd_ingest(&input, &input_format, &store, &output_format),

        Commands::Insight {
            kind,
            user_id,
            date,
            store,
            pretty,
        } => cmd_insight(kind, user_id, date, &store, pretty),

        Commands::Prompt { store, json } => cmd_prompt(&store, json),

        Commands::Measure { store, cancel } => cmd_measure(&store, cancel),

        Commands::Doctor { store, json } => cmd_doctor(&store, json),
    }
}

fn cmd_evaluate(readings: &[MeasurementInput], format: &OutputFormat) -> Result<(), KardiaCliError> {
    let evaluations: Vec<_> = readings.iter().map(evaluate).collect();
    print!("{}", format_output(&evaluations, format)?);
    Ok(())
}

fn cmd_ingest(
    input: &Path,
    input_format: &InputFormat,
    store_path: &Path,
    output_format: &OutputFormat,
) -> Result<(), KardiaCliError> {
    let input_data = read_input(input)?;
    let payloads = match input_format {
        InputFormat::Ndjson => ingest::parse_ndjson(&input_data)?,
        InputFormat::Json => ingest::parse_array(&input_data)?,
    };

    if payloads.is_empty() {
        return Err(KardiaCliError::NoReadings);
    }

    // Out-of-range readings are stored; their flags ride along in the output
    let mut processor = load_processor(store_path)?;
    let mut outcomes = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        outcomes.push(processor.ingest(payload)?);
    }

    let flagged = outcomes.iter().filter(|o| !o.flags.is_empty()).count();
    if flagged > 0 {
        tracing::warn!(flagged, total = outcomes.len(), "ingested readings with quality flags");
    }

    // A stored reading fulfils any pending measurement request
    processor.store_mut().disarm();
    save_processor(&processor, store_path)?;

    print!("{}", format_output(&outcomes, output_format)?);
    Ok(())
}

fn cmd_insight(
    kind: InsightKind,
    user_id: u64,
    date: Option<NaiveDate>,
    store_path: &Path,
    pretty: bool,
) -> Result<(), KardiaCliError> {
    let processor = load_processor(store_path)?;
    let store = processor.store();
    let now = Utc::now();
    let day = date.unwrap_or_else(|| now.date_naive());

    let value = match kind {
        InsightKind::Today => {
            let insight = today_for_user(store, user_id, now);
            match insight {
                Some(insight) => serde_json::json!({ "insight": insight }),
                None => serde_json::json!({ "message": "No data for today", "insight": null }),
            }
        }
        InsightKind::Day => {
            let summary = DaySummary::for_day(store, day);
            let hint = day_hint(&summary);
            serde_json::json!({ "summary": summary, "hint": hint })
        }
        InsightKind::Week => serde_json::to_value(WeeklyTrend::for_week_of(store, day))?,
        InsightKind::Summary => serde_json::to_value(MetricsOverview::from_measurements(store.all()))?,
    };

    if pretty {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", serde_json::to_string(&value)?);
    }
    Ok(())
}

fn cmd_prompt(store_path: &Path, json: bool) -> Result<(), KardiaCliError> {
    let processor = load_processor(store_path)?;
    let mut readings: Vec<&Measurement> = processor.store().recent();
    readings.reverse();

    let request = InsightRequest::from_measurements(&readings)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&request.to_chat_body())?);
    } else {
        println!("{}", request.system_prompt);
        println!();
        println!("{}", request.user_prompt);
    }
    Ok(())
}

fn cmd_measure(store_path: &Path, cancel: bool) -> Result<(), KardiaCliError> {
    let mut processor = load_processor(store_path)?;
    if cancel {
        processor.store_mut().disarm();
        println!("Measurement request cleared.");
    } else {
        processor.store_mut().arm();
        println!("Measurement command successful, device is now listening for data.");
    }
    save_processor(&processor, store_path)
}

fn cmd_doctor(store_path: &Path, json: bool) -> Result<(), KardiaCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "kardia_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Kardia version {}", KARDIA_VERSION),
    });

    if store_path.exists() {
        match fs::read_to_string(store_path) {
            Ok(content) => {
                let mut processor = KardiaProcessor::new();
                match processor.load_store(&content) {
                    Ok(()) => {
                        let store = processor.store();
                        checks.push(DoctorCheck {
                            name: "store".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "Store file valid ({} measurements, measurement request {})",
                                store.len(),
                                if store.is_armed() { "pending" } else { "idle" }
                            ),
                        });

                        let flagged = store
                            .all()
                            .filter(|m| !ingest::quality_flags(&m.input()).is_empty())
                            .count();
                        if flagged > 0 {
                            checks.push(DoctorCheck {
                                name: "quality".to_string(),
                                status: CheckStatus::Warning,
                                message: format!(
                                    "{} measurements raise quality flags (e.g. motion level sent as percent)",
                                    flagged
                                ),
                            });
                        }
                    }
                    Err(e) => checks.push(DoctorCheck {
                        name: "store".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid store JSON: {}", e),
                    }),
                }
            }
            Err(e) => checks.push(DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read store file: {}", e),
            }),
        }
    } else {
        checks.push(DoctorCheck {
            name: "store".to_string(),
            status: CheckStatus::Warning,
            message: "Store file does not exist; it will be created on first ingest".to_string(),
        });
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ingest from - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: KARDIA_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Kardia Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(KardiaCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, KardiaCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_readings(input: &Path, format: &InputFormat) -> Result<Vec<MeasurementInput>, KardiaCliError> {
    let data = read_input(input)?;
    let readings = match format {
        InputFormat::Json => serde_json::from_str(&data)?,
        InputFormat::Ndjson => {
            let mut readings = Vec::new();
            for (line_num, line) in data.lines().enumerate() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let reading: MeasurementInput = serde_json::from_str(trimmed).map_err(|e| {
                    KardiaCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
                })?;
                readings.push(reading);
            }
            readings
        }
    };
    if readings.is_empty() {
        return Err(KardiaCliError::NoReadings);
    }
    Ok(readings)
}

fn load_processor(store_path: &Path) -> Result<KardiaProcessor, KardiaCliError> {
    let mut processor = KardiaProcessor::new();
    if store_path.exists() {
        let json = fs::read_to_string(store_path)?;
        processor.load_store(&json)?;
    } else {
        tracing::debug!(path = %store_path.display(), "store file missing, starting empty");
    }
    Ok(processor)
}

fn save_processor(processor: &KardiaProcessor, store_path: &Path) -> Result<(), KardiaCliError> {
    fs::write(store_path, processor.save_store()?)?;
    Ok(())
}

fn format_output<T: Serialize>(items: &[T], format: &OutputFormat) -> Result<String, KardiaCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for item in items {
                lines.push(serde_json::to_string(item)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(items)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(items)?),
    }
}

// Error types

#[derive(Debug)]
enum KardiaCliError {
    Io(io::Error),
    Kardia(KardiaError),
    Json(serde_json::Error),
    NoReadings,
    MissingReading,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for KardiaCliError {
    fn from(e: io::Error) -> Self {
        KardiaCliError::Io(e)
    }
}

impl From<KardiaError> for KardiaCliError {
    fn from(e: KardiaError) -> Self {
        KardiaCliError::Kardia(e)
    }
}

impl From<serde_json::Error> for KardiaCliError {
    fn from(e: serde_json::Error) -> Self {
        KardiaCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<KardiaCliError> for CliError {
    fn from(e: KardiaCliError) -> Self {
        match e {
            KardiaCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            KardiaCliError::Kardia(e) => {
                let (code, hint) = match &e {
                    KardiaError::InvalidPayload(_) | KardiaError::ParseError(_) => (
                        "INVALID_PAYLOAD",
                        "Payloads need numeric userId, heartRate, spo2, temperature and motionLevel",
                    ),
                    KardiaError::EmptyMeasurements => {
                        ("NO_MEASUREMENTS", "Ingest a few readings first")
                    }
                    KardiaError::StoreError(_) => {
                        ("STORE_ERROR", "Run 'kardia doctor' to inspect the store file")
                    }
                    _ => ("KARDIA_ERROR", "Check the input and retry"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            KardiaCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            KardiaCliError::NoReadings => CliError {
                code: "NO_READINGS".to_string(),
                message: "No readings found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            KardiaCliError::MissingReading => CliError {
                code: "MISSING_READING".to_string(),
                message: "A reading needs heart rate, SpO₂, temperature and motion level".to_string(),
                hint: Some("Pass all four flags or --input".to_string()),
            },
            KardiaCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            KardiaCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
