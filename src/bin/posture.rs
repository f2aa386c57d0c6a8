//! Posture CLI - Command-line interface for the posture engine
//!
//! Commands:
//! - analyze: Classify measurements without persisting (stateless)
//! - record: Evaluate and persist measurements into a database
//! - records: List a user's stored records
//! - stats: Trailing-window summary statistics
//! - trends: Per-day trend series
//! - standards: Print the medical thresholds
//! - doctor: Diagnose engine and database health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use posture_engine::engine::{DEFAULT_STATS_WINDOW_DAYS, DEFAULT_TREND_WINDOW_DAYS};
use posture_engine::error::EngineError;
use posture_engine::schema::RawMeasurement;
use posture_engine::store::RecordStore;
use posture_engine::{PostureEngine, ENGINE_VERSION, PRODUCER_NAME};

/// Posture - evaluation and aggregation engine for posture measurements
#[derive(Parser)]
#[command(name = "posture")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Evaluate posture measurements and serve posture history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify measurements without persisting (stateless)
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Evaluate and persist measurements into a database
    Record {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// List a user's stored records, newest first
    Records {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// User to query
        #[arg(long)]
        user: i64,

        /// Start date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        start_date: Option<String>,

        /// End date (YYYY-MM-DD, covers the whole day)
        #[arg(long)]
        end_date: Option<String>,

        /// Maximum records to return
        #[arg(long)]
        limit: Option<u32>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Trailing-window summary statistics
    Stats {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// User to query
        #[arg(long)]
        user: i64,

        /// Window size in days
        #[arg(long, default_value_t = DEFAULT_STATS_WINDOW_DAYS)]
        days: u32,
    },

    /// Per-day trend series
    Trends {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// User to query
        #[arg(long)]
        user: i64,

        /// Window size in days
        #[arg(long, default_value_t = DEFAULT_TREND_WINDOW_DAYS)]
        days: u32,
    },

    /// Print the medical thresholds
    Standards {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose engine and database health
    Doctor {
        /// Database file to check
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one measurement per line)
    Ndjson,
    /// JSON array of measurements
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

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PostureCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            input_format,
            output_format,
        } => cmd_analyze(&input, input_format, output_format),

        Commands::Record {
            db,
            input,
            input_format,
            output_format,
        } => cmd_record(&db, &input, input_format, output_format),

        Commands::Records {
            db,
            user,
            start_date,
            end_date,
            limit,
            output_format,
        } => cmd_records(
            &db,
            user,
            start_date.as_deref(),
            end_date.as_deref(),
            limit,
            output_format,
        ),

        Commands::Stats { db, user, days } => cmd_stats(&db, user, days),

        Commands::Trends { db, user, days } => cmd_trends(&db, user, days),

        Commands::Standards { json } => cmd_standards(json),

        Commands::Doctor { db, json } => cmd_doctor(db.as_deref(), json),
    }
}

fn cmd_analyze(
    input: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
) -> Result<(), PostureCliError> {
    let measurements = read_measurements(input, &input_format)?;

    let engine = PostureEngine::new(RecordStore::open_in_memory()?);
    let results: Vec<_> = measurements.iter().map(|m| engine.analyze(m)).collect();

    print_output(&results, &output_format)
}

fn cmd_record(
    db: &Path,
    input: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
) -> Result<(), PostureCliError> {
    let measurements = read_measurements(input, &input_format)?;

    let engine = PostureEngine::new(RecordStore::open(db)?);
    let mut saved = Vec::with_capacity(measurements.len());
    for measurement in &measurements {
        saved.push(engine.save_record(measurement)?);
    }

    print_output(&saved, &output_format)
}

fn cmd_records(
    db: &Path,
    user: i64,
    start_date: Option<&str>,
    end_date: Option<&str>,
    limit: Option<u32>,
    output_format: OutputFormat,
) -> Result<(), PostureCliError> {
    let engine = PostureEngine::new(RecordStore::open(db)?);
    let records = engine.list_records(user, start_date, end_date, limit)?;
    print_output(&records, &output_format)
}

fn cmd_stats(db: &Path, user: i64, days: u32) -> Result<(), PostureCliError> {
    let engine = PostureEngine::new(RecordStore::open(db)?);
    let summary = engine.stats(user, Some(days))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_trends(db: &Path, user: i64, days: u32) -> Result<(), PostureCliError> {
    let engine = PostureEngine::new(RecordStore::open(db)?);
    let trends = engine.trends(user, Some(days))?;
    println!("{}", serde_json::to_string_pretty(&trends)?);
    Ok(())
}

fn cmd_standards(json: bool) -> Result<(), PostureCliError> {
    let engine = PostureEngine::new(RecordStore::open_in_memory()?);
    let standards = engine.medical_standards();

    if json {
        println!("{}", serde_json::to_string_pretty(&standards)?);
    } else {
        println!("Medical Standards");
        println!("=================");
        println!(
            "Neck angle:           {:?} degrees",
            standards.neck_angle_normal_range
        );
        println!(
            "Forward head max:     {} mm",
            standards.forward_head_normal_max
        );
        println!(
            "Head tilt:            {:?} degrees",
            standards.head_tilt_normal_range
        );
    }
    Ok(())
}

fn cmd_doctor(db: Option<&Path>, json: bool) -> Result<(), PostureCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{PRODUCER_NAME} {ENGINE_VERSION}"),
    });

    if let Some(db_path) = db {
        if db_path.exists() {
            match RecordStore::open(db_path) {
                Ok(_) => checks.push(DoctorCheck {
                    name: "database".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("database at {} opens cleanly", db_path.display()),
                }),
                Err(e) => checks.push(DoctorCheck {
                    name: "database".to_string(),
                    status: CheckStatus::Error,
                    message: format!("cannot open database: {e}"),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "database".to_string(),
                status: CheckStatus::Warning,
                message: "database file does not exist yet; it will be created on first record"
                    .to_string(),
            });
        }
    }

    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (streaming mode ready)"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Posture Doctor Report");
        println!("=====================");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PostureCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn read_measurements(
    input: &Path,
    format: &InputFormat,
) -> Result<Vec<RawMeasurement>, PostureCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("reading measurements from terminal; pipe NDJSON or press Ctrl-D when done");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let measurements = match format {
        InputFormat::Ndjson => input_data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(RawMeasurement::from_json)
            .collect::<Result<Vec<_>, _>>()?,
        InputFormat::Json => serde_json::from_str::<Vec<RawMeasurement>>(&input_data)
            .map_err(|e| PostureCliError::ParseError(format!("invalid measurement array: {e}")))?,
    };

    if measurements.is_empty() {
        return Err(PostureCliError::NoMeasurements);
    }
    Ok(measurements)
}

fn print_output<T: serde::Serialize>(
    items: &[T],
    format: &OutputFormat,
) -> Result<(), PostureCliError> {
    match format {
        OutputFormat::Ndjson => {
            for item in items {
                println!("{}", serde_json::to_string(item)?);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(items)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum PostureCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoMeasurements,
    ParseError(String),
    DoctorFailed,
}

impl From<io::Error> for PostureCliError {
    fn from(e: io::Error) -> Self {
        PostureCliError::Io(e)
    }
}

impl From<EngineError> for PostureCliError {
    fn from(e: EngineError) -> Self {
        PostureCliError::Engine(e)
    }
}

impl From<serde_json::Error> for PostureCliError {
    fn from(e: serde_json::Error) -> Self {
        PostureCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PostureCliError> for CliError {
    fn from(e: PostureCliError) -> Self {
        match e {
            PostureCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PostureCliError::Engine(e) => {
                let code = if e.is_client_error() {
                    "INVALID_REQUEST"
                } else {
                    "ENGINE_ERROR"
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: None,
                }
            }
            PostureCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PostureCliError::NoMeasurements => CliError {
                code: "NO_MEASUREMENTS".to_string(),
                message: "No measurements found in input".to_string(),
                hint: Some("Ensure input is not empty".to_string()),
            },
            PostureCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
            PostureCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}
