//! Stress CLI - Command-line interface for Stress Sense
//!
//! Commands:
//! - calibrate: Store the features of a session file as the baseline
//! - analyze: Score a session file against the baseline
//! - record: Capture host notifications from stdin, then analyze or calibrate
//! - baseline: Show or clear the stored baseline
//! - doctor: Diagnose configuration and baseline health

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use stress_sense::baseline::{BaselineStore, FileBaselineStore};
use stress_sense::capture::{CaptureSink, EventCapture, HostNotification, InputSource};
use stress_sense::encoder::ReportEncoder;
use stress_sense::error::CaptureError;
use stress_sense::types::{AnalysisReport, Session, SessionSubmission};
use stress_sense::{ComputeError, EngineConfig, StressProcessor, PRODUCER_NAME, STRESS_VERSION};

/// How often `record` checks whether the session is due
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stress - On-device stress estimation from pointer and keyboard behavior
#[derive(Parser)]
#[command(name = "stress")]
#[command(version = STRESS_VERSION)]
#[command(about = "Estimate stress from mouse and keystroke dynamics", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true, default_value = "stress.json")]
    config: PathBuf,

    /// Override the data directory from the configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate the baseline from a session file
    Calibrate {
        /// Session submission file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Analyze a session file
    Analyze {
        /// Session submission file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,

        /// Attach the feature summary regardless of the submission flag
        #[arg(long)]
        summary: bool,
    },

    /// Record host notifications (NDJSON on stdin) for one session
    Record {
        /// Session length in seconds (defaults to the configured duration)
        #[arg(long)]
        duration: Option<u64>,

        /// Store the recording as the baseline instead of analyzing it
        #[arg(long)]
        calibrate: bool,
    },

    /// Inspect or reset the stored baseline
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },

    /// Diagnose configuration and baseline health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BaselineAction {
    /// Print the stored baseline
    Show,
    /// Delete the stored baseline
    Clear,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

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

fn run(cli: Cli) -> Result<(), StressCliError> {
    let mut config = EngineConfig::load(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Calibrate { input } => cmd_calibrate(&config, &input),
        Commands::Analyze {
            input,
            pretty,
            summary,
        } => cmd_analyze(&config, &input, pretty, summary),
        Commands::Record {
            duration,
            calibrate,
        } => cmd_record(&config, duration, calibrate),
        Commands::Baseline { action } => cmd_baseline(&config, action),
        Commands::Doctor { json } => cmd_doctor(&config, &cli.config, json),
    }
}

fn read_input(input: &Path) -> Result<String, StressCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn cmd_calibrate(config: &EngineConfig, input: &Path) -> Result<(), StressCliError> {
    let json = read_input(input)?;
    let calibration = StressProcessor::from_config(config).calibrate_json(&json)?;
    println!("{}", serde_json::to_string_pretty(&calibration)?);
    Ok(())
}

fn cmd_analyze(
    config: &EngineConfig,
    input: &Path,
    pretty: bool,
    summary: bool,
) -> Result<(), StressCliError> {
    let json = read_input(input)?;
    let mut submission = stress_sense::pipeline::parse_submission(&json)?;
    submission.analyze_with_llm |= summary;

    let report = StressProcessor::from_config(config).process_submission(&submission);
    print_report(&report, pretty)
}

fn print_report(report: &AnalysisReport, pretty: bool) -> Result<(), StressCliError> {
    let encoder = ReportEncoder::new();
    let output = if pretty {
        encoder.encode_pretty(report)?
    } else {
        encoder.encode(report)?
    };
    println!("{}", output);
    Ok(())
}

fn cmd_record(
    config: &EngineConfig,
    duration: Option<u64>,
    calibrate: bool,
) -> Result<(), StressCliError> {
    let duration = match duration {
        Some(0) => return Err(StressCliError::InvalidDuration),
        Some(secs) => Duration::from_secs(secs),
        None => config.session_duration(),
    };

    let source = StdinSource::default();
    let exhausted = Arc::clone(&source.exhausted);
    let mut capture = EventCapture::new(source);
    capture.start()?;

    tracing::info!(seconds = duration.as_secs(), "recording session from stdin");
    while !capture.is_due(duration) && !exhausted.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }

    let session = capture.stop();
    let processor = StressProcessor::from_config(config);

    if calibrate {
        let calibration = processor.calibrate(&session)?;
        println!("{}", serde_json::to_string_pretty(&calibration)?);
        return Ok(());
    }

    let report = processor.process_submission(&recording_submission(&session));
    print_report(&report, false)
}

/// Analysis recordings always carry the assessment summary
fn recording_submission(session: &Session) -> SessionSubmission {
    SessionSubmission::from_session(session, true)
}

fn cmd_baseline(config: &EngineConfig, action: BaselineAction) -> Result<(), StressCliError> {
    let store = FileBaselineStore::new(config.baseline_path());

    match action {
        BaselineAction::Show => {
            let baseline = store.load().ok_or(StressCliError::NoBaseline)?;
            println!("{}", serde_json::to_string_pretty(&baseline)?);
        }
        BaselineAction::Clear => {
            store.clear()?;
            tracing::info!(path = %store.path().display(), "baseline cleared");
        }
    }

    Ok(())
}

fn cmd_doctor(config: &EngineConfig, config_path: &Path, json: bool) -> Result<(), StressCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "stress_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Stress Sense version {}", STRESS_VERSION),
    });

    checks.push(if config_path.exists() {
        DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!("Loaded {}", config_path.display()),
        }
    } else {
        DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} not found, using defaults", config_path.display()),
        }
    });

    checks.push(check_data_dir(&config.data_dir));

    let store = FileBaselineStore::new(config.baseline_path());
    checks.push(if !store.exists() {
        DoctorCheck {
            name: "baseline".to_string(),
            status: CheckStatus::Warning,
            message: "No baseline yet, analysis uses heuristic scoring".to_string(),
        }
    } else {
        match store.load() {
            Some(baseline) => DoctorCheck {
                name: "baseline".to_string(),
                status: CheckStatus::Ok,
                message: format!("Baseline valid ({} features)", baseline.len()),
            },
            None => DoctorCheck {
                name: "baseline".to_string(),
                status: CheckStatus::Error,
                message: format!(
                    "Baseline at {} is unreadable, recalibrate",
                    store.path().display()
                ),
            },
        }
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: STRESS_VERSION.to_string(),
        session_duration_secs: config.session_duration_secs,
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stress Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("Session:  {}s", report.session_duration_secs);
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
        Err(StressCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_data_dir(dir: &Path) -> DoctorCheck {
    if !dir.exists() {
        return DoctorCheck {
            name: "data_dir".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist yet, created on first write", dir.display()),
        };
    }

    match tempfile::tempfile_in(dir) {
        Ok(_) => DoctorCheck {
            name: "data_dir".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} is writable", dir.display()),
        },
        Err(e) => DoctorCheck {
            name: "data_dir".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot write to {}: {}", dir.display(), e),
        },
    }
}

// Input source

/// Host bridge that pipes NDJSON notifications into the capture sink.
///
/// Reading happens on a background thread. Stdin reads cannot be
/// interrupted, so `unregister` only stops forwarding.
#[derive(Default)]
struct StdinSource {
    forwarding: Arc<AtomicBool>,
    exhausted: Arc<AtomicBool>,
}

impl InputSource for StdinSource {
    fn register(&mut self, sink: CaptureSink) -> Result<(), CaptureError> {
        self.forwarding.store(true, Ordering::SeqCst);
        let forwarding = Arc::clone(&self.forwarding);
        let exhausted = Arc::clone(&self.exhausted);

        thread::Builder::new()
            .name("stdin-source".to_string())
            .spawn(move || {
                for (index, line) in io::stdin().lock().lines().enumerate() {
                    if !forwarding.load(Ordering::SeqCst) {
                        break;
                    }
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::error!(error = %e, "stdin read failed");
                            break;
                        }
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<HostNotification>(trimmed) {
                        Ok(notification) => sink.dispatch(&notification),
                        Err(e) => tracing::warn!(line = index + 1, error = %e, "skipping notification"),
                    }
                }
                exhausted.store(true, Ordering::SeqCst);
            })
            .map(|_| ())
            .map_err(|e| CaptureError::SourceUnavailable(e.to_string()))
    }

    fn unregister(&mut self) -> Result<(), CaptureError> {
        self.forwarding.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum StressCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    Capture(CaptureError),
    NoBaseline,
    InvalidDuration,
    DoctorFailed,
}

impl From<io::Error> for StressCliError {
    fn from(e: io::Error) -> Self {
        StressCliError::Io(e)
    }
}

impl From<ComputeError> for StressCliError {
    fn from(e: ComputeError) -> Self {
        StressCliError::Compute(e)
    }
}

impl From<serde_json::Error> for StressCliError {
    fn from(e: serde_json::Error) -> Self {
        StressCliError::Json(e)
    }
}

impl From<CaptureError> for StressCliError {
    fn from(e: CaptureError) -> Self {
        StressCliError::Capture(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StressCliError> for CliError {
    fn from(e: StressCliError) -> Self {
        match e {
            StressCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StressCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Ensure input has movements, clicks and keystrokes arrays",
                    ),
                    ComputeError::EmptySession(_) => (
                        "EMPTY_SESSION",
                        "Record some mouse movement or typing before calibrating",
                    ),
                    ComputeError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Fix the configuration file and retry")
                    }
                    ComputeError::Io(_) | ComputeError::BaselineError(_) => (
                        "BASELINE_ERROR",
                        "Check that the data directory is writable",
                    ),
                    ComputeError::EncodingError(_) => ("ENCODING_ERROR", "Report this as a bug"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            StressCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StressCliError::Capture(e) => CliError {
                code: "CAPTURE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            StressCliError::NoBaseline => CliError {
                code: "NO_BASELINE".to_string(),
                message: "No baseline stored".to_string(),
                hint: Some("Run 'stress calibrate' first".to_string()),
            },
            StressCliError::InvalidDuration => CliError {
                code: "INVALID_DURATION".to_string(),
                message: "Session duration must be positive".to_string(),
                hint: None,
            },
            StressCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    session_duration_secs: u64,
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

#[cfg(test)]
mod tests {
    use super::*;
    use stress_sense::types::MovementEvent;
    use stress_sense::MemoryBaselineStore;

    #[test]
    fn test_recording_attaches_summary() {
        let session = Session::new(
            vec![
                MovementEvent::new(0.0, 0.0, 1000.0),
                MovementEvent::new(10.0, 0.0, 1001.0),
            ],
            Vec::new(),
            Vec::new(),
        );

        let submission = recording_submission(&session);
        assert!(submission.analyze_with_llm);

        let report = StressProcessor::new(MemoryBaselineStore::new()).process_submission(&submission);
        let summary = report.assessment_summary.unwrap();
        assert!(summary.contains("- mouse_vel_mean: 10.00"));
    }
}
