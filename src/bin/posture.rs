//! Posture CLI - Command-line interface for Posture Flux
//!
//! Commands:
//! - score: Score recorded frames into reports (batch mode)
//! - run: Replay recorded frames through a live session (streaming mode)
//! - validate: Check recorded frames for required landmarks
//! - doctor: Diagnose configuration and environment

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use posture_flux::consumer::{SessionConsumer, SessionEvent};
use posture_flux::encoder::{PostureReport, ReportEncoder};
use posture_flux::history::HistoryBuffer;
use posture_flux::pipeline::{FrameParser, FrameProcessor};
use posture_flux::validator::{LandmarkValidator, ValidationError, REQUIRED_JOINTS};
use posture_flux::{
    EngineConfig, Frame, NdjsonSink, PostureError, PostureSession, PostureStatus, ReplayProvider,
    ScoreRecord, POSTURE_FLUX_VERSION, PRODUCER_NAME,
};

/// Posture - Real-time posture assessment from body landmarks
#[derive(Parser)]
#[command(name = "posture")]
#[command(version = POSTURE_FLUX_VERSION)]
#[command(about = "Score posture from pose-estimation landmarks", long_about = None)]
struct Cli {
    /// Log pipeline and session activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score recorded frames into reports (batch mode)
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        engine: EngineArgs,

        /// Load score history from file
        #[arg(long)]
        load_history: Option<PathBuf>,

        /// Save score history to file after processing
        #[arg(long)]
        save_history: Option<PathBuf>,
    },

    /// Replay recorded frames through a live session, printing session events
    Run {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Delay between replayed frames in milliseconds
        #[arg(long, default_value = "33")]
        frame_interval_ms: u64,

        #[command(flatten)]
        engine: EngineArgs,

        /// Append persistence samples to this NDJSON file
        #[arg(long)]
        samples: Option<PathBuf>,
    },

    /// Check recorded frames for required landmarks
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Treat landmarks below this visibility as missing
        #[arg(long)]
        min_visibility: Option<f64>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check saved history file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Engine settings shared by the scoring commands
#[derive(Args)]
struct EngineArgs {
    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of score records kept in history
    #[arg(long)]
    history_capacity: Option<usize>,

    /// Treat landmarks below this visibility as missing
    #[arg(long)]
    min_visibility: Option<f64>,

    /// User identifier stamped on persistence samples
    #[arg(long)]
    user_id: Option<String>,
}

impl EngineArgs {
    fn resolve(self) -> Result<EngineConfig, PostureCliError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        if let Some(capacity) = self.history_capacity {
            config.history_capacity = capacity;
        }
        if self.min_visibility.is_some() {
            config.min_visibility = self.min_visibility;
        }
        if let Some(user_id) = self.user_id {
            config.user_id = user_id;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame or null per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one report per line)
    Ndjson,
    /// JSON array of reports
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
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

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<(), PostureCliError> {
    match command {
        Commands::Score {
            input,
            output,
            input_format,
            output_format,
            engine,
            load_history,
            save_history,
        } => cmd_score(
            &input,
            &output,
            input_format,
            output_format,
            engine.resolve()?,
            load_history.as_deref(),
            save_history.as_deref(),
        ),

        Commands::Run {
            input,
            input_format,
            frame_interval_ms,
            engine,
            samples,
        } => cmd_run(
            &input,
            input_format,
            frame_interval_ms,
            engine.resolve()?,
            samples.as_deref(),
        ),

        Commands::Validate {
            input,
            input_format,
            min_visibility,
            json,
        } => cmd_validate(&input, input_format, min_visibility, json),

        Commands::Doctor {
            config,
            history,
            json,
        } => cmd_doctor(config.as_deref(), history.as_deref(), json),
    }
}

fn cmd_score(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: EngineConfig,
    load_history: Option<&Path>,
    save_history: Option<&Path>,
) -> Result<(), PostureCliError> {
    let frames = read_frames(input, &input_format)?;
    if frames.is_empty() {
        return Err(PostureCliError::NoFrames);
    }

    let mut processor = FrameProcessor::new(&config);

    if let Some(history_path) = load_history {
        let history_json = fs::read_to_string(history_path)?;
        processor.load_history(&history_json)?;
    }

    let encoder = ReportEncoder::new();
    let mut reports: Vec<PostureReport> = Vec::with_capacity(frames.len());
    for frame in frames {
        let outcome = processor.process(frame);
        reports.push(encoder.encode(&outcome, processor.history()));
    }

    if let Some(history_path) = save_history {
        fs::write(history_path, processor.save_history()?)?;
    }

    let output_data = format_output(&reports, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    input: &Path,
    input_format: InputFormat,
    frame_interval_ms: u64,
    config: EngineConfig,
    samples: Option<&Path>,
) -> Result<(), PostureCliError> {
    let frames = read_frames(input, &input_format)?;
    if frames.is_empty() {
        return Err(PostureCliError::NoFrames);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let provider = ReplayProvider::new(frames)
            .with_frame_interval(Duration::from_millis(frame_interval_ms));
        let mut session = PostureSession::new(config, provider, EventPrinter::new());

        if let Some(path) = samples {
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            session = session.with_sink(NdjsonSink::new(file));
        }

        session.start()?;
        session
            .run_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;

        tracing::info!(
            elapsed = session.elapsed_seconds(),
            scored = session.history().len(),
            "replay finished"
        );
        Ok::<(), PostureCliError>(())
    })
}

/// Consumer printing each session event as one JSON line on stdout
struct EventPrinter {
    stdout: io::Stdout,
}

impl EventPrinter {
    fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }

    fn print(&mut self, event: SessionEvent) {
        let written = serde_json::to_string(&event)
            .map_err(io::Error::from)
            .and_then(|line| {
                let mut out = self.stdout.lock();
                writeln!(out, "{line}")?;
                out.flush()
            });
        if let Err(error) = written {
            tracing::warn!(%error, "failed to write session event");
        }
    }
}

impl SessionConsumer for EventPrinter {
    fn on_score_update(&mut self, record: &ScoreRecord) {
        self.print(SessionEvent::ScoreUpdate { record: *record });
    }

    fn on_status_change(&mut self, status: PostureStatus, message: &str) {
        self.print(SessionEvent::StatusChange {
            status,
            message: message.to_string(),
        });
    }

    fn on_elapsed_time(&mut self, seconds: u64) {
        self.print(SessionEvent::ElapsedTime { seconds });
    }

    fn on_history_snapshot(&mut self, history: &[ScoreRecord]) {
        self.print(SessionEvent::HistorySnapshot {
            history: history.to_vec(),
        });
    }

    fn on_error(&mut self, error: &PostureError) {
        // The end of a finite recording is not worth an error line
        if matches!(error, PostureError::ProviderClosed) {
            return;
        }
        self.print(SessionEvent::Error {
            message: error.to_string(),
        });
    }
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    min_visibility: Option<f64>,
    json: bool,
) -> Result<(), PostureCliError> {
    let frames = read_frames(input, &input_format)?;
    let validator = LandmarkValidator::with_min_visibility(min_visibility);

    let mut report = ValidationReport {
        total_frames: frames.len(),
        valid_frames: 0,
        absent_frames: 0,
        invalid_frames: 0,
        errors: Vec::new(),
    };

    for (index, frame) in frames.into_iter().enumerate() {
        match validator.validate_notification(frame) {
            Ok(_) => report.valid_frames += 1,
            Err(ValidationError::NoSubject) => report.absent_frames += 1,
            Err(err) => {
                report.invalid_frames += 1;
                report.errors.push(ValidationErrorDetail {
                    index,
                    joint: err.joint().map(|j| j.to_string()),
                    error: err.to_string(),
                });
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Absent frames:  {}", report.absent_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Frame {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(PostureCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    history: Option<&Path>,
    json: bool,
) -> Result<(), PostureCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "posture_flux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Posture Flux version {}", POSTURE_FLUX_VERSION),
    });

    checks.push(DoctorCheck {
        name: "required_joints".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} joints required per frame", REQUIRED_JOINTS.len()),
    });

    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist; defaults will be used".to_string(),
        }),
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (history {}, tick {}ms, user {})",
                    config.history_capacity, config.tick_interval_ms, config.user_id
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config: {}", e),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        }),
    }

    if let Some(history_path) = history {
        if history_path.exists() {
            let loaded = fs::read_to_string(history_path)
                .map_err(PostureError::from)
                .and_then(|content| Ok(HistoryBuffer::from_json(&content)?));
            match loaded {
                Ok(buffer) => checks.push(DoctorCheck {
                    name: "history".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "History file valid ({} of {} records)",
                        buffer.len(),
                        buffer.capacity()
                    ),
                }),
                Err(e) => checks.push(DoctorCheck {
                    name: "history".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid history file: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "history".to_string(),
                status: CheckStatus::Warning,
                message: "History file does not exist".to_string(),
            });
        }
    }

    // Check stdin is available (for piped recordings)
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
            message: "stdin is a pipe (use --input - to read frames)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: POSTURE_FLUX_VERSION.to_string(),
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

// Helper functions

fn read_frames(input: &Path, format: &InputFormat) -> Result<Vec<Option<Frame>>, PostureCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let frames = match format {
        InputFormat::Ndjson => FrameParser::parse_ndjson(&input_data)?,
        InputFormat::Json => FrameParser::parse_array(&input_data)?,
    };
    Ok(frames)
}

fn format_output(reports: &[PostureReport], format: &OutputFormat) -> Result<String, PostureCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for report in reports {
                lines.push(serde_json::to_string(report)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(reports)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(reports)?),
    }
}

// Error types

#[derive(Debug)]
enum PostureCliError {
    Io(io::Error),
    Engine(PostureError),
    Json(serde_json::Error),
    NoFrames,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for PostureCliError {
    fn from(e: io::Error) -> Self {
        PostureCliError::Io(e)
    }
}

impl From<PostureError> for PostureCliError {
    fn from(e: PostureError) -> Self {
        PostureCliError::Engine(e)
    }
}

impl From<serde_json::Error> for PostureCliError {
    fn from(e: serde_json::Error) -> Self {
        PostureCliError::Json(e)
    }
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
                let (code, hint) = match &e {
                    PostureError::Config(_) => ("CONFIG_ERROR", "Run 'posture doctor --config <file>'"),
                    PostureError::ProviderUnavailable(_)
                    | PostureError::ProviderError(_)
                    | PostureError::ProviderClosed => {
                        ("PROVIDER_ERROR", "Check the frame source")
                    }
                    PostureError::JsonError(_) | PostureError::InvalidFrame(_) => (
                        "PARSE_ERROR",
                        "Frames are {\"landmarks\": {\"nose\": {\"x\": .., \"y\": ..}, ..}} or null",
                    ),
                    _ => ("ENGINE_ERROR", "Re-run with --verbose for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PostureCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PostureCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PostureCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Every frame needs all required joints, or null when nobody is in view".to_string()),
            },
            PostureCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    absent_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    joint: Option<String>,
    error: String,
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
