//! hypnoagree CLI - Command-line interface for hypnogram agreement scoring
//!
//! Commands:
//! - evaluate: Score every subject in a cohort directory and report cohort figures
//! - series: Print one subject's time-aligned series (for plotting)
//! - review: Interactively look up subjects by number
//! - config: Print the effective configuration as TOML

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use hypnogram_agreement::report::render_summary;
use hypnogram_agreement::{
    evaluate_cohort, AnalysisConfig, ComputeError, ReportEncoder, SubjectResolver,
    TotalDurationPolicy, PRODUCER_NAME, VERSION,
};

/// hypnoagree - Agreement between automated and expert sleep-stage scoring
#[derive(Parser)]
#[command(name = "hypnoagree")]
#[command(version = VERSION)]
#[command(about = "Score headband and PSG AI sleep staging against expert consensus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every subject in a cohort directory
    Evaluate {
        #[command(flatten)]
        data: DataArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        output_format: OutputFormat,
    },

    /// Print one subject's time-aligned series
    Series {
        #[command(flatten)]
        data: DataArgs,

        /// Subject number (e.g. 10 or sub-10)
        #[arg(short, long)]
        subject: String,

        /// Series format
        #[arg(long, default_value = "tsv")]
        format: SeriesFormat,
    },

    /// Interactively review subjects by number
    Review {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Cohort directory containing one folder per subject
    #[arg(short, long, env = "HYPNOAGREE_DATA_DIR")]
    data_dir: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact-rate percentage at or above which a headband record is not scored
    #[arg(long)]
    threshold: Option<f64>,

    /// Epoch length in seconds
    #[arg(long)]
    epoch_seconds: Option<f64>,

    /// How total recorded hours are counted
    #[arg(long)]
    total_duration: Option<DurationArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DurationArg {
    /// (epochs - 1) x epoch length
    DiscountFirstEpoch,
    /// epochs x epoch length
    AllEpochs,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SeriesFormat {
    /// Tab-separated, one row per epoch
    Tsv,
    /// JSON object with one array per series
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
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

fn run(cli: Cli) -> Result<(), HypnoCliError> {
    match cli.command {
        Commands::Evaluate {
            data,
            output,
            output_format,
        } => cmd_evaluate(&data, &output, output_format),

        Commands::Series {
            data,
            subject,
            format,
        } => cmd_series(&data, &subject, format),

        Commands::Review { data } => cmd_review(&data),

        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}

fn load_config(data: &DataArgs) -> Result<AnalysisConfig, HypnoCliError> {
    let mut config = match &data.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(threshold) = data.threshold {
        config.quality_gate_threshold_pct = threshold;
    }
    if let Some(seconds) = data.epoch_seconds {
        config.epoch_duration_seconds = seconds;
    }
    if let Some(policy) = data.total_duration {
        config.total_duration = match policy {
            DurationArg::DiscountFirstEpoch => TotalDurationPolicy::DiscountFirstEpoch,
            DurationArg::AllEpochs => TotalDurationPolicy::AllEpochs,
        };
    }

    config.validate()?;
    Ok(config)
}

fn cmd_evaluate(
    data: &DataArgs,
    output: &PathBuf,
    output_format: OutputFormat,
) -> Result<(), HypnoCliError> {
    let config = load_config(data)?;
    info!(data_dir = %data.data_dir.display(), "starting cohort evaluation");

    let run = evaluate_cohort(&data.data_dir, &config)?;
    if run.results().is_empty() && run.failures().is_empty() {
        return Err(HypnoCliError::NoSubjects);
    }

    let encoder = ReportEncoder::new();
    let output_data = match output_format {
        OutputFormat::Text => render_summary(&run.summary()),
        OutputFormat::Json => serde_json::to_string(&encoder.encode(&run, &config))? + "\n",
        OutputFormat::JsonPretty => encoder.encode_to_json(&run, &config)? + "\n",
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_series(data: &DataArgs, subject: &str, format: SeriesFormat) -> Result<(), HypnoCliError> {
    let config = load_config(data)?;
    let resolver = SubjectResolver::from_directory(&data.data_dir, &config)?;
    let series = resolver.resolve(subject)?;

    match format {
        SeriesFormat::Tsv => print!("{}", series.to_tsv()?),
        SeriesFormat::Json => println!("{}", serde_json::to_string_pretty(&series)?),
    }
    Ok(())
}

fn cmd_review(data: &DataArgs) -> Result<(), HypnoCliError> {
    let config = load_config(data)?;
    let resolver = SubjectResolver::from_directory(&data.data_dir, &config)?;
    let interactive = atty::is(atty::Stream::Stdin);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    review_loop(&resolver, &mut stdin.lock(), &mut stdout, interactive)
}

/// Look up subjects until the operator declines to continue or input ends
fn review_loop<R: BufRead, W: Write>(
    resolver: &SubjectResolver,
    input: &mut R,
    out: &mut W,
    interactive: bool,
) -> Result<(), HypnoCliError> {
    loop {
        // Ask for a subject until one resolves
        loop {
            let Some(subject) = prompt(input, out, interactive, "Please enter a subject number: ")?
            else {
                return Ok(());
            };

            if subject.is_empty() {
                warn!("subject ID cannot be empty, please enter a valid subject number");
                continue;
            }
            info!(subject = %subject, "looking for subject");

            match resolver.resolve(&subject) {
                Ok(series) => {
                    match resolver.resolve_result(&subject) {
                        Ok(result) => {
                            writeln!(out, "Subject {}", result.subject_id)?;
                            writeln!(out, "  headband AI vs majority: {}", result.device_agreement)?;
                            writeln!(out, "  PSG AI vs majority:      {}", result.psg_agreement)?;
                        }
                        Err(e) => error!(subject = %subject, error = %e, "cannot score subject"),
                    }
                    write!(out, "{}", series.to_tsv()?)?;
                    out.flush()?;
                    break;
                }
                Err(ComputeError::SubjectNotFound(_)) => {
                    warn!(subject = %subject, "the subject number you entered doesn't exist, please enter a new subject number");
                }
                Err(e) => {
                    error!(subject = %subject, error = %e, "cannot load subject");
                    break;
                }
            }
        }

        // Ask whether to continue
        loop {
            let Some(answer) = prompt(
                input,
                out,
                interactive,
                "Do you want to review another subject's data? (y/n): ",
            )?
            else {
                return Ok(());
            };

            match answer.to_lowercase().as_str() {
                "y" => break,
                "n" => {
                    info!("exiting review");
                    return Ok(());
                }
                _ => warn!("invalid input, please enter 'y' to review another subject or 'n' to exit"),
            }
        }
    }
}

/// Trimmed next line, or `None` at end of input
fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    interactive: bool,
    message: &str,
) -> Result<Option<String>, HypnoCliError> {
    if interactive {
        write!(out, "{}", message)?;
        out.flush()?;
    }
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn cmd_config(config: Option<&std::path::Path>) -> Result<(), HypnoCliError> {
    let config = match config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    println!("# {} {}", PRODUCER_NAME, VERSION);
    print!("{}", config.to_toml()?);
    Ok(())
}

// Error types

#[derive(Debug)]
enum HypnoCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoSubjects,
}

impl From<io::Error> for HypnoCliError {
    fn from(e: io::Error) -> Self {
        HypnoCliError::Io(e)
    }
}

impl From<ComputeError> for HypnoCliError {
    fn from(e: ComputeError) -> Self {
        HypnoCliError::Compute(e)
    }
}

impl From<serde_json::Error> for HypnoCliError {
    fn from(e: serde_json::Error) -> Self {
        HypnoCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl From<HypnoCliError> for CliError {
    fn from(e: HypnoCliError) -> Self {
        match e {
            HypnoCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HypnoCliError::Compute(e) => {
                let hint = match &e {
                    ComputeError::InputNotFound { .. } => Some("Check --data-dir and --config paths"),
                    ComputeError::MalformedInput(_) | ComputeError::Csv(_) => {
                        Some("Event tables must be tab-separated with a header row")
                    }
                    ComputeError::SubjectNotFound(_) => Some("Run 'hypnoagree evaluate' to list subjects"),
                    ComputeError::Config(_) => Some("Run 'hypnoagree config' to see valid settings"),
                    _ => None,
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            HypnoCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            HypnoCliError::NoSubjects => CliError {
                code: "NO_SUBJECTS".to_string(),
                message: "No subject with both headband and PSG event files was found".to_string(),
                hint: Some("Expected <data-dir>/<subject>/eeg/*headband_events.tsv and *psg_events.tsv".to_string()),
            },
        }
    }
}
