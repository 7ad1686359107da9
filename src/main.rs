// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow, Context};
use log::{info, warn, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::path::PathBuf;
use std::io::Write;
use clap::{Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use polyglot_sheets::app_config::{self, Config, OutputLayout, parse_column_list, API_KEY_ENV};
use polyglot_sheets::app_controller::{Controller, RunReport};
use polyglot_sheets::language_utils::LanguageCode;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for OutputLayout to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliOutputLayout {
    Sheets,
    Wide,
}

impl From<CliOutputLayout> for OutputLayout {
    fn from(cli_layout: CliOutputLayout) -> Self {
        match cli_layout {
            CliOutputLayout::Sheets => OutputLayout::Sheets,
            CliOutputLayout::Wide => OutputLayout::Wide,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions for polyglot-sheets
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// polyglot-sheets - spreadsheet translation with a completion API
///
/// Translates the selected columns of a spreadsheet into French, English,
/// German, Spanish, Italian, Dutch and Portuguese.
#[derive(Parser, Debug)]
#[command(name = "polyglot-sheets")]
#[command(version)]
#[command(about = "Translate spreadsheet columns into seven European languages")]
#[command(long_about = "polyglot-sheets detects the language of a spreadsheet and translates the selected columns into every other supported language (FR, EN, DE, ES, IT, NL, PT).

EXAMPLES:
    polyglot-sheets catalogue.xlsx                        # Translate columns B..H
    polyglot-sheets catalogue.xlsx -o out.xlsx            # Choose the output workbook
    polyglot-sheets catalogue.csv -c Name,Description     # Translate named columns
    polyglot-sheets catalogue.xlsx -s fr                  # Skip language detection
    polyglot-sheets catalogue.xlsx --layout wide          # One sheet with suffixed columns
    polyglot-sheets --check                               # Only test the API connection
    polyglot-sheets completions bash > polyglot.bash      # Generate bash completions

CONFIGURATION:
    Settings are read from conf.json by default (see --config). Command line
    flags override the environment, which overrides the file. The API key is
    read from --api-key or the OPENAI_API_KEY environment variable.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input spreadsheet (.xlsx, .xlsm, .xls, .ods, .csv, .tsv)
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Output file (.xlsx or .csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// API key for the completion service
    #[arg(short = 'k', long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Columns to translate, by header name or letter (e.g. 'B,C,Description')
    #[arg(short, long)]
    columns: Option<String>,

    /// Source language code (e.g. 'fr', 'en'); detected when omitted
    #[arg(short, long)]
    source_language: Option<String>,

    /// Number of concurrent row tasks (1 to 30)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output layout
    #[arg(long, value_enum)]
    layout: Option<CliOutputLayout>,

    /// Configuration file path
    #[arg(long = "config", default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Test the API connection before starting, or alone without an input file
    #[arg(long)]
    check: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let color = Self::color_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {:<5} {}\x1B[0m", color, now, record.level(), record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace lets the level chosen later through set_max_level take effect
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "polyglot-sheets", &mut std::io::stdout());
            Ok(())
        }
        None => run_translate(cli).await,
    }
}

async fn run_translate(options: CommandLineOptions) -> Result<()> {
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let config = build_config(&options)?;
    log::set_max_level(config.log_level.to_level_filter());

    config.validate().context("Configuration validation failed")?;

    let source_language = match &options.source_language {
        Some(code) => Some(
            code.parse::<LanguageCode>()
                .map_err(|e| anyhow!("Invalid source language '{}': {}", code, e))?,
        ),
        None => None,
    };

    let controller = Controller::with_config(config.clone())?;

    if options.check {
        controller.check_connection().await?;
    }

    let input_path = match options.input_path {
        Some(path) => path,
        None if options.check => return Ok(()),
        None => return Err(anyhow!("INPUT_PATH is required when no subcommand is specified")),
    };

    let output_path = config.output.path.clone();
    info!("Translating {:?} into {:?}", input_path, output_path);

    let report = controller.run(&input_path, &output_path, source_language).await?;
    print_summary(&report);

    Ok(())
}

// @method: Merge config file, environment and command line flags
fn build_config(options: &CommandLineOptions) -> Result<Config> {
    let config_path = &options.config_path;
    let mut config = Config::load_or_default(config_path)?;
    if !std::path::Path::new(config_path).exists() {
        warn!("Config file not found at '{}', using defaults.", config_path);
    }

    config.apply_env();

    if let Some(api_key) = &options.api_key {
        config.api.api_key = api_key.clone();
    }

    if let Some(model) = &options.model {
        config.api.model = model.clone();
    }

    if let Some(columns) = &options.columns {
        config.translation.columns = parse_column_list(columns);
    }

    if let Some(workers) = options.workers {
        config.translation.workers = workers;
    }

    if let Some(layout) = &options.layout {
        config.output.layout = layout.clone().into();
    }

    if let Some(output) = &options.output {
        config.output.path = output.clone();
    }

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    Ok(config)
}

fn print_summary(report: &RunReport) {
    let outcome = &report.outcome;
    let summary = &outcome.summary;
    let how = if outcome.detected { "detected" } else { "given" };

    println!("Source language: {} ({})", outcome.source_language.display_name(), how);
    println!(
        "Targets: {}",
        outcome
            .target_languages()
            .iter()
            .map(|lang| lang.code())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if !outcome.missing_columns.is_empty() {
        println!("Missing columns: {}", outcome.missing_columns.join(", "));
    }
    println!(
        "Cells: {} translated, {} failed, {} empty ({} failed row task(s)) in {:.1}s",
        summary.translated_cells,
        summary.failed_cells,
        summary.empty_cells,
        summary.failed_rows,
        summary.elapsed.as_secs_f64()
    );
    println!("API: {} call(s), {} retries", report.usage.api_calls, report.usage.retries);
    for path in &report.written {
        println!("Written: {}", path.display());
    }
}
