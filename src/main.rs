use clap::{Args, ColorChoice, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::Colorize;
use detvote::codec::Format;
use detvote::codec::dataset::Dataset;
use detvote::config::{LogFormat, Settings};
use detvote::error::{ConfigError, Error};
use detvote::filter::{filter_by_confidence, filtered_file_name};
use detvote::report::{RunSummary, TracingReporter};
use detvote::sources::{discover_logs, read_any};
use detvote::{AggregationEngine, logging};
use std::fs;
use std::io::{IsTerminal, stderr, stdout};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "detvote",
    about = "Merge detections from several detectors by cascaded voting",
    arg_required_else_help = true
)]
struct Cli {
    /// Disable color
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Settings file (TOML); defaults to $DETVOTE_SETTINGS or the user config directory
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Log level, e.g. info or debug (RUST_LOG takes precedence)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log line format
    #[arg(long, global = true, value_enum, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge detector logs and keep the detections enough detectors agree on
    Aggregate(AggregateArgs),
    /// Convert between the log format and the JSON dataset format
    Convert(ConvertArgs),
    /// Drop detections below a confidence threshold
    Filter(FilterArgs),
    /// Print the JSON Schema of the dataset format
    Schema,
    /// Show or create the settings file
    #[command(subcommand)]
    Settings(SettingsCmd),
}

#[derive(Args, Clone)]
struct AggregateArgs {
    /// Detector log files, merged in the order given
    #[arg(value_name = "LOG")]
    logs: Vec<PathBuf>,

    /// Directory holding `<detector>/*.txt` logs
    #[arg(long, value_name = "DIR")]
    logs_dir: Option<PathBuf>,

    /// Image dataset path the detectors ran on
    #[arg(short = 'i', long, value_name = "PATH")]
    dataset: Option<String>,

    /// Path prefix to remove from image keys, e.g. `a/b/c` turns `a/b/c/d.jpg` into `d.jpg`
    #[arg(short, long)]
    prefix: Option<String>,

    /// Directory to save results in
    #[arg(short, long, value_name = "DIR")]
    output_path: Option<PathBuf>,

    /// Output file name; defaults to the last component of --dataset
    #[arg(short, long)]
    filename: Option<String>,

    /// Output format: dataset or log
    #[arg(long, value_name = "FORMAT")]
    save_format: Option<String>,

    /// Comma-separated IoU threshold per cascade stage
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    thresh_iou: Option<Vec<f64>>,

    /// Comma-separated minimum votes per cascade stage
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    min_votes: Option<Vec<usize>>,

    /// Worker threads for per-image aggregation
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Write the result to stdout instead of a file
    #[arg(long, conflicts_with_all = ["output_path", "filename"])]
    stdout: bool,
}

#[derive(Args, Clone)]
struct ConvertArgs {
    /// Input file (.txt log or .json dataset)
    input: PathBuf,

    /// Target format; defaults to the other one
    #[arg(long, value_name = "FORMAT")]
    to: Option<String>,

    /// Directory to save results in
    #[arg(short, long, value_name = "DIR")]
    output_path: Option<PathBuf>,

    /// Output file name; defaults to the input name
    #[arg(short, long)]
    filename: Option<String>,

    /// Write the result to stdout instead of a file
    #[arg(long, conflicts_with_all = ["output_path", "filename"])]
    stdout: bool,
}

#[derive(Args, Clone)]
struct FilterArgs {
    /// Input file (.txt log or .json dataset)
    input: PathBuf,

    /// Detections with a lower confidence are removed
    #[arg(short, long, value_name = "THRESH")]
    thresh_conf: f64,

    /// Directory to save results in
    #[arg(short, long, value_name = "DIR")]
    output_path: Option<PathBuf>,

    /// Output file name; defaults to `<input>_filtered_<thresh>`
    #[arg(short, long)]
    filename: Option<String>,

    /// Write the result to stdout instead of a file
    #[arg(long, conflicts_with_all = ["output_path", "filename"])]
    stdout: bool,
}

#[derive(Subcommand, Clone)]
enum SettingsCmd {
    /// Print the effective settings
    Show,
    /// Write default settings to --settings or the user config directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

type CmdResult = Result<(), Error>;

/// Where a result goes: a file under `dir`, or stdout.
enum Destination {
    File { dir: PathBuf, name: String },
    Stdout,
}

fn write_result(
    dest: &Destination,
    format: Format,
    contents: &str,
) -> Result<Option<PathBuf>, Error> {
    match dest {
        Destination::Stdout => {
            println!("{}", contents);
            Ok(None)
        }
        Destination::File { dir, name } => {
            let ext = format!(".{}", format.extension());
            let file_name = if name.ends_with(&ext) {
                name.clone()
            } else {
                format!("{name}{ext}")
            };
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
            let path = dir.join(file_name);
            fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
            Ok(Some(path))
        }
    }
}

/// Last non-empty component of a `/`-separated path.
fn last_component(path: &str) -> Option<&str> {
    path.split('/').rfind(|s| !s.is_empty())
}

fn heading(text: &str) -> String {
    text.bold().cyan().to_string()
}

fn print_summary(summary: &RunSummary, saved: Option<&Path>) {
    println!("{}", heading("Aggregated:"));
    println!("  sources = {}", summary.sources);
    println!("  images = {}", summary.images);
    println!(
        "  detections = {} -> {}",
        summary.detections_in,
        summary.detections_out.to_string().green()
    );
    if let Some(path) = saved {
        println!("  saved = {}", path.display());
    }
}

fn run_aggregate(args: AggregateArgs, mut settings: Settings) -> CmdResult {
    if let Some(thresh_iou) = args.thresh_iou {
        settings.cascade.thresh_iou = thresh_iou;
    }
    if let Some(min_votes) = args.min_votes {
        settings.cascade.min_votes = min_votes;
    }
    if let Some(format) = args.save_format {
        settings.output.format = format;
    }
    if let Some(dir) = args.output_path {
        settings.output.directory = dir;
    }
    if args.prefix.is_some() {
        settings.output.prefix = args.prefix;
    }

    // Everything configurable is checked before any log is read.
    settings.validate(args.dataset.as_deref())?;
    let cascade = settings.cascade()?;
    let format = settings.format()?;
    let dest = if args.stdout {
        Destination::Stdout
    } else {
        let name = args
            .filename
            .or_else(|| args.dataset.as_deref().and_then(last_component).map(str::to_string))
            .ok_or(ConfigError::MissingOutputName)?;
        Destination::File {
            dir: settings.output.directory.clone(),
            name,
        }
    };

    let mut logs = args.logs;
    if let Some(dir) = &args.logs_dir {
        logs.extend(discover_logs(dir)?);
    }
    if logs.is_empty() {
        return Err(ConfigError::NoInputs.into());
    }

    let engine = AggregationEngine::new(cascade)
        .with_prefix(settings.output.prefix.clone())
        .with_jobs(args.jobs);
    let (aggregated, summary) = engine.run_files(&logs)?;
    let encoded = format.encode(&aggregated)?;
    let saved = write_result(&dest, format, &encoded)?;

    if let Some(path) = saved {
        print_summary(&summary, Some(path.as_path()));
    }
    Ok(())
}

fn run_convert(args: ConvertArgs, settings: Settings) -> CmdResult {
    let (from, set) = read_any(&args.input, &TracingReporter)?;
    let to = match args.to.as_deref() {
        Some(s) => s.parse()?,
        None => match from {
            Format::Log => Format::Dataset,
            Format::Dataset => Format::Log,
        },
    };
    let dest = if args.stdout {
        Destination::Stdout
    } else {
        let name = args.filename.unwrap_or_else(|| file_stem(&args.input));
        Destination::File {
            dir: args.output_path.unwrap_or(settings.output.directory),
            name,
        }
    };
    let encoded = to.encode(&set)?;
    if let Some(path) = write_result(&dest, to, &encoded)? {
        println!("{} {}", heading("Converted:"), path.display());
    }
    Ok(())
}

fn run_filter(args: FilterArgs, settings: Settings) -> CmdResult {
    let (format, set) = read_any(&args.input, &TracingReporter)?;
    let before = set.detection_count();
    let filtered = filter_by_confidence(set, args.thresh_conf);
    let dest = if args.stdout {
        Destination::Stdout
    } else {
        let name = args
            .filename
            .unwrap_or_else(|| filtered_file_name(&args.input, args.thresh_conf));
        Destination::File {
            dir: args.output_path.unwrap_or(settings.output.directory),
            name,
        }
    };
    let encoded = format.encode(&filtered)?;
    if let Some(path) = write_result(&dest, format, &encoded)? {
        println!(
            "{} {} -> {} detections, saved = {}",
            heading("Filtered:"),
            before,
            filtered.detection_count(),
            path.display()
        );
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

fn run_schema() -> CmdResult {
    let schema = schemars::schema_for!(Dataset);
    match serde_json::to_string_pretty(&schema) {
        Ok(s) => println!("{}", s),
        Err(e) => return Err(detvote::error::EncodeError::Json(e.to_string()).into()),
    }
    Ok(())
}

fn run_settings_show(settings: &Settings) -> Result<(), i32> {
    match settings.to_toml() {
        Ok(s) => {
            print!("{}", s);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: cannot render settings: {}", e);
            Err(1)
        }
    }
}

fn run_settings_init(explicit: Option<&Path>, force: bool) -> Result<(), i32> {
    let Some(path) = explicit
        .map(Path::to_path_buf)
        .or_else(Settings::settings_file_path)
    else {
        eprintln!("Error: no config directory available, pass --settings");
        return Err(2);
    };
    if path.exists() && !force {
        eprintln!(
            "Error: {} already exists (use --force to overwrite)",
            path.display()
        );
        return Err(1);
    }
    if let Err(e) = Settings::default().save(&path) {
        eprintln!("Error: cannot write {}: {}", path.display(), e);
        return Err(1);
    }
    println!("{} {}", heading("Wrote:"), path.display());
    Ok(())
}

/// Configuration problems exit with 2, malformed inputs with 3, anything else with 1.
fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Config(_) => 2,
        Error::Decode { .. } => 3,
        _ => 1,
    }
}

fn detect_color_choice() -> ColorChoice {
    // Scan args before clap so help/errors honor `--no-color`.
    // Mirror clap's parsing by stopping at `--` which terminates flags.
    let mut args = std::env::args_os();
    // Skip binary name
    args.next();
    let mut flag = false;
    for arg in args {
        if arg == "--" {
            break;
        }
        if arg == "--no-color" {
            flag = true;
            break;
        }
    }
    if flag || std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

/// Process-wide options shared by every subcommand.
struct Globals {
    settings: Option<PathBuf>,
    log_level: Option<String>,
    log_format: Option<LogFormat>,
    color: bool,
}

impl Globals {
    /// Load settings and install logging. Failures are configuration errors.
    fn prepare(&self) -> Result<Settings, i32> {
        let settings = Settings::load(self.settings.as_deref()).map_err(|e| {
            eprintln!("Error: {}", e);
            2
        })?;

        let mut log_settings = settings.logging.clone();
        if let Some(level) = &self.log_level {
            log_settings.level = level.clone();
        }
        if let Some(format) = self.log_format {
            log_settings.format = format;
        }
        logging::init(&log_settings, self.color).map_err(|e| {
            eprintln!("Error: {:#}", e);
            2
        })?;
        Ok(settings)
    }
}

fn report(result: CmdResult) -> Result<(), i32> {
    result.map_err(|err| {
        tracing::error!(error = %err, "command failed");
        eprintln!("Error: {}", err);
        exit_code(&err)
    })
}

fn run(command: Commands, globals: &Globals) -> Result<(), i32> {
    match command {
        Commands::Aggregate(args) => report(run_aggregate(args, globals.prepare()?)),
        Commands::Convert(args) => report(run_convert(args, globals.prepare()?)),
        Commands::Filter(args) => report(run_filter(args, globals.prepare()?)),
        Commands::Schema => {
            globals.prepare()?;
            report(run_schema())
        }
        Commands::Settings(SettingsCmd::Show) => run_settings_show(&globals.prepare()?),
        // Init must work even when the existing file does not parse.
        Commands::Settings(SettingsCmd::Init { force }) => {
            run_settings_init(globals.settings.as_deref(), force)
        }
    }
}

fn main() {
    let color = detect_color_choice();
    let matches = Cli::command().color(color).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    let allow_color = !cli.no_color && !matches!(color, ColorChoice::Never);
    if !(allow_color && stdout().is_terminal()) {
        colored::control::set_override(false);
    }

    let Some(command) = cli.command else {
        return;
    };
    let globals = Globals {
        settings: cli.settings,
        log_level: cli.log_level,
        log_format: cli.log_format,
        color: allow_color && stderr().is_terminal(),
    };

    if let Err(code) = run(command, &globals) {
        std::process::exit(code);
    }
}
