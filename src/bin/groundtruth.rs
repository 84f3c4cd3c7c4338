//! Groundtruth CLI: extract and track decisions from meeting transcripts.
//!
//! Usage:
//!   groundtruth process <folder> [--pattern GLOB] [--from DATE] [--to DATE] ...
//!   groundtruth extract <file> [--config path] [--deciders a,b]
//!   groundtruth manifest <folder>
//!   groundtruth validate <csv> [--config path] [--deciders a,b]
//!   groundtruth categories [--config path]
//!   groundtruth template [--config path] [--deciders a,b]
//!   groundtruth init [path] [--deciders a,b] [--force]
//!
//! Exit codes: 0 success, 1 error, 2 finished with per-file failures.

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use groundtruth::config::merge_frameworks;
use groundtruth::manifest;
use groundtruth::pipeline::{process_file, process_root, RunOptions, RunSummary, DEFAULT_PATTERN};
use groundtruth::report::{check_csv, csv_template, output_base_name, write_report};
use groundtruth::{CliBackend, ExtractionBackend, Framework, TrackerConfig};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "groundtruth",
    version,
    about = "Extract and track decisions from meeting transcripts"
)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that run extraction.
#[derive(Args)]
struct ExtractionArgs {
    /// Path to YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Framework files (YAML or markdown), applied in order
    #[arg(short, long = "framework")]
    frameworks: Vec<PathBuf>,
    /// Comma-separated decision-makers; disables auto-detection
    #[arg(short, long)]
    deciders: Option<String>,
    /// Retries per file for transient backend failures
    #[arg(long)]
    retries: Option<u32>,
    /// Output name without extension
    #[arg(long)]
    output_name: Option<String>,
    /// Do not prefix the output name with today's date
    #[arg(long)]
    no_date_prefix: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every transcript in a folder, reusing cached results
    Process {
        folder: PathBuf,
        /// Glob for transcript files
        #[arg(short, long, default_value = DEFAULT_PATTERN)]
        pattern: String,
        /// Only files dated on or after (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Only files dated on or before (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
        /// Concurrent extractions
        #[arg(short, long)]
        workers: Option<usize>,
        /// Show what would be processed without calling the backend
        #[arg(long)]
        dry_run: bool,
        /// Ignore the manifest and reprocess everything
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        extraction: ExtractionArgs,
    },
    /// Extract decisions from a single transcript (no caching)
    Extract {
        file: PathBuf,
        #[command(flatten)]
        extraction: ExtractionArgs,
    },
    /// Show the manifest for a folder
    Manifest { folder: PathBuf },
    /// Check a report CSV for layout and value errors
    Validate {
        csv: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Comma-separated decision-makers expected as columns
        #[arg(short, long)]
        deciders: Option<String>,
    },
    /// Show the configured categories and decision types
    Categories {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print a CSV header for a hand-filled report
    Template {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Comma-separated decision-makers
        #[arg(short, long)]
        deciders: Option<String>,
    },
    /// Write a default config file
    Init {
        #[arg(default_value = "groundtruth.yaml")]
        path: PathBuf,
        /// Comma-separated decision-makers
        #[arg(short, long)]
        deciders: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Base config, frameworks and command-line overrides, in that order.
fn effective_config(args: &ExtractionArgs) -> Result<(TrackerConfig, Framework), String> {
    let mut config = TrackerConfig::load_or_default(args.config.as_deref())
        .map_err(|e| format!("Failed to load config: {}", e))?;

    let framework = merge_frameworks(&args.frameworks)
        .map_err(|e| format!("Failed to load framework: {}", e))?;
    if !framework.is_empty() {
        config.apply_framework(&framework);
        tracing::info!(frameworks = args.frameworks.len(), "Applied frameworks");
    }

    if let Some(deciders) = &args.deciders {
        config.set_explicit_participants(&split_names(deciders));
    }
    if let Some(retries) = args.retries {
        config.pipeline.max_retries = retries;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok((config, framework))
}

fn block_on<F: Future<Output = i32>>(future: F) -> i32 {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(future),
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            1
        }
    }
}

fn print_summary(summary: &RunSummary) {
    if summary.dry_run {
        println!("Dry run: {} to process, {} cached", summary.pending.len(), summary.cached.len());
        for name in &summary.pending {
            println!("  would process  {}", name);
        }
        for name in &summary.cached {
            println!("  cached         {}", name);
        }
        return;
    }

    println!(
        "Processed {}, cached {}, failed {} ({} decisions)",
        summary.processed.len(),
        summary.cached.len(),
        summary.failed.len(),
        summary.decisions.len()
    );
    for failure in &summary.failed {
        println!("  failed  {}: {}", failure.path.display(), failure.error);
    }
    for correction in &summary.corrections {
        println!(
            "  status  '{}' ({}): {} -> {}",
            correction.title, correction.meeting_reference, correction.from, correction.to
        );
    }
    if !summary.manifest_saved {
        println!("Warning: manifest not saved; the next run will reprocess every file");
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_process(
    folder: PathBuf,
    pattern: String,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    workers: Option<usize>,
    dry_run: bool,
    force: bool,
    args: ExtractionArgs,
) -> i32 {
    let (mut config, framework) = match effective_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Some(workers) = workers {
        if workers == 0 {
            eprintln!("Error: --workers must be at least 1");
            return 1;
        }
        config.pipeline.max_workers = workers;
    }

    let base_name = output_base_name(
        &folder,
        args.output_name.as_deref(),
        !args.no_date_prefix,
        Local::now().date_naive(),
    );
    let options = RunOptions {
        pattern,
        from,
        to,
        dry_run,
        force,
        output_file: format!("{}.csv", base_name),
    };
    let backend: Arc<dyn ExtractionBackend> = Arc::new(CliBackend::from_config(&config));

    block_on(async {
        let summary = match process_root(&folder, &config, &framework, &options, backend).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };
        print_summary(&summary);
        if summary.dry_run {
            return 0;
        }

        match write_report(&folder, &base_name, &summary.decisions, &summary.participants) {
            Ok(paths) => println!("Created: {}\nCreated: {}", paths.csv.display(), paths.json.display()),
            Err(e) => {
                eprintln!("Error: failed to write report: {}", e);
                return 1;
            }
        }
        if summary.has_failures() {
            2
        } else {
            0
        }
    })
}

fn cmd_extract(file: PathBuf, args: ExtractionArgs) -> i32 {
    if !file.is_file() {
        eprintln!("Error: '{}' is not a file", file.display());
        return 1;
    }
    let (config, _framework) = match effective_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let backend: Arc<dyn ExtractionBackend> = Arc::new(CliBackend::from_config(&config));
    let out_dir = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let base_name = output_base_name(
        &file,
        args.output_name.as_deref(),
        !args.no_date_prefix,
        Local::now().date_naive(),
    );

    block_on(async {
        let batch = match process_file(&file, &config, backend).await {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };
        let participants = groundtruth::pipeline::report_participants(&config, &batch.participants, &batch.decisions);
        match write_report(&out_dir, &base_name, &batch.decisions, &participants) {
            Ok(paths) => {
                println!("Created: {} ({} decisions)", paths.csv.display(), batch.decisions.len());
                0
            }
            Err(e) => {
                eprintln!("Error: failed to write report: {}", e);
                1
            }
        }
    })
}

fn cmd_manifest(folder: &Path) -> i32 {
    let Some(m) = manifest::load(folder) else {
        eprintln!("No usable manifest in {}", folder.display());
        return 1;
    };
    println!("Manifest:   {}", manifest::manifest_path(folder).display());
    println!("Version:    {}", m.schema_version);
    println!("Generated:  {}", m.generated_at);
    println!("Output:     {}", m.output_file);
    println!("Config:     {}", m.config_fingerprint);
    if m.framework_fingerprint.is_empty_sentinel() {
        println!("Framework:  none");
    } else {
        println!("Framework:  {}", m.framework_fingerprint);
    }
    println!();
    println!("{:<48}  {:>9}  {:<20}", "FILE", "DECISIONS", "HASH");
    println!("{}", "-".repeat(81));
    for (name, entry) in &m.files {
        let hash: String = entry.content_hash.as_str().chars().take(20).collect();
        println!("{:<48}  {:>9}  {:<20}", name, entry.decisions_count, hash);
    }
    println!();
    println!("{} files, {} decisions", m.files.len(), m.total_decisions());
    0
}

/// Participant columns: `--deciders` when given, else the configured names.
fn column_names(config: Option<&Path>, deciders: Option<&str>) -> Result<(TrackerConfig, Vec<String>), String> {
    let config = TrackerConfig::load_or_default(config).map_err(|e| format!("Failed to load config: {}", e))?;
    let names = match deciders {
        Some(list) => split_names(list),
        None => config.participant_names(),
    };
    Ok((config, names))
}

fn cmd_validate(csv: &Path, config: Option<&Path>, deciders: Option<&str>) -> i32 {
    let (config, participants) = match column_names(config, deciders) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let text = match std::fs::read_to_string(csv) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", csv.display(), e);
            return 1;
        }
    };

    let check = check_csv(&text, &participants, &config.category_names());
    if check.passed() {
        println!("Validation PASSED ({} rows)", check.rows);
    } else {
        println!("Validation FAILED");
        for error in &check.errors {
            println!("  ERROR: {}", error);
        }
    }
    for warning in &check.warnings {
        println!("  WARNING: {}", warning);
    }
    if check.passed() && check.warnings.is_empty() {
        println!("  No issues found");
    }
    if check.passed() {
        0
    } else {
        1
    }
}

fn cmd_categories(config: Option<&Path>) -> i32 {
    let config = match TrackerConfig::load_or_default(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: Failed to load config: {}", e);
            return 1;
        }
    };
    println!("{:<24}  DESCRIPTION", "CATEGORY");
    println!("{}", "-".repeat(72));
    for category in &config.categories {
        println!("{:<24}  {}", category.name, category.description);
    }
    println!();
    println!("{:<24}  DESCRIPTION", "TYPE");
    println!("{}", "-".repeat(72));
    for decision_type in &config.types {
        println!("{:<24}  {}", decision_type.name, decision_type.description);
    }
    0
}

fn cmd_template(config: Option<&Path>, deciders: Option<&str>) -> i32 {
    match column_names(config, deciders) {
        Ok((_, participants)) => {
            println!("{}", csv_template(&participants));
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_init(path: &Path, deciders: Option<&str>, force: bool) -> i32 {
    if path.exists() && !force {
        eprintln!("Error: {} already exists (use --force to overwrite)", path.display());
        return 1;
    }
    let mut config = TrackerConfig::default();
    if let Some(list) = deciders {
        config.set_explicit_participants(&split_names(list));
    }
    let text = match config.template_yaml() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match std::fs::write(path, text) {
        Ok(()) => {
            println!("Created {}", path.display());
            0
        }
        Err(e) => {
            eprintln!("Error: cannot write {}: {}", path.display(), e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let code = match cli.command {
        Commands::Process {
            folder,
            pattern,
            from,
            to,
            workers,
            dry_run,
            force,
            extraction,
        } => cmd_process(folder, pattern, from, to, workers, dry_run, force, extraction),
        Commands::Extract { file, extraction } => cmd_extract(file, extraction),
        Commands::Manifest { folder } => cmd_manifest(&folder),
        Commands::Validate {
            csv,
            config,
            deciders,
        } => cmd_validate(&csv, config.as_deref(), deciders.as_deref()),
        Commands::Categories { config } => cmd_categories(config.as_deref()),
        Commands::Template { config, deciders } => cmd_template(config.as_deref(), deciders.as_deref()),
        Commands::Init {
            path,
            deciders,
            force,
        } => cmd_init(&path, deciders.as_deref(), force),
    };
    std::process::exit(code);
}
