use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use simcull::config::{Config, DEFAULT_LOG_NAME, Settings};
use simcull::core::decision::{ReviewMode, Reviewer};
use simcull::core::fingerprint::{HashKind, ImageHasher};
use simcull::core::image::format_size;
use simcull::core::run_log::RunLog;
use simcull::history::{self, RestoreResult, Selection};
use simcull::review::TerminalReviewer;
use simcull::{Culler, RunSummary};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "simcull",
    version,
    about = "Find visually similar images and cull the redundant copies"
)]
struct Cli {
    /// JSON config file (default: <config dir>/simcull/config.json if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors; no progress bars
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find and list groups of similar images without changing anything
    Scan {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Keep one image per similar group and trash or delete the rest
    Cull {
        #[command(flatten)]
        run: RunArgs,
        /// Review every group yourself
        #[arg(long)]
        interactive: bool,
        /// Automatic mode: keep the largest file of each group (default)
        #[arg(long)]
        keep_larger: bool,
        /// Automatic mode: keep the smallest file of each group
        #[arg(long)]
        keep_smaller: bool,
        /// Move removed files here instead of deleting them
        #[arg(long, value_name = "DIR")]
        trash_folder: Option<PathBuf>,
        /// Only show what would be removed
        #[arg(long)]
        dry_run: bool,
        /// Run log location (default: `<dir>/simcull-log.jsonl`)
        #[arg(long, value_name = "FILE")]
        log_file: Option<PathBuf>,
    },

    /// Work with trashed files recorded in a run log
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory to scan
    #[arg(value_name = "DIR")]
    path: PathBuf,
    /// Maximum fingerprint distance (in bits) for two images to count as similar
    #[arg(short, long)]
    threshold: Option<u32>,
    /// Fingerprint algorithm
    #[arg(long, value_enum)]
    hash_kind: Option<HashKind>,
    /// Threads used for fingerprinting
    #[arg(short, long)]
    jobs: Option<usize>,
}

impl RunArgs {
    fn settings(&self) -> Settings {
        Settings {
            threshold: self.threshold,
            hash_kind: self.hash_kind,
            jobs: self.jobs,
            ..Settings::default()
        }
    }
}

#[derive(Args, Debug)]
struct LogLocation {
    /// Directory that was culled (its default run log is used)
    #[arg(value_name = "DIR", required_unless_present = "log_file")]
    path: Option<PathBuf>,
    /// Run log to read
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl LogLocation {
    fn resolve(&self) -> PathBuf {
        match (&self.log_file, &self.path) {
            (Some(file), _) => file.clone(),
            (None, Some(dir)) => dir.join(DEFAULT_LOG_NAME),
            (None, None) => PathBuf::from(DEFAULT_LOG_NAME),
        }
    }
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List trashed files
    List {
        #[command(flatten)]
        log: LogLocation,
    },

    /// Move trashed files back to their original location
    Restore {
        #[command(flatten)]
        log: LogLocation,
        /// Restore a specific record index
        #[arg(long, conflicts_with = "all")]
        record: Option<usize>,
        /// Restore every record not yet restored
        #[arg(long, conflicts_with = "record")]
        all: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Scan { run } => {
            let settings = Settings::load(cli.config.as_deref())?.merge(run.settings());
            let config = Config::resolve_for_scan(&run.path, settings)?;
            scan(&config, cli.quiet)
        }

        Commands::Cull {
            run,
            interactive,
            keep_larger,
            keep_smaller,
            trash_folder,
            dry_run,
            log_file,
        } => {
            let flags = Settings {
                interactive: interactive.then_some(true),
                auto_keep_rule: Settings::keep_rule_from_flags(keep_larger, keep_smaller)?,
                trash_folder,
                dry_run: dry_run.then_some(true),
                log_file,
                ..run.settings()
            };
            let settings = Settings::load(cli.config.as_deref())?.merge(flags);
            let config = Config::resolve(&run.path, settings)?;
            cull(&config, cli.quiet)
        }

        Commands::History { command } => match command {
            HistoryCmd::List { log } => list_history(&log.resolve()),
            HistoryCmd::Restore { log, record, all } => {
                let selection = match (record, all) {
                    (Some(index), _) => Selection::Record(index),
                    (None, true) => Selection::All,
                    (None, false) => Selection::Latest,
                };
                restore_history(&log.resolve(), selection)
            }
        },
    }
}

fn scan(config: &Config, quiet: bool) -> Result<()> {
    println!("▶ Scanning for similar images in: {}", config.root.display());
    let hasher = ImageHasher::new(config.hash_kind);
    let report = Culler::new(config, &hasher).with_progress(!quiet).scan()?;

    if !report.decode_failures.is_empty() {
        println!("⚠️  {} file(s) could not be read as images", report.decode_failures.len());
    }

    let groups = &report.grouping.groups;
    if groups.is_empty() {
        println!("No similar images found among {} images.", report.discovered);
        return Ok(());
    }

    println!("Found {} group(s) of similar images:", groups.len());
    for (i, group) in groups.iter().enumerate() {
        println!(" Group {}:", i + 1);
        let Some(first) = group.first() else { continue };
        for member in &group.members {
            println!(
                "   ▶ {} ({}, distance {})",
                member.path.display(),
                format_size(member.size_bytes),
                first.distance(member)
            );
        }
    }
    Ok(())
}

fn cull(config: &Config, quiet: bool) -> Result<()> {
    println!("▶ Culling similar images in: {}", config.root.display());
    println!("   mode: {}, {}", config.describe_review(), config.describe_disposal());
    if config.dry_run {
        println!("   dry-run: no files will be changed");
    }

    let hasher = ImageHasher::new(config.hash_kind);
    let mut log = RunLog::open(&config.log_file)?;
    let mut reviewer = matches!(config.review, ReviewMode::Interactive).then(TerminalReviewer::new);

    let summary = Culler::new(config, &hasher)
        .with_progress(!quiet)
        .cull(&mut log, reviewer.as_mut().map(|r| r as &mut dyn Reviewer))?;

    print_summary(&summary, config.dry_run);
    println!("\n✅ Run log: {}", log.path().display());
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!(
        "\nTotal similar images found: {} in {} group(s)",
        summary.grouped_images, summary.groups
    );
    println!(
        "   {} discovered, {} fingerprinted, {} unreadable",
        summary.discovered, summary.fingerprinted, summary.decode_failures
    );
    if dry_run {
        println!("   {} file(s) would be removed", summary.planned);
    } else {
        println!(
            "   {} removed, {} already gone, {} failed",
            summary.removed, summary.already_gone, summary.failed
        );
    }
    if summary.aborted {
        println!("   ⚠️  Run aborted; remaining groups were not processed");
    }
}

fn list_history(log_path: &Path) -> Result<()> {
    let files = history::list(log_path)?;
    if files.is_empty() {
        println!("No trashed files recorded in {}", log_path.display());
        return Ok(());
    }

    println!("🗂️  Trash history:");
    for file in files {
        println!(
            "[{}] {}\n     original: {}\n     trash: {}\n     restored: {}\n",
            file.index,
            file.timestamp,
            file.original.display(),
            file.destination.display(),
            if file.restored { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn restore_history(log_path: &Path, selection: Selection) -> Result<()> {
    let results = history::restore(log_path, selection)
        .with_context(|| format!("Restore from {} failed", log_path.display()))?;

    let mut failed = 0;
    for result in &results {
        match result {
            RestoreResult::Restored { original, from } => {
                println!("🔄 Restored {} → {}", from.display(), original.display())
            }
            RestoreResult::Failed { original, error } => {
                failed += 1;
                eprintln!("⚠️  {}: {}", original.display(), error);
            }
        }
    }
    println!(
        "🧹 Restored {} of {} file(s)",
        results.len() - failed,
        results.len()
    );
    Ok(())
}
