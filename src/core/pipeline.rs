use crate::config::Config;
use crate::core::decision::{Decision, DecisionError, Outcome, Reviewer, decide};
use crate::core::disposal::{DisposalAction, DisposalMode, Disposer};
use crate::core::duplicate::{DuplicateDetector, Grouping};
use crate::core::fingerprint::{DecodeError, Fingerprint, Fingerprinter};
use crate::core::image::{ImageRecord, format_size};
use crate::core::run_log::{LogEvent, RunLog};
use crate::core::scanner::{DiscoveredFile, Scanner};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub fingerprinted: usize,
    pub decode_failures: usize,
    pub groups: usize,
    pub grouped_images: usize,
    pub removed: usize,
    pub already_gone: usize,
    pub failed: usize,
    pub planned: usize,
    pub aborted: bool,
}

/// Result of the read-only half of a run: discovery, fingerprinting and grouping.
#[derive(Debug)]
pub struct ScanReport {
    pub discovered: usize,
    pub grouping: Grouping,
    pub decode_failures: Vec<DecodeError>,
}

pub struct Culler<'a> {
    config: &'a Config,
    fingerprinter: &'a dyn Fingerprinter,
    show_progress: bool,
}

impl<'a> Culler<'a> {
    pub fn new(config: &'a Config, fingerprinter: &'a dyn Fingerprinter) -> Self {
        Self {
            config,
            fingerprinter,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn scanner(&self) -> Scanner {
        let mut scanner = Scanner::new(&self.config.extensions).exclude(&self.config.log_file);
        if let Some(trash) = self.config.trash_folder() {
            scanner = scanner.exclude(trash);
        }
        scanner
    }

    /// Discover, fingerprint and group images without touching any file.
    pub fn scan(&self) -> Result<ScanReport> {
        let spinner = self.spinner("Scanning for images…")?;
        let files = self.scanner().scan(&self.config.root);
        spinner.finish_and_clear();
        let discovered = files.len();
        log::info!("Found {} candidate files in {}", discovered, self.config.root.display());

        let hashed = benchmark("fingerprinting", || self.fingerprint_all(files))?;

        let mut records = Vec::with_capacity(hashed.len());
        let mut decode_failures = Vec::new();
        for (file, result) in hashed {
            match result {
                Ok(fingerprint) => {
                    records.push(ImageRecord::new(file.path, fingerprint, file.size_bytes))
                }
                Err(e) => {
                    log::warn!("{}", e);
                    decode_failures.push(e);
                }
            }
        }

        let detector = DuplicateDetector::new(self.config.threshold);
        let grouping = benchmark("grouping", || detector.group(records));

        Ok(ScanReport {
            discovered,
            grouping,
            decode_failures,
        })
    }

    fn fingerprint_all(
        &self,
        files: Vec<DiscoveredFile>,
    ) -> Result<Vec<(DiscoveredFile, Result<Fingerprint, DecodeError>)>> {
        let bar = self.bar(files.len() as u64)?;
        let hash = |file: DiscoveredFile| {
            bar.set_message(file.path.display().to_string());
            let result = self.fingerprinter.fingerprint(&file.path);
            bar.inc(1);
            (file, result)
        };

        // Output stays in discovery order either way.
        let results: Vec<_> = if self.config.jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
                .context("Failed to build hashing thread pool")?;
            pool.install(|| files.into_par_iter().map(hash).collect())
        } else {
            files.into_iter().map(hash).collect()
        };

        bar.finish_and_clear();
        Ok(results)
    }

    /// Full run: scan, then decide and dispose group by group.
    pub fn cull(
        &self,
        log: &mut RunLog,
        mut reviewer: Option<&mut dyn Reviewer>,
    ) -> Result<RunSummary> {
        log.record(LogEvent::RunStarted {
            root: self.config.root.clone(),
            threshold: self.config.threshold,
            mode: self.config.describe_review(),
            disposal: self.config.describe_disposal(),
            dry_run: self.config.dry_run,
        })?;

        let report = self.scan()?;
        for failure in &report.decode_failures {
            log.record(LogEvent::DecodeFailed {
                path: failure.path().to_path_buf(),
                error: failure.to_string(),
            })?;
        }

        let mut summary = RunSummary {
            discovered: report.discovered,
            fingerprinted: report.discovered - report.decode_failures.len(),
            decode_failures: report.decode_failures.len(),
            groups: report.grouping.groups.len(),
            grouped_images: report.grouping.grouped_count(),
            ..RunSummary::default()
        };

        let disposer = Disposer::new(self.config.disposal.clone());
        for (i, group) in report.grouping.groups.iter().enumerate() {
            let index = i + 1;
            log.record(LogEvent::GroupFound {
                group: index,
                members: group.members.iter().map(|m| m.path.clone()).collect(),
            })?;
            println!("\n✨ Group {} ({} images):", index, group.len());

            match decide(group, self.config.review, reviewer.as_deref_mut()) {
                Ok(Outcome::Remove(decision)) => {
                    self.apply(index, &decision, &disposer, log, &mut summary)?
                }
                Ok(Outcome::KeepAll) => {
                    println!("   🤝 Keeping all {} images", group.len());
                    log.record(LogEvent::GroupKept { group: index })?;
                }
                Ok(Outcome::Skip) => {
                    println!("   ⏭  Skipped");
                    log.record(LogEvent::GroupSkipped {
                        group: index,
                        reason: "skipped by reviewer".to_string(),
                    })?;
                }
                Ok(Outcome::Abort) => {
                    self.abort(index, "aborted by reviewer".to_string(), log, &mut summary)?;
                    break;
                }
                Err(DecisionError::Reviewer(e)) => {
                    log::error!("Reviewer failed: {}", e);
                    self.abort(index, format!("reviewer failed: {}", e), log, &mut summary)?;
                    break;
                }
                Err(e) => {
                    log::warn!("Group {}: {}", index, e);
                    println!("   ⚠️  {}; group left untouched", e);
                    log.record(LogEvent::GroupSkipped {
                        group: index,
                        reason: e.to_string(),
                    })?;
                }
            }
        }

        log.record(LogEvent::RunFinished(summary.clone()))?;
        Ok(summary)
    }

    fn apply(
        &self,
        index: usize,
        decision: &Decision,
        disposer: &Disposer,
        log: &mut RunLog,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for kept in &decision.keep {
            println!("   🏆 Keeping → {} ({})", kept.path.display(), format_size(kept.size_bytes));
        }

        for record in &decision.remove {
            if self.config.dry_run {
                println!(
                    "   📦 [dry-run] {} {}",
                    match disposer.mode() {
                        DisposalMode::Permanent => "DELETE",
                        DisposalMode::Trash(_) => "MOVE",
                    },
                    record.path.display()
                );
                log.record(LogEvent::RemovalPlanned {
                    group: index,
                    path: record.path.clone(),
                    kept: decision.keep.iter().map(|k| k.path.clone()).collect(),
                })?;
                summary.planned += 1;
                continue;
            }

            let disposal = disposer.dispose(record);
            match &disposal.action {
                DisposalAction::Trashed { destination, .. } => {
                    println!("   📦 Moved {} → {}", record.path.display(), destination.display());
                    summary.removed += 1;
                }
                DisposalAction::Deleted => {
                    println!("   🗑️  Deleted {}", record.path.display());
                    summary.removed += 1;
                }
                DisposalAction::AlreadyGone => {
                    println!("   👻 Already gone: {}", record.path.display());
                    summary.already_gone += 1;
                }
                DisposalAction::Failed { error } => {
                    eprintln!("   ⚠️  {}", error);
                    summary.failed += 1;
                }
            }
            log.record(LogEvent::Disposal {
                group: index,
                record: disposal,
            })?;
        }
        Ok(())
    }

    fn abort(
        &self,
        index: usize,
        reason: String,
        log: &mut RunLog,
        summary: &mut RunSummary,
    ) -> Result<()> {
        println!("\n🛑 Stopping at group {}; remaining files untouched.", index);
        summary.aborted = true;
        log.record(LogEvent::RunAborted { reason })
    }

    fn spinner(&self, message: &'static str) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        Ok(spinner)
    }

    fn bar(&self, len: u64) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let bar = ProgressBar::new(len);
        bar.set_style(
            ProgressStyle::with_template(
                "Hashing [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {wide_msg}",
            )?,
        );
        Ok(bar)
    }
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::debug!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
