pub mod date;
pub mod dedup;
pub mod delete;
pub mod error;
pub mod hasher;
pub mod jpeg;
pub mod media;
pub mod metadata;
pub mod options;
pub mod restore;
pub mod walk;

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub use dedup::{DedupReport, DuplicateGroup};
pub use delete::{Answer, DeleteMode, DeletionReport, Prompt};
pub use error::{Error, Result};
pub use options::{DedupOptions, RestoreOptions, ScanOptions};
pub use restore::{RestoreOutcome, RestoreReport};

/// Type alias for progress callback; may borrow from the caller's frame.
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Throttled progress reporter - emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        let start = Instant::now()
            .checked_sub(Duration::from_secs(1))
            .unwrap_or_else(Instant::now);
        Self {
            inner,
            last_emit: Mutex::new(start),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap_or_else(|e| e.into_inner());
            if last.elapsed() < Duration::from_millis(200) {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

fn display_relative<'p>(path: &'p Path, root: &Path) -> std::path::Display<'p> {
    path.strip_prefix(root).unwrap_or(path).display()
}

/// Restore capture dates for every media file under the configured root.
///
/// Fails only if the root is unusable; per-file problems land in the report.
pub fn restore_dates(options: &RestoreOptions) -> Result<RestoreReport> {
    log::info!("Listing media files in {}", options.scan.path.display());
    let walker = walk::MediaWalker::new(&options.scan)?;

    let mut report = RestoreReport::default();
    for (i, path) in walker.enumerate() {
        let outcome = restore::restore_file(&path, options.set_mtime);
        let shown = display_relative(&path, &options.scan.path);
        match &outcome {
            RestoreOutcome::Restored { date, .. } => log::info!("{} - {}: set date {}", i + 1, shown, date),
            RestoreOutcome::AlreadyDated => log::info!("{} - {}: Exif date already exists, skipping", i + 1, shown),
            RestoreOutcome::ParseMiss => log::warn!("{} - {}: no date in filename, skipping", i + 1, shown),
            RestoreOutcome::Failed { error } => log::warn!("{} - {}: {}", i + 1, shown, error),
        }
        report.entries.push(restore::RestoreEntry { path, outcome });
    }

    log::info!(
        "Finished: {} restored, {} already dated, {} without date, {} failed",
        report.restored(),
        report.already_dated(),
        report.parse_misses(),
        report.failed()
    );
    Ok(report)
}

/// Scan for duplicate groups and choose a survivor in each. Nothing is deleted.
pub fn find_duplicates(options: &DedupOptions, progress_callback: &ProgressCallback<'_>) -> Result<DedupReport> {
    options.validate()?;
    let walker = walk::MediaWalker::new(&options.scan)?;

    let tp = ThrottledProgress::new(progress_callback);
    let plan = dedup::HashingPlan {
        chunk_size: options.chunk_size,
        growth_factor: options.growth_factor,
    };
    let mut resolver = dedup::Resolver::new(plan, options.jobs, &tp)?;
    Ok(resolver.resolve(walker))
}

/// Delete the discards of `report` per the options' dry-run / force flags.
pub fn remove_duplicates(report: &DedupReport, options: &DedupOptions, prompt: &mut dyn Prompt) -> DeletionReport {
    let mode = DeleteMode {
        dry_run: options.dry_run,
        force: options.force,
    };
    delete::execute(&report.groups, mode, prompt)
}
