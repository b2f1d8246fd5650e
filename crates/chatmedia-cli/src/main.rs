use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use chatmedia_core::{
    Answer, DedupOptions, DedupReport, DeletionReport, DuplicateGroup, Prompt, RestoreOptions, RestoreReport,
    ScanOptions,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

#[derive(Parser)]
#[command(name = "chatmedia", version, about = "Restore dates and remove duplicates in exported chat media")]
struct Cli {
    /// More log output (debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ScanArgs {
    /// Path to the media folder
    path: Option<PathBuf>,

    /// Recursively process media
    #[arg(short, long)]
    recursive: bool,

    /// Load options from a JSON file; flags given here take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Restore Exif / file dates from media filenames
    RestoreDates {
        #[command(flatten)]
        scan: ScanArgs,

        /// Also set the file modified date of images
        #[arg(short = 'm', long = "mod")]
        set_mtime: bool,
    },

    /// Find duplicated media, keeping the earliest-dated or shortest name
    Dedup {
        #[command(flatten)]
        scan: ScanArgs,

        /// Initial hashing window in bytes. Smaller is faster, but many files
        /// with identical leading bytes cause more rehashing
        #[arg(short, long)]
        chunk_size: Option<u64>,

        /// Window multiplier for each rehash round
        #[arg(long)]
        growth_factor: Option<u64>,

        /// Delete duplicates without prompting
        #[arg(short, long)]
        force: bool,

        /// Report what would be deleted without deleting
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Hashing threads
        #[arg(short, long)]
        jobs: Option<usize>,
    },
}

fn init_logger(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {} {}: {}",
                buf.timestamp_seconds(),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn scan_options(base: Option<ScanOptions>, args: &ScanArgs) -> anyhow::Result<ScanOptions> {
    let mut scan = match (base, &args.path) {
        (Some(mut scan), Some(path)) => {
            scan.path = path.clone();
            scan
        }
        (Some(scan), None) => scan,
        (None, Some(path)) => ScanOptions::new(path),
        (None, None) => anyhow::bail!("no media path given (pass PATH or --config)"),
    };
    scan.recursive |= args.recursive;
    Ok(scan)
}

/// Per-group y/N/a/q question on stderr, answer from stdin.
struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&mut self, group: &DuplicateGroup) -> Answer {
        eprintln!("Keep: {}", group.survivor.display());
        for discard in &group.discards {
            eprintln!("  delete: {}", discard.display());
        }
        eprint!("Delete {} duplicate(s)? [y/N/a/q]: ", group.discards.len());
        io::stderr().flush().ok();

        let mut reply = String::new();
        match io::stdin().lock().read_line(&mut reply) {
            Ok(_) => Answer::parse(&reply),
            Err(_) => Answer::Quit,
        }
    }
}

fn print_restore(report: &RestoreReport, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    eprintln!(
        "Done! {} restored, {} already dated, {} without date, {} failed",
        report.restored(),
        report.already_dated(),
        report.parse_misses(),
        report.failed()
    );
    Ok(())
}

fn print_dedup(report: &DedupReport, deletions: &DeletionReport, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        let out = json!({ "duplicates": report, "deletions": deletions });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    for group in &report.groups {
        println!("{}", group.survivor.display());
        for discard in &group.discards {
            println!("  = {}", discard.display());
        }
    }
    eprintln!(
        "Done! {} files scanned, {} duplicate groups, {} duplicates, {} deleted, {} failed, {} bytes freed",
        report.files_scanned,
        report.groups.len(),
        report.discard_count(),
        deletions.deleted(),
        deletions.failed(),
        deletions.bytes_freed
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose, cli.quiet);
    let t_total = std::time::Instant::now();

    match cli.command {
        Command::RestoreDates { scan, set_mtime } => {
            let base = scan
                .config
                .as_deref()
                .map(RestoreOptions::from_file)
                .transpose()
                .context("loading --config")?;
            let mut options = match base {
                Some(options) => RestoreOptions {
                    scan: scan_options(Some(options.scan), &scan)?,
                    set_mtime: options.set_mtime,
                },
                None => RestoreOptions::new(scan_options(None, &scan)?),
            };
            options.set_mtime |= set_mtime;

            let report = chatmedia_core::restore_dates(&options)?;
            print_restore(&report, scan.json)?;
        }
        Command::Dedup {
            scan,
            chunk_size,
            growth_factor,
            force,
            dry_run,
            jobs,
        } => {
            let base = scan
                .config
                .as_deref()
                .map(DedupOptions::from_file)
                .transpose()
                .context("loading --config")?;
            let mut options = match base {
                Some(mut options) => {
                    options.scan = scan_options(Some(options.scan), &scan)?;
                    options
                }
                None => DedupOptions::new(scan_options(None, &scan)?),
            };
            options.chunk_size = chunk_size.unwrap_or(options.chunk_size);
            options.growth_factor = growth_factor.unwrap_or(options.growth_factor);
            options.jobs = jobs.or(options.jobs);
            options.force |= force;
            options.dry_run |= dry_run;

            let pb = ProgressBar::new(0);
            pb.set_style(ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {msg}")?);
            if cli.quiet {
                pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
            }
            let report = chatmedia_core::find_duplicates(&options, &|_stage, current, total, message| {
                pb.set_length(total);
                pb.set_position(current + 1);
                pb.set_message(message.to_string());
            })?;
            pb.finish_and_clear();

            let deletions = chatmedia_core::remove_duplicates(&report, &options, &mut StdinPrompt);
            print_dedup(&report, &deletions, scan.json)?;
        }
    }

    log::debug!("Total: {:.2}s", t_total.elapsed().as_secs_f64());
    Ok(())
}
