use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::MultiProgress;
use reddit_sentiment::{
    init_tracing_once, set_global_multiprogress, IntegrityMode, MalformedPolicy, SentimentETL,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "reddit-sentiment", about = "Sentiment over the monthly Reddit comment archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, decode and score every month of the given years that has no output yet
    Annotate {
        #[arg(default_value_t = 2005)]
        start_year: u16,
        #[arg(default_value_t = 2006)]
        end_year: u16,
        /// Process several months at once
        #[arg(long, overrides_with = "no_multithreading")]
        multithreading: bool,
        #[arg(long, overrides_with = "multithreading")]
        no_multithreading: bool,
        /// Worker count; implies --multithreading (default with it: available parallelism)
        #[arg(long)]
        jobs: Option<usize>,
        /// Directory holding the archives (and outputs, unless --out-dir is given)
        #[arg(long, default_value = "dataset")]
        dir: PathBuf,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        base_url: Option<String>,
        /// Fail a month on its first malformed line instead of skipping it
        #[arg(long, default_value_t = false)]
        strict: bool,
        /// Keep archives after their output is written (default: true)
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        keep_archives: bool,
        #[arg(long, default_value_t = false)]
        no_progress: bool,
    },
    /// Average polarity/subjectivity per (year, day, subreddit) over all outputs
    Distill {
        #[arg(default_value = "dataset")]
        dataset_path: PathBuf,
        /// Directory receiving part-00000.csv
        #[arg(default_value = "dataset/result")]
        result_path: PathBuf,
        #[arg(long, default_value_t = false)]
        no_progress: bool,
    },
    /// Check downloaded archives for corruption
    Verify {
        #[arg(long, default_value = "dataset")]
        dir: PathBuf,
        /// Decode whole streams instead of a sample
        #[arg(long, default_value_t = false)]
        full: bool,
        #[arg(long, default_value_t = 8 * 1024 * 1024)]
        sample_bytes: u64,
        #[arg(long, default_value_t = 1)]
        jobs: usize,
    },
}

/// An explicit `--jobs` always wins; `--multithreading` alone uses every core.
fn worker_count(multithreading: bool, jobs: Option<usize>) -> usize {
    match jobs {
        Some(n) => n.max(1),
        None if multithreading => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
        None => 1,
    }
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();
    set_global_multiprogress(Arc::new(MultiProgress::new()));

    match cli.command {
        Commands::Annotate {
            start_year,
            end_year,
            multithreading,
            no_multithreading: _,
            jobs,
            dir,
            out_dir,
            base_url,
            strict,
            keep_archives,
            no_progress,
        } => {
            if end_year < start_year {
                bail!("end year {end_year} is before start year {start_year}");
            }
            let workers = worker_count(multithreading, jobs);
            let mut etl = SentimentETL::new()
                .base_dir(&dir)
                .years(start_year, end_year)
                .file_concurrency(workers)
                .keep_archives(keep_archives)
                .progress(!no_progress)
                .progress_label("Archives");
            if let Some(out) = out_dir {
                etl = etl.output_dir(out);
            }
            if let Some(url) = base_url {
                etl = etl.base_url(url);
            }
            if strict {
                etl = etl.malformed_policy(MalformedPolicy::Abort);
            }

            let report = etl.run()?;
            println!("Omitting {} archives", report.omitted);
            println!("{} months annotated, {} failed", report.completed.len(), report.failed.len());
            for e in &report.failed {
                eprintln!("{}: {e:#}", e.unit());
            }
            if !report.is_success() {
                bail!("{} month(s) failed", report.failed.len());
            }
        }
        Commands::Distill { dataset_path, result_path, no_progress } => {
            let out = result_path.join("part-00000.csv");
            let summary = SentimentETL::new().progress(!no_progress).aggregate_dir(&dataset_path, &out)?;
            println!(
                "{} groups from {} rows in {} files -> {}",
                summary.groups,
                summary.rows_in,
                summary.files,
                out.display()
            );
        }
        Commands::Verify { dir, full, sample_bytes, jobs } => {
            let mode = if full { IntegrityMode::Full } else { IntegrityMode::Quick { sample_bytes } };
            let bad = SentimentETL::new().base_dir(&dir).file_concurrency(jobs).check_archives(mode)?;
            for (path, msg) in &bad {
                println!("{}\t{msg}", path.display());
            }
            if !bad.is_empty() {
                bail!("{} archive(s) failed the integrity check", bad.len());
            }
        }
    }
    Ok(())
}
