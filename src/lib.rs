mod config;
mod date;
mod paths;
mod error;
mod retry;
mod util;

mod progress;
mod mem;
mod concurrency;

mod zstd_lines;
mod sentiment;
mod record;
mod tsv;
mod fetch;

mod planner;
mod pipeline;
mod aggregate;
mod integrity;

pub use crate::config::{MalformedPolicy, SentimentOptions, DEFAULT_COMMENTS_URL};
pub use crate::date::{iter_year_months, months_of_years, year_and_ordinal, YearMonth};
pub use crate::paths::{discover_all, ArchiveNaming, Discovered, OUTPUT_EXT};
pub use crate::pipeline::{RunReport, SentimentETL, UnitOutcome};
pub use crate::error::{DecodeError, MalformedRecordError, ProcessError, TransferError, UnitError};
pub use crate::retry::{retry_with_backoff, RetryPolicy};

// Archive fetch + streaming decode, usable on their own.
pub use crate::fetch::Fetcher;
pub use crate::zstd_lines::{decode, ArchiveLines, CompressedCounter};

// Scoring and the per-record contract.
pub use crate::sentiment::{Sentiment, SentimentModel, VaderModel};
pub use crate::record::{process_line, process_lines, score_line, ArchiveStats, CommentRecord, RecordSink, ScoredRecord};
pub use crate::tsv::{parse_tsv_row, write_tsv_row, TsvReader, TsvWriter};

pub use crate::planner::{plan, plan_from, select_units, WorkPlan, WorkUnit};
pub use crate::aggregate::{aggregate, discover_tsv_inputs, write_csv, AggregateRow, AggregateSummary, Aggregator, DailySentiment, CSV_HEADER};

// Expose multiprogress and progress helpers.
pub use crate::progress::{make_count_progress, make_progress_bar_labeled, set_global_multiprogress};

// Expose memory helpers for adaptive throttling from the binary.
pub use crate::mem::{available_memory_fraction, wait_for_memory_headroom};

// Expose integrity checker mode, and direct zstd validators.
pub use crate::integrity::IntegrityMode;
pub use crate::zstd_lines::{quick_validate_zst, validate_zst_full};

pub use crate::concurrency::run_bounded;

//export robust file ops from util so binaries can import from crate root.
pub use crate::util::{create_with_backoff, init_tracing_once, open_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
