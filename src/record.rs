//! Record processor: one archive line → one scored TSV row.

use crate::config::MalformedPolicy;
use crate::error::{DecodeError, MalformedRecordError, ProcessError};
use crate::sentiment::SentimentModel;
use serde::{Deserialize, Deserializer};
use std::io;

/// The fields of a comment this pipeline needs. Extra fields are ignored by serde,
/// missing or mistyped ones make the line malformed.
#[derive(Debug, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub subreddit: String,
    #[serde(deserialize_with = "de_timestamp")]
    pub created_utc: i64,
    pub body: String,
}

/// Older dumps store `created_utc` as a decimal string; accept both forms.
fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }
    match Raw::deserialize(d)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("created_utc is not an integer timestamp: {s:?}"))),
    }
}

/// One output row. Field order is the TSV column order.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub subreddit: String,
    pub created_utc: i64,
    pub polarity: f64,
    pub subjectivity: f64,
}

/// Destination of scored rows (a TSV file in production, a Vec in tests).
pub trait RecordSink {
    fn write_row(&mut self, row: &ScoredRecord) -> io::Result<()>;
}

impl RecordSink for Vec<ScoredRecord> {
    fn write_row(&mut self, row: &ScoredRecord) -> io::Result<()> {
        self.push(row.clone());
        Ok(())
    }
}

/// Parse `line` (the `line_no`-th of its archive) and score its body.
pub fn score_line(line: &str, line_no: u64, model: &dyn SentimentModel) -> Result<ScoredRecord, MalformedRecordError> {
    let rec: CommentRecord =
        serde_json::from_str(line).map_err(|source| MalformedRecordError::Json { line: line_no, source })?;
    let s = model.score(&rec.body);
    Ok(ScoredRecord {
        id: rec.id,
        subreddit: rec.subreddit,
        created_utc: rec.created_utc,
        polarity: s.polarity,
        subjectivity: s.subjectivity,
    })
}

/// Score one line and write its row to `sink`.
pub fn process_line(
    line: &str,
    line_no: u64,
    model: &dyn SentimentModel,
    sink: &mut dyn RecordSink,
) -> Result<(), ProcessError> {
    let row = score_line(line, line_no, model)?;
    sink.write_row(&row)?;
    Ok(())
}

/// Per-archive counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub lines: u64,
    pub rows: u64,
    pub malformed: u64,
    pub blank: u64,
}

const MALFORMED_WARN_LIMIT: u64 = 5;

/// Drain `lines` into `sink`, applying `policy` to malformed lines.
/// `on_line` runs after every line (progress hooks).
pub fn process_lines<I>(
    lines: I,
    model: &dyn SentimentModel,
    sink: &mut dyn RecordSink,
    policy: MalformedPolicy,
    mut on_line: impl FnMut(),
) -> Result<ArchiveStats, ProcessError>
where
    I: IntoIterator<Item = Result<String, DecodeError>>,
{
    let mut stats = ArchiveStats::default();
    for item in lines {
        stats.lines += 1;
        let res = match item {
            Ok(line) if line.trim().is_empty() => {
                stats.blank += 1;
                Ok(())
            }
            Ok(line) => process_line(&line, stats.lines, model, sink),
            Err(DecodeError::InvalidUtf8 { line, .. }) => Err(MalformedRecordError::NotUtf8 { line }.into()),
            Err(e) => return Err(e.into()),
        };
        match res {
            Ok(()) => {}
            Err(ProcessError::Malformed(e)) if policy == MalformedPolicy::Skip => {
                stats.malformed += 1;
                if stats.malformed <= MALFORMED_WARN_LIMIT {
                    tracing::warn!(error = %e, "dropping malformed record");
                }
            }
            Err(e) => return Err(e),
        }
        on_line();
    }
    stats.rows = stats.lines - stats.blank - stats.malformed;
    if stats.malformed > MALFORMED_WARN_LIMIT {
        tracing::warn!(dropped = stats.malformed, "malformed records dropped (only the first {} logged)", MALFORMED_WARN_LIMIT);
    }
    Ok(stats)
}
