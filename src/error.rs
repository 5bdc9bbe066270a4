//! Error taxonomy for one WorkUnit's fetch → decode → process pipeline.
//!
//! - `TransferError`: network/HTTP failure; retried by the fetcher, then fatal to the unit.
//! - `DecodeError`: corrupt or truncated archive; fatal to the unit, never retried.
//! - `MalformedRecordError`: one unparsable line; dropped or fatal depending on `MalformedPolicy`.

use crate::date::YearMonth;
use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("writing {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt or truncated zstd stream in {path} after line {line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: u64,
        #[source]
        source: io::Error,
    },

    /// One line is not UTF-8; the stream itself is intact and decoding may continue.
    #[error("line {line} of {path} is not valid UTF-8")]
    InvalidUtf8 { path: PathBuf, line: u64 },
}

impl DecodeError {
    /// Whether the sequence ends after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DecodeError::InvalidUtf8 { .. })
    }
}

#[derive(Debug, Error)]
pub enum MalformedRecordError {
    #[error("line {line}: {source}")]
    Json {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: not valid UTF-8")]
    NotUtf8 { line: u64 },
}

/// Failure while turning an archive's lines into output rows.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),

    #[error("writing output row failed: {0}")]
    Sink(#[from] io::Error),
}

/// Why a single WorkUnit failed. Siblings keep running.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("{unit}: download failed: {source}")]
    Transfer {
        unit: YearMonth,
        #[source]
        source: TransferError,
    },

    #[error("{unit}: {source}")]
    Decode {
        unit: YearMonth,
        #[source]
        source: DecodeError,
    },

    #[error("{unit}: malformed record, aborting unit: {source}")]
    Malformed {
        unit: YearMonth,
        #[source]
        source: MalformedRecordError,
    },

    #[error("{unit}: worker panicked: {message}")]
    Panicked { unit: YearMonth, message: String },

    #[error("{unit}: {source:#}")]
    Other {
        unit: YearMonth,
        #[source]
        source: anyhow::Error,
    },
}

impl UnitError {
    pub fn unit(&self) -> YearMonth {
        match self {
            UnitError::Transfer { unit, .. }
            | UnitError::Decode { unit, .. }
            | UnitError::Malformed { unit, .. }
            | UnitError::Panicked { unit, .. }
            | UnitError::Other { unit, .. } => *unit,
        }
    }
}
