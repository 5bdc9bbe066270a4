//! Lazy line-by-line decoding of a zstd-compressed JSONL archive.
//!
//! `ArchiveLines` is a pull iterator: each `next()` decodes just enough of the stream to
//! produce one line, so the decompressed payload never sits in memory as a whole.
//! A corrupt or truncated stream yields one `DecodeError::Corrupt` and then ends.

use crate::error::DecodeError;
use crate::util::open_with_backoff;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

/// A `Read` wrapper that counts compressed bytes read.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}
impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

type ZstdReader = Decoder<'static, BufReader<CountingReader<File>>>;

pub struct ArchiveLines {
    path: PathBuf,
    reader: BufReader<ZstdReader>,
    buf: Vec<u8>,
    line_no: u64,
    compressed_read: Arc<AtomicU64>,
    done: bool,
}

impl ArchiveLines {
    /// Open `path` with a history window of up to `2^window_log_max` bytes
    /// (31 → 2 GiB, needed by the large monthly dumps).
    pub fn open(path: &Path, window_log_max: u32, read_buf_bytes: usize) -> Result<Self, DecodeError> {
        let open_err = |source| DecodeError::Open { path: path.to_path_buf(), source };
        let file = open_with_backoff(path, 16, 50).map_err(open_err)?;
        let counter = Arc::new(AtomicU64::new(0));
        let counting = CountingReader { inner: file, counter: counter.clone() };
        let mut decoder = Decoder::new(counting).map_err(open_err)?;
        decoder.window_log_max(window_log_max).map_err(open_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::with_capacity(read_buf_bytes.max(8 * 1024), decoder),
            buf: Vec::with_capacity(16 * 1024),
            line_no: 0,
            compressed_read: counter,
            done: false,
        })
    }

    /// Shared handle on the count of compressed bytes consumed so far. Stays valid after
    /// the iterator itself is moved into a consumer.
    pub fn compressed_counter(&self) -> CompressedCounter {
        CompressedCounter(self.compressed_read.clone())
    }
}

/// Compressed bytes read from an archive, for byte progress bars.
#[derive(Clone, Debug)]
pub struct CompressedCounter(Arc<AtomicU64>);

impl CompressedCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Iterator for ArchiveLines {
    type Item = Result<String, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                self.line_no += 1;
                if self.buf.ends_with(b"\n") {
                    self.buf.pop();
                    if self.buf.ends_with(b"\r") {
                        self.buf.pop();
                    }
                }
                let bytes = std::mem::take(&mut self.buf);
                Some(String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
                    path: self.path.clone(),
                    line: self.line_no,
                }))
            }
            Err(source) => {
                self.done = true;
                Some(Err(DecodeError::Corrupt { path: self.path.clone(), line: self.line_no, source }))
            }
        }
    }
}

/// Open `path` and return its lines lazily.
pub fn decode(path: &Path, window_log_max: u32, read_buf_bytes: usize) -> Result<ArchiveLines, DecodeError> {
    ArchiveLines::open(path, window_log_max, read_buf_bytes)
}

// ----------------------------- Integrity checks ----------------------------------

fn open_decoder(path: &Path, window_log_max: u32) -> Result<Decoder<'static, BufReader<File>>, DecodeError> {
    let open_err = |source| DecodeError::Open { path: path.to_path_buf(), source };
    let file = open_with_backoff(path, 16, 50).map_err(open_err)?;
    let mut decoder = Decoder::new(file).map_err(open_err)?;
    decoder.window_log_max(window_log_max).map_err(open_err)?;
    Ok(decoder)
}

/// QUICK check: decode up to `max_decompressed_bytes` and stop.
pub fn quick_validate_zst(path: &Path, window_log_max: u32, max_decompressed_bytes: u64) -> Result<(), DecodeError> {
    let mut limited = open_decoder(path, window_log_max)?.take(max_decompressed_bytes);
    io::copy(&mut limited, &mut io::sink())
        .map(|_| ())
        .map_err(|source| DecodeError::Corrupt { path: path.to_path_buf(), line: 0, source })
}

/// FULL check: decode the entire stream to EOF (validates frame checksums).
pub fn validate_zst_full(path: &Path, window_log_max: u32) -> Result<(), DecodeError> {
    let mut decoder = open_decoder(path, window_log_max)?;
    io::copy(&mut decoder, &mut io::sink())
        .map(|_| ())
        .map_err(|source| DecodeError::Corrupt { path: path.to_path_buf(), line: 0, source })
}
