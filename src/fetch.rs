//! Archive fetcher: stream an HTTP body to disk without holding it in memory.
//!
//! Every attempt writes `<dest>.part` from scratch and renames it to `<dest>` only after
//! the whole body arrived, so an interrupted download is never mistaken for an archive.
//! Skipping destinations that already exist is the caller's job.

use crate::error::TransferError;
use crate::progress::make_progress_bar_labeled;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::util::{create_with_backoff, remove_with_backoff, replace_file_atomic_backoff, with_suffix};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
    progress: bool,
}

impl Fetcher {
    pub fn new(retry: RetryPolicy, connect_timeout: Duration, progress: bool) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>) // monthly dumps take far longer than any fixed budget
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self { client, retry, progress })
    }

    /// Download `url` to `dest`. Any transfer failure, including a non-success status,
    /// is retried up to the policy's attempt limit.
    /// Returns the number of bytes written.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransferError> {
        let tmp = with_suffix(dest, ".part");
        let res = retry_with_backoff(&self.retry, url, |_: &TransferError| true, |attempt| {
            debug!(url, attempt, "fetch attempt");
            self.fetch_once(url, &tmp)
        });
        let bytes = match res {
            Ok(n) => n,
            Err(e) => {
                let _ = remove_with_backoff(&tmp, 4, 50);
                return Err(e);
            }
        };
        replace_file_atomic_backoff(&tmp, dest).map_err(|e| TransferError::Io {
            path: dest.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, format!("{e:#}")),
        })?;
        info!(url, path = %dest.display(), bytes, "downloaded");
        Ok(bytes)
    }

    fn fetch_once(&self, url: &str, tmp: &Path) -> Result<u64, TransferError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|source| TransferError::Request { url: url.to_string(), source })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransferError::Status { url: url.to_string(), status });
        }

        let io_err = |source| TransferError::Io { path: tmp.to_path_buf(), source };
        // Truncates whatever a previous attempt left behind.
        let file = create_with_backoff(tmp, 16, 50).map_err(io_err)?;
        let mut out = BufWriter::with_capacity(1 << 20, file);

        let copied = if self.progress {
            let label = tmp.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let pb = make_progress_bar_labeled(resp.content_length().unwrap_or(0), Some(&label));
            let n = io::copy(&mut pb.wrap_read(resp), &mut out);
            pb.finish_and_clear();
            n
        } else {
            let mut resp = resp;
            io::copy(&mut resp, &mut out)
        }
        .map_err(io_err)?;

        out.flush().map_err(io_err)?;
        out.into_inner().map_err(|e| io_err(e.into_error()))?.sync_all().map_err(io_err)?;
        Ok(copied)
    }
}
