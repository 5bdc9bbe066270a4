#[path = "common/mod.rs"]
mod common;

use common::*;
use reddit_sentiment::{decode, quick_validate_zst, validate_zst_full, DecodeError};
use std::fs;

/// Lines come back in archive order, newline-stripped, blank lines included.
#[test]
fn decodes_lines_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("RC_2006-01.zst");
    let lines = vec!["{\"a\":1}".to_string(), String::new(), "{\"a\":2}\r".to_string(), "{\"a\":3}".to_string()];
    write_zst_lines(&path, &lines);

    let got: Vec<String> = decode(&path, 31, 64 * 1024).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(got, vec!["{\"a\":1}", "", "{\"a\":2}", "{\"a\":3}"]);
}

/// Not a zstd stream at all: the first pull fails and the sequence ends.
#[test]
fn garbage_yields_one_fatal_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("RC_2006-02.zst");
    fs::write(&path, b"{\"id\":\"plain text, not compressed\"}\n").unwrap();

    let items: Vec<_> = match decode(&path, 31, 8 * 1024) {
        Ok(lines) => lines.collect(),
        Err(e) => vec![Err(e)],
    };
    assert_eq!(items.len(), 1);
    let err = items.into_iter().next().unwrap().unwrap_err();
    assert!(err.is_fatal());
}

/// A stream cut short still hands out the lines before the damage, then errors.
#[test]
fn truncated_stream_errors_after_good_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("RC_2006-03.zst");
    let lines: Vec<String> = (0..2000).map(|i| comment(&format!("c{i}"), "programming", JAN_1_2006 + i, "text")).collect();
    write_zst_lines(&path, &lines);
    let full = fs::read(&path).unwrap();
    fs::write(&path, &full[..full.len() - 16]).unwrap();

    let items: Vec<_> = decode(&path, 31, 8 * 1024).unwrap().collect();
    let (last, rest) = items.split_last().unwrap();
    assert!(rest.iter().all(|r| r.is_ok()));
    assert!(matches!(last, Err(DecodeError::Corrupt { .. })));

    assert!(validate_zst_full(&path, 31).is_err());
}

#[test]
fn missing_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = decode(&dir.path().join("RC_2099-01.zst"), 31, 8 * 1024).err().unwrap();
    assert!(matches!(err, DecodeError::Open { .. }));
}

#[test]
fn validators_accept_a_good_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("RC_2006-01.zst");
    write_zst_lines(&path, &sample_month());
    quick_validate_zst(&path, 31, 16).unwrap();
    validate_zst_full(&path, 31).unwrap();
}

/// The compressed-byte counter outlives the iterator and ends at the file size.
#[test]
fn compressed_counter_tracks_the_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("RC_2006-04.zst");
    let lines: Vec<String> = (0..3000).map(|i| comment(&format!("c{i}"), "programming", JAN_1_2006 + i, "text")).collect();
    write_zst_lines(&path, &lines);

    let archive = decode(&path, 31, 8 * 1024).unwrap();
    let counter = archive.compressed_counter();
    assert_eq!(counter.get(), 0);
    assert_eq!(archive.map(|r| r.unwrap()).count(), 3000);
    assert_eq!(counter.get(), fs::metadata(&path).unwrap().len());
}
