#![allow(dead_code)]

use reddit_sentiment::{Sentiment, SentimentModel};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

/// 2006-01-01T00:00:00Z
pub const JAN_1_2006: i64 = 1_136_073_600;

/// Write a compressed `.zst` file containing the provided JSONL lines.
/// This mirrors the corpus's RC_ monthly files but with tiny content.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// The same, but returned as bytes (served by the test HTTP server).
pub fn zst_bytes(lines: &[String]) -> Vec<u8> {
    let mut enc = zstd::stream::write::Encoder::new(Vec::new(), 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap()
}

/// Read a text file line-by-line into strings (skips empty lines).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

/// One comment line as found in the dumps (with a few of the fields we ignore).
pub fn comment(id: &str, subreddit: &str, created_utc: i64, body: &str) -> String {
    json!({
        "controversiality": 0, "body": body, "subreddit_id": "t5_x",
        "link_id": "t3_s1", "stickied": false, "subreddit": subreddit, "score": 1,
        "ups": 1, "author": "alice", "id": id, "edited": false, "parent_id": "t3_s1",
        "gilded": 0, "distinguished": null, "created_utc": created_utc
    })
    .to_string()
}

/// A month of three comments in two subreddits, all on 2006-01-01 or 2006-01-02.
pub fn sample_month() -> Vec<String> {
    vec![
        comment("c1", "programming", JAN_1_2006 + 60, "good"),
        comment("c2", "programming", JAN_1_2006 + 120, "bad"),
        comment("c3", "reddit.com", JAN_1_2006 + 86_400, "neutral words"),
    ]
}

/// Deterministic stand-in for the lexicon model: "good" → +0.5, "bad" → −0.5,
/// subjectivity 0.5 for either, 0 otherwise.
pub struct KeywordModel;

impl SentimentModel for KeywordModel {
    fn score(&self, text: &str) -> Sentiment {
        let good = text.contains("good");
        let bad = text.contains("bad");
        let polarity = match (good, bad) {
            (true, false) => 0.5,
            (false, true) => -0.5,
            _ => 0.0,
        };
        let subjectivity = if good || bad { 0.5 } else { 0.0 };
        Sentiment { polarity, subjectivity }
    }
}

/// A minimal HTTP/1.1 server with scripted responses per path.
/// Unscripted (or exhausted) paths get 404. Every request path is recorded.
pub struct TestServer {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn start(routes: Vec<(&str, Vec<(u16, Vec<u8>)>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let mut script: HashMap<String, VecDeque<(u16, Vec<u8>)>> =
            routes.into_iter().map(|(p, r)| (p.to_string(), r.into_iter().collect())).collect();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&hits);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let path = match read_request_path(&mut stream) {
                    Some(p) => p,
                    None => continue,
                };
                seen.lock().unwrap().push(path.clone());
                let (status, body) = script
                    .get_mut(&path)
                    .and_then(|q| q.pop_front())
                    .unwrap_or((404, b"not found".to_vec()));
                let head = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                    reason(status),
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&body);
                let _ = stream.flush();
            }
        });

        Self { base_url, hits }
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|p| p.as_str() == path).count()
    }
}

fn read_request_path<S: Read>(stream: &mut S) -> Option<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(1) => buf.push(byte[0]),
            _ => return None,
        }
    }
    let head = String::from_utf8_lossy(&buf);
    head.lines().next()?.split_whitespace().nth(1).map(str::to_string)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
