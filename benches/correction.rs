//! Criterion benchmarks for srtfix performance testing.
//!
//! These benchmarks measure the performance of the srtfix binary by invoking
//! it as a subprocess. This approach tests real-world performance including
//! process startup, decoding, file I/O, and the complete fixing pipeline.
//!
//! Inputs are staged in a temp directory because srtfix writes its output
//! next to the input file.

use criterion::{Criterion, criterion_group, criterion_main};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const BINARY: &str = "./target/release/srtfix";

/// Build an SRT body with `blocks` entries of Hebrew text with misplaced punctuation
fn generate_srt(blocks: usize) -> String {
    let mut srt = String::new();
    for i in 0..blocks {
        if i > 0 {
            srt.push('\n');
        }
        let secs = i * 3;
        let _ = writeln!(
            srt,
            "{}\n00:{:02}:{:02},000 --> 00:{:02}:{:02},500\n.יום טוב לכולם\n- ?מה שלומך -",
            i + 1,
            secs / 60 % 60,
            secs % 60,
            (secs + 2) / 60 % 60,
            (secs + 2) % 60
        );
    }
    srt
}

fn bench_file(c: &mut Criterion, name: &str, content: &[u8]) {
    if !Path::new(BINARY).exists() {
        eprintln!("Skipping {}: {} not found", name, BINARY);
        return;
    }

    let temp = TempDir::new().expect("Failed to create temp dir");
    let input = temp.path().join("bench.srt");
    fs::write(&input, content).expect("Failed to write bench input");

    c.bench_function(name, |b| {
        b.iter(|| {
            Command::new(BINARY)
                .arg(&input)
                .output()
                .expect("Failed to execute srtfix")
        })
    });
}

/// Benchmark the bundled sample fixture
fn bench_small_file(c: &mut Criterion) {
    let input_file = "tests/fixtures/sample.srt";

    let Ok(content) = fs::read(input_file) else {
        eprintln!("Skipping bench_small_file: {} not found", input_file);
        return;
    };

    bench_file(c, "small_file", &content);
}

/// Benchmark a 2000-block UTF-8 file
fn bench_large_file(c: &mut Criterion) {
    bench_file(c, "large_file", generate_srt(2000).as_bytes());
}

/// Benchmark the windows-1255 fallback path
fn bench_legacy_encoding(c: &mut Criterion) {
    let srt = generate_srt(2000);
    let (bytes, _, _) = encoding_rs::WINDOWS_1255.encode(&srt);
    bench_file(c, "legacy_encoding", &bytes);
}

criterion_group!(
    benches,
    bench_small_file,
    bench_large_file,
    bench_legacy_encoding
);
criterion_main!(benches);
