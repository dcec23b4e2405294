//! Bulk loading of payroll sources.
//!
//! A source is resolved from an ordered list of candidate paths, decoded with
//! an encoding fallback and fed line by line to the [`RecordParser`]. Small
//! files are read whole; files above the streaming threshold are read in
//! fixed-size chunks and delivered downstream in small batches so the full
//! result set never has to live in memory.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::LoaderConfig;
use crate::error::{NominaError, Result};
use crate::ingest::encoding::{TextEncoding, decode_with_fallback};
use crate::ingest::parser::{ParseStats, RecordParser};
use crate::model::PayrollRecord;

/// Downstream consumer of parsed records.
pub trait RecordSink {
    /// Accept one batch. An error abandons only this batch.
    fn accept_batch(&mut self, batch: Vec<PayrollRecord>) -> Result<()>;
}

impl RecordSink for Vec<PayrollRecord> {
    fn accept_batch(&mut self, batch: Vec<PayrollRecord>) -> Result<()> {
        self.extend(batch);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    Whole,
    Streaming,
}

/// Outcome of one load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub path: PathBuf,
    pub mode: LoadMode,
    /// Encoding every line of the source was decoded with.
    pub encoding: Option<TextEncoding>,
    pub bytes: u64,
    pub stats: ParseStats,
    pub batches_delivered: usize,
    pub batches_failed: usize,
    pub last_error: Option<String>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl LoadReport {
    fn new(path: &Path, mode: LoadMode, bytes: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            mode,
            encoding: None,
            bytes,
            stats: ParseStats::default(),
            batches_delivered: 0,
            batches_failed: 0,
            last_error: None,
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn records(&self) -> usize {
        self.stats.records
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(value.as_millis())
    }
}

#[derive(Debug, Clone)]
pub struct BulkLoader {
    candidates: Vec<PathBuf>,
    parser: RecordParser,
    streaming_threshold: u64,
    chunk_size: usize,
    batch_size: usize,
    encodings: Vec<TextEncoding>,
}

impl BulkLoader {
    #[must_use]
    pub fn new(candidates: Vec<PathBuf>, config: &LoaderConfig) -> Self {
        Self {
            candidates,
            parser: RecordParser::new(config.min_fields),
            streaming_threshold: config.streaming_threshold_bytes,
            chunk_size: config.chunk_size.max(1),
            batch_size: config.batch_size.max(1),
            encodings: TextEncoding::FALLBACK_ORDER.to_vec(),
        }
    }

    /// Loader for a single known path with default settings.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self::new(vec![path.into()], &LoaderConfig::default())
    }

    #[must_use]
    pub const fn with_streaming_threshold(mut self, bytes: u64) -> Self {
        self.streaming_threshold = bytes;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, records: usize) -> Self {
        self.batch_size = records.max(1);
        self
    }

    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that exists and is a readable file.
    pub fn resolve_source(&self) -> Result<PathBuf> {
        self.candidates
            .iter()
            .find(|path| path.is_file() && File::open(path).is_ok())
            .cloned()
            .ok_or_else(|| {
                let tried = self
                    .candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                NominaError::SourceUnavailable(if tried.is_empty() {
                    "no candidate paths configured".to_string()
                } else {
                    tried
                })
            })
    }

    /// Load every record into memory.
    pub fn load_all(&self) -> Result<(Vec<PayrollRecord>, LoadReport)> {
        let mut records = Vec::new();
        let report = self.load_into(&mut records)?;
        Ok((records, report))
    }

    /// Load the resolved source into `sink`, choosing the strategy by size.
    pub fn load_into(&self, sink: &mut dyn RecordSink) -> Result<LoadReport> {
        let path = self.resolve_source()?;
        let bytes = std::fs::metadata(&path)?.len();
        let start = Instant::now();

        let mut report = if bytes > self.streaming_threshold {
            tracing::info!(path = %path.display(), bytes, "large source, streaming");
            self.load_streaming(&path, bytes, sink)?
        } else {
            self.load_whole(&path, bytes, sink)?
        };

        report.elapsed = start.elapsed();
        tracing::info!(
            path = %path.display(),
            records = report.stats.records,
            rejected = report.stats.rejected,
            coerced = report.stats.coerced_numbers,
            failed_batches = report.batches_failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "payroll source loaded"
        );
        Ok(report)
    }

    fn load_whole(&self, path: &Path, bytes: u64, sink: &mut dyn RecordSink) -> Result<LoadReport> {
        let raw = std::fs::read(path)?;
        let (text, encoding) = decode_with_fallback(&raw, &self.encodings).ok_or_else(|| {
            tracing::error!(path = %path.display(), "source matches no configured encoding");
            NominaError::DecodeFailed {
                path: path.to_path_buf(),
            }
        })?;
        if encoding != TextEncoding::Utf8 {
            tracing::warn!(%encoding, "source is not UTF-8, decoded with fallback");
        }

        let mut report = LoadReport::new(path, LoadMode::Whole, bytes);
        report.encoding = Some(encoding);

        let records: Vec<PayrollRecord> = non_blank_lines(&text)
            .skip(1)
            .filter_map(|line| self.parser.parse_line_with_stats(line, &mut report.stats))
            .collect();

        if !records.is_empty() {
            deliver(sink, records, &mut report);
        }
        Ok(report)
    }

    /// Two passes over the file in `chunk_size` reads.
    ///
    /// The first pass settles the encoding the same way [`Self::load_whole`]
    /// would (the first one under which every line decodes); the second
    /// parses and delivers batches. The outcome never depends on which mode
    /// the file size selected.
    fn load_streaming(
        &self,
        path: &Path,
        bytes: u64,
        sink: &mut dyn RecordSink,
    ) -> Result<LoadReport> {
        let encoding = self.detect_encoding(path)?;
        if encoding != TextEncoding::Utf8 {
            tracing::warn!(%encoding, "source is not UTF-8, decoded with fallback");
        }

        let mut report = LoadReport::new(path, LoadMode::Streaming, bytes);
        report.encoding = Some(encoding);
        let mut batch: Vec<PayrollRecord> = Vec::with_capacity(self.batch_size);
        let mut header_seen = false;

        self.for_each_line(path, |raw| {
            let text = encoding.decode(raw).ok_or_else(|| NominaError::DecodeFailed {
                path: path.to_path_buf(),
            })?;
            let line = text.trim_end_matches('\r');
            if line.trim().is_empty() {
                return Ok(());
            }
            if !header_seen {
                header_seen = true;
                return Ok(());
            }
            if let Some(record) = self.parser.parse_line_with_stats(line, &mut report.stats) {
                batch.push(record);
            }
            if batch.len() >= self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                deliver(sink, full, &mut report);
                tracing::debug!(records = report.stats.records, "streamed batch delivered");
            }
            Ok(())
        })?;

        if !batch.is_empty() {
            deliver(sink, batch, &mut report);
        }
        Ok(report)
    }

    /// First configured encoding that accepts every line of `path`.
    fn detect_encoding(&self, path: &Path) -> Result<TextEncoding> {
        let mut viable = self.encodings.clone();
        let failed = || NominaError::DecodeFailed {
            path: path.to_path_buf(),
        };

        self.for_each_line(path, |raw| {
            viable.retain(|encoding| encoding.accepts(raw));
            if viable.is_empty() {
                tracing::error!(path = %path.display(), "source matches no configured encoding");
                return Err(failed());
            }
            Ok(())
        })?;
        viable.first().copied().ok_or_else(failed)
    }

    /// Feed every `\n`-terminated line (and an unterminated tail) to `visit`.
    fn for_each_line(
        &self,
        path: &Path,
        mut visit: impl FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        let mut file = File::open(path)?;
        let mut chunk = vec![0u8; self.chunk_size];
        let mut carry: Vec<u8> = Vec::new();

        loop {
            let read = file.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            carry.extend_from_slice(&chunk[..read]);

            // Everything up to the last newline is complete; the tail waits
            // for the next chunk.
            let Some(last_newline) = carry.iter().rposition(|b| *b == b'\n') else {
                continue;
            };
            let tail = carry.split_off(last_newline + 1);
            let complete = std::mem::replace(&mut carry, tail);
            for line in complete[..last_newline].split(|b| *b == b'\n') {
                visit(line)?;
            }
        }

        if !carry.is_empty() {
            visit(&carry)?;
        }
        Ok(())
    }
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
}

fn deliver(sink: &mut dyn RecordSink, batch: Vec<PayrollRecord>, report: &mut LoadReport) {
    let size = batch.len();
    match sink.accept_batch(batch) {
        Ok(()) => report.batches_delivered += 1,
        Err(err) => {
            tracing::warn!(error = %err, records = size, "sink rejected batch");
            report.batches_failed += 1;
            report.last_error = Some(err.to_string());
        }
    }
}
