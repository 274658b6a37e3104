//! Tick Streaming
//!
//! Forward-only, bounded-memory readers over stored market events.
//!
//! Files are CSV (`timestamp,price,volume,side,event_type` with a header) or
//! JSON-lines, optionally zstd-compressed (`.zst` suffix) and decompressed on
//! the fly. A stream is never rewound: replaying a window means opening a
//! fresh handle through [`DataWindow::open`].

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::tick::Tick;
use crate::error::{Component, ErrorContext, ExecError, Result};

/// Where ticks come from
#[derive(Debug, Clone)]
pub enum TickSource {
    /// CSV or JSON-lines file, `.zst` compressed or plain
    File(PathBuf),
    /// Already materialized ticks (synthetic data, tests)
    Memory(Arc<[Tick]>),
}

impl TickSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        TickSource::File(path.into())
    }

    pub fn memory(ticks: Vec<Tick>) -> Self {
        TickSource::Memory(ticks.into())
    }

    pub fn label(&self) -> String {
        match self {
            TickSource::File(path) => path.display().to_string(),
            TickSource::Memory(ticks) => format!("memory[{}]", ticks.len()),
        }
    }
}

/// A contiguous time range of a tick source bound to one episode
#[derive(Debug, Clone)]
pub struct DataWindow {
    pub source: TickSource,
    /// Inclusive lower bound in nanoseconds
    pub start_ns: Option<u64>,
    /// Inclusive upper bound in nanoseconds
    pub end_ns: Option<u64>,
}

impl DataWindow {
    /// The whole source
    pub fn whole(source: TickSource) -> Self {
        Self {
            source,
            start_ns: None,
            end_ns: None,
        }
    }

    pub fn between(source: TickSource, start_ns: u64, end_ns: u64) -> Self {
        Self {
            source,
            start_ns: Some(start_ns),
            end_ns: Some(end_ns),
        }
    }

    /// Open a fresh stream over this window
    pub fn open(&self) -> Result<TickStream> {
        let reader = RecordReader::open(&self.source)?;
        Ok(TickStream::new(
            Records::Direct(reader),
            self.label(),
            self.start_ns,
            self.end_ns,
        ))
    }

    /// Open a stream whose reading and decompression runs on a background
    /// thread, at most `depth` records ahead of consumption
    pub fn open_prefetched(&self, depth: usize) -> Result<TickStream> {
        let mut reader = RecordReader::open(&self.source)?;
        let (tx, rx) = bounded(depth.max(1));
        let label = self.label();

        let worker_label = label.clone();
        thread::Builder::new()
            .name("tick-prefetch".to_string())
            .spawn(move || {
                while let Some(record) = reader.next_record() {
                    let fatal = matches!(record, Record::Fatal(_));
                    if tx.send(record).is_err() {
                        debug!(source = %worker_label, "Prefetch consumer dropped, stopping worker");
                        return;
                    }
                    if fatal {
                        return;
                    }
                }
            })
            .map_err(|e| {
                ExecError::io(
                    ErrorContext::new(Component::TickStream),
                    format!("failed to spawn prefetch worker for {label}"),
                    e,
                )
            })?;

        Ok(TickStream::new(
            Records::Prefetched(rx),
            label,
            self.start_ns,
            self.end_ns,
        ))
    }

    pub fn label(&self) -> String {
        match (self.start_ns, self.end_ns) {
            (None, None) => self.source.label(),
            (start, end) => format!(
                "{}[{}..{}]",
                self.source.label(),
                start.map(|s| s.to_string()).unwrap_or_default(),
                end.map(|e| e.to_string()).unwrap_or_default()
            ),
        }
    }
}

/// On-disk representation of a tick file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickFormat {
    Csv,
    JsonLines,
}

impl TickFormat {
    /// Infer format and compression from a path such as `day1.csv.zst`
    pub fn detect(path: &Path) -> (TickFormat, bool) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let compressed = name.ends_with(".zst");
        let base = name.trim_end_matches(".zst");
        let format = if base.ends_with(".jsonl") || base.ends_with(".json") {
            TickFormat::JsonLines
        } else {
            TickFormat::Csv
        };
        (format, compressed)
    }
}

/// One raw read result before validation
enum Record {
    Tick(Tick),
    Malformed(String),
    Fatal(std::io::Error),
}

type DynRead = Box<dyn Read + Send>;

enum RecordReader {
    Csv(csv::DeserializeRecordsIntoIter<DynRead, Tick>),
    JsonLines {
        reader: BufReader<DynRead>,
        line: Vec<u8>,
    },
    Memory { ticks: Arc<[Tick]>, pos: usize },
}

impl RecordReader {
    fn open(source: &TickSource) -> Result<Self> {
        match source {
            TickSource::Memory(ticks) => Ok(RecordReader::Memory {
                ticks: Arc::clone(ticks),
                pos: 0,
            }),
            TickSource::File(path) => {
                let ctx = ErrorContext::new(Component::TickStream);
                let file = File::open(path).map_err(|e| {
                    ExecError::io(ctx, format!("cannot open tick source {}", path.display()), e)
                })?;
                let (format, compressed) = TickFormat::detect(path);

                let raw: DynRead = if compressed {
                    let decoder = zstd::stream::read::Decoder::new(file).map_err(|e| {
                        ExecError::io(ctx, format!("cannot start zstd decoder for {}", path.display()), e)
                    })?;
                    Box::new(decoder)
                } else {
                    Box::new(file)
                };

                Ok(match format {
                    TickFormat::Csv => RecordReader::Csv(
                        csv::ReaderBuilder::new()
                            .has_headers(true)
                            .trim(csv::Trim::All)
                            .from_reader(raw)
                            .into_deserialize(),
                    ),
                    TickFormat::JsonLines => RecordReader::JsonLines {
                        reader: BufReader::new(raw),
                        line: Vec::new(),
                    },
                })
            }
        }
    }

    fn next_record(&mut self) -> Option<Record> {
        match self {
            RecordReader::Memory { ticks, pos } => {
                let tick = ticks.get(*pos).copied()?;
                *pos += 1;
                Some(Record::Tick(tick))
            }
            RecordReader::Csv(rows) => {
                let row = rows.next()?;
                Some(match row {
                    Ok(tick) => Record::Tick(tick),
                    Err(e) if e.is_io_error() => match e.into_kind() {
                        csv::ErrorKind::Io(io) => Record::Fatal(io),
                        other => Record::Malformed(format!("{other:?}")),
                    },
                    Err(e) => Record::Malformed(e.to_string()),
                })
            }
            RecordReader::JsonLines { reader, line } => loop {
                line.clear();
                match reader.read_until(b'\n', line) {
                    Ok(0) => return None,
                    Ok(_) => {}
                    Err(e) => return Some(Record::Fatal(e)),
                }
                let text = match std::str::from_utf8(line.as_slice()) {
                    Ok(text) => text,
                    Err(e) => return Some(Record::Malformed(format!("invalid UTF-8: {e}"))),
                };
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                return Some(match serde_json::from_str::<Tick>(trimmed) {
                    Ok(tick) => Record::Tick(tick),
                    Err(e) => Record::Malformed(e.to_string()),
                });
            },
        }
    }
}

enum Records {
    Direct(RecordReader),
    Prefetched(Receiver<Record>),
}

impl Records {
    fn next_record(&mut self) -> Option<Record> {
        match self {
            Records::Direct(reader) => reader.next_record(),
            // Disconnected channel means the worker reached end of input
            Records::Prefetched(rx) => rx.recv().ok(),
        }
    }
}

/// Lazy, finite, forward-only sequence of validated ticks
pub struct TickStream {
    records: Records,
    label: String,
    start_ns: Option<u64>,
    end_ns: Option<u64>,
    last_timestamp: Option<u64>,
    delivered: u64,
    skipped: u64,
    aborted: bool,
    finished: bool,
}

impl TickStream {
    /// Open the whole of a source
    pub fn open(source: &TickSource) -> Result<Self> {
        DataWindow::whole(source.clone()).open()
    }

    fn new(records: Records, label: String, start_ns: Option<u64>, end_ns: Option<u64>) -> Self {
        Self {
            records,
            label,
            start_ns,
            end_ns,
            last_timestamp: None,
            delivered: 0,
            skipped: 0,
            aborted: false,
            finished: false,
        }
    }

    /// Next valid tick, or `None` at end of stream
    pub fn next_tick(&mut self) -> Option<Tick> {
        if self.finished {
            return None;
        }

        loop {
            let record = match self.records.next_record() {
                Some(record) => record,
                None => {
                    self.finish();
                    return None;
                }
            };

            let tick = match record {
                Record::Tick(tick) => tick,
                Record::Malformed(reason) => {
                    self.skip(&reason);
                    continue;
                }
                Record::Fatal(e) => {
                    warn!(
                        source = %self.label,
                        delivered = self.delivered,
                        error = %e,
                        "Tick stream aborted on read error"
                    );
                    self.aborted = true;
                    self.finish();
                    return None;
                }
            };

            if !tick.is_well_formed() {
                self.skip("non-finite or negative price/volume");
                continue;
            }
            if self.last_timestamp.is_some_and(|last| tick.timestamp < last) {
                self.skip("timestamp out of order");
                continue;
            }
            if self.start_ns.is_some_and(|start| tick.timestamp < start) {
                self.last_timestamp = Some(tick.timestamp);
                continue;
            }
            if self.end_ns.is_some_and(|end| tick.timestamp > end) {
                self.finish();
                return None;
            }

            self.last_timestamp = Some(tick.timestamp);
            self.delivered += 1;
            return Some(tick);
        }
    }

    fn skip(&mut self, reason: &str) {
        self.skipped += 1;
        debug!(source = %self.label, skipped = self.skipped, reason, "Skipping malformed tick record");
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            debug!(
                source = %self.label,
                delivered = self.delivered,
                skipped = self.skipped,
                aborted = self.aborted,
                "Tick stream finished"
            );
        }
    }

    /// Number of malformed or out-of-order records dropped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// True when the stream ended on an I/O error rather than end of input
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Iterator for TickStream {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        self.next_tick()
    }
}
