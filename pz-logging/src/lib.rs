//! pz-logging: append-only NDJSON search events.
//!
//! Search progress and the final move land as one JSON object per line,
//! tagged by event kind, for run post-mortems. Readers should be lenient:
//! a crashed run may leave a torn final line.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use pz_mcts::{BestMoveSink, InfoSink};
use serde::Serialize;
use thiserror::Error;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema identifiers stamped on every event, so a line stays decodable
/// after the encoder or the policy head changes shape.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchemaStampV1 {
    pub feature_schema_id: u32,
    pub policy_size: u32,
}

impl SchemaStampV1 {
    pub fn current() -> Self {
        Self {
            feature_schema_id: pz_features::FEATURE_SCHEMA_ID,
            policy_size: pz_core::POLICY_SIZE as u32,
        }
    }
}

/// Everything the search log can carry. The variant name becomes the
/// line's `event` field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SearchEventV1 {
    /// One progress emission of a running search.
    SearchInfo {
        ts_ms: u64,
        schema: SchemaStampV1,
        depth: u16,
        seldepth: u16,
        time_ms: u64,
        nodes: i64,
        hashfull: u16,
        nps: i64,
        score_cp: i64,
        pv: Vec<String>,
        comment: String,
    },
    /// The final move announcement. Empty fields mean the root had no
    /// legal moves.
    BestMove {
        ts_ms: u64,
        schema: SchemaStampV1,
        best: Option<String>,
        ponder: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum NdjsonError {
    #[error("log io error: {0}")]
    Io(#[from] io::Error),
    #[error("log serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Append-only NDJSON writer over any byte sink.
///
/// Each [`log`](Self::log) call appends exactly one JSON object followed by
/// a newline. An optional byte threshold bounds how much buffered output a
/// crash can lose.
pub struct NdjsonWriter<W: Write> {
    sink: W,
    flush_threshold: usize,
    unflushed_bytes: usize,
}

impl NdjsonWriter<BufWriter<File>> {
    /// Append to a log file, creating it on first use.
    pub fn append_to_path(path: impl AsRef<Path>) -> Result<Self, NdjsonError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> NdjsonWriter<W> {
    /// Wrap a sink. Nothing is flushed until [`flush`](Self::flush).
    pub fn new(sink: W) -> Self {
        Self::with_flush_threshold(sink, 0)
    }

    /// Flush whenever at least `threshold` bytes accumulate since the last
    /// flush; `0` disables the threshold.
    pub fn with_flush_threshold(sink: W, threshold: usize) -> Self {
        Self {
            sink,
            flush_threshold: threshold,
            unflushed_bytes: 0,
        }
    }

    /// Append one event as one line.
    pub fn log(&mut self, event: &SearchEventV1) -> Result<(), NdjsonError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.sink.write_all(&line)?;
        self.unflushed_bytes += line.len();
        if self.flush_threshold > 0 && self.unflushed_bytes >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), NdjsonError> {
        self.sink.flush()?;
        self.unflushed_bytes = 0;
        Ok(())
    }

    /// Unwrap the underlying sink. Flush first; buffered bytes are not.
    pub fn into_sink(self) -> W {
        self.sink
    }
}

/// An info sink that appends one `search_info` event per emission.
///
/// Log failures are swallowed: losing an event must never stop a search.
pub fn info_sink<W>(writer: Arc<Mutex<NdjsonWriter<W>>>) -> InfoSink
where
    W: Write + Send + 'static,
{
    Box::new(move |info| {
        let event = SearchEventV1::SearchInfo {
            ts_ms: now_ms(),
            schema: SchemaStampV1::current(),
            depth: info.depth,
            seldepth: info.seldepth,
            time_ms: info.time_ms,
            nodes: info.nodes,
            hashfull: info.hashfull,
            nps: info.nps,
            score_cp: info.score_cp,
            pv: info.pv.iter().map(|m| m.to_string()).collect(),
            comment: info.comment.clone(),
        };
        if let Ok(mut w) = writer.lock() {
            let _ = w.log(&event);
        }
    })
}

/// A best-move sink that appends one `best_move` event and flushes.
pub fn best_move_sink<W>(writer: Arc<Mutex<NdjsonWriter<W>>>) -> BestMoveSink
where
    W: Write + Send + 'static,
{
    Box::new(move |pair| {
        let event = SearchEventV1::BestMove {
            ts_ms: now_ms(),
            schema: SchemaStampV1::current(),
            best: pair.best.map(|m| m.to_string()),
            ponder: pair.ponder.map(|m| m.to_string()),
        };
        if let Ok(mut w) = writer.lock() {
            let _ = w.log(&event);
            let _ = w.flush();
        }
    })
}
