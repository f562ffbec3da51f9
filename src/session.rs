// src/session.rs
//
// Capture session driver.
// Pulls chunks from a byte source, frames them into lines, decodes records and
// appends them to a sink until the target count, a transport failure, or a stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{SessionError, SettingsError, TransportError};
use crate::io::pacing::{wait_cancellable, PacingPolicy};
use crate::io::serial::framer::{Line, LineFramer, Lines, TextEncoding};
use crate::io::{now_us, ByteSource, ReadOutcome, StreamEndReason};
use crate::record::RecordFormat;
use crate::sink::RecordSink;

/// Records to collect when no target is given
pub const DEFAULT_TARGET_COUNT: usize = 100;

/// Shared stop request for a running session
pub type CancelFlag = Arc<AtomicBool>;

// ============================================================================
// Types and Configuration
// ============================================================================

/// Session configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Stop once the sink holds this many records
    pub target_count: usize,
    pub encoding: TextEncoding,
    pub format: RecordFormat,
    pub pacing: PacingPolicy,
    /// Append records with no fields (non-record lines included) to the sink
    pub forward_empty_records: bool,
    /// Decode the unterminated tail as a last line when the source ends
    pub decode_trailing_line: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            target_count: DEFAULT_TARGET_COUNT,
            encoding: TextEncoding::default(),
            format: RecordFormat::default(),
            pacing: PacingPolicy::default(),
            forward_empty_records: true,
            decode_trailing_line: false,
        }
    }
}

impl SessionConfig {
    pub fn new(target_count: usize) -> Self {
        SessionConfig {
            target_count,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.target_count == 0 {
            return Err(SettingsError::Invalid(
                "target record count must be positive".to_string(),
            ));
        }
        self.format.validate()
    }
}

/// Outcome of one session
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub reason: StreamEndReason,
    /// Records appended by this session
    pub records_appended: usize,
    /// Terminated lines seen, including ones that failed to decode
    pub lines_seen: u64,
    pub decode_errors: u64,
    /// Empty records withheld because `forward_empty_records` was off
    pub empty_records_skipped: u64,
    /// Transport failure message when the source ended the session
    pub transport_error: Option<String>,
    pub started_us: u64,
    pub ended_us: u64,
}

// ============================================================================
// Driver
// ============================================================================

/// Run one session to completion on the current thread.
///
/// Blocks only inside `source.read()` and pacing waits; both observe `cancel`.
/// The framer and sink stay valid whatever the end reason: every record is
/// appended whole, and lines not yet decoded remain in the framer's buffer.
pub fn run_session<S, K>(
    source: &mut S,
    framer: &mut LineFramer,
    sink: &mut K,
    config: &SessionConfig,
    cancel: &AtomicBool,
) -> SessionSummary
where
    S: ByteSource + ?Sized,
    K: RecordSink + ?Sized,
{
    let started_us = now_us();
    let initial_count = sink.count();
    let initial_lines = framer.lines_seen();
    let initial_errors = framer.decode_errors();
    let mut empty_skipped: u64 = 0;
    let mut transport_error: Option<String> = None;
    let target = config.target_count;

    tlog!(
        "[session] Starting on {} (target: {} records, encoding: {})",
        source.describe(),
        target,
        framer.encoding()
    );

    let reason = loop {
        if cancel.load(Ordering::Relaxed) {
            break StreamEndReason::Stopped;
        }
        if sink.count() >= target {
            break StreamEndReason::Complete;
        }

        // Complete lines left in a resumed framer go out before the next read
        if framer.buffer().has_complete_line() {
            let (_, reached_target) = pump(framer.feed(&[]), sink, config, &mut empty_skipped);
            if reached_target {
                break StreamEndReason::Complete;
            }
        }

        let chunk = match source.read() {
            Ok(ReadOutcome::Chunk(chunk)) => chunk,
            Ok(ReadOutcome::EndOfStream) => break StreamEndReason::Disconnected,
            Err(e) => {
                tlog!("[session] Transport failure on {}: {}", source.describe(), e);
                let reason = match e {
                    TransportError::Disconnected => StreamEndReason::Disconnected,
                    _ => StreamEndReason::Error,
                };
                transport_error = Some(e.to_string());
                break reason;
            }
        };

        let (completed, reached_target) = pump(framer.feed(&chunk), sink, config, &mut empty_skipped);
        if reached_target {
            break StreamEndReason::Complete;
        }

        if !wait_cancellable(config.pacing.delay_after(completed), cancel) {
            break StreamEndReason::Stopped;
        }
    };

    let source_ended = matches!(
        reason,
        StreamEndReason::Disconnected | StreamEndReason::Error
    );
    if source_ended && config.decode_trailing_line && sink.count() < target {
        if let Some(line) = framer.flush() {
            deliver(line, sink, config, &mut empty_skipped);
        }
    }

    let summary = SessionSummary {
        reason,
        records_appended: sink.count().saturating_sub(initial_count),
        lines_seen: framer.lines_seen() - initial_lines,
        decode_errors: framer.decode_errors() - initial_errors,
        empty_records_skipped: empty_skipped,
        transport_error,
        started_us,
        ended_us: now_us(),
    };

    tlog!(
        "[session] Ended ({}): {} records, {} lines, {} decode errors, {} bytes buffered",
        summary.reason,
        summary.records_appended,
        summary.lines_seen,
        summary.decode_errors,
        framer.buffer().len()
    );

    summary
}

/// Deliver lines until they run out or the sink reaches the target.
/// Returns the number of lines pulled and whether the target was reached.
fn pump<K: RecordSink + ?Sized>(
    lines: Lines<'_>,
    sink: &mut K,
    config: &SessionConfig,
    empty_skipped: &mut u64,
) -> (usize, bool) {
    let mut completed = 0usize;
    for line in lines {
        completed += 1;
        deliver(line, sink, config, empty_skipped);
        if sink.count() >= config.target_count {
            return (completed, true);
        }
    }
    (completed, false)
}

/// Decode one line and hand the record to the sink
fn deliver<K: RecordSink + ?Sized>(
    line: Line,
    sink: &mut K,
    config: &SessionConfig,
    empty_skipped: &mut u64,
) {
    let text = match line {
        Ok(text) => text,
        Err(e) => {
            tlog!("[session] Dropped line: {}", e);
            return;
        }
    };

    let record = config.format.decode(&text);
    if record.is_empty() && !config.forward_empty_records {
        *empty_skipped += 1;
        return;
    }
    sink.append(record);
}

// ============================================================================
// Background Session
// ============================================================================

/// Everything a finished session hands back
#[derive(Debug)]
pub struct SessionReport<K> {
    pub summary: SessionSummary,
    pub sink: K,
    /// Framer with whatever bytes were still buffered
    pub framer: LineFramer,
}

/// Session running on a blocking worker thread
pub struct SessionHandle<K> {
    cancel_flag: CancelFlag,
    task: tokio::task::JoinHandle<SessionReport<K>>,
}

impl<K: RecordSink + Send + 'static> SessionHandle<K> {
    /// Start a session with a fresh framer
    pub fn spawn<S>(source: S, sink: K, config: SessionConfig) -> Self
    where
        S: ByteSource + Send + 'static,
    {
        let framer = LineFramer::new(config.encoding);
        Self::spawn_with_framer(source, sink, framer, config)
    }

    /// Start a session that continues from an existing framer's buffer
    pub fn spawn_with_framer<S>(
        mut source: S,
        mut sink: K,
        mut framer: LineFramer,
        config: SessionConfig,
    ) -> Self
    where
        S: ByteSource + Send + 'static,
    {
        let cancel_flag: CancelFlag = Arc::new(AtomicBool::new(false));
        let flag = cancel_flag.clone();

        // Serial reads block, so the driver gets a dedicated thread
        let task = tokio::task::spawn_blocking(move || {
            let summary = run_session(&mut source, &mut framer, &mut sink, &config, &flag);
            SessionReport {
                summary,
                sink,
                framer,
            }
        });

        SessionHandle { cancel_flag, task }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel_flag.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request a stop and wait for the driver to return
    pub async fn stop(self) -> Result<SessionReport<K>, SessionError> {
        self.cancel_flag.store(true, Ordering::Relaxed);
        self.join().await
    }

    /// Wait for the session to end on its own
    pub async fn join(self) -> Result<SessionReport<K>, SessionError> {
        Ok(self.task.await?)
    }
}
