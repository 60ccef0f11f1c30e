//! Scoped execution timing.
//!
//! A [`TimeRecorder`] is opened at the top of a request and emits one record per
//! [`section`](TimeRecorder::section) checkpoint plus a final record when it goes out
//! of scope. Records go to a [`RecordSink`]; sinks are fire-and-forget and nothing a
//! sink does can change the outcome of the request being timed.
//!
//! # Example
//! ```rust
//! use std::sync::Arc;
//! use ferry::recorder::{LogSink, TimeRecorder};
//!
//! let mut rc = TimeRecorder::start("CountTableRequest(table=t1)", Arc::new(LogSink));
//! rc.section("check validation");
//! // final record emitted here
//! drop(rc);
//! ```
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use log::debug;

/// Destination for timing records.
pub trait RecordSink: Send + Sync {
    fn record(&self, label: &str, elapsed: Duration);
}

/// Writes timing records to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl RecordSink for LogSink {
    fn record(&self, label: &str, elapsed: Duration) {
        debug!("{label} [{:.3} ms]", elapsed.as_secs_f64() * 1000.0);
    }
}

pub struct TimeRecorder {
    header: String,
    sink: Arc<dyn RecordSink>,
    start: Instant,
    last: Instant,
}

impl TimeRecorder {
    pub fn start(header: impl Into<String>, sink: Arc<dyn RecordSink>) -> Self {
        let now = Instant::now();
        Self {
            header: header.into(),
            sink,
            start: now,
            last: now,
        }
    }

    /// Emits the time elapsed since the previous checkpoint and resets it.
    pub fn section(&mut self, label: &str) {
        let now = Instant::now();
        self.sink
            .record(&format!("{}: {label}", self.header), now - self.last);
        self.last = now;
    }

    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Drop for TimeRecorder {
    fn drop(&mut self) {
        self.sink
            .record(&format!("{}: done", self.header), self.start.elapsed());
    }
}
