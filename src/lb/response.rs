use std::fmt::{self, Display};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;
use tracing::debug;

use super::pool::SharedState;

/// Handle binding a selected host to the outcome of one request
///
/// Mark the handle once the request finishes. Only the first mark counts;
/// later calls are ignored, so racing or retried marks are harmless. For
/// adaptive pools the time between selection and a successful mark is fed
/// back as a latency sample.
pub struct HostResponse {
    host: String,
    idx: usize,
    state: SharedState,
    started: Option<Instant>,
    marked: AtomicBool,
}

impl HostResponse {
    pub(crate) fn new(host: String, idx: usize, state: SharedState, started: Option<Instant>) -> Self {
        Self {
            host,
            idx,
            state,
            started,
            marked: AtomicBool::new(false),
        }
    }

    /// Host chosen for this request
    pub fn host(&self) -> &str {
        &self.host
    }

    /// When timing started, if the pool measures latency
    pub fn started_at(&self) -> Option<Instant> {
        self.started
    }

    /// Whether an outcome has already been reported
    pub fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }

    /// Report the request outcome; `Ok` marks the host alive, `Err` dead
    pub fn mark<T, E: Display>(&self, outcome: &Result<T, E>) {
        match outcome {
            Ok(_) => self.finish(true),
            Err(e) => self.mark_failed(e),
        }
    }

    /// Report a successful request
    pub fn mark_success(&self) {
        self.finish(true);
    }

    /// Report a failed request
    pub fn mark_failed(&self, reason: impl Display) {
        if !self.is_marked() {
            debug!(host = %self.host, error = %reason, "request failed");
        }
        self.finish(false);
    }

    fn finish(&self, success: bool) {
        if self.marked.swap(true, Ordering::AcqRel) {
            debug!(host = %self.host, "response already marked");
            return;
        }

        // Failed requests carry no useful latency signal
        let elapsed = if success {
            self.started.map(|started| started.elapsed())
        } else {
            None
        };
        self.state.lock().record_outcome(self.idx, success, elapsed);
    }
}

impl fmt::Debug for HostResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostResponse")
            .field("host", &self.host)
            .field("started", &self.started)
            .field("marked", &self.is_marked())
            .finish()
    }
}
