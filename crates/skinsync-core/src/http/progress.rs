//! Request state, progress counters and cooperative abort.
//!
//! A `RequestProgress` is shared between the worker running the transfer and
//! any number of observers (UI, catalog polling). All fields are atomics
//! updated with relaxed stores; readers only need atomicity, not ordering.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of a request. `Done`, `Error` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestState {
    Queued = 0,
    Running = 1,
    Done = 2,
    Error = 3,
    Aborted = 4,
}

impl RequestState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RequestState::Queued,
            1 => RequestState::Running,
            2 => RequestState::Done,
            3 => RequestState::Error,
            _ => RequestState::Aborted,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Done | RequestState::Error | RequestState::Aborted
        )
    }
}

/// Shared abort flag. Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort; the transfer stops at its next progress or write callback.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress of one request, safe to poll from any thread.
#[derive(Debug)]
pub struct RequestProgress {
    state: AtomicU8,
    current: AtomicU64,
    size: AtomicU64,
    progress: AtomicU8,
    abort: AbortToken,
}

impl Default for RequestProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestProgress {
    pub fn new() -> Self {
        Self::with_abort(AbortToken::new())
    }

    /// Progress tracker that shares an existing abort token.
    pub fn with_abort(abort: AbortToken) -> Self {
        Self {
            state: AtomicU8::new(RequestState::Queued as u8),
            current: AtomicU64::new(0),
            size: AtomicU64::new(0),
            progress: AtomicU8::new(0),
            abort,
        }
    }

    pub fn state(&self) -> RequestState {
        RequestState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub(crate) fn set_state(&self, state: RequestState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Bytes received so far.
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    /// Expected total bytes (0 while unknown).
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    /// Percent complete, 0..=100.
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn abort_token(&self) -> &AbortToken {
        &self.abort
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Record transfer counters. The percentage is clamped and never moves backwards.
    pub(crate) fn update(&self, current: u64, total: u64) {
        self.current.store(current, Ordering::Relaxed);
        self.size.store(total, Ordering::Relaxed);
        self.progress
            .fetch_max(percent(current, total), Ordering::Relaxed);
    }

    pub(crate) fn complete(&self) {
        self.progress.store(100, Ordering::Relaxed);
    }
}

/// `100 * current / total`, clamped to 0..=100; 0 when the total is unknown.
pub fn percent(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (current.min(total) as u128 * 100) / total as u128;
    pct as u8
}
