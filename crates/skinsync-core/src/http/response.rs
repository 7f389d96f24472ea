//! Request results: the finished `Response` and the in-flight `PendingRequest`.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::{HttpError, RequestProgress, RequestState};

/// Outcome of one request.
#[derive(Debug)]
pub struct Response {
    pub(crate) state: RequestState,
    pub(crate) status_code: Option<u32>,
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) dest: Option<PathBuf>,
    pub(crate) error: Option<HttpError>,
}

impl Response {
    pub(crate) fn failed(state: RequestState, dest: Option<PathBuf>, error: HttpError) -> Self {
        Self {
            state,
            status_code: None,
            body: None,
            dest,
            error: Some(error),
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Final HTTP status, if the server answered at all.
    pub fn status_code(&self) -> Option<u32> {
        self.status_code
    }

    pub fn error(&self) -> Option<&HttpError> {
        self.error.as_ref()
    }

    /// Destination file for file requests.
    pub fn dest(&self) -> Option<&Path> {
        self.dest.as_deref()
    }

    pub fn is_done(&self) -> bool {
        self.state == RequestState::Done
    }

    /// Raw body; only for in-memory requests that reached `Done`.
    pub fn result(&self) -> Option<&[u8]> {
        if self.state != RequestState::Done {
            return None;
        }
        self.body.as_deref()
    }

    /// Take ownership of the raw body (same conditions as `result`).
    pub fn into_result(self) -> Option<Vec<u8>> {
        if self.state != RequestState::Done {
            return None;
        }
        self.body
    }

    /// Parse the body as JSON into `T`.
    pub fn result_json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        let bytes = self.result().ok_or(HttpError::NoResult)?;
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn result_json_value(&self) -> Result<serde_json::Value, HttpError> {
        self.result_json()
    }
}

/// A request running on its own worker thread.
///
/// `T` is what the worker hands back: the `Response` itself, or whatever a
/// completion step derived from it on the worker.
#[derive(Debug)]
pub struct PendingRequest<T = Response> {
    pub(crate) progress: Arc<RequestProgress>,
    pub(crate) handle: JoinHandle<T>,
}

impl<T> PendingRequest<T> {
    pub fn progress(&self) -> &Arc<RequestProgress> {
        &self.progress
    }

    pub fn state(&self) -> RequestState {
        self.progress.state()
    }

    /// Cooperative abort; see `AbortToken`.
    pub fn abort(&self) {
        self.progress.abort();
    }

    /// True once the worker, including any completion step, has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker returns.
    pub fn wait(self) -> Result<T, HttpError> {
        self.handle
            .join()
            .map_err(|_| HttpError::Worker("request thread panicked".to_string()))
    }
}
