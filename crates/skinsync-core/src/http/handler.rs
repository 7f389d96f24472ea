//! Easy2 Handler for one request: streams the body into memory or a file,
//! feeds the shared progress counters and answers the abort check.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Destination, HttpError, RequestProgress};

/// Where response bytes accumulate.
#[derive(Debug)]
pub(crate) enum Sink {
    Memory(Vec<u8>),
    File {
        path: PathBuf,
        writer: BufWriter<File>,
    },
}

impl Sink {
    /// Prepare the sink before any network I/O: for files, create the parent
    /// folder and open (truncate) the destination.
    pub(crate) fn open(destination: &Destination) -> Result<Self, HttpError> {
        match destination {
            Destination::Memory => Ok(Sink::Memory(Vec::new())),
            Destination::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|source| HttpError::CreateDir {
                        path: path.clone(),
                        source,
                    })?;
                }
                let file = File::create(path).map_err(|source| HttpError::OpenFile {
                    path: path.clone(),
                    source,
                })?;
                Ok(Sink::File {
                    path: path.clone(),
                    writer: BufWriter::new(file),
                })
            }
        }
    }

    /// Flush and sync a file sink ("close"); returns the in-memory body otherwise.
    pub(crate) fn finish(self) -> Result<Option<Vec<u8>>, HttpError> {
        match self {
            Sink::Memory(buf) => Ok(Some(buf)),
            Sink::File { path, writer } => {
                let file = writer.into_inner().map_err(|e| HttpError::CloseFile {
                    path: path.clone(),
                    source: e.into_error(),
                })?;
                file.sync_all()
                    .map_err(|source| HttpError::CloseFile { path, source })?;
                Ok(None)
            }
        }
    }
}

/// Remove a partially written destination. Missing files are fine.
pub(crate) fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "cannot remove partial download: {}", e),
    }
}

/// Handler state for one transfer. Implements curl's Handler for Easy2.
pub(crate) struct RequestHandler {
    pub(super) sink: Option<Sink>,
    pub(super) progress: Arc<RequestProgress>,
    pub(super) max_response_size: Option<u64>,
    pub(super) received: u64,
    /// First failure seen inside a callback; curl only reports a generic write error.
    pub(super) failure: Option<HttpError>,
}

impl RequestHandler {
    pub(super) fn new(
        sink: Sink,
        progress: Arc<RequestProgress>,
        max_response_size: Option<u64>,
    ) -> Self {
        Self {
            sink: Some(sink),
            progress,
            max_response_size,
            received: 0,
            failure: None,
        }
    }

    /// Placeholder kept in pooled handles between requests.
    pub(super) fn idle() -> Self {
        Self {
            sink: None,
            progress: Arc::new(RequestProgress::new()),
            max_response_size: None,
            received: 0,
            failure: None,
        }
    }
}

impl curl::easy::Handler for RequestHandler {
    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        if data.is_empty() {
            return Ok(0);
        }
        if self.progress.is_aborted() {
            return Ok(0);
        }
        if let Some(limit) = self.max_response_size {
            if self.received + data.len() as u64 > limit {
                self.failure = Some(HttpError::TooLarge { limit });
                return Ok(0);
            }
        }
        match self.sink.as_mut() {
            Some(Sink::Memory(buf)) => buf.extend_from_slice(data),
            Some(Sink::File { path, writer }) => {
                if let Err(source) = writer.write_all(data) {
                    self.failure = Some(HttpError::WriteFile {
                        path: path.clone(),
                        source,
                    });
                    return Ok(0);
                }
            }
            None => return Ok(0),
        }
        self.received += data.len() as u64;
        Ok(data.len())
    }

    fn progress(&mut self, dltotal: f64, dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        self.progress.update(dlnow as u64, dltotal as u64);
        !self.progress.is_aborted()
    }
}
