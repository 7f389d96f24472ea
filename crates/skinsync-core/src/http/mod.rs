//! Asynchronous-by-thread HTTP requests on top of libcurl.
//!
//! A request is configured with `HttpRequest`, executed by an `HttpClient`
//! either on the calling thread (`run`) or on a dedicated worker
//! (`spawn` / `spawn_with`), and observed through a shared `RequestProgress`.
//! The client keeps a pool of easy handles; libcurl keeps live connections,
//! the DNS cache and TLS session IDs on a handle across `reset`, so reusing
//! handles gives connection reuse between requests. The pool lock is held
//! only to check a handle out or back in, never during a transfer.

mod error;
mod handler;
mod progress;
mod request;
mod response;

pub use error::HttpError;
pub use progress::{percent, AbortToken, RequestProgress, RequestState};
pub use request::{Destination, HttpLog, HttpRequest, IpResolve, Method, Timeout};
pub use response::{PendingRequest, Response};

use curl::easy::{Easy2, List};
use handler::{remove_partial, RequestHandler, Sink};
use std::sync::{Arc, Mutex};

/// Redirects followed before giving up.
const MAX_REDIRECTS: u32 = 4;
/// Idle handles kept for reuse.
const MAX_POOLED_HANDLES: usize = 8;
/// libcurl before 7.68 crashes when reusing connections from shared handles.
const MIN_SAFE_REUSE_VERSION: u32 = 0x07_44_00;

/// Client-wide settings.
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    pub user_agent: String,
    /// libcurl verbose output, and start/done/failure logging for every request.
    pub debug: bool,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            debug: false,
        }
    }
}

/// `skinsync/<version> (<os>; <arch>)`
pub fn default_user_agent() -> String {
    format!(
        "skinsync/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Owner of the shared easy-handle pool. Share it as `Arc<HttpClient>`.
pub struct HttpClient {
    options: HttpClientOptions,
    forbid_reuse: bool,
    handles: Mutex<Vec<Easy2<RequestHandler>>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("options", &self.options)
            .field("forbid_reuse", &self.forbid_reuse)
            .finish()
    }
}

impl HttpClient {
    /// Initialize libcurl (once per process) and create an empty handle pool.
    pub fn new(options: HttpClientOptions) -> Self {
        curl::init();
        let version = curl::Version::get();
        tracing::info!(
            "libcurl version {} (ssl: {})",
            version.version(),
            version.ssl_version().unwrap_or("none")
        );
        Self {
            options,
            forbid_reuse: version.version_num() < MIN_SAFE_REUSE_VERSION,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn options(&self) -> &HttpClientOptions {
        &self.options
    }

    /// Number of idle handles currently pooled.
    pub fn pooled_handles(&self) -> usize {
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Execute `request` on the current thread, reporting into `progress`.
    /// The terminal state is stored in `progress` before returning.
    pub fn run(&self, request: &HttpRequest, progress: &Arc<RequestProgress>) -> Response {
        let response = self.run_inner(request, progress);
        if response.state == RequestState::Done {
            progress.complete();
        }
        progress.set_state(response.state);
        response
    }

    /// Execute `request` on a new worker thread.
    pub fn spawn(self: &Arc<Self>, request: HttpRequest) -> PendingRequest {
        self.spawn_with(request, |response| response)
    }

    /// Execute `request` on a new worker thread and run `complete` on that
    /// worker with the response, e.g. to decode a downloaded file.
    pub fn spawn_with<T, F>(self: &Arc<Self>, request: HttpRequest, complete: F) -> PendingRequest<T>
    where
        T: Send + 'static,
        F: FnOnce(Response) -> T + Send + 'static,
    {
        let progress = Arc::new(RequestProgress::new());
        let client = Arc::clone(self);
        let worker_progress = Arc::clone(&progress);
        let handle = std::thread::spawn(move || complete(client.run(&request, &worker_progress)));
        PendingRequest { progress, handle }
    }

    /// Run the blocking transfer on tokio's blocking pool.
    pub async fn run_async(self: &Arc<Self>, request: HttpRequest) -> Response {
        let client = Arc::clone(self);
        let progress = Arc::new(RequestProgress::new());
        let dest = request.dest_path().map(|p| p.to_path_buf());
        match tokio::task::spawn_blocking(move || client.run(&request, &progress)).await {
            Ok(response) => response,
            Err(e) => Response::failed(RequestState::Error, dest, HttpError::Worker(e.to_string())),
        }
    }

    fn run_inner(&self, request: &HttpRequest, progress: &Arc<RequestProgress>) -> Response {
        let log_all = self.options.debug || request.log >= HttpLog::All;
        let log_failure = self.options.debug || request.log >= HttpLog::Failure;
        let dest = request.dest_path().map(|p| p.to_path_buf());

        if let Err(e) = request.validate_url() {
            if log_failure {
                tracing::warn!("{} failed: {}", request.url, e);
            }
            return Response::failed(RequestState::Error, dest, e);
        }
        if progress.is_aborted() {
            return Response::failed(RequestState::Aborted, dest, HttpError::Aborted);
        }
        let sink = match Sink::open(&request.destination) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::warn!("{}", e);
                return Response::failed(RequestState::Error, dest, e);
            }
        };

        let handler = RequestHandler::new(sink, Arc::clone(progress), request.max_response_size);
        let mut easy = self.checkout(handler);

        if log_all {
            tracing::info!("fetching {}", request.url);
        }
        progress.set_state(RequestState::Running);
        let performed = self
            .configure(&mut easy, request)
            .and_then(|()| easy.perform());
        let status_code = easy.response_code().ok().filter(|c| *c != 0);

        let handler = std::mem::replace(easy.get_mut(), RequestHandler::idle());
        self.checkin(easy);

        let (mut state, mut error) = match performed {
            Ok(()) => {
                // the last progress callback may predate the final chunk
                progress.update(handler.received, progress.size().max(handler.received));
                (RequestState::Done, None)
            }
            Err(e) => {
                let aborted = progress.is_aborted() || e.is_aborted_by_callback();
                let err = match handler.failure {
                    Some(f) => f,
                    None if aborted => HttpError::Aborted,
                    None => HttpError::Curl(e),
                };
                if log_failure {
                    tracing::warn!("{} failed: {}", request.url, err);
                }
                let state = if aborted && !matches!(err, HttpError::TooLarge { .. }) {
                    RequestState::Aborted
                } else {
                    RequestState::Error
                };
                (state, Some(err))
            }
        };

        let body = close_sink(handler.sink, &mut state, &mut error, dest.as_deref());
        if state == RequestState::Done && log_all {
            tracing::info!("task done {}", request.url);
        }

        Response {
            state,
            status_code,
            body,
            dest,
            error,
        }
    }

    fn configure(
        &self,
        easy: &mut Easy2<RequestHandler>,
        request: &HttpRequest,
    ) -> Result<(), curl::Error> {
        easy.verbose(self.options.debug)?;
        easy.connect_timeout(request.timeout.connect)?;
        easy.low_speed_limit(request.timeout.low_speed_limit)?;
        easy.low_speed_time(request.timeout.low_speed_time)?;

        easy.url(&request.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTS)?;
        easy.fail_on_error(true)?;
        easy.signal(false)?;
        easy.useragent(&self.options.user_agent)?;
        // any compression libcurl supports
        easy.accept_encoding("")?;
        easy.progress(true)?;
        easy.ip_resolve(match request.ip_resolve {
            IpResolve::Whatever => curl::easy::IpResolve::Any,
            IpResolve::V4 => curl::easy::IpResolve::V4,
            IpResolve::V6 => curl::easy::IpResolve::V6,
        })?;
        if self.forbid_reuse {
            easy.forbid_reuse(true)?;
        }

        match request.method {
            Method::Get => {}
            Method::Head => easy.nobody(true)?,
            Method::Post | Method::PostJson => {
                easy.post(true)?;
                easy.post_fields_copy(&request.body)?;
            }
        }

        let lines = request.header_lines();
        if !lines.is_empty() {
            let mut list = List::new();
            for line in &lines {
                list.append(line)?;
            }
            easy.http_headers(list)?;
        }
        Ok(())
    }

    fn checkout(&self, handler: RequestHandler) -> Easy2<RequestHandler> {
        let pooled = self.handles.lock().unwrap_or_else(|e| e.into_inner()).pop();
        match pooled {
            Some(mut easy) => {
                easy.reset();
                *easy.get_mut() = handler;
                easy
            }
            None => Easy2::new(handler),
        }
    }

    fn checkin(&self, easy: Easy2<RequestHandler>) {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        if handles.len() < MAX_POOLED_HANDLES {
            handles.push(easy);
        }
    }
}

/// Close the sink after the transfer. A failed close turns `Done` into
/// `Error`; `Error` and `Aborted` file requests lose their destination file.
fn close_sink(
    sink: Option<Sink>,
    state: &mut RequestState,
    error: &mut Option<HttpError>,
    dest: Option<&std::path::Path>,
) -> Option<Vec<u8>> {
    let mut body = None;
    if let Some(sink) = sink {
        match sink.finish() {
            Ok(b) => body = b,
            Err(e) => {
                tracing::warn!("{}", e);
                *state = RequestState::Error;
                error.get_or_insert(e);
            }
        }
    }
    if matches!(*state, RequestState::Error | RequestState::Aborted) {
        if let Some(path) = dest {
            remove_partial(path);
        }
        body = None;
    }
    body
}

/// Percent-escape a string for use as a URL path component
/// (everything except unreserved characters).
pub fn escape_url(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_url_unreserved_untouched() {
        assert_eq!(escape_url("default"), "default");
        assert_eq!(escape_url("a-b_c.d~e"), "a-b_c.d~e");
    }

    #[test]
    fn escape_url_reserved_and_utf8() {
        assert_eq!(escape_url("x y"), "x%20y");
        assert_eq!(escape_url("a/b?c"), "a%2Fb%3Fc");
        assert_eq!(escape_url("ü"), "%C3%BC");
    }

    #[test]
    fn user_agent_mentions_platform() {
        let ua = default_user_agent();
        assert!(ua.starts_with("skinsync/"));
        assert!(ua.contains(std::env::consts::OS));
    }

    #[test]
    fn unsupported_scheme_fails_without_transport() {
        let client = HttpClient::new(HttpClientOptions::default());
        let progress = Arc::new(RequestProgress::new());
        let resp = client.run(&HttpRequest::get("file:///etc/passwd"), &progress);
        assert_eq!(resp.state(), RequestState::Error);
        assert!(matches!(resp.error(), Some(HttpError::UnsupportedScheme(_))));
        assert_eq!(progress.state(), RequestState::Error);
        assert_eq!(client.pooled_handles(), 0);
    }

    #[test]
    fn abort_before_run_yields_aborted() {
        let client = HttpClient::new(HttpClientOptions::default());
        let progress = Arc::new(RequestProgress::new());
        progress.abort();
        let resp = client.run(&HttpRequest::get("http://127.0.0.1:1/"), &progress);
        assert_eq!(resp.state(), RequestState::Aborted);
        assert!(resp.result().is_none());
    }

    #[test]
    fn failed_close_turns_done_into_error_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"").unwrap();
        // read-only descriptor: buffered bytes cannot be flushed
        let mut writer = std::io::BufWriter::new(std::fs::File::open(&path).unwrap());
        std::io::Write::write_all(&mut writer, b"abc").unwrap();
        let sink = Sink::File {
            path: path.clone(),
            writer,
        };

        let mut state = RequestState::Done;
        let mut error = None;
        let body = close_sink(Some(sink), &mut state, &mut error, Some(&path));
        assert_eq!(state, RequestState::Error);
        assert!(matches!(error, Some(HttpError::CloseFile { .. })));
        assert!(body.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn successful_close_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.bin");
        let sink = Sink::open(&Destination::File(path.clone())).unwrap();
        let mut state = RequestState::Done;
        let mut error = None;
        assert!(close_sink(Some(sink), &mut state, &mut error, Some(&path)).is_none());
        assert_eq!(state, RequestState::Done);
        assert!(error.is_none());
        assert!(path.exists());
    }
}
