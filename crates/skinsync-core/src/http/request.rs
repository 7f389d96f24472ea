//! Request configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::HttpError;

/// HTTP method. `PostJson` is a POST with `Content-Type: application/json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    PostJson,
}

/// Address family for name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpResolve {
    #[default]
    Whatever,
    V4,
    V6,
}

/// How much a request logs on its own. `Failure` logs only failed transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum HttpLog {
    None,
    Failure,
    #[default]
    All,
}

/// Connect timeout plus the low-speed abort window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    pub connect: Duration,
    /// Bytes per second below which the transfer counts as stalled (0 = off).
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
}

impl Default for Timeout {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(8000),
            low_speed_limit: 500,
            low_speed_time: Duration::from_secs(10),
        }
    }
}

/// Where the response body goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Memory,
    File(PathBuf),
}

/// A single HTTP request: URL, method, headers, body, timeouts and sink.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub(crate) url: String,
    pub(crate) method: Method,
    pub(crate) headers: Vec<String>,
    pub(crate) body: Vec<u8>,
    pub(crate) timeout: Timeout,
    pub(crate) ip_resolve: IpResolve,
    pub(crate) destination: Destination,
    pub(crate) log: HttpLog,
    pub(crate) max_response_size: Option<u64>,
}

impl HttpRequest {
    fn new(url: &str, method: Method) -> Self {
        Self {
            url: url.to_string(),
            method,
            headers: Vec::new(),
            body: Vec::new(),
            timeout: Timeout::default(),
            ip_resolve: IpResolve::default(),
            destination: Destination::Memory,
            log: HttpLog::default(),
            max_response_size: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(url, Method::Get)
    }

    pub fn head(url: &str) -> Self {
        Self::new(url, Method::Head)
    }

    pub fn post(url: &str, body: impl Into<Vec<u8>>) -> Self {
        let mut req = Self::new(url, Method::Post);
        req.body = body.into();
        req
    }

    pub fn post_json(url: &str, json: &serde_json::Value) -> Self {
        let mut req = Self::new(url, Method::PostJson);
        req.body = json.to_string().into_bytes();
        req
    }

    /// Add a raw header line, e.g. `"Authorization: Bearer x"`.
    pub fn header(mut self, name_colon_value: &str) -> Self {
        self.headers.push(name_colon_value.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn ip_resolve(mut self, ip_resolve: IpResolve) -> Self {
        self.ip_resolve = ip_resolve;
        self
    }

    /// Stream the body into `path` instead of memory. Parent folders are created on run.
    pub fn write_to_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Destination::File(path.into());
        self
    }

    pub fn log_progress(mut self, log: HttpLog) -> Self {
        self.log = log;
        self
    }

    /// Fail the transfer once the body grows past `bytes`.
    pub fn max_response_size(mut self, bytes: u64) -> Self {
        self.max_response_size = Some(bytes);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn dest_path(&self) -> Option<&Path> {
        match &self.destination {
            Destination::File(p) => Some(p),
            Destination::Memory => None,
        }
    }

    /// Header lines as sent, including the implied JSON content type.
    pub fn header_lines(&self) -> Vec<String> {
        let mut lines = self.headers.clone();
        if self.method == Method::PostJson {
            lines.push("Content-Type: application/json".to_string());
        }
        lines
    }

    /// Only http and https are allowed.
    pub(crate) fn validate_url(&self) -> Result<(), HttpError> {
        let parsed = url::Url::parse(&self.url).map_err(|source| HttpError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(HttpError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_json_adds_content_type() {
        let req = HttpRequest::post_json("https://example.com/api", &serde_json::json!({"a": 1}))
            .header("X-Test: 1");
        assert_eq!(req.method(), Method::PostJson);
        assert_eq!(req.body, br#"{"a":1}"#.to_vec());
        assert_eq!(
            req.header_lines(),
            vec!["X-Test: 1".to_string(), "Content-Type: application/json".to_string()]
        );
    }

    #[test]
    fn plain_post_keeps_headers() {
        let req = HttpRequest::post("http://example.com/", b"k=v".to_vec());
        assert!(req.header_lines().is_empty());
        assert_eq!(req.body, b"k=v");
    }

    #[test]
    fn write_to_file_sets_destination() {
        let req = HttpRequest::get("https://example.com/a.png").write_to_file("/tmp/a.png");
        assert_eq!(req.dest_path(), Some(Path::new("/tmp/a.png")));
        assert_eq!(HttpRequest::get("https://example.com/").dest_path(), None);
    }

    #[test]
    fn validate_url_schemes() {
        assert!(HttpRequest::get("https://example.com/").validate_url().is_ok());
        assert!(HttpRequest::head("http://127.0.0.1:8080/x").validate_url().is_ok());
        assert!(matches!(
            HttpRequest::get("ftp://example.com/").validate_url(),
            Err(HttpError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            HttpRequest::get("not a url").validate_url(),
            Err(HttpError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn log_levels_are_ordered() {
        assert!(HttpLog::All >= HttpLog::Failure);
        assert!(HttpLog::Failure > HttpLog::None);
        assert_eq!(HttpLog::default(), HttpLog::All);
    }
}
