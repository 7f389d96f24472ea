//! `skinsync fetch` – one HTTP request with progress on stderr.

use anyhow::{bail, Context, Result};
use skinsync_core::config::Config;
use skinsync_core::http::{HttpClient, HttpRequest, RequestState};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PROGRESS_INTERVAL_MS: u64 = 500;

pub async fn run_fetch(
    client: Arc<HttpClient>,
    cfg: &Config,
    url: &str,
    output: Option<PathBuf>,
    head: bool,
    json: bool,
) -> Result<()> {
    let mut request = if head {
        HttpRequest::head(url)
    } else {
        HttpRequest::get(url)
    };
    request = request
        .timeout(cfg.http.timeout())
        .ip_resolve(cfg.http.ip_resolve);
    if let Some(path) = &output {
        request = request.write_to_file(path);
    }

    let pending = client.spawn(request);
    let started = Instant::now();
    let mut last_print = Instant::now();
    while !pending.is_finished() {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let progress = pending.progress();
        if last_print.elapsed().as_millis() as u64 >= PROGRESS_INTERVAL_MS {
            let secs = started.elapsed().as_secs_f64();
            let rate = if secs > 0.0 {
                progress.current() as f64 / secs / 1024.0
            } else {
                0.0
            };
            eprint!(
                "\r  {} / {} bytes ({}%)  {:.1} KiB/s  ",
                progress.current(),
                progress.size(),
                progress.progress(),
                rate
            );
            last_print = Instant::now();
        }
    }

    let response = pending.wait()?;
    if response.state() != RequestState::Done {
        match response.error() {
            Some(err) => bail!("{} failed: {}", url, err),
            None => bail!("{} failed ({:?})", url, response.state()),
        }
    }

    if let Some(code) = response.status_code() {
        eprintln!("HTTP {}", code);
    }
    if let Some(path) = response.dest() {
        println!("saved to {}", path.display());
    } else if json {
        let value = response.result_json_value()?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if let Some(body) = response.result() {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(body).context("write body to stdout")?;
        stdout.flush()?;
    }
    Ok(())
}
