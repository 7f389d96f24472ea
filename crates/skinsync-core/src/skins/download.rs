//! Download tasks for skins referenced remotely but missing locally.
//!
//! The PNG is decoded and validated on the download worker right after the
//! transfer, so the catalog only has to rename the file and insert the skin.

use std::path::PathBuf;
use std::sync::Arc;

use crate::http::{escape_url, HttpClient, HttpLog, HttpRequest, PendingRequest, RequestState};
use crate::image::ImageDecoder;
use crate::storage::{tmp_path, Storage};

use super::skin::{Skin, SkinError, SkinSource};
use super::CatalogOptions;

/// Folder (in the save directory) downloaded skins are stored in.
pub const DOWNLOAD_DIR: &str = "downloadedskins";

/// What the worker hands back once the transfer and decode are over.
#[derive(Debug)]
pub(crate) struct DownloadOutcome {
    pub(crate) state: RequestState,
    pub(crate) skin: Option<Skin>,
}

/// One name in the download list. The entry outlives its task so the same
/// name is not fetched twice before the next refresh.
#[derive(Debug)]
pub(crate) struct DownloadSkin {
    pub(crate) name: String,
    /// Lowercased name; the download list is sorted by it.
    pub(crate) key: String,
    /// Temp file, relative to the save directory.
    pub(crate) tmp_rel: String,
    pub(crate) task: Option<PendingRequest<DownloadOutcome>>,
    /// Set once the task has been collected.
    pub(crate) final_state: Option<RequestState>,
}

impl DownloadSkin {
    /// A transfer that reached `Done` reports `Running` until the task is
    /// collected, since the worker may still reject the image.
    pub(crate) fn state(&self) -> RequestState {
        if let Some(state) = self.final_state {
            return state;
        }
        match &self.task {
            Some(task) => match task.state() {
                RequestState::Done => RequestState::Running,
                state => state,
            },
            None => RequestState::Queued,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.task.is_some()
    }
}

/// `downloadedskins/<name>.png`
pub fn download_rel(name: &str) -> String {
    format!("{}/{}.png", DOWNLOAD_DIR, name)
}

/// `<base><escaped name>.png`
pub fn skin_url(base: &str, name: &str) -> String {
    format!("{}{}.png", base, escape_url(name))
}

/// Temp file for download number `seq`: `downloadedskins/<name>.png.<seq>.<pid>.tmp`.
/// Every task gets its own, so a worker still winding down never touches the
/// file of a newer download of the same name.
pub(crate) fn download_tmp_rel(name: &str, seq: u64) -> String {
    tmp_path(&format!("{}.{}", download_rel(name), seq))
}

/// Start fetching `name` on a worker thread.
pub(crate) fn start(
    client: &Arc<HttpClient>,
    storage: &Storage,
    decoder: &Arc<dyn ImageDecoder>,
    options: &CatalogOptions,
    name: &str,
    seq: u64,
) -> DownloadSkin {
    let url = skin_url(&options.base_url, name);
    let tmp_rel = download_tmp_rel(name, seq);
    let dest = storage.save_path(&tmp_rel);
    let final_path: PathBuf = storage.save_path(&download_rel(name));

    let request = HttpRequest::get(&url)
        .write_to_file(&dest)
        .timeout(options.timeout)
        .ip_resolve(options.ip_resolve)
        .log_progress(HttpLog::Failure);

    tracing::debug!(skin = name, %url, "downloading skin");
    let decoder = Arc::clone(decoder);
    let skin_name = name.to_string();
    let task = client.spawn_with(request, move |response| {
        if !response.is_done() {
            return DownloadOutcome {
                state: response.state(),
                skin: None,
            };
        }
        let loaded = decoder
            .decode_file(&dest)
            .map_err(SkinError::from)
            .and_then(|info| Skin::from_image(&skin_name, info, SkinSource::Downloaded(final_path)));
        match loaded {
            Ok(skin) => DownloadOutcome {
                state: RequestState::Done,
                skin: Some(skin),
            },
            Err(e) => {
                tracing::warn!(skin = %skin_name, "failed to load downloaded skin: {}", e);
                if let Err(e) = std::fs::remove_file(&dest) {
                    tracing::debug!(path = %dest.display(), "cannot remove invalid skin: {}", e);
                }
                DownloadOutcome {
                    state: RequestState::Error,
                    skin: None,
                }
            }
        }
    });

    DownloadSkin {
        name: name.to_string(),
        key: name.to_ascii_lowercase(),
        tmp_rel,
        task: Some(task),
        final_state: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_escapes_name() {
        assert_eq!(
            skin_url("https://skins.ddnet.org/skin/", "nanami glow"),
            "https://skins.ddnet.org/skin/nanami%20glow.png"
        );
        assert_eq!(skin_url("http://h/", "x_ninja"), "http://h/x_ninja.png");
    }

    #[test]
    fn download_rel_layout() {
        assert_eq!(download_rel("foo"), "downloadedskins/foo.png");
    }

    #[test]
    fn temp_names_differ_per_task() {
        let a = download_tmp_rel("foo", 1);
        let b = download_tmp_rel("foo", 2);
        assert_ne!(a, b);
        assert!(a.starts_with("downloadedskins/foo.png.1."));
        assert!(a.ends_with(".tmp"));
    }

    #[test]
    fn state_hides_done_until_collected() {
        let entry = DownloadSkin {
            name: "foo".to_string(),
            key: "foo".to_string(),
            tmp_rel: download_tmp_rel("foo", 1),
            task: None,
            final_state: None,
        };
        assert_eq!(entry.state(), RequestState::Queued);
        let collected = DownloadSkin {
            final_state: Some(RequestState::Error),
            ..entry
        };
        assert_eq!(collected.state(), RequestState::Error);
    }
}
