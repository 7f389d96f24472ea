//! Skin catalog: the sorted set of known skins plus lazily scheduled downloads.
//!
//! Skins are kept sorted by name (byte order) so lookups are binary
//! searches and indices are stable between refreshes. Names are unique
//! ignoring ASCII case; the first storage root wins on a clash. The
//! catalog is driven from a single thread; `refresh` and the lookup calls
//! take `&mut self` where they may change state.

mod download;
mod skin;
mod vanilla;

pub use download::{download_rel, skin_url, DOWNLOAD_DIR};
pub use skin::{is_valid_name, Skin, SkinError, SkinSource, MAX_SKIN_NAME_LEN};
pub use vanilla::{is_vanilla, VANILLA_SKINS};

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::http::{HttpClient, IpResolve, RequestState, Timeout};
use crate::image::{ImageDecoder, PngDecoder};
use crate::storage::{DirEntry, Storage};
use download::{DownloadOutcome, DownloadSkin};

/// Folder (under every storage root) regular skins are scanned from.
pub const SKIN_DIR: &str = "skins";
/// Skin that always exists and is never downloaded.
pub const DEFAULT_SKIN: &str = "default";

/// Catalog behaviour, usually built from `Config`.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub download_skins: bool,
    /// Download URL prefix; the escaped name and `.png` are appended.
    pub base_url: String,
    pub skin_prefix: String,
    pub vanilla_skins_only: bool,
    pub timeout: Timeout,
    pub ip_resolve: IpResolve,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CatalogOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            download_skins: cfg.download_skins,
            base_url: cfg.skin_base_url().to_string(),
            skin_prefix: cfg.skin_prefix.clone(),
            vanilla_skins_only: cfg.vanilla_skins_only,
            timeout: cfg.http.timeout(),
            ip_resolve: cfg.http.ip_resolve,
        }
    }
}

/// Reported once per scanned skin during `refresh`.
#[derive(Debug)]
pub enum RefreshEvent<'a> {
    Loaded { name: &'a str, count: usize },
    Failed { name: &'a str, error: &'a SkinError },
}

pub struct SkinCatalog {
    client: Arc<HttpClient>,
    storage: Storage,
    decoder: Arc<dyn ImageDecoder>,
    options: CatalogOptions,
    skins: Vec<Skin>,
    /// Lowercased names of `skins`.
    folded: HashSet<String>,
    /// Sorted by lowercased name, one entry per name ignoring case.
    downloads: Vec<DownloadSkin>,
    /// Downloads started so far; numbers the temp files.
    download_seq: u64,
    event_skin_prefix: String,
}

impl SkinCatalog {
    pub fn new(client: Arc<HttpClient>, storage: Storage, options: CatalogOptions) -> Self {
        Self::with_decoder(client, storage, options, Arc::new(PngDecoder))
    }

    pub fn with_decoder(
        client: Arc<HttpClient>,
        storage: Storage,
        options: CatalogOptions,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        Self {
            client,
            storage,
            decoder,
            options,
            skins: Vec::new(),
            folded: HashSet::new(),
            downloads: Vec::new(),
            download_seq: 0,
            event_skin_prefix: String::new(),
        }
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Rescan all storage roots and rebuild the catalog from scratch.
    /// Finished downloads are moved into place first; unfinished ones are
    /// aborted and waited for.
    /// Returns the number of skins loaded.
    pub fn refresh<F>(&mut self, mut on_event: F) -> usize
    where
        F: FnMut(RefreshEvent<'_>),
    {
        self.settle_downloads();
        self.skins.clear();
        self.folded.clear();

        for (dir, downloaded) in [(SKIN_DIR, false), (DOWNLOAD_DIR, true)] {
            for entry in self.storage.list_dir(dir) {
                self.scan_entry(&entry, downloaded, &mut on_event);
            }
        }

        if self.skins.is_empty() {
            tracing::warn!("no skins found, using built-in placeholder");
            self.insert(Skin::placeholder());
        }
        tracing::info!("loaded {} skins", self.skins.len());
        self.skins.len()
    }

    fn scan_entry<F>(&mut self, entry: &DirEntry, downloaded: bool, on_event: &mut F)
    where
        F: FnMut(RefreshEvent<'_>),
    {
        let Some(name) = entry.name.strip_suffix(".png") else {
            return;
        };
        if self.options.vanilla_skins_only && !is_vanilla(name) {
            return;
        }
        if self.folded.contains(&name.to_ascii_lowercase()) {
            tracing::debug!(skin = name, path = %entry.path.display(), "skipping duplicate skin");
            return;
        }

        let source = if downloaded {
            SkinSource::Downloaded(entry.path.clone())
        } else {
            SkinSource::Local(entry.path.clone())
        };
        let loaded = self
            .decoder
            .decode_file(&entry.path)
            .map_err(SkinError::from)
            .and_then(|info| Skin::from_image(name, info, source));
        match loaded {
            Ok(skin) => {
                self.insert(skin);
                tracing::debug!(skin = name, "loaded skin");
                on_event(RefreshEvent::Loaded {
                    name,
                    count: self.skins.len(),
                });
            }
            Err(error) => {
                tracing::warn!(skin = name, path = %entry.path.display(), "failed to load skin: {}", error);
                on_event(RefreshEvent::Failed {
                    name,
                    error: &error,
                });
            }
        }
    }

    /// Insert keeping name order; an existing name (any case) keeps its skin
    /// and its index is returned instead.
    fn insert(&mut self, skin: Skin) -> usize {
        if self.folded.contains(&skin.name().to_ascii_lowercase()) {
            if let Some(i) = self
                .skins
                .iter()
                .position(|s| s.name().eq_ignore_ascii_case(skin.name()))
            {
                return i;
            }
        }
        let pos = self
            .skins
            .binary_search_by(|s| s.name().cmp(skin.name()))
            .unwrap_or_else(|p| p);
        self.folded.insert(skin.name().to_ascii_lowercase());
        self.skins.insert(pos, skin);
        pos
    }

    pub fn num(&self) -> usize {
        self.skins.len()
    }

    pub fn get(&self, index: usize) -> Option<&Skin> {
        self.skins.get(index)
    }

    pub fn skins(&self) -> &[Skin] {
        &self.skins
    }

    /// Exact, case-sensitive lookup without prefix handling.
    pub fn find_exact(&self, name: &str) -> Option<usize> {
        self.skins.binary_search_by(|s| s.name().cmp(name)).ok()
    }

    /// Prefix the event (or configured) skin prefix is applied with, if any.
    fn prefixed(&self, name: &str) -> Option<String> {
        let prefix = if self.event_skin_prefix.is_empty() {
            &self.options.skin_prefix
        } else {
            &self.event_skin_prefix
        };
        (!prefix.is_empty()).then(|| format!("{}_{}", prefix, name))
    }

    /// Look up a skin: `<prefix>_<name>` first when a prefix is active, then `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        if self.options.vanilla_skins_only && !is_vanilla(name) {
            return None;
        }
        if let Some(i) = self.prefixed(name).and_then(|p| self.find_exact(&p)) {
            return Some(i);
        }
        self.find_exact(name)
    }

    /// Like `find`, but schedules a download for a missing skin (once per name,
    /// ignoring case) and picks up downloads that finished since the last call.
    pub fn find_or_download(&mut self, name: &str) -> Option<usize> {
        if let Some(i) = self.find(name) {
            return Some(i);
        }
        let key = name.to_ascii_lowercase();
        if self.options.vanilla_skins_only
            || !self.options.download_skins
            || name == DEFAULT_SKIN
            || name.contains('/')
            || name.contains('\\')
            || !is_valid_name(name)
            || self.folded.contains(&key)
        {
            return None;
        }

        match self.downloads.binary_search_by(|d| d.key.cmp(&key)) {
            Ok(pos) => {
                // a case variant shares the first request's download but
                // lookups stay exact
                let index = self.collect_download(pos, false);
                index.filter(|_| self.downloads[pos].name == name)
            }
            Err(pos) => {
                self.download_seq += 1;
                let task = download::start(
                    &self.client,
                    &self.storage,
                    &self.decoder,
                    &self.options,
                    name,
                    self.download_seq,
                );
                self.downloads.insert(pos, task);
                None
            }
        }
    }

    /// Collect every finished download. Returns how many skins were added.
    pub fn update_downloads(&mut self) -> usize {
        (0..self.downloads.len())
            .filter(|&pos| self.collect_download(pos, false).is_some())
            .count()
    }

    /// If the task at `pos` finished (or, with `block`, once it has), move
    /// its file into place and insert the skin.
    fn collect_download(&mut self, pos: usize, block: bool) -> Option<usize> {
        let entry = &mut self.downloads[pos];
        if !entry.task.as_ref().is_some_and(|t| block || t.is_finished()) {
            return None;
        }
        let task = entry.task.take()?;
        let outcome = match task.wait() {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(skin = %entry.name, "{}", e);
                entry.final_state = Some(RequestState::Error);
                return None;
            }
        };
        entry.final_state = Some(outcome.state);
        let skin = outcome.skin?;
        let name = entry.name.clone();
        let tmp_rel = entry.tmp_rel.clone();

        if let Err(e) = self.storage.rename_in_save(&tmp_rel, &download_rel(&name)) {
            tracing::warn!(skin = %name, "cannot store downloaded skin: {:#}", e);
            if let Err(e) = self.storage.remove_in_save(&tmp_rel) {
                tracing::debug!(skin = %name, "cannot remove downloaded skin: {:#}", e);
            }
            self.downloads[pos].final_state = Some(RequestState::Error);
            return None;
        }
        tracing::info!(skin = %name, "downloaded skin");
        Some(self.insert(skin))
    }

    /// Before a rescan: abort unfinished downloads, wait for every worker,
    /// store what completed and clear the list.
    fn settle_downloads(&mut self) {
        self.abort_downloads();
        for pos in 0..self.downloads.len() {
            self.collect_download(pos, true);
        }
        self.downloads.clear();
    }

    fn abort_downloads(&self) {
        for task in self.downloads.iter().filter_map(|d| d.task.as_ref()) {
            if !task.is_finished() {
                task.abort();
            }
        }
    }

    /// Number of downloads still in flight.
    pub fn pending_downloads(&self) -> usize {
        self.downloads.iter().filter(|d| d.is_pending()).count()
    }

    /// State of the download for `name` (ignoring case), if one was scheduled
    /// since the last refresh.
    pub fn download_state(&self, name: &str) -> Option<RequestState> {
        let key = name.to_ascii_lowercase();
        self.downloads
            .binary_search_by(|d| d.key.cmp(&key))
            .ok()
            .map(|pos| self.downloads[pos].state())
    }

    /// Prefix forced by a game event (e.g. "santa"); overrides the configured one.
    /// Empty clears it.
    pub fn set_event_skin_prefix(&mut self, prefix: &str) {
        self.event_skin_prefix = prefix.to_string();
    }
}

impl Drop for SkinCatalog {
    fn drop(&mut self) {
        self.abort_downloads();
        for d in self.downloads.drain(..) {
            let Some(task) = d.task else {
                continue;
            };
            // the worker got past the transfer; nobody will rename its file
            if let Ok(DownloadOutcome { skin: Some(_), .. }) = task.wait() {
                if let Err(e) = self.storage.remove_in_save(&d.tmp_rel) {
                    tracing::debug!(skin = %d.name, "cannot remove downloaded skin: {:#}", e);
                }
            }
        }
    }
}
