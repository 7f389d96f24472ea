//! Storage roots and file lifecycle for skins.
//!
//! The first root is the writable save directory
//! (`~/.local/share/skinsync`); further roots are read-only data directories.
//! Paths handed around the catalog are relative (`skins/x.png`) and resolved
//! against a root on use. Downloads land in a temp file first and are
//! renamed into place once complete.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of in-progress downloads.
pub const TEMP_SUFFIX: &str = ".tmp";

/// One file found by `Storage::list_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name without directory.
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
    /// Index of the root it was found under (0 = save directory).
    pub root: usize,
}

#[derive(Debug, Clone)]
pub struct Storage {
    roots: Vec<PathBuf>,
}

impl Storage {
    /// Storage with `save_dir` first, then `data_dirs` in order.
    pub fn new(save_dir: impl Into<PathBuf>, data_dirs: &[PathBuf]) -> Self {
        let mut roots = vec![save_dir.into()];
        roots.extend(data_dirs.iter().cloned());
        Self { roots }
    }

    /// Storage rooted at the XDG data home, creating it if needed.
    pub fn open_default(data_dirs: &[PathBuf]) -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("skinsync")?;
        let save_dir = xdg_dirs.get_data_home();
        fs::create_dir_all(&save_dir)
            .with_context(|| format!("create save dir {}", save_dir.display()))?;
        Ok(Self::new(save_dir, data_dirs))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn save_dir(&self) -> &Path {
        &self.roots[0]
    }

    /// Absolute path of `rel` inside the save directory.
    pub fn save_path(&self, rel: &str) -> PathBuf {
        self.save_dir().join(rel)
    }

    /// Regular files directly inside `rel` under every root, root order kept,
    /// names sorted within a root. Missing directories are skipped.
    pub fn list_dir(&self, rel: &str) -> Vec<DirEntry> {
        let mut out = Vec::new();
        for (root, base) in self.roots.iter().enumerate() {
            let dir = base.join(rel);
            let read = match fs::read_dir(&dir) {
                Ok(r) => r,
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(dir = %dir.display(), "cannot list directory: {}", e);
                    }
                    continue;
                }
            };
            let mut entries: Vec<DirEntry> = read
                .flatten()
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .filter_map(|e| {
                    let name = e.file_name().into_string().ok()?;
                    Some(DirEntry {
                        name,
                        path: e.path(),
                        root,
                    })
                })
                .collect();
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            out.extend(entries);
        }
        out
    }

    /// Rename within the save directory, creating the target folder.
    pub fn rename_in_save(&self, from_rel: &str, to_rel: &str) -> Result<()> {
        let from = self.save_path(from_rel);
        let to = self.save_path(to_rel);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&from, &to)
            .with_context(|| format!("failed to rename {} to {}", from.display(), to.display()))?;
        Ok(())
    }

    pub fn remove_in_save(&self, rel: &str) -> Result<()> {
        let path = self.save_path(rel);
        fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }
}

/// Temp name for an in-progress file: `name.png` -> `name.png.<pid>.tmp`.
pub fn tmp_path(rel: &str) -> String {
    format!("{}.{}{}", rel, std::process::id(), TEMP_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_appends_pid_and_suffix() {
        let p = tmp_path("downloadedskins/x.png");
        assert!(p.starts_with("downloadedskins/x.png."));
        assert!(p.ends_with(".tmp"));
        assert!(p.contains(&std::process::id().to_string()));
    }

    #[test]
    fn list_dir_keeps_root_order_and_skips_dirs() {
        let save = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::create_dir_all(save.path().join("skins/sub")).unwrap();
        fs::create_dir_all(data.path().join("skins")).unwrap();
        fs::write(save.path().join("skins/b.png"), b"").unwrap();
        fs::write(save.path().join("skins/a.png"), b"").unwrap();
        fs::write(data.path().join("skins/0.png"), b"").unwrap();

        let storage = Storage::new(save.path(), &[data.path().to_path_buf()]);
        let names: Vec<(String, usize)> = storage
            .list_dir("skins")
            .into_iter()
            .map(|e| (e.name, e.root))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a.png".to_string(), 0),
                ("b.png".to_string(), 0),
                ("0.png".to_string(), 1)
            ]
        );
    }

    #[test]
    fn list_dir_missing_is_empty() {
        let save = tempfile::tempdir().unwrap();
        let storage = Storage::new(save.path(), &[]);
        assert!(storage.list_dir("nope").is_empty());
    }

    #[test]
    fn rename_and_remove_in_save() {
        let save = tempfile::tempdir().unwrap();
        let storage = Storage::new(save.path(), &[]);
        fs::write(storage.save_path("a.tmp"), b"x").unwrap();
        storage.rename_in_save("a.tmp", "dir/a.png").unwrap();
        assert!(!storage.save_path("a.tmp").exists());
        assert_eq!(fs::read(storage.save_path("dir/a.png")).unwrap(), b"x");
        storage.remove_in_save("dir/a.png").unwrap();
        assert!(!storage.save_path("dir/a.png").exists());
        assert!(storage.remove_in_save("dir/a.png").is_err());
    }
}
