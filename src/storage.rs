//! Snapshot storage on disk.
//!
//! Callers choose the relative location of every file; the sink only
//! anchors it under its base directory. Nothing is deduplicated.

use std::path::{Component, Path, PathBuf};

/// Writes raw crawl snapshots under a base directory.
#[derive(Debug, Clone)]
pub struct StorageSink {
    base_path: PathBuf,
}

impl StorageSink {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write `content` to `base_path/relative_path` and return the absolute path.
    ///
    /// Returns an empty string when there is nothing to write, when the
    /// relative path would escape the base directory, or when the write
    /// fails. Failures are logged, never raised.
    pub fn save(&self, content: impl AsRef<[u8]>, relative_path: &str) -> String {
        let content = content.as_ref();
        if content.is_empty() {
            return String::new();
        }

        let Some(full_path) = self.resolve(relative_path) else {
            tracing::error!(relative_path, "Storage error: path escapes the storage root");
            return String::new();
        };

        match write_file(&full_path, content) {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                tracing::error!(path = %full_path.display(), error = %e, "Storage error");
                String::new()
            }
        }
    }

    /// Join a caller-supplied relative path onto the base, refusing anything
    /// absolute or containing `..`.
    pub fn resolve(&self, relative_path: &str) -> Option<PathBuf> {
        let relative = Path::new(relative_path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe || relative_path.trim().is_empty() {
            return None;
        }
        Some(self.base_path.join(relative))
    }
}

/// Relative location of a session snapshot:
/// `spider/group_path/sub_folder/filename`, with an empty sub-folder omitted.
pub fn snapshot_relative_path(
    spider_name: &str,
    group_path: &str,
    sub_folder: &str,
    filename: &str,
) -> String {
    [spider_name, group_path, sub_folder, filename]
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_file(path: &Path, content: &[u8]) -> std::io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    std::path::absolute(path)
}
