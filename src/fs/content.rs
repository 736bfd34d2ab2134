//! Access to the documents being tracked. Everything inside wordwhen refers to documents by
//! vault relative paths using `/` as a separator, [FsContentProvider] is the only place that maps
//! them back onto the disk.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Provides full text of a tracked document.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn read_text(&self, path: &str) -> Result<String>;
}

pub struct FsContentProvider {
    vault: PathBuf,
}

impl FsContentProvider {
    pub fn new(vault: PathBuf) -> Self {
        Self { vault }
    }
}

#[async_trait]
impl ContentProvider for FsContentProvider {
    async fn read_text(&self, path: &str) -> Result<String> {
        let full_path = self.vault.join(path);
        tokio::fs::read_to_string(&full_path)
            .await
            .with_context(|| format!("Failed to read {full_path:?}"))
    }
}

/// Converts an absolute path reported by the file system into a vault relative one. Returns
/// `None` for anything outside the vault or for paths that can't be represented as utf-8.
pub fn vault_relative(vault: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(vault).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            _ => return None,
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}
