//! Render targets: where the board markup ends up.
//!
//! A target receives the complete markup on every successful poll and
//! replaces whatever it held before. Nothing is appended or merged.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use pw_core::PwError;
use tokio::fs;
use tokio::sync::Mutex;

use crate::page::{host_page, replace_inner};

/// Destination for rendered board markup.
#[async_trait]
pub trait RenderTarget: Send + Sync {
    /// Short description for log lines.
    fn describe(&self) -> String;

    /// Replace the target's entire content with `markup`.
    async fn replace(&self, markup: &str) -> Result<(), PwError>;
}

/// In-process target holding the latest markup.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    content: RwLock<String>,
    writes: AtomicU64,
}

impl MemoryTarget {
    pub fn new(initial: impl Into<String>) -> Self {
        Self { content: RwLock::new(initial.into()), writes: AtomicU64::new(0) }
    }

    pub fn content(&self) -> String {
        self.content.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of successful replacements so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RenderTarget for MemoryTarget {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn replace(&self, markup: &str) -> Result<(), PwError> {
        let mut content = self.content.write().unwrap_or_else(PoisonError::into_inner);
        content.clear();
        content.push_str(markup);
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Element `id=<target_id>` inside an HTML page on disk.
///
/// A missing page is created from [`host_page`]. Writes go to a sibling temp
/// file that is then renamed over the page, so readers never see a
/// half-written file.
#[derive(Debug)]
pub struct PageFileTarget {
    path: PathBuf,
    target_id: String,
    title: String,
    // serializes read-modify-write when polls overlap
    lock: Mutex<()>,
}

impl PageFileTarget {
    pub fn new(path: impl Into<PathBuf>, target_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { path: path.into(), target_id: target_id.into(), title: title.into(), lock: Mutex::new(()) }
    }

    fn temp_path(&self) -> PathBuf {
        let name = self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

#[async_trait]
impl RenderTarget for PageFileTarget {
    fn describe(&self) -> String {
        format!("{}#{}", self.path.display(), self.target_id)
    }

    async fn replace(&self, markup: &str) -> Result<(), PwError> {
        let _guard = self.lock.lock().await;

        let page = match fs::read_to_string(&self.path).await {
            Ok(existing) => replace_inner(&existing, &self.target_id, markup)?,
            Err(e) if e.kind() == ErrorKind::NotFound => host_page(&self.title, &self.target_id, markup),
            Err(e) => return Err(PwError::Target(format!("reading {}: {e}", self.path.display()))),
        };

        let tmp = self.temp_path();
        fs::write(&tmp, page).await.map_err(|e| PwError::Target(format!("writing {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PwError::Target(format!("renaming onto {}: {e}", self.path.display())))?;
        Ok(())
    }
}
