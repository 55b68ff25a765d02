//! Shared, atomically swappable access to the current index.
//!
//! Readers take a cheap `Arc` snapshot and never block a rebuild; a
//! rebuild constructs the new index off to the side and swaps the
//! reference in one write-lock window. A failed rebuild leaves the prior
//! index untouched.

use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::{BuildReport, DictError, DictionaryIndex};

/// Handle to the live dictionary index, if one has been built.
#[derive(Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<DictionaryIndex>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once a build has succeeded at least once.
    pub fn ready(&self) -> bool {
        self.current
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Snapshot of the current index. `None` while the first build is
    /// pending or has never succeeded.
    pub fn snapshot(&self) -> Option<Arc<DictionaryIndex>> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    /// Installs an already-built index.
    pub fn install(&self, index: DictionaryIndex) {
        if let Ok(mut guard) = self.current.write() {
            *guard = Some(Arc::new(index));
        }
    }

    /// Builds from `path` and swaps the result in.
    ///
    /// On failure the previous index (if any) remains served; callers can
    /// distinguish "no index at all" via [`ready`](Self::ready).
    pub async fn rebuild(
        &self,
        path: impl AsRef<Path>,
        sample_cap: usize,
    ) -> Result<BuildReport, DictError> {
        let index = DictionaryIndex::build_from(path, sample_cap).await?;
        let report = BuildReport {
            lines_processed: index.lines_processed(),
        };
        self.install(index);
        Ok(report)
    }
}
