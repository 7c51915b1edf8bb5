use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use papergraph_core::{DedupKey, PaperRecord, PaperRegistry, UrlPatternTable};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pool::WorkerPool;
use crate::transport::Transport;

/// One download target for an entry. `tag` keeps attempts from different
/// sources apart on disk; the paper's own URL has an empty tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub tag: String,
}

/// Ordered candidates: the paper's own open-access URL, then one URL per
/// external identifier whose namespace has a learned pattern.
pub fn candidates(paper: &PaperRecord, patterns: &UrlPatternTable) -> Vec<Candidate> {
    let own = paper.open_access_url().map(|url| Candidate {
        url: url.to_string(),
        tag: String::new(),
    });
    let derived = paper.external_ids.iter().filter_map(|(namespace, id)| {
        patterns.get(namespace).map(|pattern| Candidate {
            url: pattern.apply(id),
            tag: format!("_{namespace}"),
        })
    });
    own.into_iter().chain(derived).collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AcquisitionReport {
    /// Entries skipped because the resumption set already lists them.
    pub already_acquired: usize,
    pub attempted: usize,
    pub acquired: Vec<DedupKey>,
    /// Entries with every candidate exhausted; removed from the registry.
    pub failed: Vec<DedupKey>,
}

/// Downloads one PDF per registry entry into `download_dir/{key}.pdf`.
pub struct Acquirer {
    transport: Arc<dyn Transport>,
    download_dir: PathBuf,
    pool: WorkerPool,
}

impl Acquirer {
    pub fn new(transport: Arc<dyn Transport>, download_dir: impl Into<PathBuf>, pool: WorkerPool) -> Self {
        Self {
            transport,
            download_dir: download_dir.into(),
            pool,
        }
    }

    pub fn canonical_path(&self, key: &DedupKey) -> PathBuf {
        self.download_dir.join(format!("{key}.pdf"))
    }

    fn candidate_path(&self, key: &DedupKey, tag: &str) -> PathBuf {
        self.download_dir.join(format!("{key}.pdf{tag}"))
    }

    /// Acquire every entry not in `already_acquired`, then drop the entries
    /// that could not be acquired from `registry`.
    pub async fn acquire(
        &self,
        registry: &mut PaperRegistry,
        already_acquired: Option<&HashSet<DedupKey>>,
        patterns: &UrlPatternTable,
    ) -> Result<AcquisitionReport> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let mut report = AcquisitionReport::default();
        let mut pending = Vec::new();
        for (key, paper) in registry.iter() {
            if already_acquired.is_some_and(|done| done.contains(key)) {
                report.already_acquired += 1;
            } else {
                pending.push((key.clone(), paper.clone()));
            }
        }
        report.attempted = pending.len();
        info!(
            to_download = pending.len(),
            already_acquired = report.already_acquired,
            "acquisition started"
        );

        let outcomes = self
            .pool
            .map(pending, |(key, paper)| async move {
                let acquired = self.acquire_entry(&key, &paper, patterns).await;
                (key, acquired)
            })
            .await;

        for (key, acquired) in outcomes {
            match acquired {
                Some(_) => report.acquired.push(key),
                None => report.failed.push(key),
            }
        }
        for key in &report.failed {
            debug!(key = %key, "dropping unacquirable paper");
            registry.remove(key.as_str());
        }

        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "papers could not be acquired and were removed");
        }
        info!(
            acquired = report.acquired.len(),
            failed = report.failed.len(),
            remaining = registry.len(),
            "acquisition finished"
        );
        Ok(report)
    }

    /// Try candidates in order until one downloads; later ones are skipped.
    /// Returns the canonical path on success. Leaves no file behind on failure.
    pub async fn acquire_entry(
        &self,
        key: &DedupKey,
        paper: &PaperRecord,
        patterns: &UrlPatternTable,
    ) -> Option<PathBuf> {
        let canonical = self.canonical_path(key);
        for candidate in candidates(paper, patterns) {
            let path = self.candidate_path(key, &candidate.tag);
            debug!(key = %key, url = %candidate.url, "downloading");
            if let Err(e) = self.transport.download(&candidate.url, &path).await {
                debug!(key = %key, url = %candidate.url, error = %e, "candidate failed");
                remove_partial(&path).await;
                continue;
            }
            if path != canonical
                && let Err(e) = tokio::fs::rename(&path, &canonical).await
            {
                warn!(key = %key, path = %path.display(), error = %e, "could not move download into place");
                remove_partial(&path).await;
                continue;
            }
            debug!(key = %key, url = %candidate.url, "acquired");
            return Some(canonical);
        }
        None
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial download"),
    }
}
