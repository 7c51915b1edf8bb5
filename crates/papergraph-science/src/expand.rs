use std::collections::HashSet;
use std::sync::Arc;

use papergraph_core::{DedupKey, PaperRecord, RelatedPaper};
use tracing::{debug, warn};

use crate::sources::MetadataApi;

/// What happened to one edge collection during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFetch {
    /// Already populated, no call made.
    Present,
    Fetched,
    /// The call failed; the collection was set to empty.
    Unavailable,
}

/// Fills in a paper's `citations`/`references` from the metadata API.
#[derive(Clone)]
pub struct MetadataExpander {
    api: Arc<dyn MetadataApi>,
}

impl MetadataExpander {
    pub fn new(api: Arc<dyn MetadataApi>) -> Self {
        Self { api }
    }

    pub async fn expand_citations(&self, paper: &mut PaperRecord) -> EdgeFetch {
        if paper.citations.is_some() {
            return EdgeFetch::Present;
        }
        let Some(paper_id) = paper.paper_id.clone() else {
            warn!(title = %paper.title, "no paperId, citations unavailable");
            paper.citations = Some(Vec::new());
            return EdgeFetch::Unavailable;
        };
        match self.api.citations_of(&paper_id).await {
            Ok(edges) => {
                debug!(paper_id = %paper_id, count = edges.len(), "fetched citations");
                paper.citations = Some(edges);
                EdgeFetch::Fetched
            }
            Err(e) => {
                warn!(paper_id = %paper_id, source = self.api.name(), error = %e, "citations unavailable");
                paper.citations = Some(Vec::new());
                EdgeFetch::Unavailable
            }
        }
    }

    pub async fn expand_references(&self, paper: &mut PaperRecord) -> EdgeFetch {
        if paper.references.is_some() {
            return EdgeFetch::Present;
        }
        let Some(paper_id) = paper.paper_id.clone() else {
            warn!(title = %paper.title, "no paperId, references unavailable");
            paper.references = Some(Vec::new());
            return EdgeFetch::Unavailable;
        };
        match self.api.references_of(&paper_id).await {
            Ok(edges) => {
                debug!(paper_id = %paper_id, count = edges.len(), "fetched references");
                paper.references = Some(edges);
                EdgeFetch::Fetched
            }
            Err(e) => {
                warn!(paper_id = %paper_id, source = self.api.name(), error = %e, "references unavailable");
                paper.references = Some(Vec::new());
                EdgeFetch::Unavailable
            }
        }
    }

    /// Expand citations, then drop every edge whose related paper is not in `keys`.
    pub async fn expand_citations_within(
        &self,
        paper: &mut PaperRecord,
        keys: &HashSet<DedupKey>,
    ) -> EdgeFetch {
        let outcome = self.expand_citations(paper).await;
        if let Some(edges) = paper.citations.as_mut() {
            retain_registered(edges, keys);
        }
        outcome
    }

    pub async fn expand_references_within(
        &self,
        paper: &mut PaperRecord,
        keys: &HashSet<DedupKey>,
    ) -> EdgeFetch {
        let outcome = self.expand_references(paper).await;
        if let Some(edges) = paper.references.as_mut() {
            retain_registered(edges, keys);
        }
        outcome
    }
}

fn retain_registered<E: RelatedPaper>(edges: &mut Vec<E>, keys: &HashSet<DedupKey>) {
    edges.retain(|edge| keys.contains(&edge.related_key()));
}
