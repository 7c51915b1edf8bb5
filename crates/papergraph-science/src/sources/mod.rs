use async_trait::async_trait;
use papergraph_core::{CitationEdge, PaperRecord, ReferenceEdge};

use crate::error::Result;

/// Remote paper metadata capability. Every call may fail; callers decide how
/// to degrade.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    fn name(&self) -> &str;

    /// First page of search results for a free-text title query.
    async fn search(&self, title: &str) -> Result<Vec<PaperRecord>>;

    async fn citations_of(&self, paper_id: &str) -> Result<Vec<CitationEdge>>;

    async fn references_of(&self, paper_id: &str) -> Result<Vec<ReferenceEdge>>;

    async fn papers_of(&self, author_id: &str) -> Result<Vec<PaperRecord>>;
}

pub mod semantic_scholar;
