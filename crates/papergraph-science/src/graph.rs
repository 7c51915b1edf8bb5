use std::collections::HashSet;
use std::sync::Arc;

use papergraph_core::{DedupKey, PaperRecord, PaperRegistry, UrlPatternTable};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::expand::{EdgeFetch, MetadataExpander};
use crate::pool::WorkerPool;
use crate::sources::MetadataApi;

/// Counts from one full graph build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphReport {
    pub seeds: usize,
    pub seeds_matched: usize,
    pub from_edges: usize,
    pub authors_queried: usize,
    pub from_authors: usize,
    pub patterns_learned: Vec<String>,
    /// Metadata calls that failed and were treated as empty.
    pub unavailable_calls: usize,
}

#[derive(Debug, Default)]
struct SeedOutcome {
    matched: Option<PaperRecord>,
    unavailable: usize,
}

/// Builds the deduplicated paper registry from seed titles.
pub struct GraphBuilder {
    api: Arc<dyn MetadataApi>,
    expander: MetadataExpander,
    pool: WorkerPool,
    include_authors: bool,
}

impl GraphBuilder {
    pub fn new(api: Arc<dyn MetadataApi>, pool: WorkerPool) -> Self {
        Self {
            expander: MetadataExpander::new(api.clone()),
            api,
            pool,
            include_authors: false,
        }
    }

    pub fn with_authors(mut self, include_authors: bool) -> Self {
        self.include_authors = include_authors;
        self
    }

    /// Search every seed, register exact-title matches with their citations
    /// and references, then optionally the seed authors' papers.
    ///
    /// Patterns learned along the way are written into `patterns`.
    pub async fn build(
        &self,
        seeds: &[String],
        patterns: &mut UrlPatternTable,
    ) -> (PaperRegistry, GraphReport) {
        let mut report = GraphReport {
            seeds: seeds.len(),
            ..Default::default()
        };

        let outcomes = self
            .pool
            .map(seeds, |title| self.match_seed(title))
            .await;

        let mut matched = Vec::new();
        for outcome in outcomes {
            report.unavailable_calls += outcome.unavailable;
            if let Some(paper) = outcome.matched {
                matched.push(paper);
            }
        }
        report.seeds_matched = matched.len();

        for seed in &matched {
            if let Some(namespace) = patterns.learn_from_paper(seed) {
                report.patterns_learned.push(namespace);
            }
        }

        let mut registry = PaperRegistry::new();
        let mut registered_seeds = Vec::new();
        for seed in &matched {
            if registry.insert_if_absent(seed.clone()).is_some() {
                registered_seeds.push(seed);
            }
        }

        for seed in &matched {
            let citing = seed.citations.iter().flatten().map(|e| &e.citing_paper);
            let cited = seed.references.iter().flatten().map(|e| &e.cited_paper);
            for related in citing.chain(cited) {
                if admit(&mut registry, patterns, related, &mut report) {
                    report.from_edges += 1;
                }
            }
        }

        if self.include_authors {
            let author_ids = distinct_author_ids(&registered_seeds);
            report.authors_queried = author_ids.len();
            let fetched = self
                .pool
                .map(author_ids, |author_id| self.author_papers(author_id))
                .await;
            for papers in fetched {
                match papers {
                    Some(papers) => {
                        for paper in &papers {
                            if admit(&mut registry, patterns, paper, &mut report) {
                                report.from_authors += 1;
                            }
                        }
                    }
                    None => report.unavailable_calls += 1,
                }
            }
        }

        info!(
            seeds = report.seeds,
            matched = report.seeds_matched,
            from_edges = report.from_edges,
            from_authors = report.from_authors,
            papers = registry.len(),
            patterns = patterns.len(),
            unavailable = report.unavailable_calls,
            "graph built"
        );
        (registry, report)
    }

    async fn match_seed(&self, title: &str) -> SeedOutcome {
        let mut outcome = SeedOutcome::default();
        let wanted = DedupKey::from_title(title);
        if wanted.is_empty() {
            debug!(title, "seed title has no searchable characters");
            return outcome;
        }

        let results = match self.api.search(title).await {
            Ok(results) => results,
            Err(e) => {
                warn!(title, source = self.api.name(), error = %e, "seed search unavailable");
                outcome.unavailable += 1;
                return outcome;
            }
        };

        let Some(mut paper) = results.into_iter().find(|p| p.dedup_key() == wanted) else {
            debug!(title, "no exact title match on first result page");
            return outcome;
        };

        if self.expander.expand_citations(&mut paper).await == EdgeFetch::Unavailable {
            outcome.unavailable += 1;
        }
        if self.expander.expand_references(&mut paper).await == EdgeFetch::Unavailable {
            outcome.unavailable += 1;
        }
        outcome.matched = Some(paper);
        outcome
    }

    async fn author_papers(&self, author_id: String) -> Option<Vec<PaperRecord>> {
        match self.api.papers_of(&author_id).await {
            Ok(papers) => {
                debug!(author_id = %author_id, count = papers.len(), "fetched author papers");
                Some(papers)
            }
            Err(e) => {
                warn!(author_id = %author_id, source = self.api.name(), error = %e, "author papers unavailable");
                None
            }
        }
    }
}

/// Infer a pattern from and register a not-yet-seen paper.
fn admit(
    registry: &mut PaperRegistry,
    patterns: &mut UrlPatternTable,
    paper: &PaperRecord,
    report: &mut GraphReport,
) -> bool {
    let key = paper.dedup_key();
    if key.is_empty() || registry.contains(key.as_str()) {
        return false;
    }
    if let Some(namespace) = patterns.learn_from_paper(paper) {
        report.patterns_learned.push(namespace);
    }
    registry.insert_if_absent(paper.clone()).is_some()
}

fn distinct_author_ids(papers: &[&PaperRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    papers
        .iter()
        .flat_map(|paper| paper.author_ids())
        .filter(|id| seen.insert(id.to_string()))
        .map(ToOwned::to_owned)
        .collect()
}
