use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use papergraph_core::storage::state::{load_key_list, load_seed_titles};
use papergraph_core::{AuthorRegistry, DedupKey, HarvestConfig, PaperRegistry, StateStore};
use serde::Serialize;
use tracing::info;

use crate::acquire::{Acquirer, AcquisitionReport};
use crate::error::Result;
use crate::expand::{EdgeFetch, MetadataExpander};
use crate::graph::{GraphBuilder, GraphReport};
use crate::pool::WorkerPool;
use crate::sources::MetadataApi;
use crate::sources::semantic_scholar::SemanticScholarSource;
use crate::transport::{FallbackTransport, HttpTransport, Transport};

/// Switches for one run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Also register papers by the seed papers' authors.
    pub include_authors: bool,
    /// Resumption list of keys already acquired by an earlier run.
    pub crawled: Option<PathBuf>,
    pub download: bool,
    pub workers: usize,
    /// Fall back to the SOCKS relay when a direct download fails.
    pub proxy: bool,
    /// Rebuild the graph even if a registry is already persisted.
    pub redo: bool,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            include_authors: false,
            crawled: None,
            download: false,
            workers: 16,
            proxy: false,
            redo: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestReport {
    pub rebuilt: bool,
    pub graph: Option<GraphReport>,
    pub acquisition: Option<AcquisitionReport>,
    /// Edge fetches in the closure pass that failed and were treated as empty.
    pub closure_unavailable: usize,
    pub papers: usize,
    pub authors: usize,
    pub url_patterns: usize,
}

/// Runs graph build, acquisition, closure filtering and author extraction,
/// persisting state after each phase.
pub struct Harvester {
    api: Arc<dyn MetadataApi>,
    transport: Arc<dyn Transport>,
    store: StateStore,
    seed_titles: PathBuf,
    download_dir: PathBuf,
}

impl Harvester {
    pub fn new(
        api: Arc<dyn MetadataApi>,
        transport: Arc<dyn Transport>,
        store: StateStore,
        seed_titles: impl Into<PathBuf>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api,
            transport,
            store,
            seed_titles: seed_titles.into(),
            download_dir: download_dir.into(),
        }
    }

    /// Semantic Scholar plus HTTP transport, with the relay route when `proxy` is set.
    pub fn from_config(config: &HarvestConfig, options: &HarvestOptions) -> Result<Self> {
        let api: Arc<dyn MetadataApi> = Arc::new(SemanticScholarSource::from_config(config)?);
        let direct: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(config)?);
        let transport: Arc<dyn Transport> = if options.proxy {
            let relay = Arc::new(HttpTransport::relay_from_config(config)?);
            Arc::new(FallbackTransport::new(direct, relay))
        } else {
            direct
        };
        Ok(Self::new(
            api,
            transport,
            StateStore::new(config.state_dir()),
            config.seed_titles_path(),
            config.download_dir(),
        ))
    }

    pub async fn run(&self, options: &HarvestOptions) -> Result<HarvestReport> {
        let pool = WorkerPool::new(options.workers);
        let mut report = HarvestReport::default();
        let mut patterns = self.store.load_url_patterns()?;

        let mut registry = if options.redo || !self.store.has_papers() {
            let seeds = load_seed_titles(&self.seed_titles)?;
            let builder =
                GraphBuilder::new(self.api.clone(), pool).with_authors(options.include_authors);
            let (registry, graph) = builder.build(&seeds, &mut patterns).await;
            self.store.save_papers(&registry)?;
            self.store.save_url_patterns(&patterns)?;
            report.rebuilt = true;
            report.graph = Some(graph);
            registry
        } else {
            self.store.load_papers()?
        };
        info!(papers = registry.len(), "paper registry ready");

        if options.download {
            let crawled = match &options.crawled {
                Some(path) => {
                    let keys = load_key_list(path)?;
                    info!(crawled = keys.len(), "papers already crawled");
                    Some(keys)
                }
                None => None,
            };
            self.store.save_url_patterns(&patterns)?;
            let acquirer = Acquirer::new(self.transport.clone(), &self.download_dir, pool);
            let acquisition = acquirer
                .acquire(&mut registry, crawled.as_ref(), &patterns)
                .await?;
            self.store.save_papers(&registry)?;
            info!(papers = registry.len(), "paper registry after download");
            report.acquisition = Some(acquisition);
        }

        let keys = registry.key_set();
        for edges in [Edges::Citations, Edges::References] {
            let (closed, unavailable) = self.close_edges(registry, &keys, edges, pool).await;
            registry = closed;
            report.closure_unavailable += unavailable;
            self.store.save_papers(&registry)?;
        }

        let authors = AuthorRegistry::from_papers(&registry);
        self.store.save_authors(&authors)?;
        info!(authors = authors.len(), "author registry written");

        report.papers = registry.len();
        report.authors = authors.len();
        report.url_patterns = patterns.len();
        Ok(report)
    }

    /// Fetch one edge kind for every entry and keep only edges pointing at
    /// `keys`. Entries stay under the keys they were stored with.
    async fn close_edges(
        &self,
        registry: PaperRegistry,
        keys: &HashSet<DedupKey>,
        edges: Edges,
        pool: WorkerPool,
    ) -> (PaperRegistry, usize) {
        let expander = &MetadataExpander::new(self.api.clone());
        let outcomes = pool
            .map(registry, |(key, mut paper)| async move {
                let fetched = match edges {
                    Edges::Citations => expander.expand_citations_within(&mut paper, keys).await,
                    Edges::References => expander.expand_references_within(&mut paper, keys).await,
                };
                (key, paper, fetched)
            })
            .await;

        let mut unavailable = 0;
        let registry: PaperRegistry = outcomes
            .into_iter()
            .map(|(key, paper, fetched)| {
                unavailable += usize::from(fetched == EdgeFetch::Unavailable);
                (key, paper)
            })
            .collect();
        info!(?edges, papers = registry.len(), unavailable, "closure pass filtered");
        (registry, unavailable)
    }
}

#[derive(Debug, Clone, Copy)]
enum Edges {
    Citations,
    References,
}

#[cfg(test)]
mod tests {
    use std::fs;

    use std::time::Duration;

    use async_trait::async_trait;
    use papergraph_core::{CitationEdge, PaperRecord, ReferenceEdge};
    use tempfile::TempDir;

    use super::*;
    use crate::acquire::tests::{Behaviour, FakeTransport, pdf_paper};
    use crate::error::Result;
    use crate::expand::tests::FakeApi;

    /// Answers every call with an empty list, except the edge kinds set to hang.
    struct StallingApi {
        stall_citations: bool,
    }

    #[async_trait]
    impl MetadataApi for StallingApi {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn search(&self, _title: &str) -> Result<Vec<PaperRecord>> {
            Ok(Vec::new())
        }

        async fn citations_of(&self, _paper_id: &str) -> Result<Vec<CitationEdge>> {
            if self.stall_citations {
                std::future::pending::<()>().await;
            }
            Ok(Vec::new())
        }

        async fn references_of(&self, _paper_id: &str) -> Result<Vec<ReferenceEdge>> {
            std::future::pending::<()>().await;
            Ok(Vec::new())
        }

        async fn papers_of(&self, _author_id: &str) -> Result<Vec<PaperRecord>> {
            Ok(Vec::new())
        }
    }

    /// Stored registry {good, bad} where only good.pdf downloads.
    fn interrupted_run(dir: &TempDir, stall_citations: bool) -> (Harvester, StateStore) {
        let store = StateStore::new(dir.path());
        let mut registry = PaperRegistry::new();
        registry.insert_if_absent(with_id(pdf_paper("Good", Some("https://x/good.pdf"), &[]), "g"));
        registry.insert_if_absent(with_id(pdf_paper("Bad", Some("https://x/bad.pdf"), &[]), "b"));
        store.save_papers(&registry).unwrap();

        let harvester = Harvester::new(
            Arc::new(StallingApi { stall_citations }),
            Arc::new(FakeTransport::with(&[("https://x/good.pdf", Behaviour::Succeed)])),
            store.clone(),
            dir.path().join("seed_titles.json"),
            dir.path().join("download"),
        );
        (harvester, store)
    }

    fn with_id(mut paper: PaperRecord, id: &str) -> PaperRecord {
        paper.paper_id = Some(id.to_string());
        paper
    }

    fn attention_api() -> FakeApi {
        let mut api = FakeApi::default();
        let seed = with_id(
            pdf_paper(
                "Attention Is All You Need",
                Some("https://arxiv.org/pdf/1706.03762.pdf"),
                &[("ArXiv", "1706.03762")],
            ),
            "s1",
        );
        api.search.insert("Attention Is All You Need".into(), vec![seed]);
        api.citations.insert(
            "s1".into(),
            vec![with_id(pdf_paper("Unreachable Paper", None, &[("DOI", "10.1/x")]), "u1")],
        );
        api.references.insert(
            "s1".into(),
            vec![with_id(pdf_paper("Deep Residual Learning", None, &[("ArXiv", "1512.03385")]), "r1")],
        );
        api
    }

    fn setup(dir: &TempDir) -> PathBuf {
        let seeds = dir.path().join("seed_titles.json");
        fs::write(&seeds, r#"["Attention Is All You Need"]"#).unwrap();
        seeds
    }

    #[tokio::test]
    async fn end_to_end_build_download_and_close() {
        let dir = TempDir::new().unwrap();
        let seeds = setup(&dir);
        let api = Arc::new(attention_api());
        let transport = Arc::new(FakeTransport::with(&[
            ("https://arxiv.org/pdf/1706.03762.pdf", Behaviour::Succeed),
            ("https://arxiv.org/pdf/1512.03385.pdf", Behaviour::Succeed),
        ]));
        let store = StateStore::new(dir.path().join("state"));
        let harvester = Harvester::new(
            api.clone(),
            transport.clone(),
            store.clone(),
            &seeds,
            dir.path().join("download"),
        );

        let options = HarvestOptions {
            download: true,
            workers: 4,
            ..Default::default()
        };
        let report = harvester.run(&options).await.unwrap();

        assert!(report.rebuilt);
        let patterns = store.load_url_patterns().unwrap();
        assert_eq!(
            patterns.get("ArXiv").unwrap().apply("1706.03762"),
            "https://arxiv.org/pdf/1706.03762.pdf"
        );

        let acquisition = report.acquisition.unwrap();
        assert_eq!(acquisition.acquired.len(), 2);
        assert_eq!(acquisition.failed.len(), 1);
        assert_eq!(acquisition.failed[0].as_str(), "unreachable_paper");

        let download = dir.path().join("download");
        assert!(download.join("attention_is_all_you_need.pdf").exists());
        assert!(download.join("deep_residual_learning.pdf").exists());
        assert!(!download.join("deep_residual_learning.pdf_ArXiv").exists());

        let registry = store.load_papers().unwrap();
        assert_eq!(report.papers, 2);
        assert_eq!(registry.len(), 2);
        let seed = registry.get("attention_is_all_you_need").unwrap();
        assert_eq!(seed.citations, Some(Vec::new()));
        let references = seed.references.as_ref().unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].cited_paper.title, "Deep Residual Learning");

        // r1 has no edges in the fake API: both closure fetches fail.
        let residual = registry.get("deep_residual_learning").unwrap();
        assert_eq!(residual.citations, Some(Vec::new()));
        assert_eq!(report.closure_unavailable, 2);
        assert!(store.authors_path().exists());
    }

    #[tokio::test]
    async fn rerun_with_resumption_list_downloads_nothing() {
        let dir = TempDir::new().unwrap();
        let seeds = setup(&dir);
        let api = Arc::new(attention_api());
        let transport = Arc::new(FakeTransport::with(&[
            ("https://arxiv.org/pdf/1706.03762.pdf", Behaviour::Succeed),
            ("https://arxiv.org/pdf/1512.03385.pdf", Behaviour::Succeed),
        ]));
        let store = StateStore::new(dir.path());
        let harvester = Harvester::new(
            api.clone(),
            transport.clone(),
            store,
            &seeds,
            dir.path().join("download"),
        );
        let options = HarvestOptions {
            download: true,
            workers: 2,
            ..Default::default()
        };
        let first = harvester.run(&options).await.unwrap();
        let attempts_after_first = transport.attempts().len();
        let searches_after_first = api.calls().iter().filter(|c| c.starts_with("search:")).count();

        let crawled = dir.path().join("crawled.txt");
        let lines: Vec<&str> = first
            .acquisition
            .as_ref()
            .unwrap()
            .acquired
            .iter()
            .map(|k| k.as_str())
            .collect();
        fs::write(&crawled, lines.join("\n")).unwrap();

        let second = harvester
            .run(&HarvestOptions {
                crawled: Some(crawled),
                ..options
            })
            .await
            .unwrap();

        assert!(!second.rebuilt);
        assert_eq!(second.acquisition.unwrap().attempted, 0);
        assert_eq!(transport.attempts().len(), attempts_after_first);
        assert_eq!(
            api.calls().iter().filter(|c| c.starts_with("search:")).count(),
            searches_after_first
        );
        assert_eq!(second.papers, 2);
    }

    #[tokio::test]
    async fn missing_seed_file_aborts_run() {
        let dir = TempDir::new().unwrap();
        let harvester = Harvester::new(
            Arc::new(FakeApi::default()),
            Arc::new(FakeTransport::default()),
            StateStore::new(dir.path()),
            dir.path().join("missing.json"),
            dir.path().join("download"),
        );
        assert!(harvester.run(&HarvestOptions::default()).await.is_err());
        assert!(!dir.path().join("all_papers.json").exists());
    }

    #[tokio::test]
    async fn pruned_registry_is_saved_before_closure_starts() {
        let dir = TempDir::new().unwrap();
        let (harvester, store) = interrupted_run(&dir, true);
        let options = HarvestOptions {
            download: true,
            ..Default::default()
        };

        let run = tokio::time::timeout(Duration::from_millis(500), harvester.run(&options)).await;
        assert!(run.is_err(), "closure pass should still be waiting");

        let saved = store.load_papers().unwrap();
        let keys: Vec<&str> = saved.keys().map(DedupKey::as_str).collect();
        assert_eq!(keys, vec!["good"]);
    }

    #[tokio::test]
    async fn citation_pass_is_saved_before_reference_pass() {
        let dir = TempDir::new().unwrap();
        let (harvester, store) = interrupted_run(&dir, false);

        let run = tokio::time::timeout(
            Duration::from_millis(500),
            harvester.run(&HarvestOptions::default()),
        )
        .await;
        assert!(run.is_err(), "reference pass should still be waiting");

        let saved = store.load_papers().unwrap();
        assert_eq!(saved.len(), 2);
        for (_, paper) in saved.iter() {
            assert_eq!(paper.citations, Some(Vec::new()));
            assert!(paper.references.is_none());
        }
    }

    #[tokio::test]
    async fn closure_keeps_entries_under_their_stored_keys() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        fs::write(
            store.papers_path(),
            r#"{"graph_networks": {"title": "Graph Networks"}, "graph_networks_": {"title": "Graph Networks"}}"#,
        )
        .unwrap();
        let harvester = Harvester::new(
            Arc::new(FakeApi::default()),
            Arc::new(FakeTransport::default()),
            store.clone(),
            dir.path().join("seed_titles.json"),
            dir.path().join("download"),
        );

        let report = harvester.run(&HarvestOptions::default()).await.unwrap();

        assert_eq!(report.papers, 2);
        let saved = store.load_papers().unwrap();
        assert!(saved.contains("graph_networks"));
        assert!(saved.contains("graph_networks_"));
    }
}
