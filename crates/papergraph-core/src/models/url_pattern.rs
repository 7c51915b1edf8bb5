use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::paper::{DOI_NAMESPACE, PaperRecord};

/// `prefix + identifier + suffix` rebuilds a download URL for a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct UrlPattern {
    pub prefix: String,
    pub suffix: String,
}

impl UrlPattern {
    /// Split `observed_url` around `identifier`. Only an identifier that
    /// occurs exactly once (overlapping occurrences included) yields a pattern.
    pub fn infer(identifier: &str, observed_url: &str) -> Option<Self> {
        if identifier.is_empty() {
            return None;
        }
        let start = observed_url.find(identifier)?;
        if observed_url.rfind(identifier) != Some(start) {
            return None;
        }
        Some(Self {
            prefix: observed_url[..start].to_string(),
            suffix: observed_url[start + identifier.len()..].to_string(),
        })
    }

    pub fn apply(&self, identifier: &str) -> String {
        format!("{}{identifier}{}", self.prefix, self.suffix)
    }
}

impl From<(String, String)> for UrlPattern {
    fn from((prefix, suffix): (String, String)) -> Self {
        Self { prefix, suffix }
    }
}

impl From<UrlPattern> for (String, String) {
    fn from(pattern: UrlPattern) -> Self {
        (pattern.prefix, pattern.suffix)
    }
}

/// Learned patterns per external-identifier namespace. Write-once per namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlPatternTable {
    patterns: BTreeMap<String, UrlPattern>,
}

impl UrlPatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str) -> Option<&UrlPattern> {
        self.patterns.get(namespace)
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.patterns.contains_key(namespace)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UrlPattern)> {
        self.patterns.iter()
    }

    /// Try to learn a pattern for `namespace` from one observation.
    ///
    /// Skipped for DOI and for namespaces that already have a pattern.
    /// Returns `true` only when a new pattern was stored.
    pub fn learn(&mut self, namespace: &str, identifier: &str, observed_url: &str) -> bool {
        if namespace == DOI_NAMESPACE || self.patterns.contains_key(namespace) {
            return false;
        }
        match UrlPattern::infer(identifier, observed_url) {
            Some(pattern) => {
                debug!(namespace, prefix = %pattern.prefix, suffix = %pattern.suffix, "learned url pattern");
                self.patterns.insert(namespace.to_string(), pattern);
                true
            }
            None => false,
        }
    }

    /// Learn from a paper's open-access URL, trying its identifiers in order
    /// until one yields a new pattern. Returns the namespace that was learned.
    pub fn learn_from_paper(&mut self, paper: &PaperRecord) -> Option<String> {
        let url = paper.open_access_url()?;
        paper
            .external_ids
            .iter()
            .find(|(namespace, id)| self.learn(namespace, id, url))
            .map(|(namespace, _)| namespace.clone())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::models::OpenAccessPdf;

    fn paper_with(url: &str, ids: &[(&str, &str)]) -> PaperRecord {
        let mut paper = PaperRecord::new("Some Paper");
        paper.open_access_pdf = Some(OpenAccessPdf {
            url: Some(url.to_string()),
            ..Default::default()
        });
        paper.external_ids = ids
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        paper
    }

    #[test]
    fn test_infer_single_occurrence() {
        let url = "https://arxiv.org/pdf/1706.03762.pdf";
        let pattern = UrlPattern::infer("1706.03762", url).unwrap();
        assert_eq!(pattern.prefix, "https://arxiv.org/pdf/");
        assert_eq!(pattern.suffix, ".pdf");
        assert_eq!(pattern.apply("1706.03762"), url);
        assert_eq!(pattern.apply("1512.03385"), "https://arxiv.org/pdf/1512.03385.pdf");
    }

    #[test]
    fn test_infer_rejects_zero_or_many_occurrences() {
        assert!(UrlPattern::infer("9999.99999", "https://arxiv.org/pdf/1706.03762.pdf").is_none());
        assert!(UrlPattern::infer("123", "https://host/123/paper-123.pdf").is_none());
        assert!(UrlPattern::infer("", "https://host/paper.pdf").is_none());
        // Overlapping hits make the split ambiguous too.
        assert!(UrlPattern::infer("aa", "https://host/aaa.pdf").is_none());
    }

    #[test]
    fn test_infer_at_url_edges() {
        let pattern = UrlPattern::infer("abc", "abc").unwrap();
        assert_eq!(pattern.prefix, "");
        assert_eq!(pattern.suffix, "");
    }

    #[test]
    fn test_learn_skips_doi() {
        let mut table = UrlPatternTable::new();
        assert!(!table.learn("DOI", "10.1000/xyz", "https://doi.org/10.1000/xyz"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_learn_is_write_once() {
        let mut table = UrlPatternTable::new();
        assert!(table.learn("ArXiv", "1706.03762", "https://arxiv.org/pdf/1706.03762.pdf"));
        assert!(!table.learn("ArXiv", "1512.03385", "https://export.arxiv.org/pdf/1512.03385"));
        assert_eq!(table.get("ArXiv").unwrap().prefix, "https://arxiv.org/pdf/");
    }

    #[test]
    fn test_learn_from_paper_stops_after_first_success() {
        let mut table = UrlPatternTable::new();
        let paper = paper_with(
            "https://www.aclweb.org/anthology/P19-1001.pdf?id=P19-1001&corpus=42",
            &[("ACL", "P19-1001"), ("CorpusId", "42"), ("DOI", "10.18653/v1/P19-1001")],
        );
        // ACL appears twice, so the next identifier is tried.
        assert_eq!(table.learn_from_paper(&paper).as_deref(), Some("CorpusId"));
        assert!(!table.contains("ACL"));
        assert!(!table.contains("DOI"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_learn_from_paper_without_url() {
        let mut table = UrlPatternTable::new();
        let mut paper = paper_with("https://arxiv.org/pdf/1706.03762.pdf", &[("ArXiv", "1706.03762")]);
        paper.open_access_pdf = None;
        assert!(table.learn_from_paper(&paper).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_table_serializes_as_pairs() {
        let mut table = UrlPatternTable::new();
        table.learn("ArXiv", "1706.03762", "https://arxiv.org/pdf/1706.03762.pdf");
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json, serde_json::json!({"ArXiv": ["https://arxiv.org/pdf/", ".pdf"]}));
        let back: UrlPatternTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }

    proptest! {
        #[test]
        fn infer_succeeds_iff_identifier_occurs_once(identifier in "[ab]{1,3}", url in "[ab/.]{0,16}") {
            let inferred = UrlPattern::infer(&identifier, &url);
            let occurrences = (0..url.len()).filter(|&i| url[i..].starts_with(&identifier)).count();
            prop_assert_eq!(inferred.is_some(), occurrences == 1);
            if let Some(pattern) = inferred {
                prop_assert_eq!(pattern.apply(&identifier), url);
            }
        }

        #[test]
        fn inferred_pattern_rebuilds_observed_url(
            prefix in "https://[a-z]{1,10}\\.org/[a-z/]{0,10}",
            identifier in "[0-9]{4}\\.[0-9]{5}",
            suffix in "(\\.pdf)?(\\?download=1)?",
        ) {
            let url = format!("{prefix}{identifier}{suffix}");
            let pattern = UrlPattern::infer(&identifier, &url).unwrap();
            prop_assert_eq!(&pattern.prefix, &prefix);
            prop_assert_eq!(&pattern.suffix, &suffix);
            prop_assert_eq!(pattern.apply(&identifier), url);
        }
    }
}
