use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::serde_util::{external_ids, null_as_default};
use super::{AuthorRecord, DedupKey};

/// Namespace excluded from URL pattern inference.
pub const DOI_NAMESPACE: &str = "DOI";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAccessPdf {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A paper as returned by the metadata API, plus lazily fetched edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    #[serde(default)]
    pub paper_id: Option<String>,

    #[serde(default, deserialize_with = "external_ids")]
    pub external_ids: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default)]
    pub venue: Option<String>,

    #[serde(default)]
    pub open_access_pdf: Option<OpenAccessPdf>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub fields_of_study: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<AuthorRecord>,

    /// `None` until fetched; once `Some`, never fetched again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<CitationEdge>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<ReferenceEdge>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaperRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::from_title(&self.title)
    }

    /// The paper's own open-access PDF URL, if it carries a usable one.
    pub fn open_access_url(&self) -> Option<&str> {
        self.open_access_pdf
            .as_ref()
            .and_then(|pdf| pdf.url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Author ids in listing order, skipping anonymous entries.
    pub fn author_ids(&self) -> impl Iterator<Item = &str> {
        self.authors
            .iter()
            .filter_map(|a| a.author_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// Common access to the related paper of a citation or reference edge.
pub trait RelatedPaper {
    fn related(&self) -> &PaperRecord;

    fn related_key(&self) -> DedupKey {
        self.related().dedup_key()
    }
}

/// A paper citing the owner of the edge list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationEdge {
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub intents: Vec<String>,

    #[serde(default)]
    pub citing_paper: PaperRecord,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RelatedPaper for CitationEdge {
    fn related(&self) -> &PaperRecord {
        &self.citing_paper
    }
}

/// A paper cited by the owner of the edge list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEdge {
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub intents: Vec<String>,

    #[serde(default)]
    pub cited_paper: PaperRecord,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RelatedPaper for ReferenceEdge {
    fn related(&self) -> &PaperRecord {
        &self.cited_paper
    }
}
