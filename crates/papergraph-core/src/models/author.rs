use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::PaperRegistry;
use super::serde_util::null_as_default;

/// An author as listed on a paper or returned by the author endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRecord {
    #[serde(default)]
    pub author_id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub affiliations: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h_index: Option<u32>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authors keyed by `authorId`, derived from a [`PaperRegistry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorRegistry {
    authors: BTreeMap<String, AuthorRecord>,
}

impl AuthorRegistry {
    /// Collect every author with an id from the registry's author lists.
    /// A later occurrence of the same id replaces the earlier one.
    pub fn from_papers(registry: &PaperRegistry) -> Self {
        let mut authors = BTreeMap::new();
        for (_, paper) in registry.iter() {
            for author in &paper.authors {
                if let Some(id) = author.author_id.as_deref().filter(|id| !id.is_empty()) {
                    authors.insert(id.to_string(), author.clone());
                }
            }
        }
        Self { authors }
    }

    pub fn get(&self, author_id: &str) -> Option<&AuthorRecord> {
        self.authors.get(author_id)
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AuthorRecord)> {
        self.authors.iter()
    }
}
