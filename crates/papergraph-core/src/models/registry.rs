use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DedupKey, PaperRecord};

/// Deduplicated papers keyed by normalized title. First-seen wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperRegistry {
    papers: BTreeMap<DedupKey, PaperRecord>,
}

impl PaperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `paper` under its own key unless that key is already taken.
    /// Returns the key when the paper was admitted.
    pub fn insert_if_absent(&mut self, paper: PaperRecord) -> Option<DedupKey> {
        let key = paper.dedup_key();
        if self.papers.contains_key(&key) {
            return None;
        }
        self.papers.insert(key.clone(), paper);
        Some(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.papers.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&PaperRecord> {
        self.papers.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PaperRecord> {
        self.papers.remove(key)
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DedupKey> {
        self.papers.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DedupKey, &PaperRecord)> {
        self.papers.iter()
    }

    /// Key set snapshot used for closure filtering.
    pub fn key_set(&self) -> std::collections::HashSet<DedupKey> {
        self.papers.keys().cloned().collect()
    }
}

impl IntoIterator for PaperRegistry {
    type Item = (DedupKey, PaperRecord);
    type IntoIter = std::collections::btree_map::IntoIter<DedupKey, PaperRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.papers.into_iter()
    }
}

/// Rebuild from entries taken out of a registry, keeping their keys as stored.
impl FromIterator<(DedupKey, PaperRecord)> for PaperRegistry {
    fn from_iter<I: IntoIterator<Item = (DedupKey, PaperRecord)>>(iter: I) -> Self {
        Self {
            papers: iter.into_iter().collect(),
        }
    }
}
