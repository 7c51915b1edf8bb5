use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CoreError, Result};
use crate::models::{AuthorRegistry, DedupKey, PaperRegistry, UrlPatternTable};

pub const PAPERS_FILE: &str = "all_papers.json";
pub const AUTHORS_FILE: &str = "all_authors.json";
pub const URL_PATTERNS_FILE: &str = "url_patterns.json";

/// On-disk state shared between runs: `{state_dir}/{all_papers,url_patterns,all_authors}.json`.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn papers_path(&self) -> PathBuf {
        self.dir.join(PAPERS_FILE)
    }

    pub fn authors_path(&self) -> PathBuf {
        self.dir.join(AUTHORS_FILE)
    }

    pub fn url_patterns_path(&self) -> PathBuf {
        self.dir.join(URL_PATTERNS_FILE)
    }

    pub fn has_papers(&self) -> bool {
        self.papers_path().exists()
    }

    pub fn load_papers(&self) -> Result<PaperRegistry> {
        let path = self.papers_path();
        if !path.exists() {
            return Err(CoreError::StateNotFound(path.display().to_string()));
        }
        load_json(&path)
    }

    pub fn save_papers(&self, registry: &PaperRegistry) -> Result<PathBuf> {
        let path = self.papers_path();
        save_json(&path, registry)?;
        Ok(path)
    }

    /// A missing pattern file is an empty table.
    pub fn load_url_patterns(&self) -> Result<UrlPatternTable> {
        let path = self.url_patterns_path();
        if !path.exists() {
            return Ok(UrlPatternTable::new());
        }
        load_json(&path)
    }

    pub fn save_url_patterns(&self, table: &UrlPatternTable) -> Result<PathBuf> {
        let path = self.url_patterns_path();
        save_json(&path, table)?;
        Ok(path)
    }

    pub fn save_authors(&self, authors: &AuthorRegistry) -> Result<PathBuf> {
        let path = self.authors_path();
        save_json(&path, authors)?;
        Ok(path)
    }
}

/// Load seed titles from a JSON array of strings.
pub fn load_seed_titles(path: &Path) -> Result<Vec<String>> {
    load_json(path)
}

/// Load a resumption list: one key per line, blank lines ignored.
pub fn load_key_list(path: &Path) -> Result<HashSet<DedupKey>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(DedupKey::from_normalized)
        .collect())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write to a sibling temp file, then rename over the target.
fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
