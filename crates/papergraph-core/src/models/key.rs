use std::borrow::Borrow;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static NON_ALNUM_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

const SEPARATOR: &str = "_";

/// Canonicalize a title into the string used as its registry key.
///
/// NFKD decomposition with combining marks dropped, lower-cased, and every run
/// of characters outside `[a-z0-9]` collapsed to a single `_`. Leading and
/// trailing separators are trimmed so trailing punctuation does not matter.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    NON_ALNUM_RUN
        .replace_all(&folded, SEPARATOR)
        .trim_matches('_')
        .to_string()
}

/// Identity of a paper inside a [`PaperRegistry`](super::PaperRegistry).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn from_title(title: &str) -> Self {
        Self(normalize_title(title))
    }

    /// Wrap an already-normalized key, e.g. a line from a resumption list.
    pub fn from_normalized(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DedupKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_normalize_basic_title() {
        assert_eq!(
            normalize_title("Attention Is All You Need"),
            "attention_is_all_you_need"
        );
    }

    #[test]
    fn test_normalize_ignores_punctuation_and_case() {
        assert_eq!(normalize_title("Foo-Bar!"), normalize_title("foo bar"));
        assert_eq!(normalize_title("  BERT: Pre-training  "), "bert_pre_training");
    }

    #[test]
    fn test_normalize_strips_accents() {
        assert_eq!(normalize_title("Café Résumé"), normalize_title("cafe resume"));
        assert_eq!(normalize_title("Gödel, Escher, Bach"), "godel_escher_bach");
    }

    #[test]
    fn test_normalize_compatibility_forms() {
        // Fullwidth letters and the "ﬁ" ligature fold to plain ASCII.
        assert_eq!(normalize_title("ＢＥＲＴ"), "bert");
        assert_eq!(normalize_title("Eﬃcient ﬁne-tuning"), "efficient_fine_tuning");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for title in [
            "Attention Is All You Need",
            "Foo-Bar!",
            "  --Deep   Residual__Learning-- ",
            "Ünïcödé ＴＥＸＴ ½",
            "",
            "!!!",
            "日本語のタイトル",
        ] {
            let once = normalize_title(title);
            assert_eq!(normalize_title(&once), once, "not idempotent for {title:?}");
        }
    }

    #[test]
    fn test_normalize_without_alphanumerics_is_empty() {
        assert_eq!(normalize_title("?!-- ..."), "");
        assert!(DedupKey::from_title("---").is_empty());
    }

    #[test]
    fn test_dedup_key_display_and_borrow() {
        let key = DedupKey::from_title("Deep Residual Learning");
        assert_eq!(key.to_string(), "deep_residual_learning");
        let set: std::collections::HashSet<DedupKey> = [key.clone()].into_iter().collect();
        assert!(set.contains("deep_residual_learning"));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent_for_any_title(title in any::<String>()) {
            let once = normalize_title(&title);
            prop_assert_eq!(normalize_title(&once), once);
        }

        #[test]
        fn normalized_keys_are_separator_joined_alphanumerics(title in "\\PC{0,60}") {
            let key = normalize_title(&title);
            prop_assert!(key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
            prop_assert!(!key.starts_with('_') && !key.ends_with('_'));
            prop_assert!(!key.contains("__"));
        }

        #[test]
        fn case_and_punctuation_do_not_change_the_key(
            words in prop::collection::vec("[a-zA-Z0-9]{1,8}", 1..6),
            separators in prop::collection::vec("[ ,.;:!?()'\"-]{1,3}", 6),
        ) {
            let spaced = words.join(" ");
            let mut noisy = String::new();
            for (word, sep) in words.iter().zip(&separators) {
                noisy.push_str(&word.to_uppercase());
                noisy.push_str(sep);
            }
            prop_assert_eq!(normalize_title(&noisy), normalize_title(&spaced.to_lowercase()));
        }
    }
}
