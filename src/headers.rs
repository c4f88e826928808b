use std::collections::HashMap;

use crate::error::{MergeError, Result};
use crate::model::CellValue;

/// Reduces a raw header to its comparison form: trimmed, case-folded,
/// punctuation replaced by spaces, internal whitespace collapsed.
pub fn normalize(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut gap = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            if gap && !normalized.is_empty() {
                normalized.push(' ');
            }
            gap = false;
            normalized.extend(ch.to_lowercase());
        } else {
            gap = true;
        }
    }
    normalized
}

/// Matching policy. The default is strict: two headers name the same column
/// only when their normal forms are equal. An optional similarity floor in
/// `[0, 1]` widens the policy to normalized Levenshtein similarity, for
/// sources whose headers carry genuine typos.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatcherConfig {
    pub similarity_threshold: Option<f64>,
}

/// Decides whether two header strings refer to the same column.
///
/// `matches` is commutative by construction: both sides go through the same
/// normalization and the similarity measure is symmetric.
#[derive(Debug, Clone, Default)]
pub struct HeaderMatcher {
    config: MatcherConfig,
}

impl HeaderMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Strict matcher: equal normal forms only.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Matcher that additionally accepts pairs whose normalized Levenshtein
    /// similarity reaches `threshold`.
    pub fn with_threshold(threshold: f64) -> Self {
        Self::new(MatcherConfig {
            similarity_threshold: Some(threshold),
        })
    }

    pub fn matches(&self, a: &str, b: &str) -> bool {
        let left = normalize(a);
        let right = normalize(b);
        if left.is_empty() || right.is_empty() {
            return false;
        }
        if left == right {
            return true;
        }
        match self.config.similarity_threshold {
            Some(threshold) => strsim::normalized_levenshtein(&left, &right) >= threshold,
            None => false,
        }
    }
}

/// Fixed header-rename table applied before matching. Lookup keys are
/// normal forms; unmapped headers pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    entries: HashMap<String, String>,
}

impl AliasMap {
    /// Builds the map from `(alias, canonical)` pairs. Chained aliases (a
    /// canonical name that is itself an alias for a different name) are
    /// rejected so that `canonicalize` is idempotent.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries = HashMap::new();
        for (alias, canonical) in pairs {
            let key = normalize(&alias);
            if key.is_empty() {
                return Err(MergeError::InvalidAliasMap(format!(
                    "alias '{alias}' normalizes to nothing"
                )));
            }
            entries.insert(key, canonical);
        }
        for canonical in entries.values() {
            if let Some(target) = entries.get(&normalize(canonical)) {
                if target != canonical {
                    return Err(MergeError::InvalidAliasMap(format!(
                        "'{canonical}' is itself an alias for '{target}'"
                    )));
                }
            }
        }
        Ok(Self { entries })
    }

    /// Returns the canonical name for `header`, or `header` unchanged when
    /// no alias applies.
    pub fn canonicalize(&self, header: &str) -> String {
        self.entries
            .get(&normalize(header))
            .cloned()
            .unwrap_or_else(|| header.to_string())
    }
}

/// Locator tuning: how many leading rows to scan and how many template hits
/// a row needs to qualify as the header row.
#[derive(Debug, Clone, Copy)]
pub struct LocatorConfig {
    pub scan_window: usize,
    pub min_matches: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            scan_window: 10,
            min_matches: 1,
        }
    }
}

/// Finds the zero-based index of the real header row inside a sheet.
///
/// Scans top-to-bottom through the leading window; the first row in which at
/// least `min_matches` cells canonicalize-and-match some template column
/// wins. Returns `None` when no row in the window qualifies.
pub fn locate_header_row(
    rows: &[Vec<CellValue>],
    template: &[String],
    matcher: &HeaderMatcher,
    aliases: &AliasMap,
    config: &LocatorConfig,
) -> Option<usize> {
    for (index, row) in rows.iter().take(config.scan_window).enumerate() {
        let hits = row
            .iter()
            .filter(|cell| !cell.is_empty())
            .map(|cell| aliases.canonicalize(&cell.to_string()))
            .filter(|candidate| template.iter().any(|name| matcher.matches(name, candidate)))
            .count();
        if hits >= config.min_matches {
            return Some(index);
        }
    }
    None
}
