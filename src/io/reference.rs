use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::backfill::ReferenceTable;
use crate::error::{MergeError, Result};

/// Loads the keyed reference table from a JSON side file shaped as
/// `{"0001": {"bank": "…", "placement": "…"}}`. An unreadable or malformed
/// file is fatal for the backfill step; per-key misses are not handled here.
pub fn load_reference_table(path: &Path) -> Result<ReferenceTable> {
    let data = fs::read_to_string(path).map_err(|error| MergeError::ReferenceTableLoad {
        file: path.to_path_buf(),
        message: error.to_string(),
    })?;
    serde_json::from_str(&data).map_err(|error| MergeError::ReferenceTableLoad {
        file: path.to_path_buf(),
        message: error.to_string(),
    })
}

/// Loads `(alias, canonical)` pairs from a JSON object file shaped as
/// `{"REQUEST DATE": "DATE"}`.
pub fn load_alias_pairs(path: &Path) -> Result<Vec<(String, String)>> {
    let data = fs::read_to_string(path)
        .map_err(|error| MergeError::InvalidAliasMap(format!("{}: {error}", path.display())))?;
    let map: BTreeMap<String, String> = serde_json::from_str(&data)
        .map_err(|error| MergeError::InvalidAliasMap(format!("{}: {error}", path.display())))?;
    Ok(map.into_iter().collect())
}
