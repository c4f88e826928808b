use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::merge::MergedTable;
use crate::model::CellValue;

/// Keyed fallback values loaded from a side file: key → column → value.
pub type ReferenceTable = BTreeMap<String, BTreeMap<String, String>>;

/// Which columns the fill step touches and which column keys the lookup.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub key_column: String,
    pub target_columns: Vec<String>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            key_column: "CAMPAIGN".to_string(),
            target_columns: vec!["BANK".to_string(), "PLACEMENT".to_string()],
        }
    }
}

/// Drops every row carrying exactly one non-empty cell. Such rows are stray
/// header or footer artifacts, not data. Returns the number dropped.
pub fn drop_degenerate_rows(table: &mut MergedTable) -> usize {
    let before = table.rows.len();
    table
        .rows
        .retain(|row| row.iter().filter(|cell| !cell.is_empty()).count() != 1);
    let dropped = before - table.rows.len();
    if dropped > 0 {
        debug!(dropped, "removed degenerate rows");
    }
    dropped
}

/// Fills empty target cells by looking up each row's key in the reference
/// table. A key absent from the table is a normal gap and leaves the cell
/// empty; a key or target column absent from the schema disables that part
/// of the fill. Filled cells are recorded on the table so the writer can
/// highlight them. Returns the number of cells filled.
pub fn fill_missing_values(
    table: &mut MergedTable,
    reference: &ReferenceTable,
    config: &BackfillConfig,
) -> usize {
    let Some(key_position) = table.schema.position(&config.key_column) else {
        warn!(column = %config.key_column, "key column absent from merged output, skipping fill");
        return 0;
    };

    let mut targets = Vec::new();
    for name in &config.target_columns {
        match table.schema.position(name) {
            Some(position) => targets.push((position, name.as_str())),
            None => warn!(column = %name, "fill target absent from merged output"),
        }
    }

    let mut filled = 0;
    for (row_index, row) in table.rows.iter_mut().enumerate() {
        let key = row[key_position].to_string().trim().to_string();
        if key.is_empty() {
            continue;
        }
        let Some(entry) = reference.get(&key) else {
            continue;
        };
        for (position, name) in &targets {
            if !row[*position].is_empty() {
                continue;
            }
            let value = entry
                .iter()
                .find(|(column, _)| column.eq_ignore_ascii_case(name))
                .map(|(_, value)| value);
            if let Some(value) = value {
                row[*position] = CellValue::Text(value.clone());
                table.filled.insert((row_index, *position));
                filled += 1;
            }
        }
    }
    debug!(filled, "backfilled cells from reference table");
    filled
}
