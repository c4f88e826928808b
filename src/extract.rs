use crate::error::{MergeError, Result};
use crate::merge::MergedTable;
use crate::model::CellValue;

/// A single projected column, order preserved, blanks included.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnExtract {
    pub column: String,
    pub values: Vec<CellValue>,
}

/// Projects one named column out of the merged output. The lookup is
/// case-insensitive; the extract carries the schema's spelling of the name.
pub fn extract_column(table: &MergedTable, column: &str) -> Result<ColumnExtract> {
    let position = table
        .schema
        .position(column)
        .ok_or_else(|| MergeError::ColumnNotFound(column.to_string()))?;
    let values = table.rows.iter().map(|row| row[position].clone()).collect();
    Ok(ColumnExtract {
        column: table.schema.columns()[position].clone(),
        values,
    })
}
