use std::path::Path;

use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};

use crate::error::Result;
use crate::extract::ColumnExtract;
use crate::merge::MergedTable;
use crate::model::CellValue;

/// Fill applied to backfilled cells so looked-up values stand apart from
/// originally-present ones.
fn filled_format() -> Format {
    Format::new().set_background_color(Color::Yellow)
}

/// Writes the merged table to the given path. Backfilled cells are
/// highlighted; `autofit` additionally sizes columns to their content.
pub fn write_merged(path: &Path, table: &MergedTable, autofit: bool) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Merged")?;

    for (col_idx, header) in table.schema.columns().iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, header.as_str())?;
    }

    let highlight = filled_format();
    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            let format = table
                .filled
                .contains(&(row_idx, col_idx))
                .then_some(&highlight);
            write_cell(worksheet, (row_idx + 1) as u32, col_idx as u16, cell, format)?;
        }
    }

    if autofit {
        worksheet.autofit();
    }
    workbook.save(path)?;
    Ok(())
}

/// Writes a single-column extract workbook.
pub fn write_extract(path: &Path, extract: &ColumnExtract, autofit: bool) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Addresses")?;

    worksheet.write_string(0, 0, extract.column.as_str())?;
    for (row_idx, value) in extract.values.iter().enumerate() {
        write_cell(worksheet, (row_idx + 1) as u32, 0, value, None)?;
    }

    if autofit {
        worksheet.autofit();
    }
    workbook.save(path)?;
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    format: Option<&Format>,
) -> Result<()> {
    match (cell, format) {
        (CellValue::Text(value), Some(format)) => {
            worksheet.write_string_with_format(row, col, value.as_str(), format)?;
        }
        (CellValue::Text(value), None) => {
            worksheet.write_string(row, col, value.as_str())?;
        }
        (CellValue::Number(value), Some(format)) => {
            worksheet.write_number_with_format(row, col, *value, format)?;
        }
        (CellValue::Number(value), None) => {
            worksheet.write_number(row, col, *value)?;
        }
        (CellValue::Bool(value), Some(format)) => {
            worksheet.write_boolean_with_format(row, col, *value, format)?;
        }
        (CellValue::Bool(value), None) => {
            worksheet.write_boolean(row, col, *value)?;
        }
        (CellValue::Empty, Some(format)) => {
            worksheet.write_blank(row, col, format)?;
        }
        (CellValue::Empty, None) => {}
    }
    Ok(())
}
