use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};

use crate::error::{MergeError, Result};
use crate::headers::{AliasMap, HeaderMatcher, LocatorConfig, locate_header_row};
use crate::merge::SourceSheet;
use crate::model::CellValue;

/// Loads the canonical template header: the first row of the template's
/// first sheet that carries any non-empty cell, non-empty values in order.
pub fn read_template_header(path: &Path) -> Result<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|error| MergeError::InvalidTemplate(format!("{}: {error}", path.display())))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let first = sheet_names
        .first()
        .ok_or_else(|| MergeError::InvalidTemplate(format!("{}: no sheets", path.display())))?;
    let range = read_sheet_range(&mut workbook, first)
        .map_err(|error| MergeError::InvalidTemplate(format!("{}: {error}", path.display())))?;

    for row in range.rows() {
        let headers: Vec<String> = row
            .iter()
            .map(cell_to_value)
            .filter(|cell| !cell.is_empty())
            .map(|cell| cell.to_string().trim().to_string())
            .collect();
        if !headers.is_empty() {
            return Ok(headers);
        }
    }

    Err(MergeError::InvalidTemplate(format!(
        "{}: no header row",
        path.display()
    )))
}

/// Reads one source workbook, locating the header row of every sheet. The
/// workbook handle is scoped to this call, so a sheet that fails to parse
/// never leaks the handle into the rest of the run.
pub fn read_source_workbook(
    path: &Path,
    template: &[String],
    matcher: &HeaderMatcher,
    aliases: &AliasMap,
    locator: &LocatorConfig,
) -> Result<Vec<SourceSheet>> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|error: calamine::XlsxError| {
        MergeError::SourceRead {
            file: path.to_path_buf(),
            message: error.to_string(),
        }
    })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let range = match workbook.worksheet_range(&name) {
            Some(result) => result.map_err(|error| MergeError::SourceRead {
                file: path.to_path_buf(),
                message: error.to_string(),
            })?,
            None => continue,
        };
        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(cell_to_value).collect())
            .collect();

        let header_index =
            locate_header_row(&rows, template, matcher, aliases, locator).ok_or_else(|| {
                MergeError::HeaderNotFound {
                    file: path.to_path_buf(),
                    sheet: name.clone(),
                }
            })?;
        let headers: Vec<String> = rows[header_index]
            .iter()
            .map(|cell| cell.to_string())
            .collect();
        let data = rows[header_index + 1..].to_vec();

        sheets.push(SourceSheet {
            name,
            headers,
            rows: data,
        });
    }

    Ok(sheets)
}

fn read_sheet_range<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| MergeError::InvalidTemplate(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(MergeError::from)?;
    Ok(range)
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}
