use std::collections::BTreeSet;

use tracing::debug;

use crate::headers::{AliasMap, HeaderMatcher};
use crate::model::{CellValue, OutputSchema};

/// Prefix of system-generated names assigned to unlabeled source columns.
/// Such headers never become output columns.
const PLACEHOLDER_PREFIX: &str = "Unnamed";

/// One sheet of a source workbook, header row already located and split off.
#[derive(Debug, Clone)]
pub struct SourceSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Column alignment for one sheet, decided during the discovery pass and
/// replayed during materialization. Positions stay valid because the output
/// schema is append-only.
#[derive(Debug, Clone)]
pub struct SheetPlan {
    /// For each template column, the source column feeding it, if any.
    template_sources: Vec<Option<usize>>,
    /// `(schema position, source column)` pairs for extras this sheet
    /// introduced.
    extra_sources: Vec<(usize, usize)>,
}

/// Owns the growing output schema for the duration of one merge run.
///
/// The unifier works in two phases: `plan_sheet` is called once per sheet
/// across all source files to discover the full schema, then
/// `materialize_sheet` aligns every data row against the final width. Rows
/// therefore always come out exactly as wide as the finished schema, with
/// explicit `Empty` cells where a sheet had nothing to contribute.
#[derive(Debug)]
pub struct Unifier<'a> {
    schema: OutputSchema,
    matcher: &'a HeaderMatcher,
    aliases: &'a AliasMap,
}

impl<'a> Unifier<'a> {
    pub fn new(template: Vec<String>, matcher: &'a HeaderMatcher, aliases: &'a AliasMap) -> Self {
        Self {
            schema: OutputSchema::from_template(template),
            matcher,
            aliases,
        }
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    /// Consumes the unifier, yielding the final schema.
    pub fn into_schema(self) -> OutputSchema {
        self.schema
    }

    /// Discovery pass for one sheet.
    ///
    /// Template columns are filled first: for each one, the first source
    /// column whose canonicalized header matches wins, and later matches on
    /// the same template column are ignored. Every source column left
    /// unconsumed is an extra candidate; it joins the schema unless its raw
    /// header is blank or a placeholder, its canonical name is already
    /// present (case-insensitively), or canonicalization produced a name
    /// that no longer matches the raw header.
    pub fn plan_sheet(&mut self, headers: &[String]) -> SheetPlan {
        let canonical: Vec<String> = headers
            .iter()
            .map(|header| self.aliases.canonicalize(header))
            .collect();

        let mut consumed = vec![false; headers.len()];
        let mut template_sources = Vec::with_capacity(self.schema.template_len());
        for position in 0..self.schema.template_len() {
            let name = &self.schema.columns()[position];
            let source = canonical
                .iter()
                .position(|candidate| self.matcher.matches(name, candidate));
            if let Some(index) = source {
                consumed[index] = true;
            }
            template_sources.push(source);
        }

        let mut extra_sources = Vec::new();
        for (index, raw) in headers.iter().enumerate() {
            if consumed[index] {
                continue;
            }
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with(PLACEHOLDER_PREFIX) {
                continue;
            }
            let name = &canonical[index];
            if self.schema.contains(name) {
                continue;
            }
            // Guard: a canonical name that no longer matches its own raw
            // header does not denote this column.
            if !self.matcher.matches(name, raw) {
                continue;
            }
            if let Some(position) = self.schema.push_extra(name.clone()) {
                debug!(column = %name, position, "discovered extra column");
                extra_sources.push((position, index));
            }
        }

        SheetPlan {
            template_sources,
            extra_sources,
        }
    }
}

/// Materialization pass: aligns one sheet's data rows against the final
/// schema width. Unplanned positions come out `Empty`; all-blank source rows
/// are kept (degenerate-row removal happens later, in backfill).
pub fn materialize_sheet(sheet: &SourceSheet, plan: &SheetPlan, width: usize) -> Vec<Vec<CellValue>> {
    sheet
        .rows
        .iter()
        .map(|row| {
            let mut aligned = vec![CellValue::Empty; width];
            for (position, source) in plan.template_sources.iter().enumerate() {
                if let Some(index) = source {
                    aligned[position] = row.get(*index).cloned().unwrap_or(CellValue::Empty);
                }
            }
            for (position, index) in &plan.extra_sources {
                aligned[*position] = row.get(*index).cloned().unwrap_or(CellValue::Empty);
            }
            aligned
        })
        .collect()
}

/// The finished merge output: final schema, aligned rows, and the set of
/// `(row, column)` cells the backfill step filled from the reference table.
#[derive(Debug)]
pub struct MergedTable {
    pub schema: OutputSchema,
    pub rows: Vec<Vec<CellValue>>,
    pub filled: BTreeSet<(usize, usize)>,
}

impl MergedTable {
    pub fn new(schema: OutputSchema, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            schema,
            rows,
            filled: BTreeSet::new(),
        }
    }
}
