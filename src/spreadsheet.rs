/*!
 * In-memory table model.
 *
 * A `Table` is an ordered list of rows over a fixed, ordered list of column
 * headers. Cells are optional strings: `None` is a null cell, which is what
 * translated tables hold wherever the source cell was blank.
 */

use std::collections::HashSet;

/// A single cell value; `None` is a null cell
pub type CellValue = Option<String>;

/// Literal values that spreadsheet exports use for missing data
const NULL_MARKERS: [&str; 3] = ["nan", "NaN", "None"];

/// Whether a cell carries no translatable text.
///
/// Null cells, whitespace-only cells and the usual missing-data markers
/// (`nan`, `NaN`, `None`) are blank.
pub fn is_blank(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(text) => {
            let trimmed = text.trim();
            trimmed.is_empty() || NULL_MARKERS.contains(&trimmed)
        }
    }
}

/// A selected column resolved against a table's headers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedColumn {
    /// Identifier as given in the selection
    pub selector: String,
    /// Zero-based position in the table
    pub index: usize,
    /// Header of the column in the table
    pub header: String,
}

/// Result of matching a column selection against a table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnResolution {
    /// Columns that exist, in selection order, without duplicates
    pub resolved: Vec<ResolvedColumn>,
    /// Selection entries that matched nothing, in selection order
    pub missing: Vec<String>,
}

impl ColumnResolution {
    /// Whether every selected column was found
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Tabular data with a header row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Create an empty table with the given headers
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a table from headers and rows.
    ///
    /// Short rows are padded with null cells and long rows are truncated so
    /// that every row has exactly one cell per column.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Convenience constructor from string literals; empty strings stay empty strings
    pub fn from_strings(columns: &[&str], rows: &[&[&str]]) -> Self {
        Self::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| Some(cell.to_string())).collect())
                .collect(),
        )
    }

    /// Append a row, normalizing its width
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Column headers in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in order
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at a row and column position
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .and_then(|cell| cell.as_deref())
    }

    /// Overwrite a cell; out-of-range positions are ignored and return false
    pub fn set_cell(&mut self, row: usize, column: usize, value: CellValue) -> bool {
        match self.rows.get_mut(row).and_then(|cells| cells.get_mut(column)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Append a column filled with the given values (padded with nulls)
    pub fn push_column(&mut self, header: impl Into<String>, values: Vec<CellValue>) {
        self.columns.push(header.into());
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.push(values.next().flatten());
        }
    }

    /// Position of a column by selector.
    ///
    /// The selector is matched against the headers exactly, then ignoring case
    /// and surrounding whitespace, then as a spreadsheet column letter
    /// (`A` is the first column, `AA` the 27th).
    pub fn column_index(&self, selector: &str) -> Option<usize> {
        if let Some(index) = self.columns.iter().position(|c| c == selector) {
            return Some(index);
        }

        let wanted = selector.trim();
        if let Some(index) = self
            .columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(wanted))
        {
            return Some(index);
        }

        column_letter_index(wanted).filter(|index| *index < self.columns.len())
    }

    /// Resolve a column selection against this table
    pub fn resolve_columns<S: AsRef<str>>(&self, selection: &[S]) -> ColumnResolution {
        let mut resolution = ColumnResolution::default();
        let mut seen = HashSet::new();

        for selector in selection {
            let selector = selector.as_ref();
            match self.column_index(selector) {
                Some(index) => {
                    if seen.insert(index) {
                        resolution.resolved.push(ResolvedColumn {
                            selector: selector.to_string(),
                            index,
                            header: self.columns[index].clone(),
                        });
                    }
                }
                None => resolution.missing.push(selector.to_string()),
            }
        }

        resolution
    }
}

/// Convert a spreadsheet column letter (`A`, `H`, `AB`) to a zero-based index
pub fn column_letter_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut index = 0usize;
    for c in letters.chars() {
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

/// Default column selection: the positional range B through H
pub fn default_columns() -> Vec<String> {
    ["B", "C", "D", "E", "F", "G", "H"].iter().map(|c| c.to_string()).collect()
}
