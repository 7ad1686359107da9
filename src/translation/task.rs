/*!
 * Row translation task.
 *
 * The unit of concurrent work: every selected cell of one row, translated
 * into one target language. Tasks own their input so they can be spawned.
 */

use log::debug;

use super::core::{CellTranslation, TranslationClient};
use crate::errors::TranslationError;
use crate::language_utils::LanguageCode;
use crate::spreadsheet::{ResolvedColumn, Table, is_blank};

/// Result of one selected cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellOutcome {
    /// The source cell was blank; the result cell is null
    Empty,
    /// Translated text
    Translated(String),
    /// Every attempt failed
    Failed {
        /// Placeholder stored in the cell
        placeholder: String,
        /// Description of the last error
        error: String,
    },
}

impl CellOutcome {
    /// Value to store in the result table
    pub fn value(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Translated(text) | Self::Failed { placeholder: text, .. } => Some(text.clone()),
        }
    }
}

/// Translation of one row into one language
#[derive(Debug, Clone)]
pub struct RowTask {
    /// Zero-based row index in the source table
    pub row: usize,
    /// Source language
    pub source: LanguageCode,
    /// Target language
    pub target: LanguageCode,
    /// (column index, source value) in selection order
    cells: Vec<(usize, Option<String>)>,
}

/// Output of a completed row task
#[derive(Debug, Clone, PartialEq)]
pub struct RowResult {
    /// Zero-based row index in the source table
    pub row: usize,
    /// Target language
    pub language: LanguageCode,
    /// (column index, outcome) in selection order
    pub cells: Vec<(usize, CellOutcome)>,
}

impl RowResult {
    /// Number of cells translated successfully
    pub fn translated_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|(_, outcome)| matches!(outcome, CellOutcome::Translated(_)))
            .count()
    }

    /// Number of cells that ended as placeholders
    pub fn failed_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|(_, outcome)| matches!(outcome, CellOutcome::Failed { .. }))
            .count()
    }

    /// Number of blank cells skipped
    pub fn empty_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|(_, outcome)| matches!(outcome, CellOutcome::Empty))
            .count()
    }
}

impl RowTask {
    /// Create a task over a row of a table
    pub fn from_table(
        table: &Table,
        row: usize,
        columns: &[ResolvedColumn],
        source: LanguageCode,
        target: LanguageCode,
    ) -> Result<Self, TranslationError> {
        let values = table.rows().get(row).ok_or_else(|| TranslationError::RowFailed {
            row,
            language: target,
            reason: format!("row is outside the table ({} rows)", table.row_count()),
        })?;

        let cells = columns
            .iter()
            .map(|column| (column.index, values.get(column.index).cloned().flatten()))
            .collect();

        Ok(Self {
            row,
            source,
            target,
            cells,
        })
    }

    /// Number of non-blank cells, i.e. the cells this task translates
    pub fn translatable_cells(&self) -> usize {
        self.cells.iter().filter(|(_, value)| !is_blank(value.as_deref())).count()
    }

    /// Translate every selected cell of the row, in selection order
    pub async fn run(self, client: &TranslationClient) -> RowResult {
        let mut cells = Vec::with_capacity(self.cells.len());

        for (column, value) in self.cells {
            let outcome = match value.as_deref() {
                Some(text) if !is_blank(Some(text)) => {
                    match client.translate(text, self.source, self.target).await {
                        CellTranslation::Failed { placeholder, error } => CellOutcome::Failed { placeholder, error },
                        other => CellOutcome::Translated(other.into_text()),
                    }
                }
                _ => CellOutcome::Empty,
            };
            cells.push((column, outcome));
        }

        debug!("Row {} translated into {}", self.row, self.target);
        RowResult {
            row: self.row,
            language: self.target,
            cells,
        }
    }
}
