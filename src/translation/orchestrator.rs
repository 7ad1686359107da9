/*!
 * Translation orchestrator.
 *
 * Drives one run: resolves the column selection, settles the source
 * language, fans row tasks out over a bounded worker pool, and folds their
 * results into one table per language through a single aggregator.
 *
 * Progress is published as `ProgressEvent`s on a channel obtained with
 * `Orchestrator::subscribe`; the unit of progress is one (row, target
 * language) pair.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::core::{TranslationClient, error_placeholder};
use super::detection::LanguageClassifier;
use super::task::{CellOutcome, RowResult, RowTask};
use crate::errors::TranslationError;
use crate::language_utils::{LanguageCode, TargetSelection};
use crate::spreadsheet::{ResolvedColumn, Table, is_blank};

/// Lowest accepted worker count
pub const MIN_WORKERS: usize = 1;

/// Highest accepted worker count
pub const MAX_WORKERS: usize = 30;

/// Default worker count
pub const DEFAULT_WORKERS: usize = 15;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    DetectingLanguage,
    Scheduling,
    Translating,
    Aggregating,
    Done,
    Failed,
}

/// Events published while a run progresses
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The run entered a new stage
    Stage(RunStage),
    /// The source language is settled
    SourceLanguage {
        /// Source language of the run
        language: LanguageCode,
        /// Whether it was detected rather than given
        detected: bool,
    },
    /// Selected columns absent from the table
    MissingColumns(Vec<String>),
    /// Units completed so far out of the total
    Progress {
        /// Completed (row, language) units
        completed: usize,
        /// Scheduled (row, language) units
        total: usize,
    },
    /// A row task did not complete for one language
    RowFailed {
        /// Zero-based row index
        row: usize,
        /// Target language of the task
        language: LanguageCode,
        /// Why it failed
        reason: String,
    },
}

impl ProgressEvent {
    /// Completed fraction for `Progress` events; an empty run is complete
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Self::Progress { total: 0, .. } => Some(1.0),
            Self::Progress { completed, total } => Some(*completed as f64 / *total as f64),
            _ => None,
        }
    }
}

/// Tunables of a run
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Maximum number of concurrent row tasks
    pub workers: usize,
    /// How targets follow from the source language
    pub target_selection: TargetSelection,
    /// Fail the run when every translatable cell failed
    pub fail_on_total_failure: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            target_selection: TargetSelection::default(),
            fail_on_total_failure: true,
        }
    }
}

impl OrchestratorOptions {
    /// Worker count clamped to the accepted range
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(MIN_WORKERS, MAX_WORKERS)
    }
}

/// Address of one result cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    /// Zero-based row index
    pub row: usize,
    /// Zero-based column index
    pub column: usize,
    /// Language of the result table
    pub language: LanguageCode,
}

/// Builds the result table of one language from a copy of the source
#[derive(Debug, Clone)]
pub struct ResultTableBuilder {
    language: LanguageCode,
    table: Table,
}

impl ResultTableBuilder {
    /// Start from a copy of the source table
    pub fn new(language: LanguageCode, source: &Table) -> Self {
        Self {
            language,
            table: source.clone(),
        }
    }

    /// Language of the table being built
    pub fn language(&self) -> LanguageCode {
        self.language
    }

    /// Store a cell; keys of another language or outside the table are rejected
    pub fn set(&mut self, key: CellKey, value: Option<String>) -> bool {
        if key.language != self.language {
            return false;
        }
        self.table.set_cell(key.row, key.column, value)
    }

    /// Store every cell of a row result
    pub fn apply(&mut self, result: &RowResult) {
        for (column, outcome) in &result.cells {
            let key = CellKey {
                row: result.row,
                column: *column,
                language: result.language,
            };
            if !self.set(key, outcome.value()) {
                warn!("Dropped result outside the {} table at {:?}", self.language, key);
            }
        }
    }

    /// Finish the table
    pub fn build(self) -> Table {
        self.table
    }
}

/// Counters of a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Source cells that needed translation, across all targets
    pub translatable_cells: usize,
    /// Cells translated successfully
    pub translated_cells: usize,
    /// Cells holding a failure placeholder
    pub failed_cells: usize,
    /// Blank cells left null
    pub empty_cells: usize,
    /// (row, language) tasks that did not complete
    pub failed_rows: usize,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Share of translatable cells that ended as placeholders
    pub fn failure_rate(&self) -> f64 {
        if self.translatable_cells == 0 {
            0.0
        } else {
            self.failed_cells as f64 / self.translatable_cells as f64
        }
    }

    /// Whether every translatable cell failed
    pub fn is_total_failure(&self) -> bool {
        self.translatable_cells > 0 && self.translated_cells == 0
    }
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Source language of the run
    pub source_language: LanguageCode,
    /// Whether the source language was detected rather than given
    pub detected: bool,
    /// Selected columns absent from the table
    pub missing_columns: Vec<String>,
    /// Columns that were translated, in selection order
    pub translated_columns: Vec<ResolvedColumn>,
    /// Run counters
    pub summary: RunSummary,
    /// One table per language, source first, then targets in order
    tables: Vec<(LanguageCode, Table)>,
}

impl RunOutcome {
    /// Every language table, source first
    pub fn tables(&self) -> &[(LanguageCode, Table)] {
        &self.tables
    }

    /// Table of one language
    pub fn table(&self, language: LanguageCode) -> Option<&Table> {
        self.tables
            .iter()
            .find(|(lang, _)| *lang == language)
            .map(|(_, table)| table)
    }

    /// The untouched source table
    pub fn source_table(&self) -> Option<&Table> {
        self.table(self.source_language)
    }

    /// Target languages, in output order
    pub fn target_languages(&self) -> Vec<LanguageCode> {
        self.tables
            .iter()
            .map(|(lang, _)| *lang)
            .filter(|lang| *lang != self.source_language)
            .collect()
    }

    /// Single-sheet layout: the source table followed by one
    /// `{column}_{CODE}` column per target language and translated column
    pub fn to_wide_table(&self) -> Table {
        let mut wide = self.source_table().cloned().unwrap_or_default();

        for (language, table) in &self.tables {
            if *language == self.source_language {
                continue;
            }
            for column in &self.translated_columns {
                let values = table
                    .rows()
                    .iter()
                    .map(|row| row.get(column.index).cloned().flatten())
                    .collect();
                wide.push_column(format!("{}_{}", column.header, language.code()), values);
            }
        }

        wide
    }
}

/// Translation orchestrator for one table at a time
#[derive(Debug)]
pub struct Orchestrator {
    client: TranslationClient,
    classifier: LanguageClassifier,
    options: OrchestratorOptions,
    events: Option<UnboundedSender<ProgressEvent>>,
    stage: RunStage,
}

impl Orchestrator {
    /// Create an orchestrator
    pub fn new(client: TranslationClient, classifier: LanguageClassifier, options: OrchestratorOptions) -> Self {
        Self {
            client,
            classifier,
            options,
            events: None,
            stage: RunStage::Idle,
        }
    }

    /// Receive progress events of the following runs.
    ///
    /// A new subscription replaces the previous one.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ProgressEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.events = Some(sender);
        receiver
    }

    /// Current stage
    pub fn stage(&self) -> RunStage {
        self.stage
    }

    /// The client used for every call
    pub fn client(&self) -> &TranslationClient {
        &self.client
    }

    /// Options of this orchestrator
    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.events {
            // A dropped receiver only means nobody is listening
            let _ = sender.send(event);
        }
    }

    fn enter(&mut self, stage: RunStage) {
        debug!("Run stage: {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
        self.emit(ProgressEvent::Stage(stage));
    }

    /// Translate the selected columns of a table into every target language.
    ///
    /// Missing columns are reported and skipped. Cell and row failures stay
    /// local to their cell or row; the only run-level failure is every
    /// translatable cell failing while `fail_on_total_failure` is set.
    pub async fn run<S: AsRef<str>>(
        &mut self,
        table: &Table,
        columns: &[S],
        source_override: Option<LanguageCode>,
    ) -> Result<RunOutcome, TranslationError> {
        let started = Instant::now();
        self.stage = RunStage::Idle;

        if table.column_count() == 0 {
            return Err(TranslationError::InvalidInput("the table has no columns".to_string()));
        }

        let resolution = table.resolve_columns(columns);
        if !resolution.is_complete() {
            warn!("Columns not found in the table: {}", resolution.missing.join(", "));
            self.emit(ProgressEvent::MissingColumns(resolution.missing.clone()));
        }
        let selected = resolution.resolved;

        self.enter(RunStage::DetectingLanguage);
        let (source, detected) = match source_override {
            Some(language) => (language, false),
            None => (self.classifier.detect_table(table, &selected).await, true),
        };
        info!(
            "Source language: {} ({})",
            source.display_name(),
            if detected { "detected" } else { "given" }
        );
        self.emit(ProgressEvent::SourceLanguage {
            language: source,
            detected,
        });

        self.enter(RunStage::Scheduling);
        let targets = self.options.target_selection.targets_for(source);
        let mut builders: HashMap<LanguageCode, ResultTableBuilder> = targets
            .iter()
            .map(|lang| (*lang, ResultTableBuilder::new(*lang, table)))
            .collect();

        let mut tasks = Vec::with_capacity(targets.len() * table.row_count());
        for target in &targets {
            for row in 0..table.row_count() {
                tasks.push(RowTask::from_table(table, row, &selected, source, *target)?);
            }
        }

        let total = tasks.len();
        let workers = self.options.effective_workers();
        info!(
            "Translating {} column(s) of {} row(s) into {} language(s) with {} worker(s)",
            selected.len(),
            table.row_count(),
            targets.len(),
            workers
        );

        self.enter(RunStage::Translating);
        self.emit(ProgressEvent::Progress { completed: 0, total });

        let mut summary = RunSummary::default();
        let mut last_error: Option<String> = None;
        let mut completed = 0usize;

        let client = self.client.clone();
        let mut results = stream::iter(tasks.into_iter().map(|task| {
            let client = client.clone();
            let row = task.row;
            let language = task.target;
            async move {
                // Spawned tasks keep running if the run is abandoned
                let joined = tokio::spawn(async move { task.run(&client).await }).await;
                (row, language, joined)
            }
        }))
        .buffer_unordered(workers);

        while let Some((row, language, joined)) = results.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    let reason = e.to_string();
                    error!("Row {} failed for {}: {}", row, language, reason);
                    self.emit(ProgressEvent::RowFailed {
                        row,
                        language,
                        reason: reason.clone(),
                    });
                    summary.failed_rows += 1;
                    last_error = Some(reason.clone());
                    failed_row_result(table, row, language, &selected, &reason)
                }
            };

            summary.translated_cells += result.translated_count();
            summary.failed_cells += result.failed_count();
            summary.empty_cells += result.empty_count();
            if let Some(error) = result.cells.iter().rev().find_map(|(_, outcome)| match outcome {
                CellOutcome::Failed { error, .. } => Some(error.clone()),
                _ => None,
            }) {
                last_error = Some(error);
            }

            if let Some(builder) = builders.get_mut(&language) {
                builder.apply(&result);
            }

            completed += 1;
            self.emit(ProgressEvent::Progress { completed, total });
        }
        drop(results);

        self.enter(RunStage::Aggregating);
        summary.translatable_cells = summary.translated_cells + summary.failed_cells;
        summary.elapsed = started.elapsed();

        let mut tables = Vec::with_capacity(targets.len() + 1);
        tables.push((source, table.clone()));
        for target in &targets {
            if let Some(builder) = builders.remove(target) {
                tables.push((*target, builder.build()));
            }
        }

        info!(
            "Run finished: {} translated, {} failed, {} empty, {} failed row(s) in {:.1}s",
            summary.translated_cells,
            summary.failed_cells,
            summary.empty_cells,
            summary.failed_rows,
            summary.elapsed.as_secs_f64()
        );

        if self.options.fail_on_total_failure && summary.is_total_failure() {
            self.enter(RunStage::Failed);
            return Err(TranslationError::AllUnitsFailed {
                failed: summary.failed_cells,
                last_error: last_error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        self.enter(RunStage::Done);
        Ok(RunOutcome {
            source_language: source,
            detected,
            missing_columns: resolution.missing,
            translated_columns: selected,
            summary,
            tables,
        })
    }
}

/// Result standing in for a row task that did not complete: every non-blank
/// selected cell gets a placeholder so that no cell goes missing
fn failed_row_result(
    table: &Table,
    row: usize,
    language: LanguageCode,
    columns: &[ResolvedColumn],
    reason: &str,
) -> RowResult {
    let cells = columns
        .iter()
        .map(|column| {
            let outcome = match table.cell(row, column.index) {
                Some(text) if !is_blank(Some(text)) => CellOutcome::Failed {
                    placeholder: error_placeholder(text),
                    error: reason.to_string(),
                },
                _ => CellOutcome::Empty,
            };
            (column.index, outcome)
        })
        .collect();

    RowResult { row, language, cells }
}
