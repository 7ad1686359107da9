use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::errors::AppError;
use crate::file_utils::{FileManager, TableSource};
use crate::language_utils::LanguageCode;
use crate::providers::Provider;
use crate::providers::openai::OpenAI;
use crate::spreadsheet::Table;
use crate::translation::cache::TranslationCache;
use crate::translation::core::{ClientSettings, TokenUsageStats, TranslationClient};
use crate::translation::detection::LanguageClassifier;
use crate::translation::orchestrator::{Orchestrator, ProgressEvent, RunOutcome, RunStage};
use crate::translation::retry::RetryPolicy;

// @module: Application controller for spreadsheet translation

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The translated tables and run counters
    pub outcome: RunOutcome,
    /// Files written
    pub written: Vec<PathBuf>,
    /// API usage of the run
    pub usage: TokenUsageStats,
}

/// Main application controller for spreadsheet translation
#[derive(Debug)]
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Completion provider shared by the run
    provider: Arc<dyn Provider>,
    // @field: Whether to draw a progress bar
    show_progress: bool,
}

impl Controller {
    // @method: Create a new controller talking to the configured API
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = OpenAI::new(
            config.api.api_key.clone(),
            config.api.endpoint.clone(),
            config.api.model.clone(),
            config.api.timeout_secs,
        );
        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    // @method: Create a controller over any provider
    pub fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Self {
        Self {
            config,
            provider,
            show_progress: true,
        }
    }

    /// Disable the progress bar
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the translation client for one run
    pub fn build_client(&self) -> TranslationClient {
        let settings = &self.config.translation;
        let client_settings = ClientSettings {
            model: self.config.api.model.clone(),
            temperature: settings.temperature,
            detection_temperature: settings.detection_temperature,
            max_tokens: Some(settings.max_tokens),
            prompt: settings.prompt_template(),
        };

        TranslationClient::new(Arc::clone(&self.provider), client_settings)
            .with_retry_policy(RetryPolicy::new(settings.retry_count, settings.retry_backoff_ms))
            .with_cache(TranslationCache::new(settings.cache_enabled))
    }

    /// Build the orchestrator for one run
    pub fn build_orchestrator(&self, client: TranslationClient) -> Orchestrator {
        let settings = &self.config.translation;
        let classifier =
            LanguageClassifier::for_method(settings.detection, &client, settings.default_source_language);
        Orchestrator::new(client, classifier, settings.orchestrator_options())
    }

    /// Check that the provider answers before doing any work
    pub async fn check_connection(&self) -> Result<(), AppError> {
        info!("Testing connection to {} with model {}", self.provider.name(), self.config.api.model);
        self.provider.test_connection().await?;
        info!("Connection OK");
        Ok(())
    }

    /// Translate an in-memory table
    pub async fn translate_table(
        &self,
        table: &Table,
        source_language: Option<LanguageCode>,
    ) -> Result<(RunOutcome, TokenUsageStats), AppError> {
        let client = self.build_client();
        let mut orchestrator = self.build_orchestrator(client.clone());
        let events = orchestrator.subscribe();

        let progress_bar = if self.show_progress {
            create_progress_bar()
        } else {
            ProgressBar::hidden()
        };
        let consumer = tokio::spawn(render_progress(events, progress_bar));

        let result = orchestrator.run(table, &self.config.translation.columns, source_language).await;

        // Closing the channel lets the renderer finish
        drop(orchestrator);
        if let Err(e) = consumer.await {
            debug!("Progress renderer stopped: {}", e);
        }

        let outcome = result?;
        Ok((outcome, client.usage()))
    }

    /// Load a table, translate it and write the results
    pub async fn run(&self, input: &Path, output: &Path, source_language: Option<LanguageCode>) -> Result<RunReport, AppError> {
        if !FileManager::file_exists(input) {
            return Err(AppError::File(format!("Input file does not exist: {:?}", input)));
        }

        let table = FileManager::load_table(&TableSource::from(input))?;
        if table.is_empty() {
            warn!("{:?} has a header row but no data rows", input);
        }

        let (outcome, usage) = self.translate_table(&table, source_language).await?;

        let written = FileManager::save_outcome(&outcome, output, self.config.output.layout)?;

        log_summary(&outcome, &usage);
        for path in &written {
            info!("Success: {:?}", path);
        }

        Ok(RunReport {
            outcome,
            written,
            usage,
        })
    }
}

fn create_progress_bar() -> ProgressBar {
    let progress_bar = ProgressBar::new(0);
    let template_result = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({percent}%) {msg} {eta}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(template_result.progress_chars("█▓▒░"));
    progress_bar
}

async fn render_progress(mut events: tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>, progress_bar: ProgressBar) {
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Stage(RunStage::DetectingLanguage) => progress_bar.set_message("detecting language"),
            ProgressEvent::Stage(RunStage::Translating) => progress_bar.set_message("translating"),
            ProgressEvent::Stage(RunStage::Done) => progress_bar.finish_with_message("done"),
            ProgressEvent::Stage(RunStage::Failed) => progress_bar.abandon_with_message("failed"),
            ProgressEvent::Stage(_) => {}
            ProgressEvent::SourceLanguage { language, detected } => {
                let how = if detected { "detected" } else { "given" };
                progress_bar.println(format!("Source language: {} ({})", language.display_name(), how));
            }
            ProgressEvent::MissingColumns(columns) => {
                progress_bar.println(format!("Missing columns: {}", columns.join(", ")));
            }
            ProgressEvent::Progress { completed, total } => {
                progress_bar.set_length(total as u64);
                progress_bar.set_position(completed as u64);
            }
            ProgressEvent::RowFailed { row, language, .. } => {
                progress_bar.println(format!("Row {} failed for {}", row + 1, language));
            }
        }
    }
}

fn log_summary(outcome: &RunOutcome, usage: &TokenUsageStats) {
    let summary = &outcome.summary;
    info!(
        "Translated {} cell(s) from {} into {} language(s): {} succeeded, {} failed, {} empty",
        summary.translatable_cells,
        outcome.source_language,
        outcome.target_languages().len(),
        summary.translated_cells,
        summary.failed_cells,
        summary.empty_cells
    );
    if summary.failed_cells > 0 {
        warn!(
            "{:.1}% of cells hold an error placeholder, {} row task(s) failed",
            summary.failure_rate() * 100.0,
            summary.failed_rows
        );
    }
    if !outcome.missing_columns.is_empty() {
        warn!("Skipped missing column(s): {}", outcome.missing_columns.join(", "));
    }
    debug!("{}", usage.summary());
}
