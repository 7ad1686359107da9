/*!
 * Common test utilities for the polyglot-sheets test suite
 */

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use polyglot_sheets::app_config::Config;
use polyglot_sheets::language_utils::LanguageCode;
use polyglot_sheets::providers::CompletionRequest;
use polyglot_sheets::providers::mock::MockProvider;
use polyglot_sheets::spreadsheet::Table;
use polyglot_sheets::translation::core::{ClientSettings, TranslationClient};
use polyglot_sheets::translation::detection::LanguageClassifier;
use polyglot_sheets::translation::orchestrator::{Orchestrator, OrchestratorOptions, RunOutcome};
use polyglot_sheets::translation::retry::RetryPolicy;

/// Initialise test logging once; later calls are ignored
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    std::fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Product catalogue in French, columns A..C with descriptions in B and C
pub fn french_catalogue() -> Table {
    Table::from_strings(
        &["Ref", "Description", "Details"],
        &[
            &["1001", "Perceuse sans fil pour les travaux de la maison", "Livrée avec deux batteries"],
            &["1002", "Scie circulaire pour les professionnels du bâtiment", ""],
            &["1003", "Ponceuse compacte avec un sac à poussière", "Garantie de deux ans"],
        ],
    )
}

/// Client over a mock provider that never sleeps between retries
pub fn mock_client(provider: MockProvider) -> TranslationClient {
    TranslationClient::new(Arc::new(provider), ClientSettings::default()).with_retry_policy(RetryPolicy::immediate(3))
}

/// Configuration usable with a mock provider
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.api.api_key = "test-key".to_string();
    config.translation.retry_backoff_ms = 0;
    config
}

/// Answers with the text followed by the display name of the target language
pub fn language_tagging_response(request: &CompletionRequest) -> String {
    let target = request
        .system
        .as_deref()
        .and_then(|system| system.split(" into ").nth(1))
        .and_then(|rest| rest.split(|c: char| !c.is_alphabetic()).next())
        .unwrap_or("Unknown");
    format!("{} ({})", request.prompt, target)
}

/// Orchestrator over a mock provider with the default options
pub fn mock_orchestrator(provider: MockProvider) -> Orchestrator {
    Orchestrator::new(
        mock_client(provider),
        LanguageClassifier::default(),
        OrchestratorOptions::default(),
    )
}

/// Run the French catalogue through a working mock, source forced to French
pub async fn translated_catalogue() -> Result<RunOutcome> {
    let mut orchestrator = mock_orchestrator(MockProvider::working());
    let outcome = orchestrator
        .run(&french_catalogue(), &["Description", "Details"], Some(LanguageCode::Fr))
        .await?;
    Ok(outcome)
}
