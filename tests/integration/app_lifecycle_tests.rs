/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use std::sync::Arc;

use polyglot_sheets::app_config::OutputLayout;
use polyglot_sheets::app_controller::Controller;
use polyglot_sheets::errors::{AppError, ProviderError, TranslationError};
use polyglot_sheets::file_utils::{FileManager, TableSource};
use polyglot_sheets::language_utils::LanguageCode;
use polyglot_sheets::providers::mock::MockProvider;

use crate::common;

const CATALOGUE_CSV: &str = "Ref,Description,Prix\n\
1001,Perceuse sans fil pour les travaux de la maison,89\n\
1002,Scie circulaire pour les professionnels du bâtiment,\n";

/// Test the controller initialization with the real provider
#[test]
fn test_controller_initialization_withDefaultConfig_shouldSucceed() -> Result<()> {
    let controller = Controller::with_config(common::test_config())?;
    assert_eq!(controller.config().api.model, "gpt-4.1-mini");
    Ok(())
}

/// Test a full run from a CSV file to one CSV file per language
#[tokio::test]
async fn test_run_withCsvInput_shouldWriteEveryLanguage() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "catalogue.csv", CATALOGUE_CSV)?;
    let output = temp_dir.path().join("out").join("traductions.csv");

    let mut config = common::test_config();
    config.translation.columns = vec!["Description".to_string(), "Marque".to_string()];
    let provider = MockProvider::working().with_custom_response(common::language_tagging_response);
    let controller = Controller::with_provider(config, Arc::new(provider.clone())).without_progress();

    let report = controller.run(&input, &output, None).await?;

    assert_eq!(report.outcome.source_language, LanguageCode::Fr);
    assert!(report.outcome.detected);
    assert_eq!(report.outcome.missing_columns, vec!["Marque".to_string()]);
    assert_eq!(report.written.len(), 7);
    assert_eq!(report.usage.api_calls, 12);
    assert_eq!(provider.request_count(), 12);

    let german_path = temp_dir.path().join("out").join("traductions_DE.csv");
    let german = FileManager::load_table(&TableSource::from(german_path.as_path()))?;
    assert_eq!(german.cell(0, 1), Some("Perceuse sans fil pour les travaux de la maison (German)"));
    assert_eq!(german.cell(0, 2), Some("89"));
    assert_eq!(german.cell(1, 2), None);
    Ok(())
}

/// Test a full run to a workbook in the wide layout
#[tokio::test]
async fn test_run_withWideLayout_shouldWriteSingleSheet() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "catalogue.csv", CATALOGUE_CSV)?;
    let output = temp_dir.path().join("traductions.xlsx");

    let mut config = common::test_config();
    config.translation.columns = vec!["B".to_string()];
    config.output.layout = OutputLayout::Wide;
    let controller = Controller::with_provider(config, Arc::new(MockProvider::working())).without_progress();

    let report = controller.run(&input, &output, Some(LanguageCode::Fr)).await?;
    assert_eq!(report.written, vec![output.clone()]);

    let wide = FileManager::load_table(&TableSource::from(output.as_path()))?;
    assert_eq!(wide.column_count(), 3 + 6);
    assert_eq!(wide.columns()[3], "Description_EN");
    assert_eq!(
        wide.cell(1, 8),
        Some("[TRANSLATED] Scie circulaire pour les professionnels du bâtiment")
    );
    Ok(())
}

/// Test a run on a file that does not exist
#[tokio::test]
async fn test_run_withMissingInput_shouldFailWithoutCalls() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = MockProvider::working();
    let controller = Controller::with_provider(common::test_config(), Arc::new(provider.clone())).without_progress();

    let result = controller
        .run(&temp_dir.path().join("absent.xlsx"), &temp_dir.path().join("out.xlsx"), None)
        .await;

    assert!(matches!(result, Err(AppError::File(_))));
    assert_eq!(provider.request_count(), 0);
    Ok(())
}

/// Test that a run where everything failed is an error and writes nothing
#[tokio::test]
async fn test_run_withFailingProvider_shouldFailAndWriteNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "catalogue.csv", CATALOGUE_CSV)?;
    let output = temp_dir.path().join("traductions.xlsx");

    let mut config = common::test_config();
    config.translation.retry_count = 1;
    let controller = Controller::with_provider(config, Arc::new(MockProvider::failing())).without_progress();

    let result = controller.run(&input, &output, Some(LanguageCode::Fr)).await;

    assert!(matches!(
        result,
        Err(AppError::Translation(TranslationError::AllUnitsFailed { .. }))
    ));
    assert!(!output.exists());
    Ok(())
}

/// Test the connection check
#[tokio::test]
async fn test_checkConnection_shouldFollowProvider() {
    let working = Controller::with_provider(common::test_config(), Arc::new(MockProvider::working()));
    assert!(working.check_connection().await.is_ok());

    let rejected = Controller::with_provider(common::test_config(), Arc::new(MockProvider::auth_failure()));
    assert!(matches!(
        rejected.check_connection().await,
        Err(AppError::Provider(ProviderError::AuthenticationError(_)))
    ));
}
