/*!
 * Integration tests for concurrent translation runs
 */

use anyhow::Result;
use std::time::Duration;

use polyglot_sheets::errors::TranslationError;
use polyglot_sheets::language_utils::{LanguageCode, SUPPORTED_LANGUAGES, TargetSelection};
use polyglot_sheets::providers::CompletionRequest;
use polyglot_sheets::providers::mock::MockProvider;
use polyglot_sheets::spreadsheet::{Table, default_columns};
use polyglot_sheets::translation::core::is_error_placeholder;
use polyglot_sheets::translation::detection::LanguageClassifier;
use polyglot_sheets::translation::orchestrator::{Orchestrator, OrchestratorOptions, ProgressEvent, RunStage};

use crate::common;

fn greetings() -> Table {
    Table::from_strings(&["Ref", "Libellé"], &[&["1", "Bonjour"], &["2", "Au revoir"]])
}

fn panic_on_boom(request: &CompletionRequest) -> String {
    if request.prompt.contains("BOOM") {
        panic!("responder exploded");
    }
    common::language_tagging_response(request)
}

fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Two greetings in column B, source forced to French
#[tokio::test]
async fn test_run_withForcedFrenchSource_shouldProduceSevenTables() -> Result<()> {
    common::init_logging();
    let provider = MockProvider::working().with_custom_response(common::language_tagging_response);
    let mut orchestrator = common::mock_orchestrator(provider.clone());

    let outcome = orchestrator.run(&greetings(), &default_columns(), Some(LanguageCode::Fr)).await?;

    assert_eq!(outcome.source_language, LanguageCode::Fr);
    assert!(!outcome.detected);
    let languages: Vec<LanguageCode> = outcome.tables().iter().map(|(lang, _)| *lang).collect();
    assert_eq!(languages, SUPPORTED_LANGUAGES.to_vec());

    let english = outcome.table(LanguageCode::En).unwrap();
    let bonjour = english.cell(0, 1).unwrap();
    assert_eq!(bonjour, "Bonjour (English)");
    assert!(!is_error_placeholder(bonjour));
    assert_eq!(english.cell(1, 1), Some("Au revoir (English)"));
    assert_eq!(outcome.table(LanguageCode::Pt).unwrap().cell(0, 1), Some("Bonjour (Portuguese)"));

    // Unselected columns are copied as they are
    assert_eq!(english.cell(0, 0), Some("1"));

    assert_eq!(outcome.summary.translated_cells, 12);
    assert_eq!(outcome.summary.failed_cells, 0);
    assert_eq!(provider.request_count(), 12);
    assert_eq!(orchestrator.stage(), RunStage::Done);
    Ok(())
}

/// Empty cells stay null in every language and cost no call
#[tokio::test]
async fn test_run_withEmptyCell_shouldLeaveNullWithoutCalls() -> Result<()> {
    let provider = MockProvider::working();
    let mut orchestrator = common::mock_orchestrator(provider.clone());
    let table = Table::from_strings(&["Ref", "Libellé"], &[&["1", ""], &["2", "Bonjour"]]);

    let outcome = orchestrator.run(&table, &["B"], Some(LanguageCode::Fr)).await?;

    for language in outcome.target_languages() {
        let translated = outcome.table(language).unwrap();
        assert_eq!(translated.cell(0, 1), None, "{}", language);
        assert_eq!(translated.cell(1, 1), Some("[TRANSLATED] Bonjour"));
    }
    assert!(provider.requests().iter().all(|request| request.prompt == "Bonjour"));
    assert_eq!(provider.request_count(), 6);
    assert_eq!(outcome.summary.empty_cells, 6);
    Ok(())
}

/// Missing columns are reported and the rest is processed
#[tokio::test]
async fn test_run_withMissingColumn_shouldWarnAndContinue() -> Result<()> {
    let mut orchestrator = common::mock_orchestrator(MockProvider::working());
    let mut events = orchestrator.subscribe();

    let outcome = orchestrator
        .run(&greetings(), &["Libellé", "Prix"], Some(LanguageCode::Fr))
        .await?;

    assert_eq!(outcome.missing_columns, vec!["Prix".to_string()]);
    assert_eq!(outcome.translated_columns.len(), 1);
    assert_eq!(outcome.summary.translated_cells, 12);

    let events = drain(&mut events);
    assert!(events.contains(&ProgressEvent::MissingColumns(vec!["Prix".to_string()])));
    Ok(())
}

/// Progress is monotonic and reaches completion exactly once
#[tokio::test]
async fn test_run_progressEvents_shouldBeMonotonicAndCompleteOnce() -> Result<()> {
    let mut orchestrator = common::mock_orchestrator(MockProvider::working());
    let mut events = orchestrator.subscribe();

    orchestrator.run(&common::french_catalogue(), &["B", "C"], None).await?;

    let events = drain(&mut events);
    let fractions: Vec<f64> = events.iter().filter_map(|event| event.fraction()).collect();
    assert_eq!(fractions.first(), Some(&0.0));
    assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(fractions.iter().filter(|fraction| **fraction == 1.0).count(), 1);
    assert_eq!(fractions.last(), Some(&1.0));

    // 3 rows into 6 languages
    assert!(events.contains(&ProgressEvent::Progress { completed: 18, total: 18 }));
    assert!(events.contains(&ProgressEvent::SourceLanguage {
        language: LanguageCode::Fr,
        detected: true
    }));
    assert_eq!(events.last(), Some(&ProgressEvent::Stage(RunStage::Done)));
    Ok(())
}

/// The source table is returned untouched
#[tokio::test]
async fn test_run_shouldKeepSourceTableUnchanged() -> Result<()> {
    let table = common::french_catalogue();
    let mut orchestrator = common::mock_orchestrator(MockProvider::working());

    let outcome = orchestrator.run(&table, &["Description", "Details"], None).await?;

    assert_eq!(outcome.tables()[0].0, LanguageCode::Fr);
    assert_eq!(outcome.source_table(), Some(&table));
    Ok(())
}

/// Every cell failing fails the run
#[tokio::test]
async fn test_run_withEveryCallFailing_shouldReportAllUnitsFailed() {
    let mut orchestrator = common::mock_orchestrator(MockProvider::failing());
    let mut events = orchestrator.subscribe();

    let result = orchestrator.run(&greetings(), &["B"], Some(LanguageCode::Fr)).await;

    match result {
        Err(TranslationError::AllUnitsFailed { failed, last_error }) => {
            assert_eq!(failed, 12);
            assert!(!last_error.is_empty());
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(orchestrator.stage(), RunStage::Failed);
    assert!(drain(&mut events).contains(&ProgressEvent::Stage(RunStage::Failed)));
}

/// Total failure can be downgraded to placeholders
#[tokio::test]
async fn test_run_withTotalFailureAllowed_shouldReturnPlaceholders() -> Result<()> {
    let options = OrchestratorOptions {
        fail_on_total_failure: false,
        ..OrchestratorOptions::default()
    };
    let mut orchestrator = Orchestrator::new(
        common::mock_client(MockProvider::failing()),
        LanguageClassifier::default(),
        options,
    );

    let outcome = orchestrator.run(&greetings(), &["B"], Some(LanguageCode::Fr)).await?;

    assert_eq!(outcome.summary.failed_cells, 12);
    assert_eq!(outcome.summary.failure_rate(), 1.0);
    assert_eq!(outcome.table(LanguageCode::De).unwrap().cell(1, 1), Some("[ERROR: Au revoir]"));
    Ok(())
}

/// Partial failures stay local to their cells
#[tokio::test]
async fn test_run_withIntermittentFailures_shouldSucceedWithRetries() -> Result<()> {
    let provider = MockProvider::intermittent(4);
    let options = OrchestratorOptions {
        workers: 1,
        ..OrchestratorOptions::default()
    };
    let mut orchestrator = Orchestrator::new(common::mock_client(provider.clone()), LanguageClassifier::default(), options);

    let outcome = orchestrator.run(&greetings(), &["B"], Some(LanguageCode::Fr)).await?;

    // Each failure is followed by a successful retry
    assert_eq!(outcome.summary.failed_cells, 0);
    assert_eq!(outcome.summary.translated_cells, 12);
    assert!(provider.request_count() > 12);
    Ok(())
}

/// A crashing row task becomes placeholders for that row only
#[tokio::test]
async fn test_run_withPanickingRowTask_shouldReportRowFailure() -> Result<()> {
    let provider = MockProvider::working().with_custom_response(panic_on_boom);
    let mut orchestrator = common::mock_orchestrator(provider);
    let mut events = orchestrator.subscribe();
    let table = Table::from_strings(&["Ref", "Libellé"], &[&["1", "Bonjour"], &["2", "BOOM"]]);

    let outcome = orchestrator.run(&table, &["B"], Some(LanguageCode::Fr)).await?;

    assert_eq!(outcome.summary.failed_rows, 6);
    for language in outcome.target_languages() {
        let translated = outcome.table(language).unwrap();
        assert!(!is_error_placeholder(translated.cell(0, 1).unwrap()));
        assert_eq!(translated.cell(1, 1), Some("[ERROR: BOOM]"));
    }

    let row_failures = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, ProgressEvent::RowFailed { row: 1, .. }))
        .count();
    assert_eq!(row_failures, 6);
    Ok(())
}

/// A fixed target list replaces the default selection
#[tokio::test]
async fn test_run_withFixedTargets_shouldOnlyProduceThoseLanguages() -> Result<()> {
    let options = OrchestratorOptions {
        target_selection: TargetSelection::Fixed(vec![LanguageCode::Fr, LanguageCode::En, LanguageCode::It]),
        workers: 2,
        ..OrchestratorOptions::default()
    };
    let provider = MockProvider::working();
    let mut orchestrator = Orchestrator::new(common::mock_client(provider.clone()), LanguageClassifier::default(), options);

    let outcome = orchestrator.run(&greetings(), &["B"], Some(LanguageCode::Fr)).await?;

    assert_eq!(outcome.target_languages(), vec![LanguageCode::En, LanguageCode::It]);
    assert_eq!(outcome.tables().len(), 3);
    assert_eq!(provider.request_count(), 4);
    Ok(())
}

/// A table without data rows completes immediately
#[tokio::test]
async fn test_run_withHeaderOnlyTable_shouldCompleteWithoutCalls() -> Result<()> {
    let provider = MockProvider::working();
    let mut orchestrator = common::mock_orchestrator(provider.clone());
    let mut events = orchestrator.subscribe();
    let table = Table::from_strings(&["Ref", "Libellé"], &[]);

    let outcome = orchestrator.run(&table, &["B"], None).await?;

    assert_eq!(outcome.source_language, LanguageCode::Fr);
    assert_eq!(outcome.tables().len(), 7);
    assert_eq!(provider.request_count(), 0);
    assert!(drain(&mut events).contains(&ProgressEvent::Progress { completed: 0, total: 0 }));
    Ok(())
}

/// A table without any column cannot be translated
#[tokio::test]
async fn test_run_withNoColumns_shouldRejectInput() {
    let provider = MockProvider::working();
    let mut orchestrator = common::mock_orchestrator(provider.clone());

    let result = orchestrator.run(&Table::new(Vec::new()), &["B"], None).await;

    assert!(matches!(result, Err(TranslationError::InvalidInput(_))));
    assert_eq!(provider.request_count(), 0);
}

/// Abandoning a run stops scheduling but lets in-flight calls finish
#[tokio::test(start_paused = true)]
async fn test_run_whenAbandoned_shouldDrainInFlightRowTasks() {
    let provider = MockProvider::slow(1000);
    let options = OrchestratorOptions {
        workers: 2,
        ..OrchestratorOptions::default()
    };
    let mut orchestrator = Orchestrator::new(common::mock_client(provider.clone()), LanguageClassifier::default(), options);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(500),
        orchestrator.run(&common::french_catalogue(), &["Description", "Details"], Some(LanguageCode::Fr)),
    )
    .await;
    assert!(abandoned.is_err());

    // One call per started row, none returned yet
    assert_eq!(provider.request_count(), 2);
    assert_eq!(provider.completed_count(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;

    // Rows 1 and 2 of the first target: two cells and one cell, nothing new scheduled
    assert_eq!(provider.request_count(), 3);
    assert_eq!(provider.completed_count(), 3);
}
