/*!
 * Tests for table reading and writing
 */

use anyhow::Result;
use bytes::Bytes;
use calamine::{Reader, open_workbook_auto};
use polyglot_sheets::app_config::OutputLayout;
use polyglot_sheets::errors::TableError;
use polyglot_sheets::file_utils::{FileManager, TableFormat, TableSource};

use crate::common;

/// Test loading a CSV file from disk
#[test]
fn test_load_table_withCsvFile_shouldReadHeaderAndRows() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "catalogue.csv",
        "Ref,Description\n1001,\"Perceuse, sans fil\"\n1002,\n",
    )?;

    let table = FileManager::load_table(&TableSource::from(path.as_path()))?;

    assert_eq!(table.columns(), &["Ref".to_string(), "Description".to_string()]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(0, 1), Some("Perceuse, sans fil"));
    assert_eq!(table.cell(1, 1), None);
    Ok(())
}

/// Test loading a TSV buffer
#[test]
fn test_load_table_withTsvBytes_shouldUseTabDelimiter() -> Result<()> {
    let source = TableSource::Bytes {
        data: Bytes::from_static(b"Ref\tText\n1\tBonjour, le monde\n"),
        format: TableFormat::Tsv,
    };

    let table = FileManager::load_table(&source)?;
    assert_eq!(table.column_count(), 2);
    assert_eq!(table.cell(0, 1), Some("Bonjour, le monde"));
    Ok(())
}

/// Test loading an empty delimited file
#[test]
fn test_load_table_withEmptyCsv_shouldReportMissingHeader() {
    let source = TableSource::Bytes {
        data: Bytes::new(),
        format: TableFormat::Csv,
    };

    let result = FileManager::load_table(&source);
    assert!(matches!(result, Err(TableError::MissingHeader(_))));
}

/// Test loading an unknown extension
#[test]
fn test_load_table_withUnknownExtension_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "notes.txt", "hello")?;

    let result = FileManager::load_table(&TableSource::from(path.as_path()));
    assert!(matches!(result, Err(TableError::UnsupportedFormat(_))));
    Ok(())
}

/// Test writing a workbook with one sheet per language, then reading it back
#[tokio::test]
async fn test_save_outcome_withXlsxDestination_shouldWriteOneSheetPerLanguage() -> Result<()> {
    let outcome = common::translated_catalogue().await?;
    let temp_dir = common::create_temp_dir()?;
    let destination = temp_dir.path().join("out").join("traductions.xlsx");

    let written = FileManager::save_outcome(&outcome, &destination, OutputLayout::Sheets)?;
    assert_eq!(written, vec![destination.clone()]);

    let workbook = open_workbook_auto(&destination)?;
    assert_eq!(workbook.sheet_names(), vec!["FR", "EN", "DE", "ES", "IT", "NL", "PT"]);

    // The first sheet is the untouched source; empty strings come back as null
    let reloaded = FileManager::load_table(&TableSource::from(destination.as_path()))?;
    let source = outcome.source_table().unwrap();
    assert_eq!(reloaded.columns(), source.columns());
    assert_eq!(reloaded.row_count(), 3);
    assert_eq!(reloaded.cell(0, 0), Some("1001"));
    assert_eq!(reloaded.cell(1, 1), source.cell(1, 1));
    assert_eq!(reloaded.cell(1, 2), None);
    Ok(())
}

/// Test writing one CSV file per language
#[tokio::test]
async fn test_save_outcome_withCsvDestination_shouldWriteOneFilePerLanguage() -> Result<()> {
    let outcome = common::translated_catalogue().await?;
    let temp_dir = common::create_temp_dir()?;
    let destination = temp_dir.path().join("traductions.csv");

    let written = FileManager::save_outcome(&outcome, &destination, OutputLayout::Sheets)?;

    assert_eq!(written.len(), 7);
    assert_eq!(written[0], temp_dir.path().join("traductions_FR.csv"));
    assert_eq!(written[1], temp_dir.path().join("traductions_EN.csv"));
    assert!(written.iter().all(|path| path.exists()));

    let english = FileManager::load_table(&TableSource::from(written[1].as_path()))?;
    assert_eq!(english.cell(0, 0), Some("1001"));
    assert_eq!(
        english.cell(0, 1),
        Some("[TRANSLATED] Perceuse sans fil pour les travaux de la maison")
    );
    assert_eq!(english.cell(1, 2), None);
    Ok(())
}

/// Test writing the wide layout to a single CSV file
#[tokio::test]
async fn test_save_outcome_withWideLayout_shouldAppendSuffixedColumns() -> Result<()> {
    let outcome = common::translated_catalogue().await?;
    let temp_dir = common::create_temp_dir()?;
    let destination = temp_dir.path().join("wide.csv");

    let written = FileManager::save_outcome(&outcome, &destination, OutputLayout::Wide)?;
    assert_eq!(written, vec![destination.clone()]);

    let wide = FileManager::load_table(&TableSource::from(destination.as_path()))?;
    // 3 source columns + 2 translated columns for each of 6 targets
    assert_eq!(wide.column_count(), 3 + 2 * 6);
    assert_eq!(wide.column_index("Description_EN"), Some(3));
    assert_eq!(wide.column_index("Details_EN"), Some(4));
    assert_eq!(wide.column_index("Details_PT"), Some(14));
    assert_eq!(wide.cell(2, 4), Some("[TRANSLATED] Garantie de deux ans"));
    Ok(())
}

/// Test writing to a read-only spreadsheet format
#[tokio::test]
async fn test_save_outcome_withOdsDestination_shouldBeUnsupported() -> Result<()> {
    let outcome = common::translated_catalogue().await?;
    let temp_dir = common::create_temp_dir()?;

    let result = FileManager::save_outcome(&outcome, temp_dir.path().join("out.ods"), OutputLayout::Sheets);
    assert!(matches!(result, Err(TableError::UnsupportedFormat(_))));
    Ok(())
}
