/*!
 * # polyglot-sheets
 *
 * A Rust library for translating spreadsheets into seven European languages
 * with an OpenAI-compatible completion API.
 *
 * ## Features
 *
 * - Read `.xlsx`, `.xlsm`, `.xls`, `.ods`, `.csv` and `.tsv` tables
 * - Detect the dominant source language of the selected columns
 * - Translate every selected cell into French, English, German, Spanish,
 *   Italian, Dutch and Portuguese, with bounded concurrency
 * - Retry transient failures with exponential backoff and jitter
 * - Keep a visible placeholder in cells that could not be translated
 * - Write one sheet per language, or a single wide sheet
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `spreadsheet`: In-memory table model and column resolution
 * - `translation`: Translation services:
 *   - `translation::core`: Translation client with retries
 *   - `translation::detection`: Source language classification
 *   - `translation::task`: Row translation task
 *   - `translation::orchestrator`: Concurrent run and result assembly
 * - `file_utils`: Table reading and writing
 * - `app_controller`: Main application controller
 * - `language_utils`: Supported languages and ISO code utilities
 * - `providers`: Completion API clients:
 *   - `providers::openai`: OpenAI-compatible API client
 *   - `providers::mock`: Scripted provider for tests
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod spreadsheet;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use errors::{AppError, ProviderError, TableError, TranslationError};
pub use language_utils::{LanguageCode, SUPPORTED_LANGUAGES, TargetSelection};
pub use spreadsheet::Table;
pub use translation::{Orchestrator, ProgressEvent, RunOutcome, TranslationClient};
