/*!
 * Spreadsheet translation through a completion API.
 *
 * This module contains the core functionality for translating the cells of
 * a table into every supported language. It is split into several submodules:
 *
 * - `core`: Translation client, retries and usage accounting
 * - `cache`: Per-run cache of identical cells
 * - `detection`: Source language classification
 * - `orchestrator`: Concurrent scheduling and result assembly
 * - `prompts`: Prompt templates for translation and classification
 * - `retry`: Backoff policy for failed calls
 * - `task`: Row translation task
 */

// Re-export main types for easier usage
pub use self::core::{CellTranslation, ClientSettings, TokenUsageStats, TranslationClient};
pub use self::detection::{DetectionMethod, LanguageClassifier};
pub use self::orchestrator::{Orchestrator, OrchestratorOptions, ProgressEvent, RunOutcome, RunStage, RunSummary};

// Re-export prompt types
pub use self::prompts::PromptTemplate;

// Submodules
pub mod cache;
pub mod core;
pub mod detection;
pub mod orchestrator;
pub mod prompts;
pub mod retry;
pub mod task;
