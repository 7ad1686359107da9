/*!
 * Prompt engineering for spreadsheet translation.
 *
 * This module provides:
 * - The system prompt template for cell translation
 * - The system prompt for language classification
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptTemplate, detection_prompt};
