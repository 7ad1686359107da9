/*!
 * Prompt templates for spreadsheet cell translation.
 *
 * Instructions go in the system message; the user message is the cell text
 * and nothing else, so a cell can never be mistaken for an instruction.
 */

use crate::language_utils::{LanguageCode, SUPPORTED_LANGUAGES};

/// System prompt template for cell translation.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default system prompt for product catalogue translation.
    pub const CELL_TRANSLATOR: &'static str = r#"You are a professional translator specialized in technical and marketing content.
Translate the text provided by the user from {source_language} into {target_language}.

Rules:
- Keep HTML tags, placeholders and any other markup exactly as they are
- Keep numbers, units, dimensions, references and technical specifications unchanged
- Use the vocabulary of the trade: technical terms stay technical, commercial copy stays commercial
- Keep the tone and the formatting of the original
- Answer with the translated text only, without quotes, notes or explanations"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default cell translator template.
    pub fn cell_translator() -> Self {
        Self::new(Self::CELL_TRANSLATOR)
    }

    /// Render the template with the given variables.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }

    /// Render the template for a language pair, using display names.
    pub fn render_for(&self, source: LanguageCode, target: LanguageCode) -> String {
        self.render(source.display_name(), target.display_name())
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::cell_translator()
    }
}

/// System prompt for classifying the language of one snippet.
pub fn detection_prompt() -> String {
    let codes: Vec<&str> = SUPPORTED_LANGUAGES.iter().map(|l| l.code()).collect();
    format!(
        "Identify the language of the text provided by the user. \
         Answer with exactly one of these codes and nothing else: {}.",
        codes.join(", ")
    )
}
