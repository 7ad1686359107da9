/*!
 * Source language detection.
 *
 * A handful of snippets is sampled from the first rows of the selected
 * columns, each snippet is classified on its own, and the most frequent
 * answer wins. Detection never fails: with nothing to go on it falls back
 * to the configured default language.
 */

use async_trait::async_trait;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use whatlang::{Detector, Lang};

use super::core::TranslationClient;
use crate::language_utils::{DEFAULT_LANGUAGE, LanguageCode};
use crate::spreadsheet::{ResolvedColumn, Table, is_blank};

/// Rows read from the top of each column
pub const SAMPLE_ROWS: usize = 5;

/// Snippets must be longer than this many characters
pub const MIN_SAMPLE_CHARS: usize = 10;

/// Maximum number of snippets classified per run
pub const MAX_SAMPLES: usize = 10;

/// Which classifier back-end to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// Offline trigram statistics
    #[default]
    #[serde(alias = "stopwords")]
    Offline,
    /// Ask the completion API
    Model,
}

/// Gather detection snippets from a table.
///
/// Walks the selected columns in order and the first `SAMPLE_ROWS` rows of
/// each, keeping non-blank values longer than `MIN_SAMPLE_CHARS`, and stops
/// at `MAX_SAMPLES` snippets.
pub fn collect_samples(table: &Table, columns: &[ResolvedColumn]) -> Vec<String> {
    let mut samples = Vec::new();

    'columns: for column in columns {
        for row in 0..table.row_count().min(SAMPLE_ROWS) {
            let value = table.cell(row, column.index);
            if is_blank(value) {
                continue;
            }
            let Some(text) = value.map(str::trim) else {
                continue;
            };
            if text.chars().count() > MIN_SAMPLE_CHARS {
                samples.push(text.to_string());
                if samples.len() >= MAX_SAMPLES {
                    break 'columns;
                }
            }
        }
    }

    samples
}

/// Most frequent language; ties go to the one seen first
pub fn modal_language(votes: &[LanguageCode]) -> Option<LanguageCode> {
    let mut counts: HashMap<LanguageCode, usize> = HashMap::new();
    for vote in votes {
        *counts.entry(*vote).or_default() += 1;
    }

    let mut best: Option<(LanguageCode, usize)> = None;
    for vote in votes {
        let count = counts[vote];
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((*vote, count));
        }
    }
    best.map(|(lang, _)| lang)
}

/// Classifies a single snippet
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Best guess for one snippet, or `None` when undecided or on failure
    async fn detect_one(&self, sample: &str) -> Option<LanguageCode>;
}

/// Languages the offline detector may answer with
const DETECTABLE_LANGS: [Lang; 7] = [Lang::Fra, Lang::Eng, Lang::Deu, Lang::Spa, Lang::Ita, Lang::Nld, Lang::Por];

fn lang_to_code(lang: Lang) -> Option<LanguageCode> {
    match lang {
        Lang::Fra => Some(LanguageCode::Fr),
        Lang::Eng => Some(LanguageCode::En),
        Lang::Deu => Some(LanguageCode::De),
        Lang::Spa => Some(LanguageCode::Es),
        Lang::Ita => Some(LanguageCode::It),
        Lang::Nld => Some(LanguageCode::Nl),
        Lang::Por => Some(LanguageCode::Pt),
        _ => None,
    }
}

/// Offline statistical detector backed by whatlang
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    /// Classify a snippet synchronously; unreliable guesses are dropped
    pub fn classify(&self, sample: &str) -> Option<LanguageCode> {
        let detector = Detector::with_allowlist(DETECTABLE_LANGS.to_vec());
        let info = detector.detect(sample)?;
        if !info.is_reliable() {
            trace!("Unreliable guess {:?} ({:.2}) for {:?}", info.lang(), info.confidence(), sample);
            return None;
        }
        lang_to_code(info.lang())
    }
}

#[async_trait]
impl LanguageDetector for WhatlangDetector {
    async fn detect_one(&self, sample: &str) -> Option<LanguageCode> {
        self.classify(sample)
    }
}

/// Detector that asks the completion API for one supported code
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    client: TranslationClient,
}

impl CompletionDetector {
    pub fn new(client: TranslationClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LanguageDetector for CompletionDetector {
    async fn detect_one(&self, sample: &str) -> Option<LanguageCode> {
        match self.client.classify(sample).await {
            Ok(lang) => lang,
            Err(e) => {
                debug!("Discarding snippet after classification failure: {}", e);
                None
            }
        }
    }
}

/// Language classifier voting over several snippets
pub struct LanguageClassifier {
    detector: Box<dyn LanguageDetector>,
    default_language: LanguageCode,
}

impl LanguageClassifier {
    /// Create a classifier over any detector
    pub fn new(detector: Box<dyn LanguageDetector>, default_language: LanguageCode) -> Self {
        Self {
            detector,
            default_language,
        }
    }

    /// Create the classifier for a configured method
    pub fn for_method(method: DetectionMethod, client: &TranslationClient, default_language: LanguageCode) -> Self {
        match method {
            DetectionMethod::Offline => Self::new(Box::new(WhatlangDetector), default_language),
            DetectionMethod::Model => Self::new(Box::new(CompletionDetector::new(client.clone())), default_language),
        }
    }

    /// Language returned when no snippet can be classified
    pub fn default_language(&self) -> LanguageCode {
        self.default_language
    }

    /// Detect the dominant language of the snippets
    pub async fn detect(&self, samples: &[String]) -> LanguageCode {
        if samples.is_empty() {
            info!("No usable text samples, assuming {}", self.default_language);
            return self.default_language;
        }

        let mut votes = Vec::with_capacity(samples.len());
        for sample in samples.iter().take(MAX_SAMPLES) {
            if let Some(lang) = self.detector.detect_one(sample).await {
                votes.push(lang);
            }
        }
        debug!("Language votes over {} sample(s): {:?}", samples.len(), votes);

        modal_language(&votes).unwrap_or_else(|| {
            info!("No sample was recognised, assuming {}", self.default_language);
            self.default_language
        })
    }

    /// Sample a table and detect its dominant language
    pub async fn detect_table(&self, table: &Table, columns: &[ResolvedColumn]) -> LanguageCode {
        let samples = collect_samples(table, columns);
        self.detect(&samples).await
    }
}

impl Default for LanguageClassifier {
    fn default() -> Self {
        Self::new(Box::new(WhatlangDetector), DEFAULT_LANGUAGE)
    }
}

impl std::fmt::Debug for LanguageClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageClassifier")
            .field("default_language", &self.default_language)
            .finish_non_exhaustive()
    }
}
