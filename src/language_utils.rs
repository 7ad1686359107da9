use anyhow::{Result, anyhow};
use isolang::Language;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language utilities for the closed set of supported languages
///
/// The translator works with exactly seven languages. Each one has an
/// upper-case two-letter code that doubles as the output sheet name and
/// column suffix, plus a display name used in prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LanguageCode {
    #[serde(rename = "FR", alias = "fr")]
    Fr,
    #[serde(rename = "EN", alias = "en")]
    En,
    #[serde(rename = "DE", alias = "de")]
    De,
    #[serde(rename = "ES", alias = "es")]
    Es,
    #[serde(rename = "IT", alias = "it")]
    It,
    #[serde(rename = "NL", alias = "nl")]
    Nl,
    #[serde(rename = "PT", alias = "pt")]
    Pt,
}

/// All supported languages, in table order.
///
/// Target languages are always produced in this order.
pub const SUPPORTED_LANGUAGES: [LanguageCode; 7] = [
    LanguageCode::Fr,
    LanguageCode::En,
    LanguageCode::De,
    LanguageCode::Es,
    LanguageCode::It,
    LanguageCode::Nl,
    LanguageCode::Pt,
];

/// Language used when detection has nothing to go on
pub const DEFAULT_LANGUAGE: LanguageCode = LanguageCode::Fr;

impl LanguageCode {
    /// Upper-case code, e.g. `FR`
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fr => "FR",
            Self::En => "EN",
            Self::De => "DE",
            Self::Es => "ES",
            Self::It => "IT",
            Self::Nl => "NL",
            Self::Pt => "PT",
        }
    }

    /// ISO 639-1 code, e.g. `fr`
    pub fn iso_639_1(&self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
            Self::De => "de",
            Self::Es => "es",
            Self::It => "it",
            Self::Nl => "nl",
            Self::Pt => "pt",
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Fr => "French",
            Self::En => "English",
            Self::De => "German",
            Self::Es => "Spanish",
            Self::It => "Italian",
            Self::Nl => "Dutch",
            Self::Pt => "Portuguese",
        }
    }

    /// All supported languages in table order
    pub fn all() -> &'static [LanguageCode] {
        &SUPPORTED_LANGUAGES
    }

    /// Parse a language given as a code or a name.
    ///
    /// Accepts the two-letter codes in any case, ISO 639-3 and 639-2/B codes
    /// (`fra`, `fre`, `deu`, `ger`, ...) and English or native language names.
    /// Languages outside the supported set yield `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        let part1 = normalize_to_part1(&normalized).ok()?;
        SUPPORTED_LANGUAGES
            .iter()
            .copied()
            .find(|lang| lang.iso_639_1() == part1)
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for LanguageCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            anyhow!(
                "Unsupported language: {} (expected one of {})",
                s,
                SUPPORTED_LANGUAGES.iter().map(|l| l.code()).collect::<Vec<_>>().join(", ")
            )
        })
    }
}

/// How target languages are picked once the source language is known
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetSelection {
    /// Every supported language except the source
    #[default]
    AllExceptSource,
    /// A fixed list; the source language is still dropped from it
    Fixed(Vec<LanguageCode>),
}

impl TargetSelection {
    /// Compute the target languages for a source language.
    ///
    /// The result never contains the source, never contains duplicates and
    /// follows table order for `AllExceptSource` and list order for `Fixed`.
    pub fn targets_for(&self, source: LanguageCode) -> Vec<LanguageCode> {
        let candidates: &[LanguageCode] = match self {
            Self::AllExceptSource => &SUPPORTED_LANGUAGES,
            Self::Fixed(list) => list,
        };

        let mut targets = Vec::with_capacity(candidates.len());
        for lang in candidates {
            if *lang != source && !targets.contains(lang) {
                targets.push(*lang);
            }
        }
        targets
    }
}

/// Map an ISO 639-2/B code to its ISO 639-2/T counterpart
fn part2b_to_part2t(code: &str) -> Option<&'static str> {
    match code {
        "fre" => Some("fra"),
        "ger" => Some("deu"),
        "dut" => Some("nld"),
        _ => None,
    }
}

/// Normalize a code or name to an ISO 639-1 (2-letter) code
pub fn normalize_to_part1(input: &str) -> Result<String> {
    let normalized = input.trim().to_lowercase();

    let language = match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => {
            let part2t = part2b_to_part2t(&normalized).unwrap_or(&normalized);
            Language::from_639_3(part2t)
        }
        _ => None,
    };

    let language = language
        .or_else(|| language_from_name(&normalized))
        .ok_or_else(|| anyhow!("Unknown language: {}", input))?;

    language
        .to_639_1()
        .map(|code| code.to_string())
        .ok_or_else(|| anyhow!("Language has no ISO 639-1 code: {}", input))
}

/// Check if two language codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part1(code1), normalize_to_part1(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Look a language up by its English name or its autonym, ignoring case
fn language_from_name(name: &str) -> Option<Language> {
    let english = name.to_string();
    let native = name.to_string();

    Language::match_names(move |candidate| {
        candidate.split(';').any(|part| part.trim().eq_ignore_ascii_case(&english))
    })
    .next()
    .or_else(|| {
        Language::match_autonyms(move |candidate| candidate.to_lowercase() == native).next()
    })
}
