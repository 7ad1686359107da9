/*!
 * Error types for the polyglot-sheets application.
 *
 * This module contains custom error types for the different layers of the
 * application, using the thiserror crate for ergonomic error definitions.
 * Only configuration and load errors are meant to reach the top level; cell
 * and row failures are recovered inside the translation engine.
 */

use thiserror::Error;

use crate::language_utils::LanguageCode;

/// Errors that can occur when talking to a completion provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The provider answered but the completion was empty
    #[error("API returned an empty completion")]
    EmptyResponse,

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether a request that failed with this error is worth sending again.
    ///
    /// Credentials and malformed requests fail the same way every time, so
    /// they are not retried. Timeouts (408) and rate limits (429) are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthenticationError(_) => false,
            Self::ApiError { status_code, .. } => {
                !(400..500).contains(status_code) || *status_code == 408 || *status_code == 429
            }
            _ => true,
        }
    }
}

/// Errors that can occur while reading or writing tabular files
#[derive(Error, Debug)]
pub enum TableError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text parse or write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet parse error
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Spreadsheet write error
    #[error("Failed to write spreadsheet: {0}")]
    Write(String),

    /// The file extension or declared format is not handled
    #[error("Unsupported table format: {0}")]
    UnsupportedFormat(String),

    /// The source has no header row
    #[error("Table has no header row: {0}")]
    MissingHeader(String),
}

impl From<calamine::Error> for TableError {
    fn from(error: calamine::Error) -> Self {
        Self::Spreadsheet(error.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for TableError {
    fn from(error: rust_xlsxwriter::XlsxError) -> Self {
        Self::Write(error.to_string())
    }
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Every attempt for one text failed
    #[error("Translation failed after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The error of the final attempt
        last_error: ProviderError,
    },

    /// Not a single unit of the run succeeded
    #[error("All {failed} translation unit(s) failed, last error: {last_error}")]
    AllUnitsFailed {
        /// Number of failed cells
        failed: usize,
        /// Last error observed
        last_error: String,
    },

    /// The run was started with unusable input
    #[error("Invalid run input: {0}")]
    InvalidInput(String),

    /// A row task did not complete
    #[error("Row {row} failed for {language}: {reason}")]
    RowFailed {
        /// Zero-based row index
        row: usize,
        /// Target language of the task
        language: LanguageCode,
        /// Why the task failed
        reason: String,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error while loading or saving a table
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),
}
