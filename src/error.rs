//! Structured error types for the Folio layout engine.
//!
//! Only recoverable failures live here: malformed input, fonts that cannot be
//! parsed, images that cannot be read. Broken negotiation contracts are
//! programmer errors and panic at the call site instead.

use thiserror::Error;

/// The unified error type returned by fallible public Folio functions.
#[derive(Debug, Error)]
pub enum FolioError {
    /// JSON input failed to parse as a valid Folio document.
    #[error("failed to parse document: {source}{}", hint_suffix(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },
    /// A font could not be loaded or parsed.
    #[error("font error: {0}")]
    Font(String),
    /// An image payload could not be read or decoded.
    #[error("image error: {0}")]
    Image(String),
    /// Reading input or writing output failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {hint}")
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the Folio document schema. Check element kinds and field names.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        FolioError::Parse { source: e, hint }
    }
}
