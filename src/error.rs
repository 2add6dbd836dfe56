use thiserror::Error;

/// Errors produced while compiling selectors, resolving the display format,
/// decoding input, or writing output.
#[derive(Debug, Error)]
pub enum Error {
    /// The selector text does not follow the selector grammar.
    #[error("selector parsing error: {reason} at position {position} in `{text}`")]
    MalformedSelector {
        text: String,
        position: usize,
        reason: String,
    },

    /// The trailing token looks like a display directive but is not one.
    #[error("unknown display format `{0}`")]
    UnknownDisplayFormat(String),

    /// The requested input charset has no known decoder.
    #[error("unknown charset `{0}`")]
    UnknownCharset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(text: &str, position: usize, reason: impl Into<String>) -> Self {
        Error::MalformedSelector {
            text: text.to_string(),
            position,
            reason: reason.into(),
        }
    }
}
