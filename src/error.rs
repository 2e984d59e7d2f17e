use std::path::PathBuf;

/// Errors surfaced at the toolkit's fallible edges.
///
/// Measure, arrange, text layout and overlay handling never produce these;
/// they clamp and degrade in place instead.
#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("invalid toolkit configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load font data: {0}")]
    FontLoad(String),

    #[error("no element with id {0}")]
    ElementNotFound(u64),
}

pub type Result<T, E = UiError> = std::result::Result<T, E>;
