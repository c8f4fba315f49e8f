use std::path::PathBuf;

use thiserror::Error;

use crate::symbols::Category;

/// Errors raised by the tutor library
#[derive(Debug, Error)]
pub enum TutorError {
    #[error("profile file {} could not be parsed: {source}", path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("profile file {} violates its invariants: {reason}", path.display())]
    InconsistentState { path: PathBuf, reason: String },

    #[error("no profile named {0:?}")]
    NotFound(String),

    #[error("invalid profile name {0:?}")]
    InvalidProfileName(String),

    #[error("alphabet has {size} symbols but a question needs {needed}")]
    InsufficientAlphabet { size: usize, needed: usize },

    #[error("symbol {symbol:?} is not part of the {category} alphabet")]
    UnknownSymbol { symbol: char, category: Category },

    #[error("counts for {symbol:?} in {category} cannot grow any further")]
    CountOverflow { symbol: char, category: Category },

    #[error("choice {0} is out of range")]
    InvalidChoice(usize),

    #[error("a recognition is already in flight")]
    AlreadyListening,

    #[error("no speech recognizer is configured")]
    NoRecognizer,

    #[error(
        "no bundled reading named {0:?} (available: {available})",
        available = crate::reading::Reading::available().join(", ")
    )]
    UnknownReading(String),

    #[error("failed to persist profiles: {0}")]
    Persist(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history log error: {0}")]
    History(#[from] csv::Error),
}

impl TutorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TutorError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by unreadable or invalid persisted state
    pub fn is_corrupt_state(&self) -> bool {
        matches!(
            self,
            TutorError::CorruptState { .. } | TutorError::InconsistentState { .. }
        )
    }
}

pub type Result<T, E = TutorError> = std::result::Result<T, E>;

/// Outcome of a recognition attempt that produced no usable text.
///
/// None of these are fatal: the same prompt is offered again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("nothing was heard before the listen timeout")]
    Timeout,
    #[error("speech could not be understood")]
    Unintelligible,
    #[error("recognition service failed: {0}")]
    Service(String),
}
