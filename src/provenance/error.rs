use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvenanceError {
    #[error("Cannot {operation}: no activity is running")]
    NoActiveActivity { operation: &'static str },

    #[error("Tried to finish activity '{expected}', but the current activity is '{found}'; activities must finish in the reverse order they were started")]
    StackMismatch { expected: String, found: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProvenanceError>;
