use thiserror::Error;

use crate::sort::Sort;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Solver I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start solver `{command}`: {source}")]
    SolverNotFound {
        command: String,
        source: std::io::Error,
    },

    #[error("Solver reported an error: {0}")]
    Solver(String),

    #[error("Unexpected solver response to `{command}`: {response}")]
    Protocol { command: String, response: String },

    #[error("Malformed solver reply `{reply}`: {message}")]
    MalformedReply { reply: String, message: String },

    #[error("Sort mismatch in `{term}`: expected {expected}, found {found}")]
    SortMismatch {
        term: String,
        expected: Sort,
        found: Sort,
    },

    #[error("Symbol `{0}` was used before being declared")]
    UndeclaredSymbol(String),
}
