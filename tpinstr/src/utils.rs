use strum::{EnumIs, EnumTryAs};
use thiserror::Error;

/// A single diagnostic produced while parsing a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParserError {
    pub file: Option<String>,
    pub start: usize,
    pub end: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// Renaming targeted a write slot holding a different variable.
    #[error(
        "Cannot rename write target `{requested}` of instruction `{instruction}`: the instruction writes `{actual}`."
    )]
    WriteTargetMismatch {
        instruction: String,
        requested: String,
        actual: String,
    },

    /// Renaming targeted an instruction that writes nothing.
    #[error(
        "Cannot rename write target `{requested}` of instruction `{instruction}`: the instruction does not write any variable."
    )]
    NoWriteTarget {
        instruction: String,
        requested: String,
    },

    /// A conditional jump lands outside of the program.
    #[error(
        "The jump at line {line} targets line {target}, which lies outside of the program (valid targets are 0..={len})."
    )]
    JumpOutOfRange { line: usize, target: i64, len: usize },

    /// An SSA name is defined more than once.
    #[error(
        "Multiple instructions share the destination `{duplicate}`, violating the single assignment property."
    )]
    DuplicateSsaName { duplicate: String },

    /// A use is not dominated by the definition it refers to.
    #[error(
        "The use of `{name}` in block `{block}` is not dominated by its definition in block `{definition}`."
    )]
    UndominatedUse {
        name: String,
        block: String,
        definition: String,
    },

    /// Unknown move direction.
    #[error(
        "Unsupported move direction `{0}` (expected one of: forward, backward, left, right)."
    )]
    UnknownDirection(String),

    /// Unknown pen status.
    #[error("Unsupported pen status `{0}` (expected one of: penup, pendown).")]
    UnknownPenStatus(String),

    /// The listing could not be parsed.
    #[error("Failed to parse listing: {} error(s)", errors.len())]
    ParserErrors { errors: Vec<ParserError> },
}
