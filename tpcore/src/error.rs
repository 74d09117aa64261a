use thiserror::Error;

#[derive(Debug, Error)]
pub enum TpError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unsupported construct at line {line} (`{instruction}`): {reason}")]
    Unsupported {
        line: usize,
        instruction: String,
        reason: String,
    },

    #[error("Cannot encode `{instruction}` in block {block}: {reason}")]
    Encoding {
        block: String,
        instruction: String,
        reason: String,
    },

    #[error(
        "Block {block} is reachable through a back edge; loops must be unrolled before encoding"
    )]
    CyclicControlFlow { block: String },

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParseError {
        source: toml::de::Error,
        file: String,
    },

    #[error("Invalid angle table at line {line}: {reason}")]
    AngleTable { line: usize, reason: String },

    #[error(transparent)]
    Instr(#[from] tpinstr::utils::Error),

    #[error(transparent)]
    Solver(#[from] tpformal::Error),
}

pub type TpResult<T> = Result<T, TpError>;
