use thiserror::Error; // Import the `Error` derive macro from the `thiserror` crate

// Errors raised by the fallible surface of the crate. Evaluation itself never
// fails with an error; it reports success through `bool`/`Option` instead.
#[derive(Debug, Error)]
pub enum EvalError {
    // Hex input given on the command line or in a data file is malformed
    #[error("invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),

    // A JSON data source could not be loaded
    #[error("data error: {0}")]
    Data(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // Evaluation reported failure; the message names what was being evaluated
    #[error("evaluation failed: {0}")]
    Unresolved(String),
}

// Type alias for results that use `EvalError` as the error type
pub type Result<T> = std::result::Result<T, EvalError>;
