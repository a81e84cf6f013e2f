use thiserror::Error;

pub mod yaml;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    /// The key path does not lead to a scalar value.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("document is not valid UTF-8")]
    Encoding,
}
