//! Crypto error types.

/// Errors from credential generation.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("OS random source failed: {0}")]
    RandomSource(String),

    #[error("Invalid length: {0}")]
    InvalidLength(usize),
}
