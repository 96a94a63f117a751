//! Random credentials for newly provisioned streams.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Length of generated account passwords.
pub const DEFAULT_PASSWORD_LEN: usize = 12;

/// Random bytes behind each ingest token.
const TOKEN_BYTES: usize = 32;

/// Produces ingest tokens and account passwords from the OS RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialGenerator;

impl CredentialGenerator {
    pub const fn new() -> Self {
        Self
    }

    /// URL-safe opaque bearer token (43 characters).
    pub fn random_token(&self) -> Result<String, CryptoError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::RandomSource(e.to_string()))?;
        let token = URL_SAFE_NO_PAD.encode(bytes);
        bytes.zeroize();
        Ok(token)
    }

    /// Password of `len` ASCII letters and digits.
    pub fn random_password(&self, len: usize) -> Result<String, CryptoError> {
        if len == 0 {
            return Err(CryptoError::InvalidLength(len));
        }
        Ok(OsRng
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect())
    }
}
