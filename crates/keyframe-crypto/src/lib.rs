//! Keyframe stream credential primitives.
//!
//! ## Primitives
//!
//! - **Passphrases**: keyed BLAKE3 over the SRT stream id, hex encoded. The
//!   ingest service recomputes the same digest to accept a connection, so
//!   passphrases are never stored.
//! - **Ingest tokens**: 32 bytes from the OS RNG, URL-safe base64.
//! - **Account passwords**: 12 alphanumeric characters from the OS RNG.

pub mod credentials;
pub mod derive;
pub mod error;
pub mod srt;

pub use credentials::{CredentialGenerator, DEFAULT_PASSWORD_LEN};
pub use derive::{KeyedBlake3, SecretDeriver};
pub use error::CryptoError;
pub use srt::SrtCredentials;
