//! Keyed digest derivation.

use keyframe_core::DerivationKey;

/// Deterministic keyed digest over an arbitrary payload.
///
/// Implementations must be keyed: without the key the digest of a known
/// message must not be computable.
pub trait SecretDeriver: Send + Sync {
    /// Digest of `message`, as printable text.
    fn derive(&self, message: &[u8]) -> String;
}

/// BLAKE3 in keyed mode, hex encoded.
///
/// Matches `b3sum --keyed --no-names` and the ingest service's passphrase check.
#[derive(Debug, Clone)]
pub struct KeyedBlake3 {
    key: DerivationKey,
}

impl KeyedBlake3 {
    pub const fn new(key: DerivationKey) -> Self {
        Self { key }
    }
}

impl SecretDeriver for KeyedBlake3 {
    fn derive(&self, message: &[u8]) -> String {
        blake3::keyed_hash(self.key.as_bytes(), message)
            .to_hex()
            .to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn deriver(byte: u8) -> KeyedBlake3 {
        KeyedBlake3::new(DerivationKey::from_bytes([byte; 32]))
    }

    #[test]
    fn derive_is_deterministic() {
        let a = deriver(1).derive(b"#!::u=1");
        let b = deriver(1).derive(b"#!::u=1");
        assert_eq!(a, b);
    }

    #[test]
    fn derive_depends_on_key() {
        assert_ne!(deriver(1).derive(b"#!::u=1"), deriver(2).derive(b"#!::u=1"));
    }

    #[test]
    fn derive_depends_on_message() {
        let deriver = deriver(1);
        assert_ne!(deriver.derive(b"#!::u=1"), deriver.derive(b"#!::u=2"));
    }

    #[test]
    fn derive_is_keyed_not_plain_hash() {
        let plain = blake3::hash(b"#!::u=1").to_hex().to_string();
        assert_ne!(deriver(0).derive(b"#!::u=1"), plain);
    }

    #[test]
    fn digest_is_lowercase_hex_of_32_bytes() {
        let digest = deriver(3).derive(b"payload");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
