//! Key pair returned by key generation.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Seed, public key and secret key produced by one key generation.
///
/// The seed and secret key are wiped when the pair is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    seed: Vec<u8>,
    public_key: Vec<u8>,
    secret_key: Vec<u8>,
}

impl KeyPair {
    pub(crate) fn new(seed: Vec<u8>, public_key: Vec<u8>, secret_key: Vec<u8>) -> Self {
        Self {
            seed,
            public_key,
            secret_key,
        }
    }

    /// Seed the pair was derived from.
    pub fn seed(&self) -> &[u8] {
        &self.seed
    }

    /// Public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Secret key.
    pub fn secret_key(&self) -> &[u8] {
        &self.secret_key
    }
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("seed", &"<redacted>")
            .field("public_key", &self.public_key.len())
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let pair = KeyPair::new(vec![0xAB; 4], vec![1, 2, 3], vec![0xCD; 8]);
        let shown = format!("{pair:?}");
        assert!(shown.contains("<redacted>"));
        assert!(!shown.contains("171"));
        assert!(!shown.contains("205"));
    }

    #[test]
    fn test_zeroize_clears_all_fields() {
        let mut pair = KeyPair::new(vec![1; 4], vec![2; 4], vec![3; 4]);
        pair.zeroize();
        assert!(pair.seed().is_empty());
        assert!(pair.secret_key().is_empty());
    }
}
