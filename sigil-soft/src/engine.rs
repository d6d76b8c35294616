//! Lattice signature engine behind the soft kernel.
//!
//! Thin dispatch over the CRYSTALS-Dilithium security levels. Everything
//! here works on host slices; the kernel copies in and out of linear memory.

use sigil_core::Zeroizing;

/// Key generation seed size shared by every level.
pub const SEED_BYTES: usize = 32;

/// Supported security levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// NIST security level 2.
    Dilithium2,
    /// NIST security level 3.
    Dilithium3,
    /// NIST security level 5.
    Dilithium5,
}

macro_rules! dispatch {
    ($level:expr, $m:ident => $body:expr) => {
        match $level {
            Level::Dilithium2 => {
                use crystals_dilithium::dilithium2 as $m;
                $body
            }
            Level::Dilithium3 => {
                use crystals_dilithium::dilithium3 as $m;
                $body
            }
            Level::Dilithium5 => {
                use crystals_dilithium::dilithium5 as $m;
                $body
            }
        }
    };
}

impl Level {
    /// Short name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Level::Dilithium2 => "dilithium2",
            Level::Dilithium3 => "dilithium3",
            Level::Dilithium5 => "dilithium5",
        }
    }

    /// Detached signature size.
    pub fn signature_bytes(self) -> usize {
        dispatch!(self, d => d::SIGNBYTES)
    }

    /// Deterministic key pair from a [`SEED_BYTES`] seed.
    ///
    /// Returns `(public_key, secret_key)`.
    pub fn keypair(self, seed: &[u8]) -> (Vec<u8>, Zeroizing<Vec<u8>>) {
        dispatch!(self, d => {
            let keypair = d::Keypair::generate(Some(seed));
            (
                keypair.public.to_bytes().to_vec(),
                Zeroizing::new(keypair.secret.to_bytes().to_vec()),
            )
        })
    }

    /// Detached signature of `message`.
    pub fn sign(self, secret_key: &[u8], message: &[u8]) -> Vec<u8> {
        dispatch!(self, d => d::SecretKey::from_bytes(secret_key).sign(message).to_vec())
    }

    /// Check a detached signature.
    pub fn verify(self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        dispatch!(self, d => d::PublicKey::from_bytes(public_key).verify(message, signature))
    }
}
