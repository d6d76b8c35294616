//! Error types for Sigil operations.
//!
//! Only contract violations and kernel-side faults are errors. A kernel
//! primitive reporting failure is `Ok(None)`, and a rejected signature is
//! `Ok(false)`.

/// Result type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while driving a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Key generation seed has the wrong length.
    #[error("invalid seed length: expected {expected}, got {actual}")]
    InvalidSeedLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length provided.
        actual: usize,
    },

    /// Invalid key length provided.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length provided.
        actual: usize,
    },

    /// Signing salt has the wrong length.
    #[error("invalid salt length: expected {expected}, got {actual}")]
    InvalidSaltLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length provided.
        actual: usize,
    },

    /// Signature is shorter than its fixed header.
    #[error("invalid signature length: expected at least {expected}, got {actual}")]
    InvalidSignatureLength {
        /// Minimum length in bytes.
        expected: usize,
        /// Actual length provided.
        actual: usize,
    },

    /// Signature exceeds the kernel's maximum signature size.
    #[error("signature too long: limited to {max} bytes, got {actual}")]
    SignatureTooLong {
        /// Maximum length in bytes.
        max: usize,
        /// Actual length provided.
        actual: usize,
    },

    /// Message cannot be framed for the kernel.
    #[error("message too long: {actual} bytes")]
    MessageTooLong {
        /// Actual length provided.
        actual: usize,
    },

    /// The kernel arena could not satisfy an allocation.
    #[error("kernel arena allocation of {requested} bytes failed")]
    AllocationFailed {
        /// Requested size in bytes.
        requested: usize,
    },

    /// A buffer region fell outside the kernel's linear memory.
    #[error("kernel memory fault at offset {offset} ({len} bytes)")]
    MemoryFault {
        /// Region start offset.
        offset: u32,
        /// Region length in bytes.
        len: usize,
    },
}

impl Error {
    /// Whether this error is a caller contract violation rather than a kernel fault.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            Error::AllocationFailed { .. } | Error::MemoryFault { .. }
        )
    }
}
