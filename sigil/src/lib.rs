//! # Sigil
//!
//! Post-quantum digital signatures over sandboxed lattice kernels.
//!
//! Each algorithm is served by a kernel that owns a private linear memory.
//! Sigil stages keys, seeds, salts and messages into that memory, invokes the
//! kernel's primitives and copies results back out, wiping every buffer that
//! held secret material before returning it to the kernel.
//!
//! ## Features
//!
//! - `dilithium2` (default): CRYSTALS-Dilithium, NIST level 2
//! - `dilithium3` (default): CRYSTALS-Dilithium, NIST level 3
//! - `dilithium5` (default): CRYSTALS-Dilithium, NIST level 5
//!
//! ## Example
//!
//! ```ignore
//! let scheme = sigil::instance("dilithium2_v1").await.unwrap();
//!
//! let pair = scheme.genkey(None)?.unwrap();
//! let signature = scheme.sign("hello", pair.secret_key(), None)?.unwrap();
//!
//! assert!(scheme.verify(&signature, "hello", pair.public_key())?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod descriptor;
mod keypair;
mod loader;
mod registry;
mod scheme;

use std::sync::Arc;

pub use descriptor::{AlgorithmDescriptor, ALGORITHMS};
pub use keypair::KeyPair;
pub use loader::{KernelLoader, OnReady, SoftLoader};
pub use registry::{Lookup, PendingScheme, Registry, State};
pub use scheme::Scheme;
pub use sigil_core::{wire, BridgeStats, Error, Kernel, ParamSet, Ptr, Result, Signature, Status};
pub use sigil_soft::{ArenaConfig, Level};

/// Identifiers of the built-in algorithms, in listing order.
pub fn algorithms() -> Vec<&'static str> {
    Registry::global().algorithms()
}

/// Look up a built-in algorithm in the process-wide registry.
///
/// See [`Registry::get`].
pub fn get_instance(id: &str) -> Option<Lookup> {
    Registry::global().get(id)
}

/// Resolve a built-in algorithm, waiting for its kernel if necessary.
pub async fn instance(id: &str) -> Option<Arc<Scheme>> {
    Registry::global().instance(id).await
}
