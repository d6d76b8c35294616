//! The soft kernel: linear memory plus signature primitives.

use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake256,
};
use sigil_core::wire::{self, FRAME_HEADER_BYTES, LENGTH_FIELD_BYTES};
use sigil_core::{Kernel, ParamSet, Ptr, Status, Zeroizing};

use crate::engine::{Level, SEED_BYTES};
use crate::memory::{ArenaConfig, LinearMemory};

/// Signing salt size.
pub const SALT_BYTES: usize = 20;

/// Nonce size embedded in every signature.
pub const NONCE_BYTES: usize = 40;

const NONCE_DOMAIN: &[u8] = b"sigil-soft/nonce/v1";
const PROBE_MESSAGE: &[u8] = b"sigil-soft power-on self test";

/// Kernel startup failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartupError {
    /// The known-answer self test did not pass.
    #[error("{level} self test failed: {reason}")]
    SelfTest {
        /// Engine level under test.
        level: &'static str,
        /// Failing check.
        reason: &'static str,
    },
}

/// In-process signature kernel.
///
/// Secret keys are the engine's secret key followed by the matching public
/// key, which lets [`Kernel::public_key_create`] recover and check it.
pub struct SoftKernel {
    level: Level,
    params: ParamSet,
    memory: LinearMemory,
}

impl SoftKernel {
    /// Run the power-on self test and reserve linear memory.
    pub fn start(level: Level, config: ArenaConfig) -> Result<Self, StartupError> {
        let fail = |reason| StartupError::SelfTest {
            level: level.name(),
            reason,
        };

        let (public, secret) = level.keypair(&[0u8; SEED_BYTES]);
        let (again, _) = level.keypair(&[0u8; SEED_BYTES]);
        if public != again {
            return Err(fail("key generation is not deterministic"));
        }

        let signature = level.sign(&secret, PROBE_MESSAGE);
        if signature.len() != level.signature_bytes() {
            return Err(fail("unexpected signature size"));
        }
        if !level.verify(&public, PROBE_MESSAGE, &signature) {
            return Err(fail("probe signature rejected"));
        }
        if level.verify(&public, b"sigil-soft tampered probe", &signature) {
            return Err(fail("tampered probe accepted"));
        }

        let params = ParamSet {
            seed_bytes: SEED_BYTES,
            public_key_bytes: public.len(),
            secret_key_bytes: secret.len() + public.len(),
            signature_bytes: LENGTH_FIELD_BYTES + NONCE_BYTES + signature.len(),
            salt_bytes: SALT_BYTES,
            nonce_bytes: NONCE_BYTES,
        };
        let memory = LinearMemory::new(config);

        tracing::debug!(
            level = level.name(),
            pages = memory.pages(),
            pk = params.public_key_bytes,
            sk = params.secret_key_bytes,
            sig = params.signature_bytes,
            "soft kernel self test passed"
        );

        Ok(Self {
            level,
            params,
            memory,
        })
    }

    /// Engine level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Linear memory and allocator state.
    pub fn linear_memory(&self) -> &LinearMemory {
        &self.memory
    }

    fn engine_secret_len(&self) -> usize {
        self.params.secret_key_bytes - self.params.public_key_bytes
    }

    /// Message bytes of the frame at `ptr`.
    fn message(&self, ptr: Ptr) -> Option<&[u8]> {
        let header = self.memory.get(ptr, FRAME_HEADER_BYTES)?;
        let len = usize::try_from(wire::frame_len(header)?).ok()?;
        let frame = self.memory.get(ptr, FRAME_HEADER_BYTES.checked_add(len)?)?;
        wire::unframe(frame)
    }
}

/// Nonce bound to the salt and the message.
fn derive_nonce(salt: &[u8], message: &[u8]) -> [u8; NONCE_BYTES] {
    let mut hasher = Shake256::default();
    hasher.update(NONCE_DOMAIN);
    hasher.update(salt);
    hasher.update(message);

    let mut nonce = [0u8; NONCE_BYTES];
    hasher.finalize_xof().read(&mut nonce);
    nonce
}

fn nonced(nonce: &[u8], message: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(nonce.len() + message.len());
    input.extend_from_slice(nonce);
    input.extend_from_slice(message);
    input
}

impl Kernel for SoftKernel {
    fn params(&self) -> ParamSet {
        self.params
    }

    fn malloc(&mut self, size: usize) -> Option<Ptr> {
        self.memory.malloc(size)
    }

    fn free(&mut self, ptr: Ptr) {
        if !self.memory.free(ptr) {
            tracing::warn!(ptr, "ignoring free of unknown pointer");
        }
    }

    fn memory(&self) -> &[u8] {
        self.memory.bytes()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.bytes_mut()
    }

    fn genkey(&mut self, seed: Ptr, pk: Ptr, sk: Ptr) -> Status {
        let Some(seed) = self.memory.get(seed, self.params.seed_bytes) else {
            return Status::FAIL;
        };
        let (public, secret) = self.level.keypair(seed);

        let mut packed = Zeroizing::new(Vec::with_capacity(self.params.secret_key_bytes));
        packed.extend_from_slice(&secret);
        packed.extend_from_slice(&public);

        Status::from(self.memory.put(pk, &public) && self.memory.put(sk, &packed))
    }

    fn public_key_create(&mut self, sk: Ptr, pk: Ptr) -> Status {
        let split = self.engine_secret_len();
        let Some(packed) = self.memory.get(sk, self.params.secret_key_bytes) else {
            return Status::FAIL;
        };
        let (secret, public) = packed.split_at(split);

        // The embedded public key must belong to the secret half.
        let probe = self.level.sign(secret, PROBE_MESSAGE);
        if !self.level.verify(public, PROBE_MESSAGE, &probe) {
            return Status::FAIL;
        }

        let public = public.to_vec();
        Status::from(self.memory.put(pk, &public))
    }

    fn sign(&mut self, out: Ptr, msg: Ptr, sk: Ptr, salt: Ptr) -> Status {
        let split = self.engine_secret_len();
        let (Some(message), Some(packed), Some(salt)) = (
            self.message(msg),
            self.memory.get(sk, self.params.secret_key_bytes),
            self.memory.get(salt, self.params.salt_bytes),
        ) else {
            return Status::FAIL;
        };

        let nonce = derive_nonce(salt, message);
        let payload = self.level.sign(&packed[..split], &nonced(&nonce, message));

        let mut blob = vec![0u8; self.params.signature_bytes];
        if wire::encode_signature(&mut blob, &nonce, &payload).is_none() {
            return Status::FAIL;
        }
        Status::from(self.memory.put(out, &blob))
    }

    fn verify(&mut self, sig: Ptr, msg: Ptr, pk: Ptr) -> Status {
        let Some(declared) = self
            .memory
            .get(sig, LENGTH_FIELD_BYTES)
            .and_then(wire::declared_len)
        else {
            return Status::FAIL;
        };
        if declared != self.level.signature_bytes() {
            return Status::FAIL;
        }

        let (Some(blob), Some(message), Some(public)) = (
            self.memory.get(sig, wire::blob_len(declared, NONCE_BYTES)),
            self.message(msg),
            self.memory.get(pk, self.params.public_key_bytes),
        ) else {
            return Status::FAIL;
        };

        let (nonce, payload) = blob[LENGTH_FIELD_BYTES..].split_at(NONCE_BYTES);
        Status::from(self.level.verify(public, &nonced(nonce, message), payload))
    }
}

impl std::fmt::Debug for SoftKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftKernel")
            .field("level", &self.level)
            .field("params", &self.params)
            .field("pages", &self.memory.pages())
            .field("live", &self.memory.live_count())
            .finish()
    }
}
