//! Signing protocol over a loaded kernel.
//!
//! Every operation validates its arguments first, then opens one arena
//! session, stages inputs, invokes a single primitive and reads results back.
//! All buffers of a call are released inside that call on every path, with
//! seed, secret key and salt buffers wiped first.

use parking_lot::Mutex;
use rand_core::{CryptoRng, RngCore};
use sigil_core::wire::{self, Signature};
use sigil_core::{Arena, BridgeStats, Error, Kernel, ParamSet, Result, Zeroizing};

use crate::keypair::KeyPair;

/// A ready kernel together with the signature API it backs.
///
/// Cryptographic failure is reported as `Ok(None)` and signature rejection as
/// `Ok(false)`. Only contract violations and kernel memory faults are errors.
pub struct Scheme {
    algid: &'static str,
    params: ParamSet,
    kernel: Mutex<Box<dyn Kernel>>,
    stats: Mutex<BridgeStats>,
}

impl Scheme {
    /// Bind a started kernel to an algorithm identifier.
    pub fn new(algid: &'static str, kernel: Box<dyn Kernel>) -> Self {
        Self {
            algid,
            params: kernel.params(),
            kernel: Mutex::new(kernel),
            stats: Mutex::new(BridgeStats::default()),
        }
    }

    /// Generate a key pair.
    ///
    /// Without a seed, one is drawn from the thread-local CSPRNG. A provided
    /// seed must be exactly [`Scheme::genkey_seed_bytes`] long.
    pub fn genkey(&self, seed: Option<&[u8]>) -> Result<Option<KeyPair>> {
        match seed {
            Some(seed) => self.genkey_from_seed(seed),
            None => self.genkey_with_rng(&mut rand::rng()),
        }
    }

    /// Generate a key pair from a seed drawn from `rng`.
    pub fn genkey_with_rng<R: CryptoRng + ?Sized>(&self, rng: &mut R) -> Result<Option<KeyPair>> {
        let mut seed = Zeroizing::new(vec![0u8; self.params.seed_bytes]);
        rng.fill_bytes(&mut seed);
        self.genkey_from_seed(&seed)
    }

    fn genkey_from_seed(&self, seed: &[u8]) -> Result<Option<KeyPair>> {
        let p = self.params;
        if seed.len() != p.seed_bytes {
            return Err(Error::InvalidSeedLength {
                expected: p.seed_bytes,
                actual: seed.len(),
            });
        }

        self.session(|arena| {
            let seed_buf = arena.stage_secret(seed)?;
            let pk = arena.alloc(p.public_key_bytes)?;
            let sk = arena.alloc_secret(p.secret_key_bytes)?;

            let (seed_ptr, pk_ptr, sk_ptr) = (seed_buf.ptr(), pk.ptr(), sk.ptr());
            if !arena.invoke(|k| k.genkey(seed_ptr, pk_ptr, sk_ptr)) {
                tracing::debug!(algid = self.algid, "genkey primitive failed");
                seed_buf.release_secure();
                pk.release();
                sk.release_secure();
                return Ok(None);
            }

            let public_key = pk.read()?;
            let mut secret_key = sk.read_secret()?;
            seed_buf.release_secure();
            sk.release_secure();
            pk.release();

            Ok(Some(KeyPair::new(
                seed.to_vec(),
                public_key,
                std::mem::take(&mut *secret_key),
            )))
        })
    }

    /// Derive the public key belonging to `secret_key`.
    pub fn public_key_create(&self, secret_key: &[u8]) -> Result<Option<Vec<u8>>> {
        let p = self.params;
        self.check_secret_key(secret_key)?;

        self.session(|arena| {
            let sk = arena.stage_secret(secret_key)?;
            let pk = arena.alloc(p.public_key_bytes)?;

            let (sk_ptr, pk_ptr) = (sk.ptr(), pk.ptr());
            if !arena.invoke(|k| k.public_key_create(sk_ptr, pk_ptr)) {
                tracing::debug!(algid = self.algid, "public key derivation failed");
                pk.release();
                sk.release_secure();
                return Ok(None);
            }

            let public_key = pk.read()?;
            pk.release();
            sk.release_secure();
            Ok(Some(public_key))
        })
    }

    /// Sign `message` with `secret_key`.
    ///
    /// Text messages are signed over their UTF-8 bytes. Without a salt, one
    /// is drawn from the thread-local CSPRNG; a provided salt must be exactly
    /// [`Scheme::salt_bytes`] long.
    pub fn sign(
        &self,
        message: impl AsRef<[u8]>,
        secret_key: &[u8],
        salt: Option<&[u8]>,
    ) -> Result<Option<Signature>> {
        match salt {
            Some(salt) => self.sign_salted(message.as_ref(), secret_key, salt),
            None => self.sign_with_rng(message, secret_key, &mut rand::rng()),
        }
    }

    /// Sign `message` with a salt drawn from `rng`.
    pub fn sign_with_rng<R: CryptoRng + ?Sized>(
        &self,
        message: impl AsRef<[u8]>,
        secret_key: &[u8],
        rng: &mut R,
    ) -> Result<Option<Signature>> {
        let mut salt = Zeroizing::new(vec![0u8; self.params.salt_bytes]);
        rng.fill_bytes(&mut salt);
        self.sign_salted(message.as_ref(), secret_key, &salt)
    }

    fn sign_salted(&self, message: &[u8], secret_key: &[u8], salt: &[u8]) -> Result<Option<Signature>> {
        let p = self.params;
        if salt.len() != p.salt_bytes {
            return Err(Error::InvalidSaltLength {
                expected: p.salt_bytes,
                actual: salt.len(),
            });
        }
        self.check_secret_key(secret_key)?;
        let frame = wire::frame_message(message)?;

        self.session(|arena| {
            let out = arena.alloc(p.signature_bytes)?;
            let sk = arena.stage_secret(secret_key)?;
            let salt = arena.stage_secret(salt)?;
            let msg = arena.stage(&frame)?;

            let ptrs = (out.ptr(), msg.ptr(), sk.ptr(), salt.ptr());
            if !arena.invoke(|k| k.sign(ptrs.0, ptrs.1, ptrs.2, ptrs.3)) {
                tracing::debug!(algid = self.algid, "sign primitive failed");
                out.release();
                msg.release();
                sk.release_secure();
                salt.release_secure();
                return Ok(None);
            }

            let blob = out.read()?;
            out.release();
            msg.release();
            sk.release_secure();
            salt.release_secure();

            let signature = Signature::from_kernel_output(blob, p.nonce_bytes);
            if signature.is_none() {
                tracing::debug!(algid = self.algid, "kernel declared an oversized signature");
            }
            Ok(signature)
        })
    }

    /// Check `signature` over `message` against `public_key`.
    ///
    /// A signature whose declared length disagrees with its size is rejected
    /// without involving the kernel.
    pub fn verify(
        &self,
        signature: impl AsRef<[u8]>,
        message: impl AsRef<[u8]>,
        public_key: &[u8],
    ) -> Result<bool> {
        let p = self.params;
        let signature = signature.as_ref();
        if signature.len() > p.signature_bytes {
            return Err(Error::SignatureTooLong {
                max: p.signature_bytes,
                actual: signature.len(),
            });
        }
        if public_key.len() != p.public_key_bytes {
            return Err(Error::InvalidKeyLength {
                expected: p.public_key_bytes,
                actual: public_key.len(),
            });
        }

        if !wire::is_well_formed(signature, p.nonce_bytes) {
            tracing::debug!(
                algid = self.algid,
                len = signature.len(),
                "signature framing mismatch"
            );
            return Ok(false);
        }
        let frame = wire::frame_message(message.as_ref())?;

        self.session(|arena| {
            let sig = arena.stage(signature)?;
            let msg = arena.stage(&frame)?;
            let pk = arena.stage(public_key)?;

            let (sig_ptr, msg_ptr, pk_ptr) = (sig.ptr(), msg.ptr(), pk.ptr());
            let valid = arena.invoke(|k| k.verify(sig_ptr, msg_ptr, pk_ptr));
            sig.release();
            msg.release();
            pk.release();
            Ok(valid)
        })
    }

    /// Algorithm identifier.
    pub fn algid(&self) -> &'static str {
        self.algid
    }

    /// Key generation seed size in bytes.
    pub fn genkey_seed_bytes(&self) -> usize {
        self.params.seed_bytes
    }

    /// Secret key size in bytes.
    pub fn secret_key_bytes(&self) -> usize {
        self.params.secret_key_bytes
    }

    /// Public key size in bytes.
    pub fn public_key_bytes(&self) -> usize {
        self.params.public_key_bytes
    }

    /// Maximum signature size in bytes.
    pub fn signature_bytes(&self) -> usize {
        self.params.signature_bytes
    }

    /// Signing salt size in bytes.
    pub fn salt_bytes(&self) -> usize {
        self.params.salt_bytes
    }

    /// Signature nonce size in bytes.
    pub fn nonce_bytes(&self) -> usize {
        self.params.nonce_bytes
    }

    /// Full parameter set.
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    /// Cumulative bridge traffic against this kernel.
    pub fn bridge_stats(&self) -> BridgeStats {
        *self.stats.lock()
    }

    fn check_secret_key(&self, secret_key: &[u8]) -> Result<()> {
        if secret_key.len() != self.params.secret_key_bytes {
            return Err(Error::InvalidKeyLength {
                expected: self.params.secret_key_bytes,
                actual: secret_key.len(),
            });
        }
        Ok(())
    }

    /// Run `f` with exclusive access to the kernel's arena.
    fn session<T>(&self, f: impl FnOnce(&Arena<'_>) -> Result<T>) -> Result<T> {
        let mut kernel = self.kernel.lock();
        let arena = Arena::new(&mut **kernel);
        let result = f(&arena);
        self.stats.lock().merge(&arena.stats());
        result
    }
}

impl std::fmt::Debug for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheme")
            .field("algid", &self.algid)
            .field("params", &self.params)
            .finish()
    }
}
