//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sigil::{
    AlgorithmDescriptor, ArenaConfig, Kernel, KernelLoader, Level, OnReady, ParamSet, Ptr, Scheme,
    Status,
};
use sigil_soft::SoftKernel;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Soft kernel scheme with a small arena.
pub fn soft_scheme(algid: &'static str, level: Level) -> Scheme {
    let kernel = SoftKernel::start(level, ArenaConfig::compact()).expect("self test");
    Scheme::new(algid, Box::new(kernel))
}

/// A buffer the kernel saw being freed.
#[derive(Debug, Clone, Copy)]
pub struct Freed {
    pub len: usize,
    pub zeroed: bool,
}

/// Switches and observations shared with a [`FaultyKernel`].
#[derive(Default)]
pub struct Probe {
    pub fail_genkey: AtomicBool,
    pub fail_public_key_create: AtomicBool,
    pub fail_sign: AtomicBool,
    pub fail_verify: AtomicBool,
    pub primitive_calls: AtomicUsize,
    pub mallocs: AtomicUsize,
    freed: Mutex<Vec<Freed>>,
}

impl Probe {
    pub fn calls(&self) -> usize {
        self.primitive_calls.load(Ordering::SeqCst)
    }

    pub fn take_freed(&self) -> Vec<Freed> {
        std::mem::take(&mut *self.freed.lock())
    }
}

/// Soft kernel whose primitives can be forced to fail.
///
/// Records the size of every allocation and whether its bytes were all zero
/// when it came back.
pub struct FaultyKernel {
    inner: SoftKernel,
    probe: Arc<Probe>,
    sizes: HashMap<Ptr, usize>,
}

impl FaultyKernel {
    pub fn new(level: Level) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let inner = SoftKernel::start(level, ArenaConfig::compact()).expect("self test");
        (
            Self {
                inner,
                probe: Arc::clone(&probe),
                sizes: HashMap::new(),
            },
            probe,
        )
    }
}

impl Kernel for FaultyKernel {
    fn params(&self) -> ParamSet {
        self.inner.params()
    }

    fn malloc(&mut self, size: usize) -> Option<Ptr> {
        let ptr = self.inner.malloc(size)?;
        self.probe.mallocs.fetch_add(1, Ordering::SeqCst);
        self.sizes.insert(ptr, size);
        Some(ptr)
    }

    fn free(&mut self, ptr: Ptr) {
        if let Some(len) = self.sizes.remove(&ptr) {
            let start = ptr as usize;
            let zeroed = self.inner.memory()[start..start + len].iter().all(|&b| b == 0);
            self.probe.freed.lock().push(Freed { len, zeroed });
        }
        self.inner.free(ptr);
    }

    fn memory(&self) -> &[u8] {
        self.inner.memory()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.inner.memory_mut()
    }

    fn genkey(&mut self, seed: Ptr, pk: Ptr, sk: Ptr) -> Status {
        let probe = Arc::clone(&self.probe);
        let inner = &mut self.inner;
        gate(&probe, &probe.fail_genkey, || inner.genkey(seed, pk, sk))
    }

    fn public_key_create(&mut self, sk: Ptr, pk: Ptr) -> Status {
        let probe = Arc::clone(&self.probe);
        let inner = &mut self.inner;
        gate(&probe, &probe.fail_public_key_create, || inner.public_key_create(sk, pk))
    }

    fn sign(&mut self, out: Ptr, msg: Ptr, sk: Ptr, salt: Ptr) -> Status {
        let probe = Arc::clone(&self.probe);
        let inner = &mut self.inner;
        gate(&probe, &probe.fail_sign, || inner.sign(out, msg, sk, salt))
    }

    fn verify(&mut self, sig: Ptr, msg: Ptr, pk: Ptr) -> Status {
        let probe = Arc::clone(&self.probe);
        let inner = &mut self.inner;
        gate(&probe, &probe.fail_verify, || inner.verify(sig, msg, pk))
    }
}

fn gate(probe: &Probe, switch: &AtomicBool, run: impl FnOnce() -> Status) -> Status {
    probe.primitive_calls.fetch_add(1, Ordering::SeqCst);
    if switch.load(Ordering::SeqCst) {
        Status::FAIL
    } else {
        run()
    }
}

/// Scheme over a [`FaultyKernel`].
pub fn faulty_scheme(level: Level) -> (Scheme, Arc<Probe>) {
    let (kernel, probe) = FaultyKernel::new(level);
    (Scheme::new("faulty_v1", Box::new(kernel)), probe)
}

/// Loads soft kernels on a background thread after a delay, counting loads.
#[derive(Clone)]
pub struct SlowLoader {
    pub delay: Duration,
    pub loads: Arc<AtomicUsize>,
}

impl SlowLoader {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl KernelLoader for SlowLoader {
    fn load(&self, descriptor: &'static AlgorithmDescriptor, on_ready: OnReady) {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            let kernel = SoftKernel::start(descriptor.module, ArenaConfig::compact()).expect("self test");
            on_ready(Box::new(kernel));
        });
    }
}
