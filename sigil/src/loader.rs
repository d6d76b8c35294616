//! Kernel module loading.
//!
//! A loader starts instantiating the module behind a descriptor and reports
//! back exactly once, through the ready callback, when the module finished
//! its own startup. Loading cannot be cancelled. A module that fails to start
//! takes the process down with it.

use std::sync::Arc;

use parking_lot::Mutex;
use sigil_core::Kernel;
use sigil_soft::{ArenaConfig, SoftKernel};

use crate::descriptor::AlgorithmDescriptor;

/// One-shot "module ready" notification.
pub type OnReady = Box<dyn FnOnce(Box<dyn Kernel>) + Send + 'static>;

/// Starts kernel instantiation for a descriptor.
pub trait KernelLoader: Send + Sync {
    /// Begin instantiating `descriptor`'s module and call `on_ready` when done.
    ///
    /// Implementations may call `on_ready` before returning.
    fn load(&self, descriptor: &'static AlgorithmDescriptor, on_ready: OnReady);
}

/// Loads the built-in soft kernel on a background thread.
#[derive(Debug, Clone, Default)]
pub struct SoftLoader {
    config: ArenaConfig,
}

impl SoftLoader {
    /// Loader reserving linear memory according to `config`.
    pub fn with_config(config: ArenaConfig) -> Self {
        Self { config }
    }

    fn instantiate(descriptor: &'static AlgorithmDescriptor, config: ArenaConfig) -> Box<dyn Kernel> {
        match SoftKernel::start(descriptor.module, config) {
            Ok(kernel) => Box::new(kernel),
            Err(err) => {
                tracing::error!(algid = descriptor.id, error = %err, "kernel failed to start");
                std::process::abort();
            }
        }
    }
}

impl KernelLoader for SoftLoader {
    fn load(&self, descriptor: &'static AlgorithmDescriptor, on_ready: OnReady) {
        let config = self.config;
        let pending = Arc::new(Mutex::new(Some(on_ready)));

        let worker = Arc::clone(&pending);
        let spawned = std::thread::Builder::new()
            .name(format!("sigil-load-{}", descriptor.id))
            .spawn(move || {
                let on_ready = worker.lock().take();
                if let Some(on_ready) = on_ready {
                    on_ready(Self::instantiate(descriptor, config));
                }
            });

        // Without a worker thread the module starts on the caller's thread.
        if let Err(err) = spawned {
            tracing::warn!(algid = descriptor.id, error = %err, "loading kernel inline");
            let on_ready = pending.lock().take();
            if let Some(on_ready) = on_ready {
                on_ready(Self::instantiate(descriptor, config));
            }
        }
    }
}
