//! Algorithm descriptor table.

use sigil_soft::Level;

/// Maps an algorithm identifier to the kernel module that implements it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlgorithmDescriptor {
    /// Stable algorithm identifier.
    pub id: &'static str,
    /// Kernel module to instantiate.
    pub module: Level,
}

/// Built-in algorithms, in listing order.
pub static ALGORITHMS: &[AlgorithmDescriptor] = &[
    #[cfg(feature = "dilithium2")]
    AlgorithmDescriptor {
        id: "dilithium2_v1",
        module: Level::Dilithium2,
    },
    #[cfg(feature = "dilithium3")]
    AlgorithmDescriptor {
        id: "dilithium3_v1",
        module: Level::Dilithium3,
    },
    #[cfg(feature = "dilithium5")]
    AlgorithmDescriptor {
        id: "dilithium5_v1",
        module: Level::Dilithium5,
    },
];

/// Look up a descriptor by identifier.
pub fn find(table: &'static [AlgorithmDescriptor], id: &str) -> Option<&'static AlgorithmDescriptor> {
    table.iter().find(|descriptor| descriptor.id == id)
}
