//! Benchmark harness for sigil. See `benches/`.
