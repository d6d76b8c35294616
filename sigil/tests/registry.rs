#![cfg(feature = "dilithium2")]

//! Registry behaviour under concurrent first-time lookups.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{init_tracing, SlowLoader};
use sigil::{Lookup, Registry, State, ALGORITHMS};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_lookups_share_one_load() {
    init_tracing();
    let loader = SlowLoader::new(Duration::from_millis(100));
    let registry = Arc::new(Registry::new(ALGORITHMS, loader.clone()));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            registry.instance("dilithium2_v1").await.unwrap()
        }));
    }

    let mut schemes = Vec::new();
    for task in tasks {
        schemes.push(task.await.unwrap());
    }

    let first = &schemes[0];
    assert!(schemes.iter().all(|s| Arc::ptr_eq(s, first)));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(registry.load_count("dilithium2_v1"), 1);
    assert_eq!(registry.state("dilithium2_v1"), Some(State::Ready));
}

#[tokio::test]
async fn test_ready_lookup_is_synchronous() {
    let loader = SlowLoader::new(Duration::from_millis(10));
    let registry = Registry::new(ALGORITHMS, loader.clone());

    let pending = registry.get("dilithium2_v1").unwrap();
    assert!(matches!(pending, Lookup::Pending(_)));
    let scheme = pending.resolve().await;

    let again = registry.get("dilithium2_v1").and_then(Lookup::ready).unwrap();
    assert!(Arc::ptr_eq(&scheme, &again));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_algorithm_is_absent() {
    let loader = SlowLoader::new(Duration::ZERO);
    let registry = Registry::new(ALGORITHMS, loader.clone());

    assert!(registry.get("falcon512_n3_v1").is_none());
    assert!(registry.instance("falcon512_n3_v1").await.is_none());
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_loaded_instance_signs() {
    init_tracing();
    let registry = Registry::new(ALGORITHMS, SlowLoader::new(Duration::ZERO));
    let scheme = registry.instance("dilithium2_v1").await.unwrap();
    assert_eq!(scheme.algid(), "dilithium2_v1");

    let pair = scheme.genkey(None).unwrap().unwrap();
    let signature = scheme.sign("hello", pair.secret_key(), None).unwrap().unwrap();
    assert!(scheme.verify(&signature, "hello", pair.public_key()).unwrap());
}

#[tokio::test]
async fn test_global_registry() {
    init_tracing();
    assert_eq!(sigil::algorithms(), Registry::global().algorithms());
    assert!(sigil::algorithms().contains(&"dilithium2_v1"));
    assert!(sigil::get_instance("unknown_v1").is_none());

    let a = sigil::instance("dilithium2_v1").await.unwrap();
    let b = sigil::get_instance("dilithium2_v1").and_then(Lookup::ready).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_listing_order() {
    let registry = Registry::new(ALGORITHMS, SlowLoader::new(Duration::ZERO));
    let ids = registry.algorithms();
    let expected: Vec<&str> = ALGORITHMS.iter().map(|d| d.id).collect();
    assert_eq!(ids, expected);
    for id in ids {
        assert_eq!(registry.state(id), Some(State::Uninitialized));
    }
}
