//! Single-flight prepared-query cache (SPEC_FULL §C), modeled on
//! `fraiseql-core::compiler::compilation_cache`: concurrent callers
//! compiling the same `(role, query, variable shape)` fingerprint share
//! one compilation instead of racing to redo it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

use gqlsql_error::Result;

use crate::qcode::QCode;

/// Compute the cache key for one compilation: a role name, the raw query
/// text, and the shape (not values) of the bound variables, so that two
/// requests differing only in a variable's *value* share one compiled
/// plan while two differing in which variables are *bound at all* do not.
#[must_use]
pub fn fingerprint(role: &str, query_text: &str, variable_names: &[&str]) -> String {
    let mut sorted_names: Vec<&str> = variable_names.to_vec();
    sorted_names.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(role.as_bytes());
    hasher.update([0u8]);
    hasher.update(query_text.as_bytes());
    hasher.update([0u8]);
    for name in sorted_names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

type Slot = Arc<OnceCell<Arc<QCode>>>;

/// A bounded, single-flight cache of compiled [`QCode`] plans.
///
/// Eviction is plain FIFO (spec.md makes no ordering promise beyond
/// "bounded"); a slot that fails to compile stays uninitialized so the
/// next caller with the same fingerprint simply retries rather than
/// replaying a stale error.
pub struct QueryCache {
    capacity: usize,
    slots: Mutex<HashMap<String, Slot>>,
    insertion_order: Mutex<VecDeque<String>>,
}

impl QueryCache {
    /// Build a cache holding at most `capacity` distinct fingerprints.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, slots: Mutex::new(HashMap::new()), insertion_order: Mutex::new(VecDeque::new()) }
    }

    /// Return the cached plan for `key`, compiling it via `compute` if
    /// absent. Concurrent callers racing on the same `key` block on one
    /// another rather than each invoking `compute`.
    ///
    /// # Errors
    /// Propagates whatever [`compute`] returns; the slot stays empty so a
    /// later call can retry.
    pub fn get_or_compile(&self, key: &str, compute: impl FnOnce() -> Result<QCode>) -> Result<Arc<QCode>> {
        let slot = self.slot_for(key);
        slot.get_or_try_init(|| compute().map(Arc::new)).map(Arc::clone)
    }

    fn slot_for(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().expect("query cache mutex poisoned");
        if let Some(slot) = slots.get(key) {
            return slot.clone();
        }

        self.evict_if_full(&mut slots);
        let slot: Slot = Arc::new(OnceCell::new());
        slots.insert(key.to_string(), slot.clone());
        self.insertion_order.lock().expect("query cache mutex poisoned").push_back(key.to_string());
        slot
    }

    fn evict_if_full(&self, slots: &mut HashMap<String, Slot>) {
        if self.capacity == 0 {
            return;
        }
        let mut order = self.insertion_order.lock().expect("query cache mutex poisoned");
        while slots.len() >= self.capacity {
            let Some(oldest) = order.pop_front() else { break };
            slots.remove(&oldest);
        }
    }

    /// Number of fingerprints currently resident.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().expect("query cache mutex poisoned").len()
    }

    /// `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qcode::{QCodeBuilder, QCodeKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fingerprint_is_stable_and_order_independent_for_variable_names() {
        let a = fingerprint("anon", "{ a }", &["limit", "offset"]);
        let b = fingerprint("anon", "{ a }", &["offset", "limit"]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_roles_fingerprint_differently() {
        let a = fingerprint("anon", "{ a }", &[]);
        let b = fingerprint("admin", "{ a }", &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn repeated_lookups_compile_once() {
        let cache = QueryCache::new(8);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(QCodeBuilder::default().finish(QCodeKind::Query, None, vec![]))
        };
        cache.get_or_compile("k1", compute).unwrap();
        cache.get_or_compile("k1", compute).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_compile_does_not_poison_the_slot() {
        let cache = QueryCache::new(8);
        let first = cache.get_or_compile("k1", || {
            Err(gqlsql_error::CompileError::parse(0, "x", "y"))
        });
        assert!(first.is_err());
        let second = cache.get_or_compile("k1", || {
            Ok(QCodeBuilder::default().finish(QCodeKind::Query, None, vec![]))
        });
        assert!(second.is_ok());
    }

    #[test]
    fn capacity_evicts_oldest_fingerprint() {
        let cache = QueryCache::new(1);
        cache.get_or_compile("k1", || Ok(QCodeBuilder::default().finish(QCodeKind::Query, None, vec![]))).unwrap();
        cache.get_or_compile("k2", || Ok(QCodeBuilder::default().finish(QCodeKind::Query, None, vec![]))).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
