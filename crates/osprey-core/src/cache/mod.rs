//! Module: cache
//! Responsibility: caching translated templates by fingerprint.
//! Does not own: translation; the cache stores what the translator built.
//! Boundary: cached models are parameterized templates. They leave the
//! cache only after substitution has filled every parameter slot.

mod fingerprint;
pub(crate) mod param;

pub use fingerprint::Fingerprint;

use crate::exec::Model;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

///
/// CacheStats
///
/// Counters of one cache since construction.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

///
/// TranslationCache
///
/// A strict least-recently-used cache of translated templates. A capacity
/// of zero disables caching entirely.
///

pub(crate) struct TranslationCache {
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    state: Mutex<LruState>,
}

#[derive(Default)]
struct LruState {
    map: HashMap<Fingerprint, Slot>,
    /// Recency order: lowest sequence number is the least recently used.
    order: BTreeMap<u64, Fingerprint>,
    next_seq: u64,
}

struct Slot {
    model: Arc<Model>,
    seq: u64,
}

impl TranslationCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            state: Mutex::new(LruState::default()),
        }
    }

    /// Look a template up, promoting it to most recently used on a hit.
    pub(crate) fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<Model>> {
        if self.capacity == 0 {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let mut state = self.lock();
        let LruState {
            map,
            order,
            next_seq,
        } = &mut *state;
        if let Some(slot) = map.get_mut(fingerprint) {
            order.remove(&slot.seq);
            slot.seq = *next_seq;
            order.insert(*next_seq, *fingerprint);
            *next_seq += 1;
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(Arc::clone(&slot.model));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a template, evicting the least recently used entry when full.
    pub(crate) fn insert(&self, fingerprint: Fingerprint, model: Arc<Model>) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.lock();
        let LruState {
            map,
            order,
            next_seq,
        } = &mut *state;

        if let Some(slot) = map.get_mut(&fingerprint) {
            order.remove(&slot.seq);
            slot.model = model;
            slot.seq = *next_seq;
            order.insert(*next_seq, fingerprint);
            *next_seq += 1;
            return;
        }

        if map.len() >= self.capacity {
            if let Some((_, oldest)) = order.pop_first() {
                map.remove(&oldest);
            }
        }
        map.insert(
            fingerprint,
            Slot {
                model,
                seq: *next_seq,
            },
        );
        order.insert(*next_seq, fingerprint);
        *next_seq += 1;
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.lock().map.len(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
