use super::{CacheKey, Persist};
use crate::error::{CteError, CteResult};
use crate::query::Query;
use crate::render::RenderedStatement;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

enum SlotState {
    Unresolved { last_error: Option<String> },
    Saved(Query),
}

struct KeySlot {
    state: tokio::sync::Mutex<SlotState>,
    /// Number of failed save attempts so far.
    failures: AtomicU64,
}

impl KeySlot {
    fn new() -> Self {
        Self {
            state: tokio::sync::Mutex::new(SlotState::Unresolved { last_error: None }),
            failures: AtomicU64::new(0),
        }
    }
}

/// Caller-owned table of persisted results, keyed by content.
///
/// Lookup of a key's slot goes through a short-held global lock; the save itself
/// runs under that key's own async lock, so saves of unrelated keys proceed in
/// parallel while callers of the same key wait and then reuse the result.
///
/// A failed save is reported to every caller that was already waiting on the
/// key. The key stays unresolved, so the next call after that tries again.
///
/// Entries are never evicted on their own; use [`forget`](Self::forget) to drop one.
#[derive(Default)]
pub struct PersistCache {
    slots: Mutex<HashMap<CacheKey, Arc<KeySlot>>>,
}

impl PersistCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &CacheKey) -> Arc<KeySlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(KeySlot::new()))
            .clone()
    }

    /// Return the retrieval query for `key`, running the save at most once.
    pub async fn resolve(
        &self,
        key: &CacheKey,
        statement: &RenderedStatement,
        persist: &Persist,
    ) -> CteResult<Query> {
        let slot = self.slot(key);
        let seen_failures = slot.failures.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        match &*state {
            SlotState::Saved(query) => {
                tracing::debug!(
                    target: "ctesql.persist",
                    key = %key.short(),
                    "using saved result",
                );
                return Ok(query.clone());
            }
            SlotState::Unresolved { last_error } => {
                if slot.failures.load(Ordering::Acquire) > seen_failures {
                    return Err(CteError::CacheSave {
                        key: key.to_string(),
                        message: last_error.clone().unwrap_or_default(),
                    });
                }
            }
        }

        tracing::debug!(
            target: "ctesql.persist",
            key = %key.short(),
            tag = persist.tag().unwrap_or("-"),
            "executing save",
        );
        match persist.cacher().persist(statement, key, persist.tag()).await {
            Ok(query) => {
                *state = SlotState::Saved(query.clone());
                Ok(query)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(
                    target: "ctesql.persist",
                    key = %key.short(),
                    error = %message,
                    "save failed",
                );
                *state = SlotState::Unresolved {
                    last_error: Some(message.clone()),
                };
                slot.failures.fetch_add(1, Ordering::Release);
                Err(CteError::CacheSave {
                    key: key.to_string(),
                    message,
                })
            }
        }
    }

    /// Number of keys seen so far, saved or not.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` has a saved result. A save still in progress counts as not saved.
    pub fn is_saved(&self, key: &CacheKey) -> bool {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.get(key) {
                Some(slot) => slot.clone(),
                None => return false,
            }
        };
        slot.state
            .try_lock()
            .map(|state| matches!(*state, SlotState::Saved(_)))
            .unwrap_or(false)
    }

    /// Drop the entry for `key`, so the next build saves it again.
    ///
    /// Returns whether an entry existed.
    pub fn forget(&self, key: &CacheKey) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }
}

impl fmt::Debug for PersistCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistCache")
            .field("keys", &self.len())
            .finish()
    }
}
