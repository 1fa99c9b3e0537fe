//! Per-script program cache
//!
//! Each player script gets one slot. Concurrent requests for the same
//! script wait on the slot instead of each fetching and deriving; a
//! derivation that fails or is cancelled leaves the slot empty so the
//! next caller retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

use crate::cipher::program::TransformProgram;
use crate::error::Result;
use crate::types::PlayerScriptRef;

type Slot = Arc<OnceCell<Arc<TransformProgram>>>;

#[derive(Default)]
struct CacheInner {
    slots: Mutex<HashMap<PlayerScriptRef, Slot>>,
    derivations: AtomicUsize,
}

/// Shared map from player script to its derived program
///
/// Cloning is cheap and clones share entries, so one cache can be handed
/// to several resolvers (or replaced by a fresh one in tests).
#[derive(Clone, Default)]
pub struct ProgramCache {
    inner: Arc<CacheInner>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, script: &PlayerScriptRef) -> Slot {
        let mut slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(script.clone()).or_default().clone()
    }

    /// Cached program for `script`, if one has been derived
    pub fn get(&self, script: &PlayerScriptRef) -> Option<Arc<TransformProgram>> {
        let slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(script).and_then(|slot| slot.get().cloned())
    }

    /// Returns the cached program, running `derive` at most once per script
    /// among concurrent callers
    ///
    /// # Errors
    /// Propagates the error from `derive`; nothing is cached in that case.
    pub async fn get_or_try_derive<F, Fut>(
        &self,
        script: &PlayerScriptRef,
        derive: F,
    ) -> Result<Arc<TransformProgram>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TransformProgram>>,
    {
        let slot = self.slot(script);
        let program = slot
            .get_or_try_init(|| async {
                let program = derive().await?;
                self.inner.derivations.fetch_add(1, Ordering::SeqCst);
                Ok::<_, crate::error::TubeError>(Arc::new(program))
            })
            .await?;
        Ok(Arc::clone(program))
    }

    /// Number of scripts with a derived program
    pub fn len(&self) -> usize {
        let slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total successful derivations over the cache's lifetime
    pub fn derivations(&self) -> usize {
        self.inner.derivations.load(Ordering::SeqCst)
    }

    /// Drops every cached program
    pub fn clear(&self) {
        let mut slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.clear();
    }
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("programs", &self.len())
            .field("derivations", &self.derivations())
            .finish()
    }
}
