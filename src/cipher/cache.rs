//! Cipher cache with single-flight derivation
//!
//! Maps a content version to its [`CipherProgram`]. Each version owns a
//! slot holding a `OnceCell`; the first caller to miss runs the derivation
//! and every concurrent caller for the same version awaits that result. Once
//! a slot is filled it is never recomputed while it stays cached.

use crate::{Result, cipher::CipherProgram};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Slot {
    cell: OnceCell<Arc<CipherProgram>>,
    last_used: AtomicU64,
}

/// Shared cache of derived cipher programs
#[derive(Debug, Default)]
pub struct CipherCache {
    slots: RwLock<HashMap<String, Arc<Slot>>>,
    capacity: Option<usize>,
    clock: AtomicU64,
    derivations: AtomicUsize,
}

impl CipherCache {
    /// Create an unbounded cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache holding at most `max_entries` programs
    ///
    /// The least recently used program is evicted when an insertion goes
    /// over the limit.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            capacity: Some(max_entries.max(1)),
            ..Self::default()
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn slot(&self, version: &str) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().await.get(version) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(version.to_string())
            .or_default()
            .clone()
    }

    /// Look up the program for `version`
    pub async fn get(&self, version: &str) -> Option<Arc<CipherProgram>> {
        let slots = self.slots.read().await;
        let slot = slots.get(version)?;
        let program = slot.cell.get()?.clone();
        slot.last_used.store(self.tick(), Ordering::Relaxed);
        debug!("Cipher cache hit for {}", version);
        Some(program)
    }

    /// Install a program under its version
    ///
    /// If the version already has a program, or one is being derived, the
    /// existing one stays visible and is returned instead.
    pub async fn put(&self, program: CipherProgram) -> Arc<CipherProgram> {
        let version = program.version.clone();
        let slot = self.slot(&version).await;
        let installed = AtomicBool::new(false);
        let installed_ref = &installed;

        let visible = slot
            .cell
            .get_or_init(move || async move {
                installed_ref.store(true, Ordering::Relaxed);
                Arc::new(program)
            })
            .await
            .clone();
        slot.last_used.store(self.tick(), Ordering::Relaxed);

        if installed.load(Ordering::Relaxed) {
            self.evict_over_capacity(&version).await;
        }
        visible
    }

    /// Return the cached program for `version`, deriving it on a miss
    ///
    /// At most one derivation per version is in flight; concurrent callers
    /// wait for it and observe the same program. A failed derivation is not
    /// cached and the next caller tries again.
    ///
    /// # Examples
    ///
    /// ```
    /// use stream_resolver::cipher::{CipherCache, CipherOp, CipherProgram};
    ///
    /// # tokio_test::block_on(async {
    /// let cache = CipherCache::new();
    /// let program = cache
    ///     .get_or_derive("v1", || async {
    ///         Ok(CipherProgram::new("v1", vec![CipherOp::Reverse]))
    ///     })
    ///     .await?;
    ///
    /// assert_eq!(program.apply("abc"), "cba");
    /// assert_eq!(cache.derivations(), 1);
    /// # Ok::<(), stream_resolver::Error>(())
    /// # })
    /// # .unwrap();
    /// ```
    pub async fn get_or_derive<F, Fut>(&self, version: &str, derive: F) -> Result<Arc<CipherProgram>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CipherProgram>>,
    {
        if let Some(program) = self.get(version).await {
            return Ok(program);
        }

        let slot = self.slot(version).await;
        let derived = AtomicBool::new(false);
        let derived_ref = &derived;
        let derivations = &self.derivations;

        let program = slot
            .cell
            .get_or_try_init(move || async move {
                derived_ref.store(true, Ordering::Relaxed);
                derivations.fetch_add(1, Ordering::Relaxed);
                derive().await.map(Arc::new)
            })
            .await?
            .clone();
        slot.last_used.store(self.tick(), Ordering::Relaxed);

        if derived.load(Ordering::Relaxed) {
            info!("Derived cipher program for {} ({} ops)", version, program.ops.len());
            self.evict_over_capacity(version).await;
        }
        Ok(program)
    }

    async fn evict_over_capacity(&self, keep: &str) {
        let Some(capacity) = self.capacity else {
            return;
        };

        let mut slots = self.slots.write().await;
        loop {
            let filled = slots.values().filter(|s| s.cell.initialized()).count();
            if filled <= capacity {
                break;
            }

            let oldest = slots
                .iter()
                .filter(|(version, slot)| version.as_str() != keep && slot.cell.initialized())
                .min_by_key(|(_, slot)| slot.last_used.load(Ordering::Relaxed))
                .map(|(version, _)| version.clone());

            match oldest {
                Some(version) => {
                    debug!("Evicting cipher program for {}", version);
                    slots.remove(&version);
                }
                None => break,
            }
        }
    }

    /// Number of derivations this cache has started
    pub fn derivations(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }

    /// Number of cached programs
    pub async fn len(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .filter(|s| s.cell.initialized())
            .count()
    }

    /// Whether no program is cached
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Seed the cache with previously derived programs
    pub async fn preload(&self, programs: impl IntoIterator<Item = CipherProgram>) {
        for program in programs {
            self.put(program).await;
        }
    }

    /// Copy of every cached program, ordered by version
    pub async fn snapshot(&self) -> Vec<CipherProgram> {
        let mut programs: Vec<CipherProgram> = self
            .slots
            .read()
            .await
            .values()
            .filter_map(|slot| slot.cell.get().map(|p| p.as_ref().clone()))
            .collect();
        programs.sort_by(|a, b| a.version.cmp(&b.version));
        programs
    }

    /// Drop every cached program
    pub async fn clear(&self) {
        self.slots.write().await.clear();
    }
}
