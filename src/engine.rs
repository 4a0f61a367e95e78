//! Thread-safe owner of a [`PhysicsWorld`].
//!
//! The world sits behind a `parking_lot` reader-writer lock. A tick takes an
//! upgradable read for the expensive half, so plain readers keep running
//! next to it, upgrades to write for the short exclusive half, then drains
//! queued modifications, downgrades and drains queued read-only operations.
//!
//! Synchronous operations block for the lock. Asynchronous ones run right
//! away when the lock is free and are queued for the next tick otherwise;
//! a queued operation runs exactly once.

use std::{cell::Cell, mem};

use log::trace;
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard, RwLockWriteGuard};

use crate::{config::WorldConfig, error::Result, world::PhysicsWorld};

type Modification = Box<dyn FnOnce(&mut PhysicsWorld) + Send>;
type ReadOnlyOperation = Box<dyn FnOnce(&PhysicsWorld) + Send>;

thread_local! {
    static HOLDS_WORLD_LOCK: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as holding the world lock for its lifetime.
struct LockScope {
    outer: bool,
}

impl LockScope {
    fn enter() -> Self {
        let outer = HOLDS_WORLD_LOCK.with(|flag| flag.replace(true));
        Self { outer }
    }

    /// Blocking on the world lock while already holding it would deadlock.
    fn assert_not_held(operation: &str) {
        if HOLDS_WORLD_LOCK.with(Cell::get) {
            panic!("{operation} called while this thread already holds the world lock; use the async variant");
        }
    }

    fn is_held() -> bool {
        HOLDS_WORLD_LOCK.with(Cell::get)
    }
}

impl Drop for LockScope {
    fn drop(&mut self) {
        HOLDS_WORLD_LOCK.with(|flag| flag.set(self.outer));
    }
}

pub struct PhysicsEngine {
    world: RwLock<PhysicsWorld>,
    pending_modifications: Mutex<Vec<Modification>>,
    pending_reads: Mutex<Vec<ReadOnlyOperation>>,
}

impl std::fmt::Debug for PhysicsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsEngine")
            .field("pending_modifications", &self.pending_modifications.lock().len())
            .field("pending_reads", &self.pending_reads.lock().len())
            .finish_non_exhaustive()
    }
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new(PhysicsWorld::default())
    }
}

impl PhysicsEngine {
    pub fn new(world: PhysicsWorld) -> Self {
        Self {
            world: RwLock::new(world),
            pending_modifications: Mutex::new(Vec::new()),
            pending_reads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_config(config: WorldConfig) -> Result<Self> {
        Ok(Self::new(PhysicsWorld::new(config)?))
    }

    pub fn into_inner(self) -> PhysicsWorld {
        self.world.into_inner()
    }

    /// Operations waiting for the next tick, as (modifications, reads).
    pub fn pending_operations(&self) -> (usize, usize) {
        (
            self.pending_modifications.lock().len(),
            self.pending_reads.lock().len(),
        )
    }

    /// Runs one tick, then every queued operation.
    pub fn tick(&self) {
        LockScope::assert_not_held("tick");
        let guard = self.world.upgradable_read();
        let _scope = LockScope::enter();
        let plan = guard.compute_tick();

        let mut world = RwLockUpgradableReadGuard::upgrade(guard);
        world.apply_tick(plan);
        self.drain_modifications(&mut world);

        let world = RwLockWriteGuard::downgrade(world);
        self.drain_reads(&world);
    }

    fn drain_modifications(&self, world: &mut PhysicsWorld) {
        loop {
            let batch = mem::take(&mut *self.pending_modifications.lock());
            if batch.is_empty() {
                break;
            }
            trace!("running {} queued modifications", batch.len());
            for modification in batch {
                modification(world);
            }
        }
    }

    fn drain_reads(&self, world: &PhysicsWorld) {
        loop {
            let batch = mem::take(&mut *self.pending_reads.lock());
            if batch.is_empty() {
                break;
            }
            trace!("running {} queued read-only operations", batch.len());
            for operation in batch {
                operation(world);
            }
        }
    }

    /// Runs `operation` with exclusive access, blocking until it is available.
    ///
    /// # Panics
    ///
    /// When called from inside another world operation on the same thread.
    pub fn sync_modification<R>(&self, operation: impl FnOnce(&mut PhysicsWorld) -> R) -> R {
        LockScope::assert_not_held("sync_modification");
        let mut world = self.world.write();
        let _scope = LockScope::enter();
        operation(&mut world)
    }

    /// Runs `operation` now when the world is free, otherwise after the
    /// exclusive half of the next tick.
    pub fn async_modification(&self, operation: impl FnOnce(&mut PhysicsWorld) + Send + 'static) {
        if !LockScope::is_held() {
            if let Some(mut world) = self.world.try_write() {
                let _scope = LockScope::enter();
                operation(&mut world);
                return;
            }
        }
        self.pending_modifications.lock().push(Box::new(operation));
    }

    /// Runs `operation` with shared access, blocking until it is available.
    ///
    /// # Panics
    ///
    /// When called from inside another world operation on the same thread.
    pub fn sync_read_only_operation<R>(&self, operation: impl FnOnce(&PhysicsWorld) -> R) -> R {
        LockScope::assert_not_held("sync_read_only_operation");
        let world = self.world.read();
        let _scope = LockScope::enter();
        operation(&world)
    }

    /// Runs `operation` now when shared access is available, otherwise at
    /// the end of the next tick.
    pub fn async_read_only_operation(&self, operation: impl FnOnce(&PhysicsWorld) + Send + 'static) {
        if !LockScope::is_held() {
            if let Some(world) = self.world.try_read() {
                let _scope = LockScope::enter();
                operation(&world);
                return;
            }
        }
        self.pending_reads.lock().push(Box::new(operation));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_sync_send<T: Sync + Send>() {}
        assert_sync_send::<PhysicsEngine>();
    }

    #[test]
    fn nested_async_modification_waits_for_tick() {
        let engine = PhysicsEngine::default();
        let runs = Arc::new(AtomicUsize::new(0));
        let inner_runs = Arc::clone(&runs);
        engine.sync_read_only_operation(|_| {
            engine.async_modification(move |_| {
                inner_runs.fetch_add(1, Ordering::SeqCst);
            });
        });
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(engine.pending_operations(), (1, 0));

        engine.tick();
        engine.tick();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(engine.pending_operations(), (0, 0));
    }

    #[test]
    fn read_only_operation_queued_during_modification_runs_after_tick() {
        let engine = PhysicsEngine::default();
        let seen_age = Arc::new(AtomicUsize::new(usize::MAX));
        let seen = Arc::clone(&seen_age);
        engine.sync_modification(|_| {
            engine.async_read_only_operation(move |world| {
                seen.store(world.age() as usize, Ordering::SeqCst);
            });
        });
        engine.tick();
        assert_eq!(seen_age.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "already holds the world lock")]
    fn blocking_inside_an_operation_panics() {
        let engine = PhysicsEngine::default();
        engine.sync_read_only_operation(|_| engine.sync_modification(|_| ()));
    }
}
