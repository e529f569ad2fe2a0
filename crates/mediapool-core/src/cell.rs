//! Single-writer cell owning the current pool snapshot.

use parking_lot::RwLock;

use crate::diff::Snapshot;
use crate::error::Result;
use crate::item_pool::ItemPool;
use crate::tag_pool::TagPool;

/// Hooks run around every transition applied through a [`PoolCell`].
pub trait PoolObserver<P>: Send + Sync {
    /// Called before a transition. An error aborts it with the pool unchanged.
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Called after the cell has moved from `previous` to `current`.
    fn updated(&self, op: &str, previous: &P, current: &P) -> Result<()>;
}

/// Observer that does nothing, for pools without persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl<P> PoolObserver<P> for NoopObserver {
    fn updated(&self, _op: &str, _previous: &P, _current: &P) -> Result<()> {
        Ok(())
    }
}

/// Return shape of a transition: a bare pool, or a value plus a pool.
pub trait Transition<P> {
    type Output;

    fn split(self) -> (Self::Output, P);
}

impl<R, P: Snapshot> Transition<P> for (R, P) {
    type Output = R;

    fn split(self) -> (R, P) {
        self
    }
}

impl Transition<ItemPool> for ItemPool {
    type Output = ();

    fn split(self) -> ((), ItemPool) {
        ((), self)
    }
}

impl Transition<TagPool> for TagPool {
    type Output = ();

    fn split(self) -> ((), TagPool) {
        ((), self)
    }
}

/// Owns the one mutable reference to a pool.
///
/// Transitions run to completion under the write lock, so two mutations of
/// the same pool never interleave. Readers get cheap snapshot clones.
pub struct PoolCell<P> {
    state: RwLock<P>,
    observer: Box<dyn PoolObserver<P>>,
}

impl<P: Clone> PoolCell<P> {
    pub fn new(pool: P, observer: impl PoolObserver<P> + 'static) -> Self {
        Self {
            state: RwLock::new(pool),
            observer: Box::new(observer),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> P {
        self.state.read().clone()
    }

    /// Run a read-only closure against the current snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&*self.state.read())
    }

    /// Apply a transition and notify the observer.
    ///
    /// `op` names the operation for the observer and logs.
    pub fn apply<T, F>(&self, op: &str, f: F) -> Result<T::Output>
    where
        T: Transition<P>,
        F: FnOnce(&P) -> Result<T>,
    {
        let mut state = self.state.write();
        self.observer.check()?;
        let (output, next) = f(&*state)?.split();
        let previous = std::mem::replace(&mut *state, next);
        tracing::trace!(op, "pool transition applied");
        self.observer.updated(op, &previous, &*state)?;
        Ok(output)
    }
}
