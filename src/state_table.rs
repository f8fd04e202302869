// Per-character movement state table: four parallel callback arrays indexed by state.
use std::fmt;

use thiserror::Error;

pub type UpdateFn<C> = fn(&mut C) -> usize;
pub type CoroutineFn<C> = fn(&mut C) -> Box<dyn StateCoroutine<C>>;
pub type BeginFn<C> = fn(&mut C);
pub type EndFn<C> = fn(&mut C);

/// Result of resuming a state coroutine for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoroutineStep {
    /// Suspend until the next tick.
    Yield,
    /// The body has run to completion.
    Done,
}

/// A suspendable state body, resumed once per tick while its state is active.
pub trait StateCoroutine<C>: Send + Sync {
    fn resume(&mut self, owner: &mut C) -> CoroutineStep;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateTableError {
    #[error("state table is full ({capacity} slots), cannot add another state")]
    CapacityExhausted { capacity: usize },
}

pub struct StateTable<C> {
    updates: Vec<Option<UpdateFn<C>>>,
    coroutines: Vec<Option<CoroutineFn<C>>>,
    begins: Vec<Option<BeginFn<C>>>,
    ends: Vec<Option<EndFn<C>>>,
    capacity: usize,
}

impl<C> StateTable<C> {
    /// Allocate `states` empty slots. The table may later grow up to `capacity` slots.
    pub fn new(states: usize, capacity: usize) -> Self {
        Self {
            updates: vec![None; states],
            coroutines: vec![None; states],
            begins: vec![None; states],
            ends: vec![None; states],
            capacity: capacity.max(states),
        }
    }

    pub fn len(&self) -> usize {
        self.begins.len()
    }

    pub fn set_callbacks(
        &mut self,
        index: usize,
        update: Option<UpdateFn<C>>,
        coroutine: Option<CoroutineFn<C>>,
        begin: Option<BeginFn<C>>,
        end: Option<EndFn<C>>,
    ) {
        self.updates[index] = update;
        self.coroutines[index] = coroutine;
        self.begins[index] = begin;
        self.ends[index] = end;
    }

    /// Append one state slot and return its index.
    ///
    /// Indices are never reused, so calling this twice for the same state
    /// leaves an orphaned slot behind.
    pub fn extend(
        &mut self,
        update: UpdateFn<C>,
        coroutine: Option<CoroutineFn<C>>,
        begin: Option<BeginFn<C>>,
        end: Option<EndFn<C>>,
    ) -> Result<usize, StateTableError> {
        debug_assert!(
            self.updates.len() == self.begins.len()
                && self.coroutines.len() == self.begins.len()
                && self.ends.len() == self.begins.len()
        );

        let next = self.len();
        if next >= self.capacity {
            return Err(StateTableError::CapacityExhausted {
                capacity: self.capacity,
            });
        }

        self.updates.push(None);
        self.coroutines.push(None);
        self.begins.push(None);
        self.ends.push(None);
        self.set_callbacks(next, Some(update), coroutine, begin, end);
        Ok(next)
    }

    pub fn update(&self, index: usize) -> Option<UpdateFn<C>> {
        self.updates.get(index).copied().flatten()
    }

    pub fn coroutine(&self, index: usize) -> Option<CoroutineFn<C>> {
        self.coroutines.get(index).copied().flatten()
    }

    pub fn begin(&self, index: usize) -> Option<BeginFn<C>> {
        self.begins.get(index).copied().flatten()
    }

    pub fn end(&self, index: usize) -> Option<EndFn<C>> {
        self.ends.get(index).copied().flatten()
    }
}

impl<C> fmt::Debug for StateTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTable")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
