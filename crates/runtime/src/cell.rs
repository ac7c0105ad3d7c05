//! Graph-ordered interior mutability.
//!
//! [`TaskCell`] is shared between tasks whose accesses are already
//! serialized by edges of the execution graph. It never blocks: a
//! conflicting borrow means the graph is wrong, and panics.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

const EXCLUSIVE: usize = usize::MAX;

pub struct TaskCell<T> {
    state: AtomicUsize,
    value: UnsafeCell<T>,
}

// Exclusive access is checked through `state`; shared access additionally
// requires `T: Sync` at the call site.
unsafe impl<T: Send> Send for TaskCell<T> {}
unsafe impl<T: Send> Sync for TaskCell<T> {}

impl<T> TaskCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Shared borrow. Panics if an exclusive borrow is live.
    pub fn borrow(&self) -> TaskRef<'_, T>
    where
        T: Sync,
    {
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            if current == EXCLUSIVE || current == EXCLUSIVE - 1 {
                panic!("TaskCell: shared borrow while exclusively borrowed");
            }
            match self.state.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return TaskRef { cell: self },
                Err(actual) => current = actual,
            }
        }
    }

    /// Exclusive borrow. Panics if any borrow is live.
    pub fn borrow_mut(&self) -> TaskRefMut<'_, T> {
        if self
            .state
            .compare_exchange(0, EXCLUSIVE, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            panic!("TaskCell: exclusive borrow while already borrowed");
        }
        TaskRefMut { cell: self }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for TaskCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for TaskCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCell")
            .field("borrows", &self.state.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

pub struct TaskRef<'a, T> {
    cell: &'a TaskCell<T>,
}

impl<T> Deref for TaskRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the state counter holds a shared borrow for our lifetime.
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> Drop for TaskRef<'_, T> {
    fn drop(&mut self) {
        self.cell.state.fetch_sub(1, Ordering::Release);
    }
}

pub struct TaskRefMut<'a, T> {
    cell: &'a TaskCell<T>,
}

impl<T> Deref for TaskRefMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the state counter holds the exclusive borrow.
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> DerefMut for TaskRefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the state counter holds the exclusive borrow.
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<T> Drop for TaskRefMut<'_, T> {
    fn drop(&mut self) {
        self.cell.state.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_then_exclusive() {
        let cell = TaskCell::new(vec![1, 2]);
        {
            let a = cell.borrow();
            let b = cell.borrow();
            assert_eq!(a.len() + b.len(), 4);
        }
        cell.borrow_mut().push(3);
        assert_eq!(cell.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "exclusive borrow while already borrowed")]
    fn test_conflicting_exclusive_borrow_panics() {
        let cell = TaskCell::new(0u32);
        let _held = cell.borrow();
        let _ = cell.borrow_mut();
    }

    #[test]
    #[should_panic(expected = "shared borrow while exclusively borrowed")]
    fn test_shared_during_exclusive_panics() {
        let cell = TaskCell::new(0u32);
        let _held = cell.borrow_mut();
        let _ = cell.borrow();
    }

    #[test]
    fn test_cross_thread_handoff() {
        let cell = TaskCell::new(0u64);
        std::thread::scope(|s| {
            s.spawn(|| *cell.borrow_mut() += 1);
        });
        std::thread::scope(|s| {
            s.spawn(|| *cell.borrow_mut() += 1);
        });
        assert_eq!(*cell.borrow(), 2);
    }
}
