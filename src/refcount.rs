use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::sync::{Mutex, MutexGuard, PoisonError};

type Callback = Box<dyn Fn() + Send + Sync>;

/// Returned when releasing a reference while the count is already zero.
///
/// This is always a caller bug: something released a reference it never held.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Underflow;

impl Display for Underflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("refcount underflow: released a reference that was not held")
    }
}

impl Error for Underflow {}

/// A non-negative use count with optional hooks on the 0 -> 1 and 1 -> 0 edges.
///
/// All operations are serialized by one internal lock, which is also held while a hook runs.
/// A hook therefore finishes before any other thread can observe the count it produced.
/// Hooks must not call back into the same `Refcounter`; that would deadlock.
///
/// If a hook panics, the panic propagates to the caller with the count already updated.
pub struct Refcounter {
    count: Mutex<usize>,
    on_acquire: Option<Callback>,
    on_release: Option<Callback>,
}

impl Refcounter {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            on_acquire: None,
            on_release: None,
        }
    }

    /// Run `f` whenever [`increment`](Self::increment) raises the count from zero.
    pub fn on_acquire(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_acquire = Some(Box::new(f));
        self
    }

    /// Run `f` whenever [`decrement`](Self::decrement) lowers the count to zero.
    pub fn on_release(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_release = Some(Box::new(f));
        self
    }

    pub fn count(&self) -> usize {
        *self.lock()
    }

    pub fn is_zero(&self) -> bool {
        self.count() == 0
    }

    /// Add a user, firing `on_acquire` if this is the first one.
    pub fn increment(&self) {
        let mut count = self.lock();
        let old_value = *count;
        if old_value >= usize::MAX / 2 {
            panic!("refcount overflow (positive)");
        }
        *count = old_value + 1;
        if old_value == 0 {
            log::trace!("Refcount acquired");
            if let Some(on_acquire) = &self.on_acquire {
                on_acquire();
            }
        }
    }

    /// Remove a user, firing `on_release` if this was the last one.
    pub fn decrement(&self) -> Result<(), Underflow> {
        let mut count = self.lock();
        *count = checked_decrement(*count)?;
        if *count == 0 {
            log::trace!("Refcount released");
            if let Some(on_release) = &self.on_release {
                on_release();
            }
        }
        Ok(())
    }

    /// Add a user only if there already is one.
    ///
    /// Returns `false` without touching the count if it is zero, so this never revives a
    /// resource that is being torn down. `on_acquire` is never fired from here.
    pub fn increment_if_nonzero(&self) -> bool {
        let mut count = self.lock();
        if *count == 0 {
            return false;
        }
        if *count >= usize::MAX / 2 {
            panic!("refcount overflow (positive)");
        }
        *count += 1;
        true
    }

    /// Remove a user and report whether it was the last one.
    ///
    /// Does not fire `on_release`: on `true`, teardown is up to the caller.
    pub fn decrement_and_test(&self) -> Result<bool, Underflow> {
        let mut count = self.lock();
        *count = checked_decrement(*count)?;
        Ok(*count == 0)
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // A panicking hook poisons the lock after the count has been committed,
        // so the value behind it is still consistent.
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn checked_decrement(count: usize) -> Result<usize, Underflow> {
    match count.checked_sub(1) {
        Some(new_value) => Ok(new_value),
        None => {
            log::error!("Refcount underflow: decrement with no references held");
            Err(Underflow)
        }
    }
}

impl Debug for Refcounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refcounter")
            .field("count", &self.count())
            .field("on_acquire", &self.on_acquire.is_some())
            .field("on_release", &self.on_release.is_some())
            .finish()
    }
}
