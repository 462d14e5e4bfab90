//! Type-erased shared user data
//!
//! `RefAny` is the only way user state crosses the callback boundary. Clones
//! share the same value; access is checked against the stored type at runtime.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Reference-counted, runtime-typed box
#[derive(Clone)]
pub struct RefAny {
    inner: Arc<Mutex<Box<dyn Any + Send>>>,
    type_name: &'static str,
}

impl RefAny {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self { inner: Arc::new(Mutex::new(Box::new(value))), type_name: type_name::<T>() }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Any + Send>> {
        // a panicking callback poisons the lock; the value itself is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the stored value is a `T`
    pub fn is_type<T: Any>(&self) -> bool {
        (**self.lock()).is::<T>()
    }

    /// Name of the stored type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Run `f` on a shared borrow of the value, or `None` on a type mismatch.
    ///
    /// Holds the lock for the duration of `f`; don't access the same `RefAny`
    /// from inside `f`.
    pub fn with_ref<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.lock();
        (**guard).downcast_ref::<T>().map(f)
    }

    /// Run `f` on a mutable borrow of the value, or `None` on a type mismatch
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.lock();
        (**guard).downcast_mut::<T>().map(f)
    }

    /// Clone the value out
    pub fn get_cloned<T: Any + Clone>(&self) -> Option<T> {
        self.with_ref(T::clone)
    }

    /// Replace the value, keeping the type; returns `false` on a type mismatch
    pub fn replace<T: Any>(&self, value: T) -> bool {
        self.with_mut(|slot: &mut T| *slot = value).is_some()
    }

    /// Both handles point at the same value
    pub fn ptr_eq(&self, other: &RefAny) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for RefAny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefAny")
            .field("type", &self.type_name)
            .field("refs", &self.strong_count())
            .finish()
    }
}
