//! Per-path memoization of asynchronously loaded assets.
//!
//! Each path is either *pending*, holding a shared future every concurrent
//! requester awaits, or *ready*, holding the loaded value. A load that resolves
//! to `None` removes its entry again, so a failure leaves the cache as it was
//! before the request.

use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use futures::future::{FutureExt, LocalBoxFuture, Shared};

pub type SharedLoad<T> = Shared<LocalBoxFuture<'static, Option<T>>>;

enum Entry<T: Clone> {
    Pending(SharedLoad<T>),
    Ready(T),
}

/// How a request was served.
pub enum Slot<T: Clone> {
    /// Already loaded.
    Hit(T),
    /// Another request is loading it; await the shared future.
    Joined(SharedLoad<T>),
    /// This request started the load.
    Started(SharedLoad<T>),
}

/// Single-threaded cache; clones share the same entries.
pub struct ModelCache<T: Clone> {
    entries: Rc<RefCell<HashMap<String, Entry<T>>>>,
}

impl<T: Clone> Clone for ModelCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T: Clone> fmt::Debug for ModelCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        let pending = entries
            .values()
            .filter(|entry| matches!(entry, Entry::Pending(_)))
            .count();
        f.debug_struct("ModelCache")
            .field("ready", &(entries.len() - pending))
            .field("pending", &pending)
            .finish()
    }
}

impl<T: Clone> Default for ModelCache<T> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl<T: Clone + 'static> ModelCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded value, if the load for `path` has completed successfully.
    pub fn get(&self, path: &str) -> Option<T> {
        match self.entries.borrow().get(path) {
            Some(Entry::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_pending(&self, path: &str) -> bool {
        matches!(self.entries.borrow().get(path), Some(Entry::Pending(_)))
    }

    /// Number of paths that are loaded or loading.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Serves `path` from the cache, joins a load in flight, or starts one
    /// with `load`. `load` is only called in the last case.
    pub fn get_or_load<F>(&self, path: &str, load: F) -> Slot<T>
    where
        F: FnOnce() -> LocalBoxFuture<'static, Option<T>>,
    {
        match self.entries.borrow().get(path) {
            Some(Entry::Ready(value)) => return Slot::Hit(value.clone()),
            Some(Entry::Pending(fut)) => return Slot::Joined(fut.clone()),
            None => (),
        }

        let entries = self.entries.clone();
        let key = path.to_string();
        let inner = load();
        let fut = async move {
            let result = inner.await;
            let mut entries = entries.borrow_mut();
            match &result {
                Some(value) => {
                    entries.insert(key, Entry::Ready(value.clone()));
                }
                None => {
                    entries.remove(&key);
                }
            }
            result
        }
        .boxed_local()
        .shared();

        self.entries
            .borrow_mut()
            .insert(path.to_string(), Entry::Pending(fut.clone()));
        Slot::Started(fut)
    }
}
