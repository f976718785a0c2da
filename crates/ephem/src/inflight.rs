//! Coalescing of identical in-flight remote fetches.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use ephem_core::{ElementsRequest, EphemError};

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<T>, EphemError>>>;

/// Fetches keyed by request; concurrent callers with the same key share one future.
pub(crate) struct InFlight<T> {
    fetches: Arc<Mutex<HashMap<ElementsRequest, SharedFetch<T>>>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            fetches: Arc::default(),
        }
    }
}

/// Whether the caller started the fetch or joined one already running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    Leader,
    Follower,
}

impl<T: Send + Sync + 'static> InFlight<T> {
    /// Number of fetches currently running.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Awaits the fetch for `key`, starting it with `start` if none is running.
    pub(crate) async fn run<F>(
        &self,
        key: ElementsRequest,
        start: impl FnOnce() -> F,
    ) -> (Role, Result<Arc<T>, EphemError>)
    where
        F: Future<Output = Result<T, EphemError>> + Send + 'static,
    {
        let (role, fetch) = {
            let mut fetches = self.fetches.lock().unwrap_or_else(PoisonError::into_inner);
            match fetches.get(&key) {
                Some(fetch) => (Role::Follower, fetch.clone()),
                None => {
                    let fetch = start().map(|r| r.map(Arc::new)).boxed().shared();
                    fetches.insert(key.clone(), fetch.clone());
                    (Role::Leader, fetch)
                }
            }
        };

        // The leader clears the entry when it finishes or is cancelled.
        let _guard = (role == Role::Leader).then(|| Removal {
            fetches: Arc::clone(&self.fetches),
            key,
        });

        (role, fetch.await)
    }
}

struct Removal<T> {
    fetches: Arc<Mutex<HashMap<ElementsRequest, SharedFetch<T>>>>,
    key: ElementsRequest,
}

impl<T> Drop for Removal<T> {
    fn drop(&mut self) {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
