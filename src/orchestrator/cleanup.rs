//! Shared registry of node teardown closures

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

type CleanupFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct Entries {
    closures: Vec<(String, CleanupFn)>,
    drained: bool,
}

/// Teardown closures registered by concurrently starting nodes
///
/// Closures are drained once by [`invoke_all`](Self::invoke_all) and run
/// concurrently. A closure registered after that runs immediately.
#[derive(Default)]
pub struct CleanupRegistry {
    entries: Mutex<Entries>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the teardown for the node `label`
    pub fn register<F, Fut>(&self, label: impl Into<String>, cleanup: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let label = label.into();
        let boxed: CleanupFn = Box::new(move || cleanup().boxed());

        let late = {
            let mut entries = self.lock();
            if entries.drained {
                Some(boxed)
            } else {
                entries.closures.push((label.clone(), boxed));
                None
            }
        };

        if let Some(cleanup) = late {
            debug!(node = %label, "Registry already drained, cleaning up now");
            tokio::spawn(cleanup());
        }
    }

    /// Number of closures waiting to run
    pub fn len(&self) -> usize {
        self.lock().closures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn every registered closure and return how many were started
    ///
    /// Must be called from within a Tokio runtime. Only the first call
    /// finds anything to run.
    pub fn invoke_all(&self) -> usize {
        let closures = {
            let mut entries = self.lock();
            entries.drained = true;
            std::mem::take(&mut entries.closures)
        };

        let count = closures.len();
        for (label, cleanup) in closures {
            debug!(node = %label, "Invoking cleanup");
            tokio::spawn(cleanup());
        }
        count
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
