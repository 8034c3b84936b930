//! Online/offline signal source.
//!
//! The monitor holds the current connectivity flag and an explicit list of
//! listeners. It does no probing or retrying of its own; whoever owns the
//! platform signal calls [`NetworkMonitor::set_online`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

struct Inner {
    online: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

/// Shared connectivity flag with change listeners.
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<Inner>,
}

impl NetworkMonitor {
    /// Create a monitor with the given initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                online: AtomicBool::new(online),
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Update connectivity, notifying listeners on an actual transition.
    ///
    /// Returns `true` if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.inner.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        debug!(online, "Network state changed");

        // Snapshot so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener(online);
        }
        true
    }

    /// Subscribe to transitions. Returns a disposer that unsubscribes.
    pub fn on_change<F>(&self, listener: F) -> impl FnOnce() + Send + Sync + 'static
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(lid, _)| *lid != id);
            }
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("online", &self.is_online())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
