//! Last-resort cleanup on process shutdown.
//!
//! Callers are expected to close every session they open. As a safety
//! net, each session also registers a hook here that closes it; the host
//! runs all hooks once when the process is going away (for example from a
//! Ctrl-C handler, see `lobbyforge::shutdown`). A session that was closed
//! normally unregisters its hook, so nothing runs twice.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifies a registered hook so it can be unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

type Hook = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct HookTable {
    /// Registration order is run order.
    hooks: Vec<(HookId, Hook)>,
    next_id: u64,
}

/// A shared registry of shutdown hooks.
///
/// Cloning is cheap: clones share the same table, so one registry can be
/// handed to several factories and to the host's shutdown path.
#[derive(Clone, Default)]
pub struct ShutdownHooks {
    table: Arc<Mutex<HookTable>>,
}

impl ShutdownHooks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook to run at shutdown.
    pub fn register(&self, hook: impl FnOnce() + Send + 'static) -> HookId {
        let mut table = self.lock();
        table.next_id += 1;
        let id = HookId(table.next_id);
        table.hooks.push((id, Box::new(hook)));
        id
    }

    /// Removes a hook without running it. Returns `false` if it was
    /// already gone (unregistered, or already run).
    pub fn unregister(&self, id: HookId) -> bool {
        let mut table = self.lock();
        let before = table.hooks.len();
        table.hooks.retain(|(hook_id, _)| *hook_id != id);
        table.hooks.len() != before
    }

    /// Runs every registered hook once, in registration order, and empties
    /// the registry. Returns how many hooks ran.
    ///
    /// Hooks run after the table lock is released, so a hook may call back
    /// into the registry.
    pub fn run(&self) -> usize {
        let hooks = std::mem::take(&mut self.lock().hooks);
        let count = hooks.len();
        for (_, hook) in hooks {
            hook();
        }
        if count > 0 {
            tracing::info!(count, "shutdown hooks ran");
        }
        count
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.lock().hooks.len()
    }

    /// Returns `true` if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().hooks.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HookTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHooks")
            .field("registered", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn test_run_executes_each_hook_once() {
        let hooks = ShutdownHooks::new();
        let calls = counter();
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            hooks.register(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(hooks.run(), 3);
        assert_eq!(hooks.run(), 0, "hooks are drained by the first run");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_run_preserves_registration_order() {
        let hooks = ShutdownHooks::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 1..=3 {
            let order = Arc::clone(&order);
            hooks.register(move || order.lock().unwrap().push(n));
        }

        hooks.run();

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unregister_prevents_run() {
        let hooks = ShutdownHooks::new();
        let calls = counter();
        let c = Arc::clone(&calls);
        let id = hooks.register(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(hooks.unregister(id));
        assert!(!hooks.unregister(id), "second unregister is a no-op");
        hooks.run();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_hook_may_unregister_itself_while_running() {
        // Sessions unregister their hook from inside close(), which the
        // hook itself calls. That must not deadlock.
        let hooks = ShutdownHooks::new();
        let inner = hooks.clone();
        let slot: Arc<Mutex<Option<HookId>>> = Arc::default();
        let slot_in_hook = Arc::clone(&slot);
        let id = hooks.register(move || {
            if let Some(id) = *slot_in_hook.lock().unwrap() {
                inner.unregister(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        assert_eq!(hooks.run(), 1);
    }

    #[test]
    fn test_clones_share_the_table() {
        let hooks = ShutdownHooks::new();
        let clone = hooks.clone();
        clone.register(|| {});

        assert_eq!(hooks.len(), 1);
    }
}
