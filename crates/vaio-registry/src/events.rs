//! Component registry lifecycle events.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::error;
use vaio_proto::ModuleType;

/// Event kinds listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryEventKind {
    /// A component became available.
    ComponentLoaded,
    /// A component was removed.
    ComponentUnloaded,
    /// Any change to the registry contents.
    RegistryChanged,
}

/// Why the registry changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    /// A component was registered under `key`.
    Registered {
        /// Registry key.
        key: String,
    },
    /// The component under `key` was removed.
    Unregistered {
        /// Registry key.
        key: String,
    },
    /// The entry under `key` was dropped ahead of a reload.
    Reloading {
        /// Registry key.
        key: String,
    },
    /// Instance entries of inactive panes were dropped.
    ActiveModulesSynced {
        /// Removed keys.
        removed: Vec<String>,
    },
}

/// A lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A component was registered.
    ComponentLoaded {
        /// Registry key.
        key: String,
        /// Category of the key.
        module_type: ModuleType,
    },
    /// A component was unregistered.
    ComponentUnloaded {
        /// Registry key.
        key: String,
    },
    /// The registry changed.
    RegistryChanged(ChangeReason),
}

impl RegistryEvent {
    /// The kind listeners subscribe with.
    #[must_use]
    pub const fn kind(&self) -> RegistryEventKind {
        match self {
            Self::ComponentLoaded { .. } => RegistryEventKind::ComponentLoaded,
            Self::ComponentUnloaded { .. } => RegistryEventKind::ComponentUnloaded,
            Self::RegistryChanged(_) => RegistryEventKind::RegistryChanged,
        }
    }
}

/// Handle returned by listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kind: RegistryEventKind,
    name: String,
    callback: Callback,
}

/// Listener list with panic-isolated synchronous delivery.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    entries: RwLock<Vec<Listener>>,
}

impl Listeners {
    pub(crate) fn add(
        &self,
        kind: RegistryEventKind,
        name: String,
        callback: impl Fn(&RegistryEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(Listener {
            id,
            kind,
            name,
            callback: Arc::new(callback),
        });
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|l| l.id != id);
        entries.len() != before
    }

    /// Deliver `event` to every listener of its kind.
    ///
    /// The list is snapshotted first so listeners may add or remove
    /// listeners. A panicking listener is logged and skipped.
    pub(crate) fn emit(&self, event: &RegistryEvent) {
        let kind = event.kind();
        let targets: Vec<(String, Callback)> = self
            .entries
            .read()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| (l.name.clone(), Arc::clone(&l.callback)))
            .collect();

        for (name, callback) in targets {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                error!(
                    listener = %name,
                    event = ?kind,
                    panic = %panic_message(payload.as_ref()),
                    "registry listener panicked"
                );
            }
        }
    }
}

/// Text of a caught panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
