//! Server-pushed service fault delivery.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::status::StatusCode;

/// A service fault not tied to a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFault {
    /// Request handle from the response header, 0 when unsolicited
    pub request_handle: u32,
    /// Service result from the response header
    pub service_result: StatusCode,
}

impl ServiceFault {
    /// Create an unsolicited fault with the given status.
    pub fn new(service_result: StatusCode) -> Self {
        Self {
            request_handle: 0,
            service_result,
        }
    }
}

/// Opaque handle for one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaultHandlerId(u64);

impl fmt::Display for FaultHandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault-handler-{}", self.0)
    }
}

/// What a handler wants done with its registration after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// Stay registered
    Keep,
    /// Remove this registration
    Deregister,
}

type Predicate = Arc<dyn Fn(&ServiceFault) -> bool + Send + Sync>;
type Callback = Arc<dyn Fn(FaultHandlerId, &ServiceFault) -> FaultAction + Send + Sync>;

struct Registration {
    predicate: Predicate,
    callback: Callback,
}

/// Registry of fault handlers keyed by [`FaultHandlerId`].
///
/// Handlers are invoked outside the registry lock, so a handler may register
/// or deregister other handlers. A handler removes itself by returning
/// [`FaultAction::Deregister`]; nothing else can remove a registration except
/// a `deregister` call with its id.
///
/// A handler deregistered after `dispatch` matched it but before its turn
/// is skipped. One already running when it is deregistered still finishes,
/// which is why callbacks get their own id: whatever they raise can be
/// checked against the registration that is current by the time it lands.
#[derive(Default)]
pub struct FaultHandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<BTreeMap<FaultHandlerId, Registration>>,
}

impl FaultHandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for faults matching `predicate`.
    ///
    /// The callback receives the id of its own registration.
    pub fn register<P, C>(&self, predicate: P, callback: C) -> FaultHandlerId
    where
        P: Fn(&ServiceFault) -> bool + Send + Sync + 'static,
        C: Fn(FaultHandlerId, &ServiceFault) -> FaultAction + Send + Sync + 'static,
    {
        let id = FaultHandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().insert(
            id,
            Registration {
                predicate: Arc::new(predicate),
                callback: Arc::new(callback),
            },
        );
        tracing::trace!("Registered {}", id);
        id
    }

    /// Remove a registration. Returns `false` if it was already gone.
    pub fn deregister(&self, id: FaultHandlerId) -> bool {
        let removed = self.handlers.lock().remove(&id).is_some();
        if removed {
            tracing::trace!("Deregistered {}", id);
        }
        removed
    }

    /// Whether `id` is still registered.
    pub fn contains(&self, id: FaultHandlerId) -> bool {
        self.handlers.lock().contains_key(&id)
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Check if no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Deliver `fault` to every matching handler. Returns how many ran.
    pub fn dispatch(&self, fault: &ServiceFault) -> usize {
        let matching: Vec<(FaultHandlerId, Callback)> = self
            .handlers
            .lock()
            .iter()
            .filter(|(_, reg)| (reg.predicate)(fault))
            .map(|(id, reg)| (*id, Arc::clone(&reg.callback)))
            .collect();

        let mut ran = 0;
        for (id, callback) in matching {
            if !self.contains(id) {
                tracing::trace!("Skipping {}, deregistered during dispatch", id);
                continue;
            }
            ran += 1;
            if callback(id, fault) == FaultAction::Deregister {
                self.deregister(id);
            }
        }
        ran
    }
}

impl fmt::Debug for FaultHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultHandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}
