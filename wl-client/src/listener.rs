//! Per-connection mapping from object id to its event listener.
//!
//! The original `void *user_data` pattern is replaced with a capturing
//! closure: instead of threading an opaque pointer through to a handler
//! that casts it back, callers simply capture whatever state they need
//! when building the `Box<dyn FnMut>`. `D` is the connection's
//! user-supplied state type, threaded into every call the same way
//! `Connection<D>` already threads it into requests.

use wl_core::collections::ChainedMap;
use wl_core::wire::ArgValue;

/// A listener's handler: given the connection's shared state and the
/// event's decoded arguments (slot 0 is always the emitting object's id),
/// does whatever the application wants.
pub type Handler<D> = Box<dyn FnMut(&mut D, &[ArgValue])>;

pub struct ListenerRegistry<D> {
    listeners: ChainedMap<Handler<D>>,
}

impl<D> ListenerRegistry<D> {
    pub fn new() -> Self {
        Self {
            listeners: ChainedMap::new(256),
        }
    }

    /// Install (or overwrite) the listener for `object_id`.
    pub fn add(&mut self, object_id: u32, handler: Handler<D>) {
        self.listeners.remove(object_id as u64);
        self.listeners.insert(object_id as u64, handler);
    }

    /// Remove the listener for `object_id`, if any. Future events for that
    /// object are dropped until a new listener is installed.
    pub fn remove(&mut self, object_id: u32) {
        self.listeners.remove(object_id as u64);
    }

    pub fn get_mut(&mut self, object_id: u32) -> Option<&mut Handler<D>> {
        self.listeners.get_mut(object_id as u64)
    }
}

impl<D> Default for ListenerRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}
