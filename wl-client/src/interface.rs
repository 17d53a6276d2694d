//! Process-wide, append-only table of interface descriptors.
//!
//! Interfaces are registered once, at bootstrap, and looked up by name
//! while building object entries. There is no removal: a descriptor lives
//! for the rest of the process once registered, and every object entry
//! that borrows it is guaranteed it will outlive the connection.

use std::sync::{Mutex, OnceLock};

use wl_core::wire::Interface;

/// Matches the static array the original implementation sized its
/// registry to.
const CAPACITY: usize = 1024;

fn registry() -> &'static Mutex<Vec<&'static Interface>> {
    static REGISTRY: OnceLock<Mutex<Vec<&'static Interface>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Vec::with_capacity(CAPACITY)))
}

/// Register `interface`, appending it to the global table.
///
/// Idempotent per descriptor pointer: registering the exact same `&'static
/// Interface` twice is a no-op. Registering two different descriptors that
/// happen to share a `name` is not detected here and is a programmer
/// error, per the original registry's contract.
///
/// # Panics
///
/// Panics if the registry already holds `CAPACITY` descriptors.
pub fn register_interface(interface: &'static Interface) {
    let mut table = registry().lock().unwrap();
    if table
        .iter()
        .any(|existing| std::ptr::eq(*existing, interface))
    {
        return;
    }
    assert!(table.len() < CAPACITY, "interface registry is full");
    table.push(interface);
}

/// Linear lookup by name.
pub fn lookup_interface(name: &str) -> Option<&'static Interface> {
    registry()
        .lock()
        .unwrap()
        .iter()
        .find(|iface| iface.name == name)
        .copied()
}
