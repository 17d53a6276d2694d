//! Per-connection object registry: dual bitmap id allocators plus a
//! chained map from object id to object entry.

use wl_core::bitmap::IdBitmap;
use wl_core::collections::ChainedMap;
use wl_core::error::{tracked, Error};
use wl_core::wire::{Interface, ObjectId};

use crate::interface::lookup_interface;

/// Capacity of each id pool, in bits. Matches the fixed-size pool the
/// original implementation sized its bitmaps to; it is a practical cap on
/// how many objects of one allocation range a connection can have live at
/// once, not the full 32-bit id range.
const ID_POOL_CAPACITY: u32 = 4096;

/// A live object: its id, the interface it was created with, and the
/// sequence number that orders it against other objects of the same
/// interface name.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub id: ObjectId,
    pub interface_name: String,
    pub interface: &'static Interface,
    pub creation_sequence: u64,
}

pub struct ObjectRegistry {
    client_ids: IdBitmap,
    server_ids: IdBitmap,
    entries: ChainedMap<ObjectEntry>,
    next_sequence: u64,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            client_ids: IdBitmap::new(ID_POOL_CAPACITY),
            server_ids: IdBitmap::new(ID_POOL_CAPACITY),
            entries: ChainedMap::new(256),
            next_sequence: 0,
        }
    }

    /// Register a new object.
    ///
    /// `id_hint == 0` allocates the lowest free id from the client pool.
    /// Otherwise `id_hint` must fall in the client or server range; that
    /// exact id is taken (`Error::IdTaken` if already live).
    pub fn register(&mut self, id_hint: u32, interface_name: &str) -> Result<ObjectId, Error> {
        let interface = tracked(
            lookup_interface(interface_name).ok_or_else(|| Error::NullInterface(interface_name.to_owned())),
        )?;

        let id = if id_hint == 0 {
            let n = tracked(self.client_ids.first_free())?;
            self.client_ids.set(n)?;
            tracked(ObjectId::new(ObjectId::MIN_CLIENT + n).ok_or(Error::NullObject(0)))?
        } else if (ObjectId::MIN_SERVER..=ObjectId::MAX_SERVER).contains(&id_hint) {
            let n = id_hint - ObjectId::MIN_SERVER;
            if self.server_ids.get(n)? {
                return tracked(Err(Error::IdTaken(id_hint)));
            }
            self.server_ids.set(n)?;
            tracked(ObjectId::new(id_hint).ok_or(Error::NullObject(0)))?
        } else {
            let n = id_hint - ObjectId::MIN_CLIENT;
            if self.client_ids.get(n)? {
                return tracked(Err(Error::IdTaken(id_hint)));
            }
            self.client_ids.set(n)?;
            tracked(ObjectId::new(id_hint).ok_or(Error::NullObject(0)))?
        };

        let creation_sequence = self.next_sequence;
        self.next_sequence += 1;

        self.entries.insert(
            id.as_u32() as u64,
            ObjectEntry {
                id,
                interface_name: interface_name.to_owned(),
                interface,
                creation_sequence,
            },
        );

        Ok(id)
    }

    /// Remove the object entry under `id`, freeing its bit in the owning
    /// pool. Unlike the bug documented for the original implementation,
    /// the entry is removed under the exact same id it was stored under.
    pub fn unregister(&mut self, id: ObjectId) -> Result<(), Error> {
        let raw = id.as_u32();
        tracked(
            self.entries
                .remove(raw as u64)
                .ok_or(Error::NullObject(raw)),
        )?;

        if id.created_by_server() {
            self.server_ids.unset(raw - ObjectId::MIN_SERVER)
        } else {
            self.client_ids.unset(raw - ObjectId::MIN_CLIENT)
        }
    }

    /// Remove the newest live object with the given interface name.
    pub fn unregister_last(&mut self, interface_name: &str) -> Result<(), Error> {
        let id = tracked(
            self.get_by_name(interface_name)
                .map(|entry| entry.id)
                .ok_or_else(|| Error::NullObject(0)),
        )?;
        self.unregister(id)
    }

    pub fn get_by_id(&self, id: ObjectId) -> Option<&ObjectEntry> {
        self.entries.get(id.as_u32() as u64)
    }

    /// The live entry with the given interface name and the highest
    /// `creation_sequence`.
    pub fn get_by_name(&self, interface_name: &str) -> Option<&ObjectEntry> {
        self.entries
            .iter()
            .map(|(_, entry)| entry)
            .filter(|entry| entry.interface_name == interface_name)
            .max_by_key(|entry| entry.creation_sequence)
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_IFACE: Interface = Interface {
        name: "wl_test_object",
        requests: &[],
        events: &[],
    };

    fn with_registry() -> ObjectRegistry {
        crate::interface::register_interface(&TEST_IFACE);
        ObjectRegistry::new()
    }

    #[test]
    fn client_ids_are_distinct_and_in_range() {
        let mut reg = with_registry();
        let a = reg.register(0, "wl_test_object").unwrap();
        let b = reg.register(0, "wl_test_object").unwrap();
        assert_ne!(a, b);
        assert!(a.created_by_client());
        assert!(b.created_by_client());
    }

    #[test]
    fn server_id_collision_is_rejected() {
        let mut reg = with_registry();
        let id = ObjectId::MIN_SERVER + 1;
        reg.register(id, "wl_test_object").unwrap();
        assert!(matches!(
            reg.register(id, "wl_test_object"),
            Err(Error::IdTaken(_))
        ));
    }

    #[test]
    fn get_by_name_prefers_most_recent() {
        let mut reg = with_registry();
        let first = reg.register(0, "wl_test_object").unwrap();
        let second = reg.register(0, "wl_test_object").unwrap();
        assert_eq!(reg.get_by_name("wl_test_object").unwrap().id, second);
        reg.unregister(second).unwrap();
        assert_eq!(reg.get_by_name("wl_test_object").unwrap().id, first);
    }

    #[test]
    fn unregister_frees_the_id_for_reuse() {
        let mut reg = with_registry();
        let id = reg.register(0, "wl_test_object").unwrap();
        reg.unregister(id).unwrap();
        assert!(reg.get_by_id(id).is_none());
        let reused = reg.register(0, "wl_test_object").unwrap();
        assert_eq!(reused, id);
    }
}
