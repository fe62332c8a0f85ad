//! The managed object heap.
//!
//! Script-visible values live in an arena owned by the run context. The VM
//! and native functions hold only [`ObjectId`] handles; nothing outside the
//! heap ever owns a [`ManagedObject`]. Objects are small (scalars, strings,
//! height-map slot handles - never pixel data), so the arena is simply reset
//! between runs instead of collected.
//!
//! Accessing an id the heap never issued is an internal fault and panics.

use orogen_render::SlotIndex;

use crate::dispatch::TypeId;

/// Handle to a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    /// The interned null object; every heap issues it as id 0.
    pub(crate) const NULL: ObjectId = ObjectId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type-specific payload of a managed object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectPayload {
    Null,
    Boolean(bool),
    Number(f64),
    Str(String),
    /// Handle to a deferred map: the graph slot its values will appear in.
    HeightMap(SlotIndex),
}

impl ObjectPayload {
    /// Type name used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            ObjectPayload::Null => "Null",
            ObjectPayload::Boolean(_) => "Boolean",
            ObjectPayload::Number(_) => "Number",
            ObjectPayload::Str(_) => "String",
            ObjectPayload::HeightMap(_) => "HeightMap",
        }
    }
}

/// A heap value: a type tag plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedObject {
    pub type_id: TypeId,
    pub payload: ObjectPayload,
}

/// Type ids of the built-in types, assigned at registry installation.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinTypeIds {
    pub null: TypeId,
    pub boolean: TypeId,
    pub number: TypeId,
    pub string: TypeId,
    pub height_map: TypeId,
    pub args: TypeId,
}

/// Arena of all live managed objects.
///
/// `null`, `true`, and `false` are interned once at construction; everything
/// else is appended per allocation and discarded wholesale by
/// [`Heap::reset`] at run boundaries.
#[derive(Debug)]
pub struct Heap {
    builtins: BuiltinTypeIds,
    objects: Vec<ManagedObject>,
}

/// Number of interned singletons at the front of the arena.
const INTERNED: usize = 3;

impl Heap {
    pub fn new(builtins: BuiltinTypeIds) -> Self {
        let objects = vec![
            ManagedObject {
                type_id: builtins.null,
                payload: ObjectPayload::Null,
            },
            ManagedObject {
                type_id: builtins.boolean,
                payload: ObjectPayload::Boolean(false),
            },
            ManagedObject {
                type_id: builtins.boolean,
                payload: ObjectPayload::Boolean(true),
            },
        ];
        Self { builtins, objects }
    }

    /// Drop every object allocated since construction.
    pub fn reset(&mut self) {
        self.objects.truncate(INTERNED);
    }

    /// Number of live objects, interned singletons included.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn alloc(&mut self, object: ManagedObject) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    /// The interned null object.
    pub fn null(&self) -> ObjectId {
        ObjectId(0)
    }

    /// One of the interned boolean objects.
    pub fn boolean(&self, value: bool) -> ObjectId {
        if value {
            ObjectId(2)
        } else {
            ObjectId(1)
        }
    }

    pub fn number(&mut self, value: f64) -> ObjectId {
        self.alloc(ManagedObject {
            type_id: self.builtins.number,
            payload: ObjectPayload::Number(value),
        })
    }

    pub fn string(&mut self, value: String) -> ObjectId {
        self.alloc(ManagedObject {
            type_id: self.builtins.string,
            payload: ObjectPayload::Str(value),
        })
    }

    pub fn height_map(&mut self, slot: SlotIndex) -> ObjectId {
        self.alloc(ManagedObject {
            type_id: self.builtins.height_map,
            payload: ObjectPayload::HeightMap(slot),
        })
    }

    /// Read an object.
    ///
    /// # Panics
    ///
    /// Panics if the id was never issued by this heap - handles do not
    /// survive [`Heap::reset`], so a stale id is a runtime bug.
    pub fn get(&self, id: ObjectId) -> &ManagedObject {
        self.objects
            .get(id.index())
            .unwrap_or_else(|| panic!("invalid object id {}", id.index()))
    }

    /// Mutate an object in place (used by in-place map operations).
    ///
    /// # Panics
    ///
    /// Panics on an invalid id, and on attempts to mutate an interned
    /// singleton.
    pub fn get_mut(&mut self, id: ObjectId) -> &mut ManagedObject {
        assert!(
            id.index() >= INTERNED,
            "attempted to mutate interned object {}",
            id.index()
        );
        self.objects
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("invalid object id {}", id.index()))
    }

    /// The builtin type ids this heap tags objects with.
    pub fn builtins(&self) -> BuiltinTypeIds {
        self.builtins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtins() -> BuiltinTypeIds {
        BuiltinTypeIds {
            null: TypeId::new(0),
            boolean: TypeId::new(1),
            number: TypeId::new(2),
            string: TypeId::new(3),
            height_map: TypeId::new(4),
            args: TypeId::new(5),
        }
    }

    #[test]
    fn test_interned_singletons() {
        let heap = Heap::new(builtins());
        assert_eq!(heap.get(heap.null()).payload, ObjectPayload::Null);
        assert_eq!(
            heap.get(heap.boolean(true)).payload,
            ObjectPayload::Boolean(true)
        );
        assert_eq!(
            heap.get(heap.boolean(false)).payload,
            ObjectPayload::Boolean(false)
        );
    }

    #[test]
    fn test_reset_drops_allocations() {
        let mut heap = Heap::new(builtins());
        heap.number(42.0);
        heap.string("terrain".to_string());
        assert_eq!(heap.len(), 5);
        heap.reset();
        assert_eq!(heap.len(), 3);
    }

    #[test]
    #[should_panic(expected = "invalid object id")]
    fn test_stale_id_panics() {
        let mut heap = Heap::new(builtins());
        let id = heap.number(1.0);
        heap.reset();
        heap.get(id);
    }

    #[test]
    #[should_panic(expected = "mutate interned object")]
    fn test_mutating_interned_panics() {
        let mut heap = Heap::new(builtins());
        let null = heap.null();
        heap.get_mut(null);
    }
}
