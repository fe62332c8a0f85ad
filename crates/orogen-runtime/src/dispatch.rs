//! Type registry and native function dispatch.
//!
//! Script-visible types are registered once at generator startup and are
//! immutable afterwards; there is no dynamic type creation from script. Each
//! type carries an ordered table of native function definitions keyed by
//! `(name, kind)`.
//!
//! # Registration Rules
//!
//! - Registering two definitions under one `(type, name, kind)` key is a
//!   configuration error and panics at registration time, never at call
//!   time.
//! - Resolution failures at call time (`NoSuchMethod`) are script errors
//!   attributed to the calling instruction.
//! - An instance-kind definition invoked without a receiver, or a
//!   static-kind one invoked with a receiver, is a dispatch bug in the VM -
//!   asserted before the native body runs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use orogen_foundation::CodeLocation;

use crate::context::RunContext;
use crate::error::{ScriptError, ScriptErrorKind, ScriptResult};
use crate::heap::ObjectId;

/// Index of a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a native method binds a receiver object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// Called on the type itself; receives no instance.
    Static,
    /// Called on an instance; the receiver is always present.
    Instance,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodKind::Static => write!(f, "static"),
            MethodKind::Instance => write!(f, "instance"),
        }
    }
}

/// Signature of a native function body.
///
/// The call's source location is threaded through so any error the body
/// raises can be attributed to a script line and column.
pub type NativeFn = fn(
    &mut RunContext,
    CodeLocation,
    Option<ObjectId>,
    &[ObjectId],
) -> ScriptResult<ObjectId>;

/// One registered native function.
#[derive(Clone)]
pub struct NativeFunctionDefinition {
    pub name: &'static str,
    pub kind: MethodKind,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunctionDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A script-visible type: a name and its native method table.
#[derive(Debug)]
pub struct TypeDefinition {
    name: &'static str,
    methods: IndexMap<(&'static str, MethodKind), NativeFunctionDefinition>,
}

impl TypeDefinition {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            methods: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add a native function to this type.
    ///
    /// # Panics
    ///
    /// Panics if a definition already exists under the same `(name, kind)`
    /// key. Duplicate registration is a startup configuration error.
    pub fn add_method(&mut self, def: NativeFunctionDefinition) {
        let key = (def.name, def.kind);
        let previous = self.methods.insert(key, def);
        assert!(
            previous.is_none(),
            "duplicate native registration: {}.{} ({})",
            self.name,
            key.0,
            key.1
        );
    }

    /// Look up a method by name and kind.
    pub fn method(&self, name: &str, kind: MethodKind) -> Option<&NativeFunctionDefinition> {
        self.methods
            .values()
            .find(|def| def.name == name && def.kind == kind)
    }
}

/// All registered types, looked up by id or name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDefinition>,
    by_name: IndexMap<&'static str, TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type and return its id.
    ///
    /// # Panics
    ///
    /// Panics if a type with the same name is already registered.
    pub fn register(&mut self, definition: TypeDefinition) -> TypeId {
        let id = TypeId::new(self.types.len() as u32);
        let previous = self.by_name.insert(definition.name, id);
        assert!(
            previous.is_none(),
            "duplicate type registration: {}",
            definition.name
        );
        self.types.push(definition);
        id
    }

    /// Fetch a type definition.
    ///
    /// # Panics
    ///
    /// Panics on an id this registry never issued.
    pub fn get(&self, id: TypeId) -> &TypeDefinition {
        self.types
            .get(id.index())
            .unwrap_or_else(|| panic!("invalid type id {}", id.index()))
    }

    /// Look a type up by name.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Resolve a method call to exactly one definition, or fail with a
    /// script-level `NoSuchMethod` error attributed to `location`.
    pub fn resolve(
        &self,
        type_id: TypeId,
        method: &str,
        kind: MethodKind,
        location: CodeLocation,
    ) -> ScriptResult<&NativeFunctionDefinition> {
        let definition = self.get(type_id);
        definition.method(method, kind).ok_or_else(|| {
            ScriptError::new(
                ScriptErrorKind::NoSuchMethod {
                    type_name: definition.name.to_string(),
                    method: method.to_string(),
                    kind,
                },
                location,
            )
        })
    }
}

/// Invoke a resolved native function.
///
/// # Panics
///
/// Panics if the receiver's presence does not match the definition's kind.
/// That mismatch means the VM dispatched incorrectly - a runtime bug, never
/// a recoverable script condition - and is checked before the body runs.
pub fn invoke(
    def: &NativeFunctionDefinition,
    ctx: &mut RunContext,
    location: CodeLocation,
    instance: Option<ObjectId>,
    args: &[ObjectId],
) -> ScriptResult<ObjectId> {
    match def.kind {
        MethodKind::Instance => assert!(
            instance.is_some(),
            "instance method {} invoked without a receiver",
            def.name
        ),
        MethodKind::Static => assert!(
            instance.is_none(),
            "static method {} invoked with a receiver",
            def.name
        ),
    }
    (def.func)(ctx, location, instance, args)
}
