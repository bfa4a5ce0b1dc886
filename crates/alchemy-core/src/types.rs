// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime type identity for the injection framework.
//!
//! Every registry, provider and context in Alchemy is keyed by a [`TypeKey`].
//! Rust has no inheritance, so the "is this type a subtype of that one"
//! relation is declared explicitly in a [`TypeCatalog`]: each concrete type
//! lists the capabilities it implements together with the upcast that turns
//! an `Arc<Concrete>` into an `Arc<dyn Capability>`.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

/// A stable identifier for a declared type.
///
/// Equality and hashing only consider the underlying [`TypeId`]; the name is
/// carried along for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key of `T`. Works for unsized types such as `dyn Trait`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type name without its module path or generic arguments.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// How the framework may obtain values of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeKind {
    /// A plain data/object type, built through its injection constructor.
    #[default]
    Plain,
    /// A type that lives attached to a node of the object hierarchy.
    Component,
    /// A capability-only type (typically `dyn Trait`). Never constructed.
    Abstract,
}

impl TypeKind {
    /// Returns `true` if values of this kind can be constructed directly.
    pub fn is_constructible(self) -> bool {
        !matches!(self, TypeKind::Abstract)
    }

    /// Returns `true` if values of this kind attach to hierarchy nodes.
    pub fn is_attachable(self) -> bool {
        matches!(self, TypeKind::Component)
    }
}

/// A type-erased, shared instance of some declared type.
///
/// The payload is stored as an `Arc<T>` behind `dyn Any`, which lets unsized
/// views such as `Arc<dyn Trait>` be carried just like concrete values.
#[derive(Clone)]
pub struct Instance {
    key: TypeKey,
    addr: usize,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    /// Wraps a shared value. The instance is keyed by `T`.
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        let addr = Arc::as_ptr(&value) as *const () as usize;
        Self {
            key: TypeKey::of::<T>(),
            addr,
            value: Arc::new(value),
        }
    }

    /// Wraps an owned value.
    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// The type this instance is currently viewed as.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Returns the shared value if this instance is viewed as `T`.
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Returns `true` if this instance is viewed as `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.key == TypeKey::of::<T>()
    }

    /// Returns `true` if both instances point at the same object, regardless
    /// of the type they are viewed as.
    pub fn same_object(&self, other: &Instance) -> bool {
        self.addr == other.addr
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.key.name())
            .field("addr", &format_args!("{:#x}", self.addr))
            .finish()
    }
}

type CastFn = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// Catalog entry describing one declared type.
#[derive(Clone)]
pub struct TypeInfo {
    key: TypeKey,
    kind: TypeKind,
    upcasts: Vec<(TypeKey, CastFn)>,
}

impl TypeInfo {
    /// Starts a declaration for `T`.
    pub fn declare<T: ?Sized + Send + Sync + 'static>(kind: TypeKind) -> Declaration<T> {
        Declaration {
            info: TypeInfo {
                key: TypeKey::of::<T>(),
                kind,
                upcasts: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// The declared type.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// The declared kind.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// The direct supertypes this type can be upcast to.
    pub fn supertypes(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.upcasts.iter().map(|(key, _)| *key)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("supertypes", &self.supertypes().collect::<Vec<_>>())
            .finish()
    }
}

/// Typed builder for a [`TypeInfo`].
pub struct Declaration<T: ?Sized> {
    info: TypeInfo,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Declaration<T> {
    /// Changes the declared kind.
    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.info.kind = kind;
        self
    }

    /// Declares that `T` satisfies the capability `U`, using `cast` to view
    /// an `Arc<T>` as an `Arc<U>`.
    pub fn implements<U: ?Sized + Send + Sync + 'static>(
        mut self,
        cast: impl Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    ) -> Self {
        let target = TypeKey::of::<U>();
        let erased: CastFn = Arc::new(move |instance: &Instance| {
            instance.downcast::<T>().map(|value| Instance::new(cast(value)))
        });
        self.info.upcasts.retain(|(key, _)| *key != target);
        self.info.upcasts.push((target, erased));
        self
    }

    /// Finishes the declaration.
    pub fn build(self) -> TypeInfo {
        self.info
    }
}

impl<T: ?Sized + Send + Sync + 'static> From<Declaration<T>> for TypeInfo {
    fn from(declaration: Declaration<T>) -> Self {
        declaration.build()
    }
}

/// The closed, extensible set of types known to the framework.
///
/// Cloning a catalog yields another handle to the same shared table.
#[derive(Clone, Default)]
pub struct TypeCatalog {
    types: Arc<RwLock<HashMap<TypeKey, TypeInfo>>>,
}

impl TypeCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a type, or updates an existing declaration.
    ///
    /// Re-declaring replaces the kind and merges the upcasts. Returns `true`
    /// if the type was not declared before.
    pub fn register(&self, info: impl Into<TypeInfo>) -> bool {
        let info = info.into();
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        match types.get_mut(&info.key) {
            Some(existing) => {
                existing.kind = info.kind;
                for (target, cast) in info.upcasts {
                    existing.upcasts.retain(|(key, _)| *key != target);
                    existing.upcasts.push((target, cast));
                }
                false
            }
            None => {
                log::trace!("Declared type {} ({:?})", info.key, info.kind);
                types.insert(info.key, info);
                true
            }
        }
    }

    /// Declares `T` with the given kind and no supertypes.
    pub fn declare<T: ?Sized + Send + Sync + 'static>(&self, kind: TypeKind) -> bool {
        self.register(TypeInfo::declare::<T>(kind))
    }

    /// Returns `true` if the type has been declared.
    pub fn is_declared(&self, key: TypeKey) -> bool {
        self.read().contains_key(&key)
    }

    /// Returns the declared kind of a type.
    pub fn kind_of(&self, key: TypeKey) -> Option<TypeKind> {
        self.read().get(&key).map(|info| info.kind)
    }

    /// Returns the direct supertypes of a type.
    pub fn supertypes(&self, key: TypeKey) -> Vec<TypeKey> {
        self.read()
            .get(&key)
            .map(|info| info.supertypes().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `derived` is `base` or transitively upcasts to it.
    pub fn is_subtype(&self, derived: TypeKey, base: TypeKey) -> bool {
        derived == base || self.cast_path(derived, base).is_some()
    }

    /// Views `instance` as `target`, following declared upcasts.
    pub fn cast(&self, instance: &Instance, target: TypeKey) -> Option<Instance> {
        if instance.key() == target {
            return Some(instance.clone());
        }
        let path = self.cast_path(instance.key(), target)?;
        path.iter()
            .try_fold(instance.clone(), |current, cast| cast(&current))
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if nothing has been declared.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TypeKey, TypeInfo>> {
        self.types.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Breadth-first search for the shortest chain of upcasts.
    fn cast_path(&self, from: TypeKey, to: TypeKey) -> Option<Vec<CastFn>> {
        let types = self.read();
        let mut visited: HashSet<TypeKey> = HashSet::from([from]);
        let mut previous: HashMap<TypeKey, (TypeKey, CastFn)> = HashMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = Vec::new();
                let mut cursor = to;
                while let Some((parent, cast)) = previous.get(&cursor) {
                    path.push(cast.clone());
                    cursor = *parent;
                }
                path.reverse();
                return Some(path);
            }
            let Some(info) = types.get(&current) else {
                continue;
            };
            for (target, cast) in &info.upcasts {
                if visited.insert(*target) {
                    previous.insert(*target, (current, cast.clone()));
                    queue.push_back(*target);
                }
            }
        }
        None
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("types", &self.len())
            .finish()
    }
}
