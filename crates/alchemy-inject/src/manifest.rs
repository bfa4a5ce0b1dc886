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

//! Injection manifests.
//!
//! A manifest is the explicit, load-time declaration of how a type takes
//! part in injection: which constructors can build it, which fields and
//! properties receive dependencies, and which methods are invoked with
//! resolved arguments. Each injectable type describes itself once through
//! [`Injectable::manifest`]; the injector only ever sees the type-erased
//! [`TypeManifest`].

use crate::error::{InjectionError, Result};
use alchemy_core::types::Declaration;
use alchemy_core::{Instance, TypeInfo, TypeKey, TypeKind};
use std::fmt;
use std::sync::Arc;

/// Marker on an injected member saying whether it must resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Inject {
    /// Failing to resolve the member fails the whole injection pass.
    #[default]
    Required,
    /// A failed resolution leaves the member empty.
    Optional,
}

impl Inject {
    /// Returns `true` for [`Inject::Required`].
    pub fn is_required(self) -> bool {
        matches!(self, Inject::Required)
    }
}

type DefaultFn = Arc<dyn Fn() -> Instance + Send + Sync>;

/// A constructor or method parameter.
#[derive(Clone)]
pub struct Param {
    name: &'static str,
    key: TypeKey,
    optional: bool,
    default: Option<DefaultFn>,
}

impl Param {
    /// A parameter that must resolve.
    pub fn required<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            key: TypeKey::of::<T>(),
            optional: false,
            default: None,
        }
    }

    /// A parameter that is left empty when it cannot be resolved.
    pub fn optional<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            optional: true,
            ..Self::required::<T>(name)
        }
    }

    /// A parameter that falls back to `default` when it cannot be resolved.
    pub fn with_default<T: ?Sized + Send + Sync + 'static>(
        name: &'static str,
        default: impl Fn() -> Arc<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            optional: true,
            default: Some(Arc::new(move || Instance::new(default()))),
            ..Self::required::<T>(name)
        }
    }

    /// The parameter name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The parameter type.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Returns `true` if the parameter may stay unresolved.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub(crate) fn default_value(&self) -> Option<Instance> {
        self.default.as_ref().map(|make| make())
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("type", &self.key.name())
            .field("optional", &self.optional)
            .finish()
    }
}

/// Resolved arguments handed to constructors and injected methods.
///
/// Each slot is already viewed as the parameter's declared type.
#[derive(Debug, Clone)]
pub struct Args {
    target: TypeKey,
    params: Vec<Param>,
    values: Vec<Option<Instance>>,
}

impl Args {
    pub(crate) fn new(target: TypeKey, params: Vec<Param>, values: Vec<Option<Instance>>) -> Self {
        Self {
            target,
            params,
            values,
        }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The argument at `index`, if it resolved and is a `T`.
    pub fn get<T: ?Sized + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.values.get(index)?.as_ref()?.downcast::<T>()
    }

    /// The argument at `index`, failing if it is missing or not a `T`.
    pub fn require<T: ?Sized + 'static>(&self, index: usize) -> Result<Arc<T>> {
        let expected = TypeKey::of::<T>();
        match self.values.get(index).and_then(Option::as_ref) {
            Some(value) => value.downcast::<T>().ok_or(InjectionError::TypeMismatch {
                expected,
                found: value.key(),
            }),
            None => {
                let param = self.params.get(index);
                Err(InjectionError::ParameterUnresolved {
                    target: self.target,
                    member: "<args>".to_string(),
                    param: param.map_or_else(|| index.to_string(), |p| p.name.to_string()),
                    dependency: param.map_or(expected, |p| p.key),
                    source: Box::new(InjectionError::DependencyUnresolved(expected)),
                })
            }
        }
    }
}

pub(crate) type BuildFn = Arc<dyn Fn(&Args) -> anyhow::Result<Instance> + Send + Sync>;
pub(crate) type ApplyFn = Arc<dyn Fn(&Instance, &Args) -> Result<()> + Send + Sync>;

/// A constructor usable by the injector.
#[derive(Clone)]
pub struct ConstructorSpec {
    pub(crate) marked: bool,
    pub(crate) params: Vec<Param>,
    pub(crate) build: BuildFn,
}

impl ConstructorSpec {
    /// Returns `true` if this constructor is explicitly marked for injection.
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// The constructor parameters.
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// What sort of member receives an injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// A plain field.
    Field,
    /// A property, possibly without a setter.
    Property {
        /// Whether the property can be assigned.
        writable: bool,
    },
    /// A method invoked with resolved arguments.
    Method,
}

/// One injected member of a type.
#[derive(Clone)]
pub struct MemberSpec {
    pub(crate) name: &'static str,
    pub(crate) kind: MemberKind,
    pub(crate) inject: Inject,
    pub(crate) params: Vec<Param>,
    pub(crate) apply: ApplyFn,
}

impl MemberSpec {
    /// The member name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The member kind.
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// The member's injection marker.
    pub fn inject(&self) -> Inject {
        self.inject
    }

    /// The member's dependencies. Fields and properties have exactly one.
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// The type-erased manifest of one injectable type.
#[derive(Clone)]
pub struct TypeManifest {
    pub(crate) key: TypeKey,
    pub(crate) kind: TypeKind,
    pub(crate) constructors: Vec<ConstructorSpec>,
    pub(crate) members: Vec<MemberSpec>,
}

impl TypeManifest {
    /// The described type.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// The described type's kind.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// All declared constructors.
    pub fn constructors(&self) -> &[ConstructorSpec] {
        &self.constructors
    }

    /// All injected members, in declaration order.
    pub fn members(&self) -> &[MemberSpec] {
        &self.members
    }

    /// Selects the injection constructor.
    ///
    /// A single marked constructor wins. Without marks, the sole constructor
    /// is used. Anything else is a configuration error.
    pub fn injection_constructor(&self) -> Result<&ConstructorSpec> {
        let mut marked = self.constructors.iter().filter(|c| c.marked);
        match (marked.next(), marked.next()) {
            (Some(constructor), None) => Ok(constructor),
            (Some(_), Some(_)) => Err(InjectionError::AmbiguousInjectionConstructor(self.key)),
            (None, _) => match self.constructors.as_slice() {
                [only] => Ok(only),
                [] => Err(InjectionError::NoUsableConstructor(self.key)),
                _ => Err(InjectionError::AmbiguousInjectionConstructor(self.key)),
            },
        }
    }
}

impl fmt::Debug for TypeManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeManifest")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("constructors", &self.constructors.len())
            .field(
                "members",
                &self.members.iter().map(|m| m.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Typed builder describing how `T` is built and injected.
///
/// ```rust
/// use std::sync::Arc;
/// use alchemy_inject::{Inject, Manifest, Param, Slot};
///
/// struct Clock;
/// struct Scheduler {
///     clock: Arc<Clock>,
///     label: Slot<String>,
/// }
///
/// let manifest = Manifest::<Scheduler>::new()
///     .constructor(vec![Param::required::<Clock>("clock")], |args| {
///         Ok(Scheduler {
///             clock: args.require::<Clock>(0)?,
///             label: Slot::new(),
///         })
///     })
///     .field::<String>("label", Inject::Optional, |s, value| s.label.set(value));
/// # let _ = manifest;
/// ```
pub struct Manifest<T: Send + Sync + 'static> {
    declaration: Declaration<T>,
    kind: TypeKind,
    constructors: Vec<ConstructorSpec>,
    members: Vec<MemberSpec>,
}

impl<T: Send + Sync + 'static> Manifest<T> {
    /// A manifest for a plain, constructor-built type.
    pub fn new() -> Self {
        Self::with_kind(TypeKind::Plain)
    }

    /// A manifest for a type attached to hierarchy nodes.
    pub fn component() -> Self {
        Self::with_kind(TypeKind::Component)
    }

    fn with_kind(kind: TypeKind) -> Self {
        Self {
            declaration: TypeInfo::declare::<T>(kind),
            kind,
            constructors: Vec::new(),
            members: Vec::new(),
        }
    }

    fn push_constructor(
        mut self,
        marked: bool,
        params: Vec<Param>,
        build: impl Fn(&Args) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.constructors.push(ConstructorSpec {
            marked,
            params,
            build: Arc::new(move |args| build(args).map(Instance::from_value)),
        });
        self
    }

    /// Adds an unmarked constructor.
    pub fn constructor(
        self,
        params: Vec<Param>,
        build: impl Fn(&Args) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.push_constructor(false, params, build)
    }

    /// Adds a constructor explicitly marked for injection.
    pub fn inject_constructor(
        self,
        params: Vec<Param>,
        build: impl Fn(&Args) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.push_constructor(true, params, build)
    }

    fn push_member<F: ?Sized + Send + Sync + 'static>(
        mut self,
        name: &'static str,
        kind: MemberKind,
        inject: Inject,
        assign: impl Fn(&T, Option<Arc<F>>) + Send + Sync + 'static,
    ) -> Self {
        let param = match inject {
            Inject::Required => Param::required::<F>(name),
            Inject::Optional => Param::optional::<F>(name),
        };
        let apply: ApplyFn = Arc::new(move |target: &Instance, args: &Args| {
            let target = downcast_target::<T>(target)?;
            assign(&target, args.get::<F>(0));
            Ok(())
        });
        self.members.push(MemberSpec {
            name,
            kind,
            inject,
            params: vec![param],
            apply,
        });
        self
    }

    /// Adds an injected field of type `F`.
    ///
    /// `assign` receives `None` when an optional field could not be resolved.
    pub fn field<F: ?Sized + Send + Sync + 'static>(
        self,
        name: &'static str,
        inject: Inject,
        assign: impl Fn(&T, Option<Arc<F>>) + Send + Sync + 'static,
    ) -> Self {
        self.push_member(name, MemberKind::Field, inject, assign)
    }

    /// Adds an injected property of type `F` with a setter.
    pub fn property<F: ?Sized + Send + Sync + 'static>(
        self,
        name: &'static str,
        inject: Inject,
        set: impl Fn(&T, Option<Arc<F>>) + Send + Sync + 'static,
    ) -> Self {
        self.push_member(name, MemberKind::Property { writable: true }, inject, set)
    }

    /// Marks a property of type `F` that has no setter.
    ///
    /// Injecting a type with such a member always fails.
    pub fn readonly_property<F: ?Sized + Send + Sync + 'static>(
        self,
        name: &'static str,
        inject: Inject,
    ) -> Self {
        self.push_member::<F>(
            name,
            MemberKind::Property { writable: false },
            inject,
            |_, _| {},
        )
    }

    /// Adds a method invoked with resolved arguments.
    ///
    /// The method runs only if every required parameter resolved.
    pub fn method(
        mut self,
        name: &'static str,
        inject: Inject,
        params: Vec<Param>,
        invoke: impl Fn(&T, &Args) + Send + Sync + 'static,
    ) -> Self {
        let apply: ApplyFn = Arc::new(move |target: &Instance, args: &Args| {
            let target = downcast_target::<T>(target)?;
            invoke(&target, args);
            Ok(())
        });
        self.members.push(MemberSpec {
            name,
            kind: MemberKind::Method,
            inject,
            params,
            apply,
        });
        self
    }

    /// Declares that `T` satisfies the capability `U`.
    pub fn implements<U: ?Sized + Send + Sync + 'static>(
        mut self,
        cast: impl Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    ) -> Self {
        self.declaration = self.declaration.implements(cast);
        self
    }

    /// Splits the manifest into its catalog entry and erased manifest.
    pub fn into_parts(self) -> (TypeInfo, TypeManifest) {
        let info = self.declaration.kind(self.kind).build();
        let manifest = TypeManifest {
            key: TypeKey::of::<T>(),
            kind: self.kind,
            constructors: self.constructors,
            members: self.members,
        };
        (info, manifest)
    }
}

impl<T: Default + Send + Sync + 'static> Manifest<T> {
    /// Adds a parameterless constructor built from `T::default()`.
    pub fn default_constructor(self) -> Self {
        self.constructor(Vec::new(), |_| Ok(T::default()))
    }
}

impl<T: Send + Sync + 'static> Default for Manifest<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast_target<T: Send + Sync + 'static>(target: &Instance) -> Result<Arc<T>> {
    target
        .downcast::<T>()
        .ok_or_else(|| InjectionError::TypeMismatch {
            expected: TypeKey::of::<T>(),
            found: target.key(),
        })
}

/// A type that describes its own injection manifest.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Builds the manifest. Called once when the type is registered.
    fn manifest() -> Manifest<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Engine;

    #[derive(Default)]
    struct Car {
        label: crate::Slot<String>,
    }

    fn noop(_: &Args) -> anyhow::Result<Car> {
        Ok(Car::default())
    }

    #[test]
    fn test_single_unmarked_constructor_is_selected() {
        let (_, manifest) = Manifest::<Car>::new().default_constructor().into_parts();
        assert!(manifest.injection_constructor().is_ok());
    }

    #[test]
    fn test_marked_constructor_wins_over_unmarked() {
        let (_, manifest) = Manifest::<Car>::new()
            .constructor(vec![], noop)
            .inject_constructor(vec![Param::required::<Engine>("engine")], noop)
            .into_parts();
        let selected = manifest.injection_constructor().unwrap();
        assert!(selected.is_marked());
        assert_eq!(selected.params().len(), 1);
    }

    #[test]
    fn test_several_unmarked_constructors_are_ambiguous() {
        let (_, manifest) = Manifest::<Car>::new()
            .constructor(vec![], noop)
            .constructor(vec![Param::required::<Engine>("engine")], noop)
            .into_parts();
        assert!(matches!(
            manifest.injection_constructor(),
            Err(InjectionError::AmbiguousInjectionConstructor(_))
        ));
    }

    #[test]
    fn test_several_marked_constructors_are_ambiguous() {
        let (_, manifest) = Manifest::<Car>::new()
            .inject_constructor(vec![], noop)
            .inject_constructor(vec![], noop)
            .into_parts();
        assert!(matches!(
            manifest.injection_constructor(),
            Err(InjectionError::AmbiguousInjectionConstructor(_))
        ));
    }

    #[test]
    fn test_no_constructor_is_unusable() {
        let (_, manifest) = Manifest::<Car>::new().into_parts();
        assert!(matches!(
            manifest.injection_constructor(),
            Err(InjectionError::NoUsableConstructor(_))
        ));
    }

    #[test]
    fn test_field_assignment_through_erased_member() {
        let (_, manifest) = Manifest::<Car>::new()
            .field::<String>("label", Inject::Optional, |car, value| car.label.set(value))
            .into_parts();
        let car = Arc::new(Car::default());
        let target = Instance::new(car.clone());
        let args = Args::new(
            TypeKey::of::<Car>(),
            manifest.members()[0].params().to_vec(),
            vec![Some(Instance::from_value("red".to_string()))],
        );
        (manifest.members()[0].apply)(&target, &args).unwrap();
        assert_eq!(car.label.get().as_deref().map(String::as_str), Some("red"));
    }

    #[test]
    fn test_args_require_reports_missing_parameter() {
        let args = Args::new(
            TypeKey::of::<Car>(),
            vec![Param::required::<Engine>("engine")],
            vec![None],
        );
        assert!(args.get::<Engine>(0).is_none());
        match args.require::<Engine>(0) {
            Err(InjectionError::ParameterUnresolved { param, .. }) => assert_eq!(param, "engine"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
