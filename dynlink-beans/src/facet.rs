//! Per-class member tables.
//!
//! A [`ClassFacet`] is the flattened view of a host class: its own members
//! plus everything inherited along the superclass chain. Facets are built
//! lazily, once per class, and shared. An inherited member that the class
//! does not redeclare is the same `Arc` in the subclass facet as in the
//! superclass facet, so member identity survives subtype substitution.

use std::fmt;
use std::sync::Arc;

use dynlink::{DynamicMethod, MethodHandle, Type, Value, Visibility};
use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::class::{field_reader, field_writer, ClassRegistry, HostClass};

/// The kinds of named members a call site can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Getter,
    Setter,
    Method,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemberKind::Getter => "getter",
            MemberKind::Setter => "setter",
            MemberKind::Method => "method",
        })
    }
}

/// A resolved member and the class that declared it.
#[derive(Debug)]
pub struct Member {
    declaring: Type,
    method: DynamicMethod,
    scope: Option<Arc<str>>,
}

impl Member {
    pub fn declaring(&self) -> &Type {
        &self.declaring
    }

    pub fn method(&self) -> &DynamicMethod {
        &self.method
    }

    /// Unrestricted members are visible everywhere; restricted ones only to
    /// call sites of their own scope.
    pub fn is_visible_to(&self, visibility: &Visibility) -> bool {
        match (&self.scope, visibility) {
            (None, _) => true,
            (Some(scope), Visibility::Scoped(site)) => scope == site,
            (Some(_), Visibility::Public) => false,
        }
    }

    /// Read the property through this getter.
    pub fn get(&self, receiver: &Value) -> dynlink::InvokeResult<Value> {
        match self.method.candidates().first() {
            Some(getter) => getter.invoke(std::slice::from_ref(receiver)),
            None => Ok(Value::Null),
        }
    }
}

type MemberTable = IndexMap<Arc<str>, Arc<Member>>;

/// Flattened members of one class.
#[derive(Debug, Default)]
pub struct ClassFacet {
    getters: MemberTable,
    setters: MemberTable,
    methods: MemberTable,
}

impl ClassFacet {
    pub fn member(&self, kind: MemberKind, name: &str) -> Option<&Arc<Member>> {
        self.table(kind).get(name)
    }

    pub fn getter(&self, name: &str) -> Option<&Arc<Member>> {
        self.getters.get(name)
    }

    /// Names of the readable properties, superclass members first.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.getters.keys().map(|name| &**name)
    }

    fn table(&self, kind: MemberKind) -> &MemberTable {
        match kind {
            MemberKind::Getter => &self.getters,
            MemberKind::Setter => &self.setters,
            MemberKind::Method => &self.methods,
        }
    }

    /// Derive a subclass facet: start from the parent's members and overlay
    /// the members `class` declares.
    fn derive(parent: Option<&ClassFacet>, class: &HostClass) -> Self {
        let mut facet = match parent {
            Some(parent) => ClassFacet {
                getters: parent.getters.clone(),
                setters: parent.setters.clone(),
                methods: parent.methods.clone(),
            },
            None => ClassFacet::default(),
        };

        // Fields first, so accessors of the same name override them.
        for (name, ty) in class.fields() {
            facet.declare(MemberKind::Getter, class, name, vec![field_reader(class.ty(), name, ty)], false);
            facet.declare(MemberKind::Setter, class, name, vec![field_writer(class.ty(), name, ty)], false);
        }
        for (name, getter) in class.getters() {
            facet.declare(MemberKind::Getter, class, name, vec![getter.clone()], false);
        }
        for (name, setters) in class.setters() {
            facet.declare(MemberKind::Setter, class, name, setters.clone(), false);
        }
        for (name, methods) in class.methods() {
            facet.declare(MemberKind::Method, class, name, methods.clone(), true);
        }
        facet
    }

    /// Declare `candidates` under `name`. Overloadable members merge with
    /// the inherited candidates, replacing those with identical parameters.
    fn declare(&mut self, kind: MemberKind, class: &HostClass, name: &Arc<str>, candidates: Vec<MethodHandle>, overloadable: bool) {
        let table = match kind {
            MemberKind::Getter => &mut self.getters,
            MemberKind::Setter => &mut self.setters,
            MemberKind::Method => &mut self.methods,
        };
        let mut all = match table.get(name) {
            Some(inherited) if overloadable => inherited.method.candidates().to_vec(),
            _ => Vec::new(),
        };
        all.extend(candidates);
        if let Some(method) = DynamicMethod::new(name.clone(), all) {
            let member = Arc::new(Member {
                declaring: class.ty().clone(),
                method,
                scope: class.scope_of(name).cloned(),
            });
            table.insert(name.clone(), member);
        }
    }
}

/// Lazily built facets, shared by every binding of a linker.
pub struct FacetCache {
    registry: ClassRegistry,
    facets: RwLock<FxHashMap<Type, Arc<ClassFacet>>>,
}

impl FacetCache {
    pub fn new(registry: ClassRegistry) -> Self {
        Self {
            registry,
            facets: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Check if `ty` or one of its superclasses is registered.
    pub fn knows(&self, ty: &Type) -> bool {
        let mut current = Some(ty);
        while let Some(ty) = current {
            let Some(def) = ty.as_class() else {
                return false;
            };
            if self.registry.get(def.name()).is_some() {
                return true;
            }
            current = def.superclass();
        }
        false
    }

    /// The facet of class `ty`, or `None` for non-class types and classes
    /// with no registered ancestor.
    pub fn facet(&self, ty: &Type) -> Option<Arc<ClassFacet>> {
        if !self.knows(ty) {
            return None;
        }
        self.facet_of(ty)
    }

    fn facet_of(&self, ty: &Type) -> Option<Arc<ClassFacet>> {
        let def = ty.as_class()?;
        if let Some(facet) = self.facets.read().get(ty) {
            return Some(facet.clone());
        }
        let parent = def.superclass().and_then(|sup| self.facet_of(sup));
        let facet = match self.registry.get(def.name()) {
            Some(class) => Arc::new(ClassFacet::derive(parent.as_deref(), class)),
            None => parent.unwrap_or_default(),
        };
        trace!(class = def.name(), properties = facet.getters.len(), methods = facet.methods.len(), "built class facet");
        Some(self.facets.write().entry(ty.clone()).or_insert(facet).clone())
    }
}

impl fmt::Debug for FacetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetCache")
            .field("classes", &self.registry.len())
            .field("facets", &self.facets.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynlink::{ClassDef, Signature};
    use pretty_assertions::assert_eq;

    fn base() -> HostClass {
        HostClass::new(ClassDef::new("Base")).property("foo", Type::object())
    }

    fn derived(base: &HostClass) -> HostClass {
        HostClass::new(ClassDef::new("Derived").extends(base.ty().clone())).property("bar", Type::object())
    }

    #[test]
    fn test_inherited_members_keep_identity() {
        let base = base();
        let derived = derived(&base);
        let cache = FacetCache::new(ClassRegistry::new().with_class(base.clone()).with_class(derived.clone()));

        let base_facet = cache.facet(base.ty()).unwrap();
        let derived_facet = cache.facet(derived.ty()).unwrap();
        assert!(Arc::ptr_eq(base_facet.getter("foo").unwrap(), derived_facet.getter("foo").unwrap()));
        assert!(base_facet.getter("bar").is_none());
        assert_eq!(derived_facet.property_names().collect::<Vec<_>>(), vec!["foo", "bar"]);
    }

    #[test]
    fn test_redeclared_field_is_a_new_member() {
        let parent = HostClass::new(ClassDef::new("P")).field("foo", Type::string());
        let child = HostClass::new(ClassDef::new("C").extends(parent.ty().clone())).field("foo", Type::string());
        let cache = FacetCache::new(ClassRegistry::new().with_class(parent.clone()).with_class(child.clone()));

        let p = cache.facet(parent.ty()).unwrap();
        let c = cache.facet(child.ty()).unwrap();
        assert!(!Arc::ptr_eq(p.getter("foo").unwrap(), c.getter("foo").unwrap()));
        assert_eq!(c.getter("foo").unwrap().declaring(), child.ty());
    }

    #[test]
    fn test_unregistered_subclass_inherits_facet() {
        let base = base();
        let cache = FacetCache::new(ClassRegistry::new().with_class(base.clone()));
        let anonymous = Type::class(ClassDef::new("Anonymous").extends(base.ty().clone()));
        let facet = cache.facet(&anonymous).unwrap();
        assert!(Arc::ptr_eq(facet.getter("foo").unwrap(), cache.facet(base.ty()).unwrap().getter("foo").unwrap()));
        assert!(cache.facet(&Type::string()).is_none());
    }

    #[test]
    fn test_getter_overrides_field() {
        let ty = Type::class(ClassDef::new("G"));
        let constant = MethodHandle::new("foo", Signature::new(Type::object(), vec![ty]), |_| Ok(Value::str("getter")));
        let class = HostClass::new(ClassDef::new("G")).field("foo", Type::object()).getter("foo", constant);
        let cache = FacetCache::new(ClassRegistry::new().with_class(class.clone()));
        let facet = cache.facet(class.ty()).unwrap();
        let value = facet.getter("foo").unwrap().get(&class.instantiate()).unwrap();
        assert_eq!(value, Value::str("getter"));
    }

    #[test]
    fn test_overriding_method_replaces_inherited_candidate() {
        let parent_ty = Type::class(ClassDef::new("Shape"));
        let area = |owner: &Type, result: i32| {
            MethodHandle::new("area", Signature::new(Type::int(), vec![owner.clone()]), move |_| Ok(Value::Int(result)))
        };
        let scale = MethodHandle::new(
            "area",
            Signature::new(Type::int(), vec![parent_ty.clone(), Type::int()]),
            |args| Ok(Value::Int(args[1].as_int().unwrap_or_default())),
        );
        let parent = HostClass::new(ClassDef::new("Shape")).method(area(&parent_ty, 1)).method(scale);
        let child_def = ClassDef::new("Square").extends(parent.ty().clone());
        let child_ty = Type::class(child_def.clone());
        let child = HostClass::new(child_def).method(area(&child_ty, 4));
        let cache = FacetCache::new(ClassRegistry::new().with_class(parent).with_class(child.clone()));

        let method = cache.facet(child.ty()).unwrap().member(MemberKind::Method, "area").unwrap().clone();
        assert_eq!(method.method().candidates().len(), 2);
        assert_eq!(method.declaring(), child.ty());
    }

    #[test]
    fn test_scoped_members_are_hidden_from_other_scopes() {
        let class = HostClass::new(ClassDef::new("Vault"))
            .property("secret", Type::string())
            .property("label", Type::string())
            .scoped("secret", "vault");
        let cache = FacetCache::new(ClassRegistry::new().with_class(class.clone()));
        let facet = cache.facet(class.ty()).unwrap();

        let secret = facet.getter("secret").unwrap();
        assert!(!secret.is_visible_to(&Visibility::Public));
        assert!(!secret.is_visible_to(&Visibility::Scoped("other".into())));
        assert!(secret.is_visible_to(&Visibility::Scoped("vault".into())));
        assert!(facet.member(MemberKind::Setter, "secret").unwrap().is_visible_to(&Visibility::Scoped("vault".into())));
        assert!(facet.getter("label").unwrap().is_visible_to(&Visibility::Public));
    }
}
