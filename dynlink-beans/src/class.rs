//! Host class descriptions.
//!
//! A [`HostClass`] lists the members a host class exposes to dynamic call
//! sites. Members are plain [`MethodHandle`]s taking the receiver as their
//! first parameter. Classes are collected in a [`ClassRegistry`] and handed
//! to the [`BeansLinker`](crate::BeansLinker).

use std::sync::Arc;

use dynlink::{ClassDef, InvokeError, MethodHandle, Signature, Type, Value};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Members declared by one host class, in declaration order.
#[derive(Debug, Clone)]
pub struct HostClass {
    ty: Type,
    fields: IndexMap<Arc<str>, Type>,
    getters: IndexMap<Arc<str>, MethodHandle>,
    setters: IndexMap<Arc<str>, Vec<MethodHandle>>,
    methods: IndexMap<Arc<str>, Vec<MethodHandle>>,
    scopes: FxHashMap<Arc<str>, Arc<str>>,
}

impl HostClass {
    pub fn new(def: ClassDef) -> Self {
        Self {
            ty: Type::class(def),
            fields: IndexMap::new(),
            getters: IndexMap::new(),
            setters: IndexMap::new(),
            methods: IndexMap::new(),
            scopes: FxHashMap::default(),
        }
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn name(&self) -> &str {
        self.ty.as_class().map_or("", ClassDef::name)
    }

    /// Create an instance with all fields unset.
    pub fn instantiate(&self) -> Value {
        Value::object(self.ty.clone())
    }

    /// Declare a public field. Fields are readable and writable by name, but
    /// a property accessor of the same name takes precedence.
    pub fn field(mut self, name: &str, ty: Type) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    /// Declare a property stored in the field of the same name, with a
    /// getter and a setter of type `ty`.
    pub fn property(self, name: &str, ty: Type) -> Self {
        let getter = field_reader(&self.ty, name, &ty);
        let setter = field_writer(&self.ty, name, &ty);
        self.getter(name, getter).setter(name, setter)
    }

    /// Declare a property getter of signature `(Self)T`.
    pub fn getter(mut self, name: &str, handle: MethodHandle) -> Self {
        self.getters.insert(name.into(), handle);
        self
    }

    /// Declare a property setter of signature `(Self, T)void`. A property
    /// may have several setters of different types.
    pub fn setter(mut self, name: &str, handle: MethodHandle) -> Self {
        self.setters.entry(name.into()).or_default().push(handle);
        self
    }

    /// Declare a method. The handle's name is the method name; handles with
    /// the same name overload each other.
    pub fn method(mut self, handle: MethodHandle) -> Self {
        self.methods.entry(handle.name().into()).or_default().push(handle);
        self
    }

    /// Restrict every member named `name` to call sites in `scope`.
    pub fn scoped(mut self, name: &str, scope: &str) -> Self {
        self.scopes.insert(name.into(), scope.into());
        self
    }

    pub(crate) fn scope_of(&self, name: &str) -> Option<&Arc<str>> {
        self.scopes.get(name)
    }

    pub(crate) fn fields(&self) -> impl Iterator<Item = (&Arc<str>, &Type)> {
        self.fields.iter()
    }

    pub(crate) fn getters(&self) -> impl Iterator<Item = (&Arc<str>, &MethodHandle)> {
        self.getters.iter()
    }

    pub(crate) fn setters(&self) -> impl Iterator<Item = (&Arc<str>, &Vec<MethodHandle>)> {
        self.setters.iter()
    }

    pub(crate) fn methods(&self) -> impl Iterator<Item = (&Arc<str>, &Vec<MethodHandle>)> {
        self.methods.iter()
    }
}

fn host_object<'a>(receiver: &'a Value, class: &Type) -> Result<&'a dynlink::HostObject, InvokeError> {
    match receiver {
        Value::Object(obj) => Ok(obj),
        other => Err(InvokeError::ClassCast {
            from: other.runtime_type(),
            to: class.clone(),
        }),
    }
}

/// A getter reading the field `name` of the receiver.
pub(crate) fn field_reader(class: &Type, name: &str, ty: &Type) -> MethodHandle {
    let field = name.to_string();
    let owner = class.clone();
    MethodHandle::new(
        format!("get {name}"),
        Signature::new(ty.clone(), vec![class.clone()]),
        move |args| Ok(host_object(&args[0], &owner)?.field(&field)),
    )
}

/// A setter writing the field `name` of the receiver.
pub(crate) fn field_writer(class: &Type, name: &str, ty: &Type) -> MethodHandle {
    let field = name.to_string();
    let owner = class.clone();
    MethodHandle::new(
        format!("set {name}"),
        Signature::new(Type::void(), vec![class.clone(), ty.clone()]),
        move |args| {
            host_object(&args[0], &owner)?.set_field(field.clone(), args[1].clone());
            Ok(Value::Null)
        },
    )
}

/// Host classes known to a linker, by class name.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: FxHashMap<String, Arc<HostClass>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, replacing any earlier class of the same name.
    pub fn register(&mut self, class: HostClass) -> &mut Self {
        self.classes.insert(class.name().to_string(), Arc::new(class));
        self
    }

    pub fn with_class(mut self, class: HostClass) -> Self {
        self.register(class);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<HostClass>> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_property_accessors_use_field_storage() {
        let class = HostClass::new(ClassDef::new("Bean")).property("color", Type::string());
        let bean = class.instantiate();
        let (_, getter) = class.getters().next().unwrap();
        let (_, setters) = class.setters().next().unwrap();

        assert_eq!(getter.invoke(&[bean.clone()]).unwrap(), Value::Null);
        setters[0].invoke(&[bean.clone(), Value::str("red")]).unwrap();
        assert_eq!(getter.invoke(&[bean]).unwrap(), Value::str("red"));
    }

    #[test]
    fn test_field_reader_rejects_non_objects() {
        let class = Type::class(ClassDef::new("Bean"));
        let reader = field_reader(&class, "x", &Type::object());
        let err = reader.invoke(&[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, InvokeError::ClassCast { .. }));
    }

    #[test]
    fn test_methods_group_by_name() {
        let class = Type::class(ClassDef::new("Calc"));
        let add = |params: Vec<Type>| {
            let mut all = vec![class.clone()];
            all.extend(params);
            MethodHandle::new("add", Signature::new(Type::int(), all), |_| Ok(Value::Int(0)))
        };
        let host = HostClass::new(ClassDef::new("Calc"))
            .method(add(vec![Type::int()]))
            .method(add(vec![Type::long()]));
        let groups: Vec<_> = host.methods().map(|(name, ms)| (name.to_string(), ms.len())).collect();
        assert_eq!(groups, vec![("add".to_string(), 2)]);
    }

    #[test]
    fn test_registry_replaces_by_name() {
        let mut registry = ClassRegistry::new();
        registry
            .register(HostClass::new(ClassDef::new("A")))
            .register(HostClass::new(ClassDef::new("A")).field("x", Type::int()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("A").unwrap().fields().count(), 1);
    }
}
