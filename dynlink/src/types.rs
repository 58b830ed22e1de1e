//! Host type model.
//!
//! Types describe the shape of values flowing through call sites. They are
//! deliberately close to a class-based object model: primitives, classes
//! (with a single superclass and any number of interfaces), arrays, and the
//! type of `null`. Class identity is the class name; two `ClassDef`s with the
//! same name are the same class.
//!
//! # Conversion relations
//!
//! Overload resolution and signature adaptation rely on four relations, from
//! strictest to loosest:
//!
//! 1. **Assignability** (`is_assignable_from`): reference widening, identity.
//! 2. **Subtyping** (`is_subtype`): assignability plus primitive widening.
//! 3. **Method invocation conversion** (`is_method_invocation_convertible`):
//!    subtyping plus boxing and unboxing.
//! 4. **Potential convertibility** (`is_potentially_convertible`): anything a
//!    checked cast could make work for *some* runtime value.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Primitive value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTy {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveTy {
    /// Source-level name of the primitive.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveTy::Boolean => "boolean",
            PrimitiveTy::Byte => "byte",
            PrimitiveTy::Short => "short",
            PrimitiveTy::Char => "char",
            PrimitiveTy::Int => "int",
            PrimitiveTy::Long => "long",
            PrimitiveTy::Float => "float",
            PrimitiveTy::Double => "double",
            PrimitiveTy::Void => "void",
        }
    }

    /// Name of the class that boxes values of this primitive.
    pub fn wrapper_name(self) -> &'static str {
        match self {
            PrimitiveTy::Boolean => "Boolean",
            PrimitiveTy::Byte => "Byte",
            PrimitiveTy::Short => "Short",
            PrimitiveTy::Char => "Character",
            PrimitiveTy::Int => "Integer",
            PrimitiveTy::Long => "Long",
            PrimitiveTy::Float => "Float",
            PrimitiveTy::Double => "Double",
            PrimitiveTy::Void => "Void",
        }
    }

    /// Inverse of [`PrimitiveTy::wrapper_name`].
    pub fn from_wrapper_name(name: &str) -> Option<Self> {
        let prim = match name {
            "Boolean" => PrimitiveTy::Boolean,
            "Byte" => PrimitiveTy::Byte,
            "Short" => PrimitiveTy::Short,
            "Character" => PrimitiveTy::Char,
            "Integer" => PrimitiveTy::Int,
            "Long" => PrimitiveTy::Long,
            "Float" => PrimitiveTy::Float,
            "Double" => PrimitiveTy::Double,
            "Void" => PrimitiveTy::Void,
            _ => return None,
        };
        Some(prim)
    }

    fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveTy::Boolean | PrimitiveTy::Void)
    }

    /// Check if `self` widens to `other` without loss (strictly).
    ///
    /// `byte < short < int < long < float < double` and `char < int`.
    pub fn is_proper_subtype_of(self, other: PrimitiveTy) -> bool {
        use PrimitiveTy::*;
        matches!(
            (self, other),
            (Byte, Short | Int | Long | Float | Double)
                | (Short, Int | Long | Float | Double)
                | (Char, Int | Long | Float | Double)
                | (Int, Long | Float | Double)
                | (Long, Float | Double)
                | (Float, Double)
        )
    }
}

/// A class or interface definition.
///
/// Equality and hashing only consider the name.
#[derive(Debug, Clone)]
pub struct ClassDef {
    name: String,
    superclass: Option<Type>,
    interfaces: Vec<Type>,
    is_interface: bool,
}

impl ClassDef {
    /// Create a class extending `Object`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: Some(Type::object()),
            interfaces: Vec::new(),
            is_interface: false,
        }
    }

    /// Create an interface.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            interfaces: Vec::new(),
            is_interface: true,
        }
    }

    fn root() -> Self {
        Self {
            name: "Object".to_string(),
            superclass: None,
            interfaces: Vec::new(),
            is_interface: false,
        }
    }

    /// Set the superclass.
    pub fn extends(mut self, superclass: Type) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Add an implemented (or, for interfaces, extended) interface.
    pub fn implements(mut self, interface: Type) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Type> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[Type] {
        &self.interfaces
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    /// Check if this class is `target` or inherits from it.
    fn inherits(&self, target: &ClassDef) -> bool {
        if self == target {
            return true;
        }
        let via_super = self
            .superclass
            .as_ref()
            .and_then(Type::as_class)
            .is_some_and(|sup| sup.inherits(target));
        via_super
            || self
                .interfaces
                .iter()
                .filter_map(Type::as_class)
                .any(|iface| iface.inherits(target))
    }
}

impl PartialEq for ClassDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassDef {}

impl Hash for ClassDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// The kind of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A primitive, including `void`.
    Primitive(PrimitiveTy),
    /// A class or interface.
    Class(Arc<ClassDef>),
    /// An array with the given element type.
    Array(Type),
    /// The type of the `null` value. Only ever a runtime type.
    Null,
}

/// A host type. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub kind: Arc<TypeKind>,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self { kind: Arc::new(kind) }
    }

    pub fn primitive(prim: PrimitiveTy) -> Self {
        Self::new(TypeKind::Primitive(prim))
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveTy::Boolean)
    }

    pub fn byte() -> Self {
        Self::primitive(PrimitiveTy::Byte)
    }

    pub fn short() -> Self {
        Self::primitive(PrimitiveTy::Short)
    }

    pub fn char() -> Self {
        Self::primitive(PrimitiveTy::Char)
    }

    pub fn int() -> Self {
        Self::primitive(PrimitiveTy::Int)
    }

    pub fn long() -> Self {
        Self::primitive(PrimitiveTy::Long)
    }

    pub fn float() -> Self {
        Self::primitive(PrimitiveTy::Float)
    }

    pub fn double() -> Self {
        Self::primitive(PrimitiveTy::Double)
    }

    pub fn void() -> Self {
        Self::primitive(PrimitiveTy::Void)
    }

    pub fn class(def: ClassDef) -> Self {
        Self::new(TypeKind::Class(Arc::new(def)))
    }

    pub fn array(element: Type) -> Self {
        Self::new(TypeKind::Array(element))
    }

    pub fn null() -> Self {
        Self::new(TypeKind::Null)
    }

    /// The root of the class hierarchy.
    pub fn object() -> Self {
        Self::class(ClassDef::root())
    }

    pub fn string() -> Self {
        Self::class(ClassDef::new("String"))
    }

    pub fn number() -> Self {
        Self::class(ClassDef::new("Number"))
    }

    /// The type of type values (class literals).
    pub fn class_type() -> Self {
        Self::class(ClassDef::new("Class"))
    }

    /// The class boxing values of `prim`.
    pub fn boxed(prim: PrimitiveTy) -> Self {
        let def = ClassDef::new(prim.wrapper_name());
        let def = if prim.is_numeric() && prim != PrimitiveTy::Char {
            def.extends(Type::number())
        } else {
            def
        };
        Self::class(def)
    }

    pub fn collection() -> Self {
        Self::class(ClassDef::interface("Collection"))
    }

    pub fn list() -> Self {
        Self::class(ClassDef::interface("List").implements(Type::collection()))
    }

    pub fn set() -> Self {
        Self::class(ClassDef::interface("Set").implements(Type::collection()))
    }

    pub fn map() -> Self {
        Self::class(ClassDef::interface("Map"))
    }

    pub fn array_list() -> Self {
        Self::class(ClassDef::new("ArrayList").implements(Type::list()))
    }

    pub fn hash_set() -> Self {
        Self::class(ClassDef::new("HashSet").implements(Type::set()))
    }

    pub fn hash_map() -> Self {
        Self::class(ClassDef::new("HashMap").implements(Type::map()))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveTy> {
        match self.kind.as_ref() {
            TypeKind::Primitive(prim) => Some(*prim),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassDef> {
        match self.kind.as_ref() {
            TypeKind::Class(def) => Some(def),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self.kind.as_ref() {
            TypeKind::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind.as_ref(), TypeKind::Primitive(_))
    }

    pub fn is_void(&self) -> bool {
        self.as_primitive() == Some(PrimitiveTy::Void)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind.as_ref(), TypeKind::Array(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind.as_ref(), TypeKind::Null)
    }

    /// Classes, interfaces, arrays and the null type.
    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }

    pub fn is_object(&self) -> bool {
        self.as_class().is_some_and(|def| def.name == "Object")
    }

    pub fn is_interface(&self) -> bool {
        self.as_class().is_some_and(ClassDef::is_interface)
    }

    /// Primitive boxed by this class, if it is a wrapper class.
    pub fn unboxed(&self) -> Option<PrimitiveTy> {
        self.as_class()
            .and_then(|def| PrimitiveTy::from_wrapper_name(&def.name))
    }

    /// Check if a value of type `from` can be stored in a `self` slot
    /// without any conversion.
    pub fn is_assignable_from(&self, from: &Type) -> bool {
        if self == from {
            return true;
        }
        match (self.kind.as_ref(), from.kind.as_ref()) {
            (_, TypeKind::Null) => self.is_reference(),
            (TypeKind::Class(target), TypeKind::Class(source)) => {
                target.name == "Object" || source.inherits(target)
            }
            (TypeKind::Class(target), TypeKind::Array(_)) => target.name == "Object",
            (TypeKind::Array(target), TypeKind::Array(source)) => {
                target.is_reference() && source.is_reference() && target.is_assignable_from(source)
            }
            _ => false,
        }
    }

    /// Check if `self` can receive any boxed primitive value.
    pub fn is_assignable_from_boxed_primitive(&self) -> bool {
        self.is_object()
            || self.as_class().is_some_and(|def| def.name == "Number")
            || self.unboxed().is_some()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            TypeKind::Primitive(prim) => f.write_str(prim.name()),
            TypeKind::Class(def) => f.write_str(&def.name),
            TypeKind::Array(element) => write!(f, "{element}[]"),
            TypeKind::Null => f.write_str("null"),
        }
    }
}

/// Subtyping: reference assignability plus primitive widening.
pub fn is_subtype(sub: &Type, sup: &Type) -> bool {
    if sup.is_assignable_from(sub) {
        return true;
    }
    match (sub.as_primitive(), sup.as_primitive()) {
        (Some(a), Some(b)) => a.is_proper_subtype_of(b),
        _ => false,
    }
}

/// Check if `from` converts to `to` by identity, widening, boxing or
/// unboxing; the conversions permitted when passing an argument without an
/// explicit cast.
pub fn is_method_invocation_convertible(from: &Type, to: &Type) -> bool {
    if to.is_assignable_from(from) {
        return true;
    }
    match (from.as_primitive(), to.as_primitive()) {
        (Some(f), Some(t)) => f.is_proper_subtype_of(t),
        (Some(f), None) => f != PrimitiveTy::Void && to.is_assignable_from(&Type::boxed(f)),
        (None, Some(t)) => from
            .unboxed()
            .is_some_and(|f| f == t || f.is_proper_subtype_of(t)),
        (None, None) => false,
    }
}

/// Check if some runtime value declared as `from` could be converted to
/// `to`, possibly with a checked cast.
pub fn is_potentially_convertible(from: &Type, to: &Type) -> bool {
    if to.is_assignable_from(from) || from.is_assignable_from(to) {
        return true;
    }
    if from.is_null() {
        return to.is_reference();
    }
    if from.is_primitive() {
        return to.is_primitive() || to.is_assignable_from_boxed_primitive();
    }
    if to.is_primitive() {
        return from.is_assignable_from_boxed_primitive();
    }
    false
}

/// Check if a checked cast from `from` to `to` is well-formed.
///
/// Primitives only widen; references may be widened, narrowed, or cast to
/// and from interfaces; boxing and unboxing are allowed.
pub fn is_castable(from: &Type, to: &Type) -> bool {
    if from == to {
        return true;
    }
    match (from.as_primitive(), to.as_primitive()) {
        (Some(f), Some(t)) => f.is_proper_subtype_of(t),
        (Some(f), None) => f != PrimitiveTy::Void && to.is_assignable_from(&Type::boxed(f)),
        (None, Some(PrimitiveTy::Void)) => false,
        (None, Some(_)) => !from.is_null() && is_potentially_convertible(from, to),
        (None, None) => {
            to.is_assignable_from(from)
                || from.is_assignable_from(to)
                || ((from.is_interface() || to.is_interface()) && !from.is_array() && !to.is_array())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t1() -> Type {
        Type::class(ClassDef::new("T1"))
    }

    fn t3() -> Type {
        Type::class(ClassDef::new("T3").extends(t1()))
    }

    #[test]
    fn test_class_identity_is_by_name() {
        assert_eq!(Type::class(ClassDef::new("T1")), t1());
        assert_ne!(t1(), t3());
    }

    #[test]
    fn test_reference_assignability() {
        assert!(t1().is_assignable_from(&t3()));
        assert!(!t3().is_assignable_from(&t1()));
        assert!(Type::object().is_assignable_from(&t3()));
        assert!(Type::object().is_assignable_from(&Type::array(Type::int())));
        assert!(!Type::object().is_assignable_from(&Type::int()));
        assert!(Type::collection().is_assignable_from(&Type::array_list()));
        assert!(Type::collection().is_assignable_from(&Type::hash_set()));
        assert!(!Type::collection().is_assignable_from(&Type::hash_map()));
    }

    #[test]
    fn test_array_covariance() {
        let objects = Type::array(Type::object());
        let strings = Type::array(Type::string());
        assert!(objects.is_assignable_from(&strings));
        assert!(!strings.is_assignable_from(&objects));
        assert!(!Type::array(Type::long()).is_assignable_from(&Type::array(Type::int())));
    }

    #[test]
    fn test_null_assignability() {
        assert!(Type::string().is_assignable_from(&Type::null()));
        assert!(!Type::int().is_assignable_from(&Type::null()));
    }

    #[test]
    fn test_primitive_subtyping() {
        assert!(is_subtype(&Type::int(), &Type::long()));
        assert!(is_subtype(&Type::char(), &Type::int()));
        assert!(!is_subtype(&Type::char(), &Type::short()));
        assert!(!is_subtype(&Type::double(), &Type::int()));
    }

    #[test]
    fn test_method_invocation_conversion() {
        let integer = Type::boxed(PrimitiveTy::Int);
        assert!(is_method_invocation_convertible(&integer, &Type::int()));
        assert!(is_method_invocation_convertible(&integer, &Type::double()));
        assert!(is_method_invocation_convertible(&Type::int(), &Type::object()));
        assert!(is_method_invocation_convertible(&Type::int(), &Type::number()));
        assert!(!is_method_invocation_convertible(&Type::object(), &Type::int()));
        assert!(!is_method_invocation_convertible(&Type::boxed(PrimitiveTy::Double), &Type::int()));
        assert!(!is_method_invocation_convertible(&integer, &Type::array(Type::int())));
    }

    #[test]
    fn test_potential_convertibility() {
        assert!(is_potentially_convertible(&Type::object(), &Type::int()));
        assert!(is_potentially_convertible(&Type::object(), &Type::string()));
        assert!(is_potentially_convertible(&Type::object(), &Type::array(Type::int())));
        assert!(!is_potentially_convertible(&Type::string(), &Type::int()));
        assert!(!is_potentially_convertible(&Type::null(), &Type::int()));
    }

    #[test]
    fn test_castability() {
        assert!(is_castable(&Type::object(), &Type::string()));
        assert!(is_castable(&Type::object(), &Type::int()));
        assert!(is_castable(&Type::int(), &Type::long()));
        assert!(!is_castable(&Type::long(), &Type::int()));
        assert!(!is_castable(&Type::string(), &Type::int()));
        assert!(!is_castable(&Type::string(), &t1()));
        assert!(is_castable(&Type::list(), &t1()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::array(Type::int()).to_string(), "int[]");
        assert_eq!(Type::boxed(PrimitiveTy::Char).to_string(), "Character");
    }
}
