//! Runtime values passed through call sites.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{InvokeError, InvokeResult};
use crate::types::{PrimitiveTy, Type};

/// A dynamically typed runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Arc<str>),
    /// A type used as a value, such as a class literal.
    Type(Type),
    Array(Arc<ArrayValue>),
    Collection(Arc<CollectionValue>),
    Map(Arc<MapValue>),
    Object(Arc<HostObject>),
}

/// A fixed-length array with a declared element type.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub element: Type,
    pub items: Vec<Value>,
}

/// A list or set. `class` is the concrete collection class.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionValue {
    pub class: Type,
    pub items: Vec<Value>,
}

/// An association list. `class` is the concrete map class.
#[derive(Debug, Clone, PartialEq)]
pub struct MapValue {
    pub class: Type,
    pub entries: Vec<(Value, Value)>,
}

impl MapValue {
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// An instance of a host class with mutable named fields.
#[derive(Debug)]
pub struct HostObject {
    class: Type,
    fields: RwLock<FxHashMap<String, Value>>,
}

impl HostObject {
    pub fn new(class: Type) -> Self {
        Self {
            class,
            fields: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn class(&self) -> &Type {
        &self.class
    }

    /// Read a field; unset fields read as `Null`.
    pub fn field(&self, name: &str) -> Value {
        self.fields.read().get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.fields.write().insert(name.into(), value);
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn array(element: Type, items: Vec<Value>) -> Self {
        Value::Array(Arc::new(ArrayValue { element, items }))
    }

    pub fn collection(class: Type, items: Vec<Value>) -> Self {
        Value::Collection(Arc::new(CollectionValue { class, items }))
    }

    pub fn map(class: Type, entries: Vec<(Value, Value)>) -> Self {
        Value::Map(Arc::new(MapValue { class, entries }))
    }

    pub fn object(class: Type) -> Self {
        Value::Object(Arc::new(HostObject::new(class)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The primitive kind of a primitive value.
    pub fn primitive_kind(&self) -> Option<PrimitiveTy> {
        let prim = match self {
            Value::Bool(_) => PrimitiveTy::Boolean,
            Value::Byte(_) => PrimitiveTy::Byte,
            Value::Short(_) => PrimitiveTy::Short,
            Value::Char(_) => PrimitiveTy::Char,
            Value::Int(_) => PrimitiveTy::Int,
            Value::Long(_) => PrimitiveTy::Long,
            Value::Float(_) => PrimitiveTy::Float,
            Value::Double(_) => PrimitiveTy::Double,
            _ => return None,
        };
        Some(prim)
    }

    /// The runtime class of the value.
    ///
    /// Primitive values report their wrapper class, and `Null` reports the
    /// null type.
    pub fn runtime_type(&self) -> Type {
        match self {
            Value::Null => Type::null(),
            Value::Bool(_) => Type::boxed(PrimitiveTy::Boolean),
            Value::Byte(_) => Type::boxed(PrimitiveTy::Byte),
            Value::Short(_) => Type::boxed(PrimitiveTy::Short),
            Value::Char(_) => Type::boxed(PrimitiveTy::Char),
            Value::Int(_) => Type::boxed(PrimitiveTy::Int),
            Value::Long(_) => Type::boxed(PrimitiveTy::Long),
            Value::Float(_) => Type::boxed(PrimitiveTy::Float),
            Value::Double(_) => Type::boxed(PrimitiveTy::Double),
            Value::Str(_) => Type::string(),
            Value::Type(_) => Type::class_type(),
            Value::Array(array) => Type::array(array.element.clone()),
            Value::Collection(coll) => coll.class.clone(),
            Value::Map(map) => map.class.clone(),
            Value::Object(obj) => obj.class.clone(),
        }
    }

    /// Check if the value is a non-null instance of `ty`.
    pub fn is_instance_of(&self, ty: &Type) -> bool {
        !self.is_null() && ty.is_assignable_from(&self.runtime_type())
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_integral(&self) -> Option<i64> {
        match self {
            Value::Byte(b) => Some(i64::from(*b)),
            Value::Short(s) => Some(i64::from(*s)),
            Value::Char(c) => Some(i64::from(u32::from(*c))),
            Value::Int(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Widen a primitive value to `to`.
    ///
    /// Only identity and widening primitive conversions are performed.
    fn widen(&self, to: PrimitiveTy) -> Option<Value> {
        let from = self.primitive_kind()?;
        if from == to {
            return Some(self.clone());
        }
        if !from.is_proper_subtype_of(to) {
            return None;
        }
        let integral = self.as_integral();
        let widened = match to {
            PrimitiveTy::Short => Value::Short(integral? as i16),
            PrimitiveTy::Int => Value::Int(integral? as i32),
            PrimitiveTy::Long => Value::Long(integral?),
            PrimitiveTy::Float => Value::Float(integral? as f32),
            PrimitiveTy::Double => match (integral, self) {
                (Some(i), _) => Value::Double(i as f64),
                (None, Value::Float(f)) => Value::Double(f64::from(*f)),
                _ => return None,
            },
            _ => return None,
        };
        Some(widened)
    }

    /// Convert the value for a slot of type `target`.
    ///
    /// Performs checked reference casts, unboxing with widening, and maps any
    /// value to `Null` for `void`.
    pub fn convert_to(&self, target: &Type) -> InvokeResult<Value> {
        if let Some(prim) = target.as_primitive() {
            if prim == PrimitiveTy::Void {
                return Ok(Value::Null);
            }
            if self.is_null() {
                return Err(InvokeError::NullToPrimitive { to: target.clone() });
            }
            return self.widen(prim).ok_or_else(|| InvokeError::ClassCast {
                from: self.runtime_type(),
                to: target.clone(),
            });
        }
        if self.is_null() || target.is_assignable_from(&self.runtime_type()) {
            Ok(self.clone())
        } else {
            Err(InvokeError::ClassCast {
                from: self.runtime_type(),
                to: target.clone(),
            })
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Collection(a), Value::Collection(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Byte(b) => write!(f, "{b}"),
            Value::Short(s) => write!(f, "{s}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Double(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Type(ty) => write!(f, "class {ty}"),
            Value::Array(array) => write!(f, "{}[{}]", array.element, array.items.len()),
            Value::Collection(coll) => write!(f, "{}(size={})", coll.class, coll.items.len()),
            Value::Map(map) => write!(f, "{}(size={})", map.class, map.entries.len()),
            Value::Object(obj) => write!(f, "{}@{:p}", obj.class, Arc::as_ptr(obj)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassDef;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_runtime_type_of_primitives_is_boxed() {
        assert_eq!(Value::Int(1).runtime_type(), Type::boxed(PrimitiveTy::Int));
        assert_eq!(Value::Null.runtime_type(), Type::null());
        assert_eq!(
            Value::array(Type::int(), vec![]).runtime_type(),
            Type::array(Type::int())
        );
    }

    #[test]
    fn test_convert_widens_primitives() {
        assert_eq!(Value::Int(3).convert_to(&Type::long()).unwrap(), Value::Long(3));
        assert_eq!(Value::Char('a').convert_to(&Type::int()).unwrap(), Value::Int(97));
        assert_eq!(Value::Float(1.5).convert_to(&Type::double()).unwrap(), Value::Double(1.5));
        assert!(matches!(
            Value::Double(1.0).convert_to(&Type::int()),
            Err(InvokeError::ClassCast { .. })
        ));
    }

    #[test]
    fn test_convert_null() {
        assert_eq!(Value::Null.convert_to(&Type::string()).unwrap(), Value::Null);
        assert!(matches!(
            Value::Null.convert_to(&Type::int()),
            Err(InvokeError::NullToPrimitive { .. })
        ));
    }

    #[test]
    fn test_convert_reference_checked_cast() {
        let t1 = Type::class(ClassDef::new("T1"));
        let obj = Value::object(t1.clone());
        assert_eq!(obj.convert_to(&Type::object()).unwrap(), obj);
        assert!(obj.convert_to(&Type::string()).is_err());
        assert!(Value::Int(1).convert_to(&Type::number()).is_ok());
    }

    #[test]
    fn test_host_object_fields() {
        let obj = HostObject::new(Type::class(ClassDef::new("T1")));
        assert_eq!(obj.field("foo"), Value::Null);
        obj.set_field("foo", Value::Int(7));
        assert_eq!(obj.field("foo"), Value::Int(7));
    }
}
