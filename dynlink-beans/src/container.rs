//! Length and element access on arrays, collections and maps.
//!
//! These operations are early-bound when the call site's declared receiver
//! type already guarantees the container kind, and guarded by the runtime
//! container kind otherwise.

use dynlink::{
    Guard, GuardedInvocation, InvokeError, LinkResult, LinkerServices, MethodHandle, Signature, Type, Value,
};

/// Container kinds with uniform length and element access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Array,
    /// Any collection; supports length only.
    Collection,
    List,
    Map,
}

impl ContainerKind {
    /// The kind every value of declared type `ty` is guaranteed to have.
    fn of_declared(ty: &Type) -> Option<Self> {
        if ty.is_array() {
            Some(ContainerKind::Array)
        } else if Type::list().is_assignable_from(ty) {
            Some(ContainerKind::List)
        } else if Type::collection().is_assignable_from(ty) {
            Some(ContainerKind::Collection)
        } else if Type::map().is_assignable_from(ty) {
            Some(ContainerKind::Map)
        } else {
            None
        }
    }

    /// The kind of a runtime value.
    fn of_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(_) => Some(ContainerKind::Array),
            Value::Collection(c) if Type::list().is_assignable_from(&c.class) => Some(ContainerKind::List),
            Value::Collection(_) => Some(ContainerKind::Collection),
            Value::Map(_) => Some(ContainerKind::Map),
            _ => None,
        }
    }

    /// Guard admitting every value of this kind.
    ///
    /// For length access lists widen to collections, so that one binding
    /// serves every collection class.
    fn guard(self, widen_lists: bool) -> Guard {
        match self {
            ContainerKind::Array => Guard::is_array(0),
            ContainerKind::List if !widen_lists => Guard::is_instance(0, Type::list()),
            ContainerKind::List | ContainerKind::Collection => Guard::is_instance(0, Type::collection()),
            ContainerKind::Map => Guard::is_instance(0, Type::map()),
        }
    }
}

fn length(container: &Value) -> Result<usize, InvokeError> {
    match container {
        Value::Array(array) => Ok(array.items.len()),
        Value::Collection(collection) => Ok(collection.items.len()),
        Value::Map(map) => Ok(map.entries.len()),
        other => Err(InvokeError::ClassCast {
            from: other.runtime_type(),
            to: Type::collection(),
        }),
    }
}

fn element(container: &Value, key: &Value) -> Result<Value, InvokeError> {
    let indexed = |items: &[Value]| {
        let index = match key {
            Value::Byte(b) => i64::from(*b),
            Value::Short(s) => i64::from(*s),
            Value::Char(c) => i64::from(u32::from(*c)),
            Value::Int(i) => i64::from(*i),
            Value::Long(l) => *l,
            other => {
                return Err(InvokeError::ClassCast {
                    from: other.runtime_type(),
                    to: Type::int(),
                })
            }
        };
        usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or(InvokeError::IndexOutOfBounds {
                index,
                length: items.len(),
            })
    };
    match container {
        Value::Array(array) => indexed(&array.items),
        Value::Collection(list) if Type::list().is_assignable_from(&list.class) => indexed(&list.items),
        Value::Map(map) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        other => Err(InvokeError::ClassCast {
            from: other.runtime_type(),
            to: Type::list(),
        }),
    }
}

/// Link `dyn:getLength` for `receiver`.
pub fn length_getter(
    signature: &Signature,
    receiver: &Value,
    services: &LinkerServices,
) -> LinkResult<Option<GuardedInvocation>> {
    if signature.arity() != 1 {
        return Ok(None);
    }
    let handle = MethodHandle::new("length", Signature::new(Type::int(), vec![Type::object()]), |args| {
        let len = length(&args[0])?;
        Ok(Value::Int(i32::try_from(len).unwrap_or(i32::MAX)))
    });
    link(signature, receiver, services, handle, true)
}

/// Link `dyn:getElem` for `receiver`. Sets support length only, so they
/// are not linked.
pub fn element_getter(
    signature: &Signature,
    receiver: &Value,
    services: &LinkerServices,
) -> LinkResult<Option<GuardedInvocation>> {
    if signature.arity() != 2 {
        return Ok(None);
    }
    let declared = ContainerKind::of_declared(signature.param(0));
    let runtime = ContainerKind::of_value(receiver);
    if declared == Some(ContainerKind::Collection)
        || (declared.is_none() && matches!(runtime, None | Some(ContainerKind::Collection)))
    {
        return Ok(None);
    }
    let handle = MethodHandle::new(
        "element",
        Signature::new(Type::object(), vec![Type::object(), Type::object()]),
        |args| element(&args[0], &args[1]),
    );
    link(signature, receiver, services, handle, false)
}

fn link(
    signature: &Signature,
    receiver: &Value,
    services: &LinkerServices,
    handle: MethodHandle,
    widen_lists: bool,
) -> LinkResult<Option<GuardedInvocation>> {
    let guard = match ContainerKind::of_declared(signature.param(0)) {
        Some(_) => None,
        None => match ContainerKind::of_value(receiver) {
            Some(kind) => Some(kind.guard(widen_lists)),
            None => return Ok(None),
        },
    };
    let adapted = services.as_type_handle(&handle, signature)?;
    Ok(Some(GuardedInvocation::new(adapted, guard)))
}
