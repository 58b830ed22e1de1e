//! Method handles: typed, invocable targets and their combinators.
//!
//! A [`MethodHandle`] pairs a [`Signature`] with a body closure. Combinators
//! never mutate a handle; they wrap the body of an existing handle in a new
//! closure and produce a handle with the resulting signature.

use std::fmt;
use std::sync::Arc;

use crate::error::{InvokeError, InvokeResult, LinkError, LinkResult};
use crate::invocation::Invocation;
use crate::signature::Signature;
use crate::types::{is_castable, Type};
use crate::value::Value;

/// Body of a method handle.
pub type HandleFn = dyn Fn(&[Value]) -> InvokeResult<Value> + Send + Sync;

/// A typed invocable target.
#[derive(Clone)]
pub struct MethodHandle {
    name: Arc<str>,
    signature: Signature,
    varargs: bool,
    body: Arc<HandleFn>,
}

impl MethodHandle {
    pub fn new<F>(name: impl Into<Arc<str>>, signature: Signature, body: F) -> Self
    where
        F: Fn(&[Value]) -> InvokeResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            varargs: false,
            body: Arc::new(body),
        }
    }

    /// Create a variable-arity handle. The last parameter must be an array;
    /// otherwise the handle is fixed-arity.
    pub fn variadic<F>(name: impl Into<Arc<str>>, signature: Signature, body: F) -> Self
    where
        F: Fn(&[Value]) -> InvokeResult<Value> + Send + Sync + 'static,
    {
        let varargs = signature.last_param().is_some_and(Type::is_array);
        Self {
            varargs,
            ..Self::new(name, signature, body)
        }
    }

    /// A handle of signature `(ty)ty` returning its argument.
    pub fn identity(ty: Type) -> Self {
        Self::new("identity", Signature::new(ty.clone(), vec![ty]), |args| {
            Ok(args[0].clone())
        })
    }

    /// A handle that ignores its arguments and returns `value`.
    pub fn constant(signature: Signature, value: Value) -> Self {
        Self::new("constant", signature, move |_| Ok(value.clone()))
    }

    /// A handle that always fails with the error produced by `error`.
    pub fn throwing<F>(name: impl Into<Arc<str>>, signature: Signature, error: F) -> Self
    where
        F: Fn(&[Value]) -> InvokeError + Send + Sync + 'static,
    {
        Self::new(name, signature, move |args| Err(error(args)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn arity(&self) -> usize {
        self.signature.arity()
    }

    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    /// The same handle with variable arity turned off.
    pub fn as_fixed_arity(&self) -> MethodHandle {
        Self {
            varargs: false,
            ..self.clone()
        }
    }

    /// Check if both handles share a body and a signature.
    pub fn same_target(&self, other: &MethodHandle) -> bool {
        Arc::ptr_eq(&self.body, &other.body) && self.signature == other.signature
    }

    pub fn invoke(&self, args: &[Value]) -> InvokeResult<Value> {
        if args.len() != self.arity() {
            return Err(InvokeError::ArityMismatch {
                expected: self.arity(),
                found: args.len(),
            });
        }
        (self.body)(args)
    }

    fn derive<F>(&self, signature: Signature, body: F) -> MethodHandle
    where
        F: Fn(&[Value]) -> InvokeResult<Value> + Send + Sync + 'static,
    {
        MethodHandle {
            name: self.name.clone(),
            signature,
            varargs: false,
            body: Arc::new(body),
        }
    }

    /// Bind constant values at parameter `pos`, removing those parameters.
    pub fn insert_arguments(&self, pos: usize, values: Vec<Value>) -> MethodHandle {
        let signature = self.signature.drop_params(pos, values.len());
        let inner = self.clone();
        self.derive(signature, move |args| {
            let mut full = Vec::with_capacity(args.len() + values.len());
            full.extend_from_slice(&args[..pos]);
            full.extend(values.iter().cloned());
            full.extend_from_slice(&args[pos..]);
            inner.invoke(&full)
        })
    }

    /// Bind the receiver.
    pub fn bind_to(&self, receiver: Value) -> MethodHandle {
        self.insert_arguments(0, vec![receiver])
    }

    /// Collect `count` trailing arguments into an array of the last
    /// parameter's element type. Returns `None` if the last parameter is not
    /// an array.
    pub fn as_collector(&self, count: usize) -> Option<MethodHandle> {
        let array_ty = self.signature.last_param()?;
        let element = array_ty.element_type()?.clone();
        let fixed = self.arity() - 1;
        let signature = self.signature.spread_tail(fixed, &element, count);
        let inner = self.as_fixed_arity();
        Some(self.derive(signature, move |args| {
            let mut full = args[..fixed].to_vec();
            full.push(Value::array(element.clone(), args[fixed..].to_vec()));
            inner.invoke(&full)
        }))
    }

    /// Run `filter` on argument `pos` before invoking. The parameter type at
    /// `pos` becomes the filter's input type.
    pub fn filter_argument(&self, pos: usize, filter: Invocation) -> MethodHandle {
        let input = filter.signature().param(0).clone();
        let signature = self.signature.with_param(pos, input);
        let inner = self.clone();
        self.derive(signature, move |args| {
            let mut filtered = args.to_vec();
            filtered[pos] = filter.invoke(&args[pos..=pos])?;
            inner.invoke(&filtered)
        })
    }

    /// Run `filter` on the result.
    pub fn filter_return(&self, filter: Invocation) -> MethodHandle {
        let signature = self.signature.with_return(filter.signature().return_type().clone());
        let inner = self.clone();
        self.derive(signature, move |args| filter.invoke(&[inner.invoke(args)?]))
    }

    /// Wrap an invocation tree as a single handle.
    pub fn from_invocation(invocation: Invocation) -> MethodHandle {
        MethodHandle::new("invocation", invocation.signature().clone(), move |args| {
            invocation.invoke(args)
        })
    }

    /// Adapt the handle to `target` using checked casts, boxing, unboxing and
    /// primitive widening only.
    pub fn adapt_signature(&self, target: &Signature) -> LinkResult<MethodHandle> {
        if &self.signature == target {
            return Ok(self.clone());
        }
        if self.arity() != target.arity() {
            return Err(LinkError::SignatureMismatch {
                expected: target.clone(),
                found: self.signature.clone(),
            });
        }
        for (from, to) in target.params().iter().zip(self.signature.params()) {
            if !is_castable(from, to) {
                return Err(LinkError::ConversionUnavailable {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }
        let own_ret = self.signature.return_type();
        let ret = target.return_type();
        let ret_ok = ret.is_void() || (own_ret.is_void() && ret.is_reference()) || is_castable(own_ret, ret);
        if !ret_ok {
            return Err(LinkError::ConversionUnavailable {
                from: own_ret.clone(),
                to: ret.clone(),
            });
        }

        let params = self.signature.params().to_vec();
        let ret = ret.clone();
        let inner = self.clone();
        Ok(self.derive(target.clone(), move |args| {
            let converted = args
                .iter()
                .zip(&params)
                .map(|(arg, ty)| arg.convert_to(ty))
                .collect::<InvokeResult<Vec<_>>>()?;
            inner.invoke(&converted)?.convert_to(&ret)
        }))
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodHandle({}{}", self.name, self.signature)?;
        if self.varargs {
            f.write_str(" varargs")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sum_handle() -> MethodHandle {
        MethodHandle::variadic(
            "sum",
            Signature::new(Type::int(), vec![Type::int(), Type::array(Type::int())]),
            |args| {
                let base = args[0].as_int().unwrap_or(0);
                let Value::Array(rest) = &args[1] else {
                    return Err(InvokeError::Host("expected array".into()));
                };
                Ok(Value::Int(base + rest.items.iter().filter_map(Value::as_int).sum::<i32>()))
            },
        )
    }

    #[test]
    fn test_variadic_requires_trailing_array() {
        assert!(sum_handle().is_varargs());
        let fixed = MethodHandle::variadic("f", Signature::new(Type::int(), vec![Type::int()]), |_| {
            Ok(Value::Int(0))
        });
        assert!(!fixed.is_varargs());
        assert!(!sum_handle().as_fixed_arity().is_varargs());
    }

    #[test]
    fn test_invoke_checks_arity() {
        let err = sum_handle().invoke(&[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, InvokeError::ArityMismatch { expected: 2, found: 1 }));
    }

    #[test]
    fn test_collector_packs_trailing_arguments() {
        let collector = sum_handle().as_collector(3).unwrap();
        assert_eq!(collector.arity(), 4);
        let result = collector
            .invoke(&[Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)])
            .unwrap();
        assert_eq!(result, Value::Int(10));
    }

    #[test]
    fn test_insert_arguments() {
        let empty = sum_handle().insert_arguments(1, vec![Value::array(Type::int(), vec![])]);
        assert_eq!(empty.signature(), &Signature::new(Type::int(), vec![Type::int()]));
        assert_eq!(empty.invoke(&[Value::Int(5)]).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_bind_to_fixes_the_receiver() {
        let greet = MethodHandle::new(
            "greet",
            Signature::new(Type::string(), vec![Type::string(), Type::string()]),
            |args| {
                let receiver = args[0].as_str().unwrap_or_default();
                let guest = args[1].as_str().unwrap_or_default();
                Ok(Value::str(&format!("{receiver} greets {guest}")))
            },
        );
        let bound = greet.bind_to(Value::str("host"));
        assert_eq!(bound.signature(), &Signature::new(Type::string(), vec![Type::string()]));
        assert_eq!(bound.name(), "greet");
        assert_eq!(bound.invoke(&[Value::str("guest")]).unwrap(), Value::str("host greets guest"));
    }

    #[test]
    fn test_adapt_signature_casts_and_boxes() {
        let handle = MethodHandle::new(
            "twice",
            Signature::new(Type::int(), vec![Type::int()]),
            |args| Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2)),
        );
        let adapted = handle.adapt_signature(&Signature::generic(1)).unwrap();
        assert_eq!(adapted.invoke(&[Value::Int(4)]).unwrap(), Value::Int(8));
        assert!(matches!(
            adapted.invoke(&[Value::str("x")]),
            Err(InvokeError::ClassCast { .. })
        ));
    }

    #[test]
    fn test_adapt_signature_rejects_impossible_casts() {
        let handle = MethodHandle::identity(Type::int());
        let err = handle
            .adapt_signature(&Signature::new(Type::int(), vec![Type::string()]))
            .unwrap_err();
        assert!(matches!(err, LinkError::ConversionUnavailable { .. }));
    }

    #[test]
    fn test_adapt_to_void_discards_result() {
        let handle = MethodHandle::identity(Type::int());
        let adapted = handle
            .adapt_signature(&Signature::new(Type::void(), vec![Type::int()]))
            .unwrap();
        assert_eq!(adapted.invoke(&[Value::Int(1)]).unwrap(), Value::Null);
    }
}
