//! Guarded invocations.
//!
//! A call site binding is a tree of [`Invocation`] nodes: direct targets,
//! guard tests choosing between two subtrees, and deferred nodes whose
//! target is chosen per invocation by a [`RuntimeSelector`]. The tree is
//! evaluated by a loop, so deep chains of guards do not grow the stack.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{InvokeError, InvokeResult, LinkError, LinkResult};
use crate::handle::MethodHandle;
use crate::signature::Signature;
use crate::types::Type;
use crate::value::Value;

/// Body of a guard.
pub type GuardFn = dyn Fn(&[Value]) -> InvokeResult<bool> + Send + Sync;

/// A predicate over the leading arguments of a call.
#[derive(Clone)]
pub struct Guard {
    description: Arc<str>,
    arity: usize,
    test: Arc<GuardFn>,
}

impl Guard {
    /// Create a guard consulting the first `arity` arguments.
    pub fn new<F>(description: impl Into<Arc<str>>, arity: usize, test: F) -> Self
    where
        F: Fn(&[Value]) -> InvokeResult<bool> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            arity,
            test: Arc::new(test),
        }
    }

    /// Passes if the runtime class of argument `pos` is exactly `ty`.
    pub fn is_of_class(pos: usize, ty: Type) -> Self {
        Self::new(format!("arg{pos} is exactly {ty}"), pos + 1, move |args| {
            Ok(!args[pos].is_null() && args[pos].runtime_type() == ty)
        })
    }

    /// Passes if argument `pos` is a non-null instance of `ty`.
    pub fn is_instance(pos: usize, ty: Type) -> Self {
        Self::new(format!("arg{pos} instanceof {ty}"), pos + 1, move |args| {
            Ok(args[pos].is_instance_of(&ty))
        })
    }

    /// Passes if argument `pos` is an array of any element type.
    pub fn is_array(pos: usize) -> Self {
        Self::new(format!("arg{pos} is an array"), pos + 1, move |args| {
            Ok(matches!(args[pos], Value::Array(_)))
        })
    }

    /// Passes if argument `pos` is `Null`.
    pub fn is_null(pos: usize) -> Self {
        Self::new(format!("arg{pos} is null"), pos + 1, move |args| Ok(args[pos].is_null()))
    }

    /// Passes if both guards pass. `other` is not evaluated if `self` fails.
    pub fn and(self, other: Guard) -> Guard {
        let description = format!("{} && {}", self.description, other.description);
        let arity = self.arity.max(other.arity);
        Guard::new(description, arity, move |args| {
            Ok(self.test(args)? && other.test(args)?)
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of leading arguments the guard consults.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Evaluate the guard. Failures are reported as
    /// [`InvokeError::GuardEvaluation`].
    pub fn test(&self, args: &[Value]) -> InvokeResult<bool> {
        let wrap = |source: InvokeError| InvokeError::GuardEvaluation {
            guard: self.description.to_string(),
            source: Box::new(source),
        };
        if args.len() < self.arity {
            return Err(wrap(InvokeError::ArityMismatch {
                expected: self.arity,
                found: args.len(),
            }));
        }
        (self.test)(&args[..self.arity]).map_err(|err| match err {
            nested @ InvokeError::GuardEvaluation { .. } => nested,
            other => wrap(other),
        })
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guard({})", self.description)
    }
}

/// Chooses a target for each invocation of a deferred node.
pub trait RuntimeSelector: Send + Sync + fmt::Debug {
    /// Signature every selected invocation conforms to.
    fn signature(&self) -> &Signature;

    fn select(&self, args: &[Value]) -> InvokeResult<Arc<Invocation>>;

    /// Number of distinct argument shapes resolved so far.
    fn resolved_shapes(&self) -> usize {
        0
    }
}

/// An invocation tree.
#[derive(Clone)]
pub enum Invocation {
    /// Call a target directly.
    Direct(MethodHandle),
    /// Test `guard`, then continue with `on_pass` or `on_fail`.
    Guarded {
        guard: Guard,
        on_pass: Arc<Invocation>,
        on_fail: Arc<Invocation>,
    },
    /// Select the target from the runtime arguments.
    Deferred(Arc<dyn RuntimeSelector>),
}

impl Invocation {
    /// Combine two invocations of the same signature under a guard.
    pub fn guard_with_test(guard: Guard, on_pass: Invocation, on_fail: Invocation) -> LinkResult<Self> {
        if on_pass.signature() != on_fail.signature() {
            return Err(LinkError::SignatureMismatch {
                expected: on_pass.signature().clone(),
                found: on_fail.signature().clone(),
            });
        }
        if guard.arity() > on_pass.signature().arity() {
            return Err(LinkError::SignatureMismatch {
                expected: on_pass.signature().clone(),
                found: Signature::generic(guard.arity()),
            });
        }
        Ok(Invocation::Guarded {
            guard,
            on_pass: Arc::new(on_pass),
            on_fail: Arc::new(on_fail),
        })
    }

    pub fn signature(&self) -> &Signature {
        let mut node = self;
        loop {
            match node {
                Invocation::Direct(handle) => return handle.signature(),
                Invocation::Guarded { on_pass, .. } => node = on_pass,
                Invocation::Deferred(selector) => return selector.signature(),
            }
        }
    }

    /// Evaluate the tree against `args`.
    pub fn invoke(&self, args: &[Value]) -> InvokeResult<Value> {
        let mut node = self;
        loop {
            match node {
                Invocation::Direct(handle) => return handle.invoke(args),
                Invocation::Guarded {
                    guard,
                    on_pass,
                    on_fail,
                } => {
                    node = if guard.test(args)? { on_pass } else { on_fail };
                }
                Invocation::Deferred(selector) => return selector.select(args)?.invoke(args),
            }
        }
    }

    /// Number of guard tests on the fail path from the root.
    pub fn guard_depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self;
        while let Invocation::Guarded { on_fail, .. } = node {
            depth += 1;
            node = on_fail;
        }
        depth
    }
}

impl From<MethodHandle> for Invocation {
    fn from(handle: MethodHandle) -> Self {
        Invocation::Direct(handle)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Direct(handle) => write!(f, "{handle:?}"),
            Invocation::Guarded {
                guard,
                on_pass,
                on_fail,
            } => f
                .debug_struct("Guarded")
                .field("guard", guard)
                .field("on_pass", on_pass)
                .field("on_fail", on_fail)
                .finish(),
            Invocation::Deferred(selector) => write!(f, "Deferred({selector:?})"),
        }
    }
}

/// A one-shot invalidation flag shared between bindings.
///
/// Once invalidated, every binding carrying the switch point fails its test
/// and the owning call sites relink on their next invocation.
#[derive(Debug, Default)]
pub struct SwitchPoint {
    invalidated: AtomicBool,
}

impl SwitchPoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    pub fn is_valid(&self) -> bool {
        !self.invalidated.load(Ordering::Acquire)
    }
}

/// A linker's answer for one call: an invocation, the guard under which it
/// stays valid, and an optional switch point.
#[derive(Debug, Clone)]
pub struct GuardedInvocation {
    invocation: Invocation,
    guard: Option<Guard>,
    switch_point: Option<Arc<SwitchPoint>>,
}

impl GuardedInvocation {
    pub fn new(invocation: impl Into<Invocation>, guard: Option<Guard>) -> Self {
        Self {
            invocation: invocation.into(),
            guard,
            switch_point: None,
        }
    }

    /// An invocation valid for every call.
    pub fn unconditional(invocation: impl Into<Invocation>) -> Self {
        Self::new(invocation, None)
    }

    pub fn with_switch_point(mut self, switch_point: Arc<SwitchPoint>) -> Self {
        self.switch_point = Some(switch_point);
        self
    }

    /// Conjoin `guard` with the existing guard, evaluating the existing one
    /// first.
    pub fn with_additional_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(match self.guard.take() {
            Some(existing) => existing.and(guard),
            None => guard,
        });
        self
    }

    pub fn replace_invocation(mut self, invocation: impl Into<Invocation>) -> Self {
        self.invocation = invocation.into();
        self
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }

    pub fn switch_point(&self) -> Option<&Arc<SwitchPoint>> {
        self.switch_point.as_ref()
    }

    /// Check if the invocation is valid for all arguments forever.
    pub fn is_unconditional(&self) -> bool {
        self.guard.is_none() && self.switch_point.is_none()
    }

    pub fn has_been_invalidated(&self) -> bool {
        self.switch_point.as_ref().is_some_and(|sp| !sp.is_valid())
    }

    /// Check if the invocation may handle `args`.
    pub fn test(&self, args: &[Value]) -> InvokeResult<bool> {
        if self.has_been_invalidated() {
            return Ok(false);
        }
        match &self.guard {
            Some(guard) => guard.test(args),
            None => Ok(true),
        }
    }

    /// Fold the guard into the invocation: if the guard passes run this
    /// invocation, otherwise run `fallback`. The switch point is dropped.
    pub fn compose(self, fallback: Invocation) -> LinkResult<Invocation> {
        match self.guard {
            Some(guard) => Invocation::guard_with_test(guard, self.invocation, fallback),
            None => Ok(self.invocation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveTy;
    use pretty_assertions::assert_eq;

    fn constant(value: i32) -> Invocation {
        Invocation::Direct(MethodHandle::constant(Signature::generic(1), Value::Int(value)))
    }

    #[test]
    fn test_guard_with_test_picks_branch() {
        let guard = Guard::is_instance(0, Type::string());
        let inv = Invocation::guard_with_test(guard, constant(1), constant(2)).unwrap();
        assert_eq!(inv.invoke(&[Value::str("s")]).unwrap(), Value::Int(1));
        assert_eq!(inv.invoke(&[Value::Int(0)]).unwrap(), Value::Int(2));
        assert_eq!(inv.invoke(&[Value::Null]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_guard_with_test_requires_matching_signatures() {
        let other = Invocation::Direct(MethodHandle::constant(Signature::generic(2), Value::Null));
        let err = Invocation::guard_with_test(Guard::is_null(0), constant(1), other).unwrap_err();
        assert!(matches!(err, LinkError::SignatureMismatch { .. }));
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut inv = constant(-1);
        for i in 0..2_000 {
            let guard = Guard::new("never", 1, |_| Ok(false));
            inv = Invocation::guard_with_test(guard, constant(i), inv).unwrap();
        }
        assert_eq!(inv.guard_depth(), 2_000);
        assert_eq!(inv.invoke(&[Value::Null]).unwrap(), Value::Int(-1));
    }

    #[test]
    fn test_guard_errors_are_wrapped() {
        let guard = Guard::new("boom", 1, |_| Err(InvokeError::Host("broken".into())));
        let err = guard.test(&[Value::Null]).unwrap_err();
        assert!(matches!(err, InvokeError::GuardEvaluation { ref guard, .. } if guard == "boom"));
    }

    #[test]
    fn test_exact_class_guard() {
        let guard = Guard::is_of_class(0, Type::boxed(PrimitiveTy::Int));
        assert!(guard.test(&[Value::Int(1)]).unwrap());
        assert!(!guard.test(&[Value::Long(1)]).unwrap());
        assert!(!guard.test(&[Value::Null]).unwrap());
    }

    #[test]
    fn test_switch_point_invalidates() {
        let sp = SwitchPoint::new();
        let gi = GuardedInvocation::unconditional(constant(1)).with_switch_point(sp.clone());
        assert!(gi.test(&[Value::Null]).unwrap());
        sp.invalidate();
        assert!(!gi.test(&[Value::Null]).unwrap());
    }

    #[test]
    fn test_compose_without_guard_ignores_fallback() {
        let gi = GuardedInvocation::unconditional(constant(1));
        let inv = gi.compose(constant(2)).unwrap();
        assert_eq!(inv.guard_depth(), 0);
        assert_eq!(inv.invoke(&[Value::Null]).unwrap(), Value::Int(1));
    }
}
