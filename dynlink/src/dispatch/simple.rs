//! Linking a single, non-overloaded method.

use std::sync::Arc;

use crate::convert::Convertibility;
use crate::error::LinkResult;
use crate::handle::MethodHandle;
use crate::invocation::{Guard, Invocation};
use crate::services::LinkerServices;
use crate::signature::Signature;
use crate::value::Value;

/// A method with a single target. Variable-arity targets are adapted to the
/// call site's argument count by packing trailing arguments.
#[derive(Debug, Clone)]
pub struct SimpleDynamicMethod {
    name: Arc<str>,
    target: MethodHandle,
}

impl SimpleDynamicMethod {
    pub fn new(target: MethodHandle) -> Self {
        Self {
            name: Arc::from(target.name()),
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &MethodHandle {
        &self.target
    }

    /// Produce an invocation of the target conforming to `call_site`, or
    /// `None` if the argument count cannot match.
    ///
    /// For a variable-arity target:
    /// - as many arguments as fixed parameters: an empty array is passed;
    /// - exactly one trailing argument: it is passed as the array when its
    ///   declared type already is one, packed when it can never be one, and
    ///   decided per call by an `instanceof` guard otherwise;
    /// - more trailing arguments: they are packed.
    pub fn get_invocation(&self, call_site: &Signature, services: &LinkerServices) -> LinkResult<Option<Invocation>> {
        let converting = |handle: &MethodHandle| -> LinkResult<Invocation> {
            Ok(Invocation::Direct(services.as_type_handle(handle, call_site)?))
        };
        let target = &self.target;
        let params_len = target.arity();
        let args_len = call_site.arity();
        let varargs = target.is_varargs();
        let fixed = target.as_fixed_arity();
        let fix_len = if varargs { params_len - 1 } else { params_len };

        if args_len < fix_len {
            return Ok(None);
        }
        if args_len == fix_len {
            let matched = if varargs {
                let element = target.signature().param(fix_len).element_type().cloned();
                let Some(element) = element else {
                    return Ok(None);
                };
                fixed.insert_arguments(fix_len, vec![Value::array(element, Vec::new())])
            } else {
                fixed
            };
            return converting(&matched).map(Some);
        }
        if !varargs {
            return Ok(None);
        }

        let Some(collector) = fixed.as_collector(args_len - fix_len) else {
            return Ok(None);
        };
        if args_len != params_len {
            return converting(&collector).map(Some);
        }

        let array_ty = target.signature().param(fix_len).clone();
        let last = call_site.param(fix_len);
        if array_ty.is_assignable_from(last) {
            return converting(&fixed).map(Some);
        }
        if services.conversion_rank(last, &array_ty) == Convertibility::Impossible {
            return converting(&collector).map(Some);
        }
        let guard = Guard::is_instance(fix_len, array_ty);
        Invocation::guard_with_test(guard, converting(&fixed)?, converting(&collector)?).map(Some)
    }
}
