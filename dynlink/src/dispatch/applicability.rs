//! Link-time applicability tests.
//!
//! Applicability against declared call site types runs in three phases,
//! each looser than the last. Parameter 0 is the receiver and never takes
//! part in overload selection.

use crate::handle::MethodHandle;
use crate::services::LinkerServices;
use crate::signature::Signature;
use crate::types::{self, Type};

/// The three applicability phases, strictest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    /// Same arity, every argument a subtype of its parameter.
    Subtyping,
    /// Same arity, every argument convertible by method invocation
    /// conversion (adds boxing and unboxing).
    MethodInvocationConversion,
    /// Variable arity: the fixed prefix and every trailing argument
    /// convertible by method invocation conversion.
    VariableArity,
}

impl Applicability {
    pub const PHASES: [Applicability; 3] = [
        Applicability::Subtyping,
        Applicability::MethodInvocationConversion,
        Applicability::VariableArity,
    ];

    pub fn is_variable_arity(self) -> bool {
        self == Applicability::VariableArity
    }

    /// Check if `method` is applicable to `call_site` in this phase.
    pub fn is_applicable(self, method: &MethodHandle, call_site: &Signature) -> bool {
        let params = method.signature().params();
        match self {
            Applicability::Subtyping => fixed_arity_applicable(params, call_site, types::is_subtype),
            Applicability::MethodInvocationConversion => {
                fixed_arity_applicable(params, call_site, types::is_method_invocation_convertible)
            }
            Applicability::VariableArity => {
                if !method.is_varargs() {
                    return false;
                }
                let fixed = params.len() - 1;
                if fixed > call_site.arity() {
                    return false;
                }
                let Some(element) = params[fixed].element_type() else {
                    return false;
                };
                let prefix_ok = (1..fixed)
                    .all(|i| types::is_method_invocation_convertible(call_site.param(i), &params[i]));
                prefix_ok
                    && call_site.params()[fixed..]
                        .iter()
                        .all(|arg| types::is_method_invocation_convertible(arg, element))
            }
        }
    }

    /// Candidates applicable in this phase.
    pub fn filter<'m>(self, methods: &'m [MethodHandle], call_site: &Signature) -> Vec<&'m MethodHandle> {
        methods
            .iter()
            .filter(|m| self.is_applicable(m, call_site))
            .collect()
    }
}

fn fixed_arity_applicable(params: &[Type], call_site: &Signature, convertible: fn(&Type, &Type) -> bool) -> bool {
    params.len() == call_site.arity()
        && (1..params.len()).all(|i| convertible(call_site.param(i), &params[i]))
}

/// Check if `method` could accept some runtime arguments passed through
/// `call_site`, allowing checked casts and contributed conversions.
pub fn is_applicable_dynamically(services: &LinkerServices, call_site: &Signature, method: &MethodHandle) -> bool {
    let params = method.signature().params();
    let varargs = method.is_varargs();
    let fixed = params.len() - usize::from(varargs);
    let argc = call_site.arity();
    if varargs {
        if argc < fixed {
            return false;
        }
    } else if argc != fixed {
        return false;
    }
    if !(1..fixed).all(|i| convertible_dynamically(services, call_site.param(i), &params[i])) {
        return false;
    }
    if !varargs {
        return true;
    }
    let array = &params[fixed];
    let Some(element) = array.element_type() else {
        return false;
    };
    if argc == fixed + 1 {
        let last = call_site.param(fixed);
        return convertible_dynamically(services, last, array) || convertible_dynamically(services, last, element);
    }
    call_site.params()[fixed..]
        .iter()
        .all(|arg| convertible_dynamically(services, arg, element))
}

fn convertible_dynamically(services: &LinkerServices, from: &Type, to: &Type) -> bool {
    types::is_potentially_convertible(from, to) || services.can_convert(from, to)
}
