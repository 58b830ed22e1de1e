//! Specificity ordering and runtime overload resolution.

use crate::convert::Comparison;
use crate::handle::MethodHandle;
use crate::services::LinkerServices;
use crate::signature::Signature;
use crate::types::{self, Type};

use super::result::{AmbiguityError, DispatchResult, NoMatchError};

/// Dispatch resolution context.
pub struct DispatchResolver<'a> {
    services: &'a LinkerServices,
}

impl<'a> DispatchResolver<'a> {
    /// Create a new dispatch resolver.
    pub fn new(services: &'a LinkerServices) -> Self {
        Self { services }
    }

    /// Resolve a method call against concrete runtime argument types.
    ///
    /// `arg_types` includes the receiver's type at position 0. With
    /// `varargs`, candidates are matched as variable-arity methods.
    /// Fixed-arity candidates go through the [`RuntimePhase`]s in order
    /// and only the first phase with an applicable candidate is ranked.
    pub fn resolve(
        &self,
        method_name: &str,
        arg_types: &[Type],
        candidates: &[MethodHandle],
        varargs: bool,
    ) -> DispatchResult {
        let phases: &[RuntimePhase] = if varargs {
            &[RuntimePhase::Converted]
        } else {
            &RuntimePhase::FIXED_ARITY
        };

        // Step 1: Filter to the applicable methods of the strictest phase
        let applicable: Vec<MethodHandle> = phases
            .iter()
            .map(|&phase| {
                candidates
                    .iter()
                    .filter(|m| self.is_applicable_in(phase, m, arg_types, varargs))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .find(|applicable| !applicable.is_empty())
            .unwrap_or_default();

        // Step 2: Handle no matches
        if applicable.is_empty() {
            return DispatchResult::NoMatch(NoMatchError {
                method_name: method_name.to_string(),
                arg_types: arg_types.to_vec(),
                candidates: candidates.to_vec(),
            });
        }

        // Step 3: Find maximally specific methods
        let mut maximal: Vec<MethodHandle> = self
            .find_maximal(&applicable, varargs, Some(arg_types))
            .into_iter()
            .map(|i| applicable[i].clone())
            .collect();

        // Step 4: Check for unique winner
        if maximal.len() == 1 {
            if let Some(winner) = maximal.pop() {
                return DispatchResult::Resolved(winner);
            }
        }

        // Step 5: Ambiguity error
        DispatchResult::Ambiguous(AmbiguityError {
            method_name: method_name.to_string(),
            arg_types: arg_types.to_vec(),
            candidates: maximal,
        })
    }

    /// Check if a method accepts arguments of the given runtime types through
    /// any conversion the services know.
    pub fn is_applicable(&self, method: &MethodHandle, arg_types: &[Type], varargs: bool) -> bool {
        self.is_applicable_in(RuntimePhase::Converted, method, arg_types, varargs)
    }

    fn is_applicable_in(&self, phase: RuntimePhase, method: &MethodHandle, arg_types: &[Type], varargs: bool) -> bool {
        let params = method.signature().params();
        let fixed = params.len() - usize::from(varargs);
        if varargs {
            if arg_types.len() < fixed {
                return false;
            }
        } else if arg_types.len() != fixed {
            return false;
        }
        // The receiver does not take part in overload selection.
        if !(1..fixed).all(|i| phase.converts(self.services, &arg_types[i], &params[i])) {
            return false;
        }
        if !varargs {
            return true;
        }
        let Some(element) = params[fixed].element_type() else {
            return false;
        };
        arg_types[fixed..].iter().all(|arg| phase.converts(self.services, arg, element))
    }

    /// Find the maximally specific methods, as indices into `methods`.
    ///
    /// A method is dropped once some other method is strictly more specific
    /// than it. The order of the survivors follows `methods`.
    pub fn find_maximal(&self, methods: &[MethodHandle], varargs: bool, arg_types: Option<&[Type]>) -> Vec<usize> {
        if methods.len() < 2 {
            return (0..methods.len()).collect();
        }
        let mut maximal: Vec<usize> = Vec::new();
        for (i, m) in methods.iter().enumerate() {
            let mut less_specific = false;
            let mut beaten = Vec::new();
            for &j in &maximal {
                match self.compare_specificity(m.signature(), methods[j].signature(), varargs, arg_types) {
                    Comparison::TypeOneBetter => beaten.push(j),
                    Comparison::TypeTwoBetter => {
                        less_specific = true;
                        break;
                    }
                    Comparison::Indeterminate => {}
                }
            }
            maximal.retain(|j| !beaten.contains(j));
            if !less_specific {
                maximal.push(i);
            }
        }
        maximal
    }

    /// Check if method m1 is more specific than method m2.
    pub fn is_more_specific(&self, m1: &MethodHandle, m2: &MethodHandle, varargs: bool, arg_types: Option<&[Type]>) -> bool {
        self.compare_specificity(m1.signature(), m2.signature(), varargs, arg_types) == Comparison::TypeOneBetter
    }

    /// Compare the specificity of two signatures.
    ///
    /// Returns:
    /// - `TypeOneBetter` if t1 is at least as specific everywhere and
    ///   strictly more specific somewhere
    /// - `TypeTwoBetter` for the converse
    /// - `Indeterminate` if each wins somewhere, or neither does
    pub fn compare_specificity(
        &self,
        t1: &Signature,
        t2: &Signature,
        varargs: bool,
        arg_types: Option<&[Type]>,
    ) -> Comparison {
        let pc1 = t1.arity();
        let pc2 = t2.arity();
        let max = pc1.max(pc2).max(arg_types.map_or(0, <[Type]>::len));
        let mut t1_better = false;
        let mut t2_better = false;
        for i in 1..max {
            let (Some(c1), Some(c2)) = (parameter_type(t1, i, varargs), parameter_type(t2, i, varargs)) else {
                continue;
            };
            if c1 == c2 {
                continue;
            }
            let arg = arg_types.and_then(|types| types.get(i));
            match self.compare_params(c1, c2, arg) {
                Comparison::TypeOneBetter => t1_better = true,
                Comparison::TypeTwoBetter => t2_better = true,
                Comparison::Indeterminate => {}
            }
            if t1_better && t2_better {
                return Comparison::Indeterminate;
            }
        }
        match (t1_better, t2_better) {
            (true, false) => Comparison::TypeOneBetter,
            (false, true) => Comparison::TypeTwoBetter,
            _ => Comparison::Indeterminate,
        }
    }

    fn compare_params(&self, c1: &Type, c2: &Type, arg: Option<&Type>) -> Comparison {
        if let Some(arg) = arg {
            let cmp = self.services.compare_conversion(arg, c1, c2);
            if cmp != Comparison::Indeterminate {
                return cmp;
            }
        }
        if types::is_subtype(c1, c2) {
            Comparison::TypeOneBetter
        } else if types::is_subtype(c2, c1) {
            Comparison::TypeTwoBetter
        } else {
            Comparison::Indeterminate
        }
    }
}

/// Runtime applicability phases, strictest first. They mirror the link-time
/// [`Applicability`](super::applicability::Applicability) phases, with a
/// last phase for conversions contributed to the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePhase {
    /// Every argument class is a subtype of its parameter.
    Subtyping,
    /// Boxing and unboxing are allowed as well.
    MethodInvocationConversion,
    /// Anything the services can convert.
    Converted,
}

impl RuntimePhase {
    pub const FIXED_ARITY: [RuntimePhase; 3] = [
        RuntimePhase::Subtyping,
        RuntimePhase::MethodInvocationConversion,
        RuntimePhase::Converted,
    ];

    fn converts(self, services: &LinkerServices, from: &Type, to: &Type) -> bool {
        if from.is_null() {
            return to.is_reference();
        }
        match self {
            RuntimePhase::Subtyping => types::is_subtype(from, to),
            RuntimePhase::MethodInvocationConversion => types::is_method_invocation_convertible(from, to),
            RuntimePhase::Converted => services.can_convert(from, to),
        }
    }
}

/// Parameter `i` of `sig`; for variable arity, positions at or past the
/// trailing array read its element type.
fn parameter_type(sig: &Signature, i: usize, varargs: bool) -> Option<&Type> {
    let len = sig.arity();
    if varargs && len > 0 && i + 1 >= len {
        let last = sig.param(len - 1);
        return Some(last.element_type().unwrap_or(last));
    }
    sig.params().get(i)
}
