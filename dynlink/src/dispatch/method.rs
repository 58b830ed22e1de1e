use std::sync::Arc;

use crate::error::LinkResult;
use crate::handle::MethodHandle;
use crate::invocation::GuardedInvocation;
use crate::services::LinkerServices;
use crate::signature::Signature;

use super::overloaded::OverloadedDynamicMethod;
use super::simple::SimpleDynamicMethod;

/// A named method as seen by a call site: one target, or an overload set.
#[derive(Debug, Clone)]
pub enum DynamicMethod {
    Simple(SimpleDynamicMethod),
    Overloaded(OverloadedDynamicMethod),
}

impl DynamicMethod {
    /// Build a dynamic method from its candidates. `None` if there are none.
    pub fn new(name: impl Into<Arc<str>>, candidates: Vec<MethodHandle>) -> Option<Self> {
        match candidates.len() {
            0 => None,
            1 => candidates.into_iter().next().map(|m| DynamicMethod::Simple(SimpleDynamicMethod::new(m))),
            _ => {
                let mut overloaded = OverloadedDynamicMethod::new(name);
                for candidate in candidates {
                    overloaded.add_method(candidate);
                }
                Some(DynamicMethod::Overloaded(overloaded))
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DynamicMethod::Simple(simple) => simple.name(),
            DynamicMethod::Overloaded(overloaded) => overloaded.name(),
        }
    }

    pub fn candidates(&self) -> &[MethodHandle] {
        match self {
            DynamicMethod::Simple(simple) => std::slice::from_ref(simple.target()),
            DynamicMethod::Overloaded(overloaded) => overloaded.methods(),
        }
    }

    pub fn is_overloaded(&self) -> bool {
        matches!(self, DynamicMethod::Overloaded(_))
    }

    /// Link the method against a call site signature.
    pub fn get_invocation(
        &self,
        call_site: &Signature,
        services: &LinkerServices,
    ) -> LinkResult<Option<GuardedInvocation>> {
        match self {
            DynamicMethod::Simple(simple) => Ok(simple
                .get_invocation(call_site, services)?
                .map(GuardedInvocation::unconditional)),
            DynamicMethod::Overloaded(overloaded) => overloaded.get_invocation(call_site, services),
        }
    }
}
