//! Services handed to linkers: signature adaptation and conversion queries.

use std::sync::Arc;

use crate::convert::{Comparison, ConversionRegistry, Convertibility};
use crate::error::{LinkError, LinkResult};
use crate::handle::MethodHandle;
use crate::invocation::{GuardedInvocation, Invocation};
use crate::signature::Signature;
use crate::types::Type;

/// Conversion-aware helpers shared by all linkers of a dynamic linker.
/// Cheap to clone.
#[derive(Debug, Clone)]
pub struct LinkerServices {
    registry: Arc<ConversionRegistry>,
}

impl LinkerServices {
    pub fn new(registry: ConversionRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ConversionRegistry {
        &self.registry
    }

    pub fn can_convert(&self, from: &Type, to: &Type) -> bool {
        self.registry.can_convert(from, to)
    }

    pub fn compare_conversion(&self, source: &Type, t1: &Type, t2: &Type) -> Comparison {
        self.registry.compare_conversion(source, t1, t2)
    }

    pub fn conversion_rank(&self, from: &Type, to: &Type) -> Convertibility {
        self.registry.rank(from, to)
    }

    pub fn type_converter(&self, from: &Type, to: &Type) -> Option<Invocation> {
        self.registry.type_converter(from, to)
    }

    /// Adapt a handle to `signature`.
    ///
    /// Parameters and the return value the host cannot convert natively are
    /// filtered through contributed converters; everything else gets a
    /// checked cast.
    pub fn as_type_handle(&self, handle: &MethodHandle, signature: &Signature) -> LinkResult<MethodHandle> {
        if handle.signature() == signature {
            return Ok(handle.clone());
        }
        if handle.arity() != signature.arity() {
            return Err(LinkError::SignatureMismatch {
                expected: signature.clone(),
                found: handle.signature().clone(),
            });
        }
        let mut adapted = handle.clone();
        for (pos, from) in signature.params().iter().enumerate() {
            let to = adapted.signature().param(pos).clone();
            if from == &to || self.registry.can_auto_convert(from, &to) {
                continue;
            }
            if let Some(converter) = self.registry.type_converter(from, &to) {
                adapted = adapted.filter_argument(pos, converter);
            }
        }
        let from = adapted.signature().return_type().clone();
        let to = signature.return_type();
        if &from != to && !to.is_void() && !self.registry.can_auto_convert(&from, to) {
            if let Some(converter) = self.registry.type_converter(&from, to) {
                adapted = adapted.filter_return(converter);
            }
        }
        adapted.adapt_signature(signature)
    }

    /// Adapt every target of an invocation tree to `signature`. Guards keep
    /// seeing the unconverted arguments.
    pub fn as_type(&self, invocation: &Invocation, signature: &Signature) -> LinkResult<Invocation> {
        if invocation.signature() == signature {
            return Ok(invocation.clone());
        }
        match invocation {
            Invocation::Direct(handle) => Ok(Invocation::Direct(self.as_type_handle(handle, signature)?)),
            Invocation::Guarded {
                guard,
                on_pass,
                on_fail,
            } => Invocation::guard_with_test(
                guard.clone(),
                self.as_type(on_pass, signature)?,
                self.as_type(on_fail, signature)?,
            ),
            Invocation::Deferred(_) => {
                let handle = MethodHandle::from_invocation(invocation.clone());
                Ok(Invocation::Direct(self.as_type_handle(&handle, signature)?))
            }
        }
    }

    /// Adapt a linker's answer to a call site signature.
    pub fn as_type_guarded(&self, guarded: GuardedInvocation, signature: &Signature) -> LinkResult<GuardedInvocation> {
        if let Some(guard) = guarded.guard() {
            if guard.arity() > signature.arity() {
                return Err(LinkError::SignatureMismatch {
                    expected: signature.clone(),
                    found: guarded.invocation().signature().clone(),
                });
            }
        }
        let adapted = self.as_type(guarded.invocation(), signature)?;
        Ok(guarded.replace_invocation(adapted))
    }
}

impl Default for LinkerServices {
    fn default() -> Self {
        Self::new(ConversionRegistry::empty())
    }
}
