//! Host-object linking for dynlink.
//!
//! Host classes describe their properties, fields and methods as
//! [`HostClass`] values. A [`BeansLinker`] built from a [`ClassRegistry`]
//! links property reads and writes, method calls, and length and element
//! access on arrays, collections and maps.
//!
//! # Example
//!
//! ```rust,ignore
//! use dynlink::{CallSiteDescriptor, ClassDef, DynamicLinkerFactory, Signature, Type};
//! use dynlink_beans::{BeansLinker, ClassRegistry, HostClass};
//!
//! let point = HostClass::new(ClassDef::new("Point")).property("x", Type::int());
//! let registry = ClassRegistry::new().with_class(point);
//! let linker = DynamicLinkerFactory::new()
//!     .prioritized_linker(Arc::new(BeansLinker::new(registry)))
//!     .create_linker();
//! let site = linker.call_site(CallSiteDescriptor::new("dyn:getProp:x", Signature::generic(1)));
//! ```

pub mod class;
pub mod container;
pub mod facet;
pub mod linker;

pub use class::{ClassRegistry, HostClass};
pub use facet::{ClassFacet, FacetCache, Member, MemberKind};
pub use linker::BeansLinker;

use dynlink::{InvokeError, Type};
use thiserror::Error;

/// Failures of host-object operations at invocation time.
#[derive(Debug, Error)]
pub enum BeansError {
    #[error("{class} has no property `{name}`")]
    NoSuchProperty { name: String, class: Type },

    #[error("property name must be a String, found {found}")]
    PropertyNameNotString { found: Type },
}

impl From<BeansError> for InvokeError {
    fn from(err: BeansError) -> Self {
        InvokeError::Host(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynlink::ClassDef;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_errors_become_host_failures() {
        let err: InvokeError = BeansError::NoSuchProperty {
            name: "color".into(),
            class: Type::class(ClassDef::new("Car")),
        }
        .into();
        assert_eq!(err.to_string(), InvokeError::Host("Car has no property `color`".into()).to_string());
    }
}
