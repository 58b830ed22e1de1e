//! Overload resolution for dynamic method calls.
//!
//! This module selects which target of a named method a call site invokes.
//! Selection happens at link time from the call site's declared types when
//! those suffice, and otherwise at invocation time from the runtime classes
//! of the arguments.
//!
//! # Algorithm Overview
//!
//! 1. **Filter applicable**: Find candidates applicable by subtyping, then
//!    by method invocation conversion, then by variable arity; the first
//!    non-empty phase counts
//! 2. **Order by specificity**: Keep the maximally specific candidates of
//!    that phase, comparing conversions from the declared argument types
//! 3. **Add runtime candidates**: Add candidates that are not statically
//!    applicable but might be for some runtime arguments
//! 4. **Select**: No candidate fails the link, one candidate links directly
//!    (guarded when some argument only converts at runtime), several defer
//!    to a runtime selector memoized by argument classes
//!
//! # Module Structure
//!
//! - [`applicability`] - Link-time applicability phases
//! - [`resolver`] - Specificity ordering and runtime resolution
//! - [`result`] - Dispatch result types and errors
//! - [`simple`] - Single-target methods and variable-arity adaptation
//! - [`overloaded`] - Overload sets and the runtime selector
//! - [`method`] - The dynamic method front end

mod applicability;
mod method;
mod overloaded;
mod resolver;
mod result;
mod simple;


pub use applicability::{is_applicable_dynamically, Applicability};

pub use method::DynamicMethod;

pub use overloaded::{OverloadSelector, OverloadedDynamicMethod};

pub use resolver::{DispatchResolver, RuntimePhase};

pub use result::{AmbiguityError, DispatchResult, NoMatchError};

pub use simple::SimpleDynamicMethod;
