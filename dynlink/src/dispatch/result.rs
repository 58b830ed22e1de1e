//! Dispatch result types and errors.

use crate::error::{type_list, InvokeError};
use crate::handle::MethodHandle;
use crate::types::Type;

/// The result of runtime overload resolution.
#[derive(Debug)]
pub enum DispatchResult {
    /// A unique method was found.
    Resolved(MethodHandle),
    /// No applicable methods found.
    NoMatch(NoMatchError),
    /// Multiple methods are ambiguous.
    Ambiguous(AmbiguityError),
}

/// Error when no method matches the arguments.
#[derive(Debug)]
pub struct NoMatchError {
    /// The method name that was called.
    pub method_name: String,
    /// The runtime argument types provided.
    pub arg_types: Vec<Type>,
    /// All candidates that were considered.
    pub candidates: Vec<MethodHandle>,
}

/// Error when multiple methods are ambiguous.
#[derive(Debug)]
pub struct AmbiguityError {
    /// The method name that was called.
    pub method_name: String,
    /// The runtime argument types provided.
    pub arg_types: Vec<Type>,
    /// The ambiguous candidates (all maximal).
    pub candidates: Vec<MethodHandle>,
}

impl NoMatchError {
    pub fn to_invoke_error(&self) -> InvokeError {
        InvokeError::NoApplicableMethod {
            method: self.method_name.clone(),
            arg_types: type_list(&self.arg_types),
        }
    }
}

impl AmbiguityError {
    /// Signatures of the ambiguous candidates, for diagnostics.
    pub fn candidate_signatures(&self) -> String {
        self.candidates
            .iter()
            .map(|m| m.signature().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn to_invoke_error(&self) -> InvokeError {
        InvokeError::AmbiguousMethod {
            method: self.method_name.clone(),
            arg_types: type_list(&self.arg_types),
            candidates: self.candidate_signatures(),
        }
    }
}
