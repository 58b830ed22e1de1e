//! Error types for linking and invocation.
//!
//! Linking errors happen while a call site looks for a new binding. They are
//! returned to the caller of the call site and leave the site's previous
//! binding untouched. Invocation errors happen while running a bound target
//! or evaluating a guard, and are never a reason to relink.

use thiserror::Error;

use crate::signature::Signature;
use crate::types::Type;

/// Failure to produce a binding for a call site.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    #[error("no linker can link `{operation}` {signature} for argument types ({arg_types})")]
    NoInvocation {
        operation: String,
        signature: Signature,
        arg_types: String,
    },

    #[error("no conversion from {from} to {to}")]
    ConversionUnavailable { from: Type, to: Type },

    #[error("signature mismatch: expected {expected}, found {found}")]
    SignatureMismatch { expected: Signature, found: Signature },

    #[error("guard `{guard}` of the new binding for `{operation}` rejects the arguments it was linked for")]
    GuardRejectsArguments { operation: String, guard: String },
}

/// Failure while invoking a bound target.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("cannot cast {from} to {to}")]
    ClassCast { from: Type, to: Type },

    #[error("cannot convert null to {to}")]
    NullToPrimitive { to: Type },

    #[error("arity mismatch: expected {expected} arguments, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("no applicable overload of `{method}` for argument types ({arg_types})")]
    NoApplicableMethod { method: String, arg_types: String },

    #[error("ambiguous overloads of `{method}` for argument types ({arg_types}): {candidates}")]
    AmbiguousMethod {
        method: String,
        arg_types: String,
        candidates: String,
    },

    #[error("guard `{guard}` failed: {source}")]
    GuardEvaluation {
        guard: String,
        #[source]
        source: Box<InvokeError>,
    },

    #[error("late linking failed: {0}")]
    Link(#[from] LinkError),

    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("{0}")]
    Host(String),
}

/// Any failure observed by the caller of a call site.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

pub type LinkResult<T> = Result<T, LinkError>;
pub type InvokeResult<T> = Result<T, InvokeError>;
pub type CallResult<T> = Result<T, CallError>;

/// Render a list of types for diagnostics.
pub(crate) fn type_list<'a>(types: impl IntoIterator<Item = &'a Type>) -> String {
    types
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
