//! Type conversion registry.
//!
//! Language runtimes contribute [`TypeConverter`]s for conversions the host
//! type system does not perform by itself, and [`ConversionComparator`]s
//! to break ties between overloads. The registry composes the contributed
//! converters for each `(from, to)` pair into a single guarded invocation
//! and memoizes the result.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::error::InvokeError;
use crate::handle::MethodHandle;
use crate::invocation::{GuardedInvocation, Invocation};
use crate::signature::Signature;
use crate::types::{self, Type};

/// Outcome of comparing two conversion targets for the same source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    TypeOneBetter,
    TypeTwoBetter,
    Indeterminate,
}

impl Comparison {
    pub fn reverse(self) -> Self {
        match self {
            Comparison::TypeOneBetter => Comparison::TypeTwoBetter,
            Comparison::TypeTwoBetter => Comparison::TypeOneBetter,
            Comparison::Indeterminate => Comparison::Indeterminate,
        }
    }
}

/// How well a value of one type fits a slot of another, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Convertibility {
    /// Same type.
    Identity,
    /// Subtyping, widening, boxing or unboxing. Always succeeds.
    Widening,
    /// May succeed depending on the runtime value.
    Runtime,
    /// Never succeeds.
    Impossible,
}

/// Produces conversions between types.
pub trait TypeConverter: Send + Sync {
    /// Return an invocation of signature `(source)target` converting values,
    /// possibly under a guard, or `None` if this converter cannot help.
    fn convert_to_type(&self, source: &Type, target: &Type) -> Option<GuardedInvocation>;
}

impl<F> TypeConverter for F
where
    F: Fn(&Type, &Type) -> Option<GuardedInvocation> + Send + Sync,
{
    fn convert_to_type(&self, source: &Type, target: &Type) -> Option<GuardedInvocation> {
        self(source, target)
    }
}

/// Breaks ties between two conversion targets.
pub trait ConversionComparator: Send + Sync {
    fn compare_conversion(&self, source: &Type, t1: &Type, t2: &Type) -> Comparison;
}

#[derive(Debug)]
struct Conversion {
    /// At least one converter contributed.
    contributed: bool,
    invocation: Invocation,
}

/// Composes and caches conversions.
pub struct ConversionRegistry {
    converters: Vec<Arc<dyn TypeConverter>>,
    comparators: Vec<Arc<dyn ConversionComparator>>,
    cache: RwLock<FxHashMap<(Type, Type), Arc<Conversion>>>,
}

impl ConversionRegistry {
    pub fn new(
        converters: Vec<Arc<dyn TypeConverter>>,
        comparators: Vec<Arc<dyn ConversionComparator>>,
    ) -> Self {
        Self {
            converters,
            comparators,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Conversions the host performs without help.
    pub fn can_auto_convert(&self, from: &Type, to: &Type) -> bool {
        types::is_method_invocation_convertible(from, to)
    }

    /// Check if `from` converts to `to`, natively or through a converter.
    pub fn can_convert(&self, from: &Type, to: &Type) -> bool {
        self.can_auto_convert(from, to) || self.conversion(from, to).contributed
    }

    /// The composed converter for `(from, to)`, if any converter contributed.
    pub fn type_converter(&self, from: &Type, to: &Type) -> Option<Invocation> {
        let conversion = self.conversion(from, to);
        conversion.contributed.then(|| conversion.invocation.clone())
    }

    pub fn rank(&self, from: &Type, to: &Type) -> Convertibility {
        if from == to {
            Convertibility::Identity
        } else if self.can_auto_convert(from, to) {
            Convertibility::Widening
        } else if types::is_potentially_convertible(from, to) || self.conversion(from, to).contributed {
            Convertibility::Runtime
        } else {
            Convertibility::Impossible
        }
    }

    /// Decide which of `t1` and `t2` is the better target for `source`.
    pub fn compare_conversion(&self, source: &Type, t1: &Type, t2: &Type) -> Comparison {
        for comparator in &self.comparators {
            let result = comparator.compare_conversion(source, t1, t2);
            if result != Comparison::Indeterminate {
                return result;
            }
        }
        let r1 = self.rank(source, t1);
        let r2 = self.rank(source, t2);
        match r1.cmp(&r2) {
            std::cmp::Ordering::Less => Comparison::TypeOneBetter,
            std::cmp::Ordering::Greater => Comparison::TypeTwoBetter,
            std::cmp::Ordering::Equal => Comparison::Indeterminate,
        }
    }

    fn conversion(&self, from: &Type, to: &Type) -> Arc<Conversion> {
        let key = (from.clone(), to.clone());
        if let Some(conversion) = self.cache.read().get(&key) {
            return conversion.clone();
        }
        let built = Arc::new(self.build_conversion(from, to));
        self.cache.write().entry(key).or_insert(built).clone()
    }

    /// Converters are folded in reverse registration order, so the first
    /// registered converter is tested first.
    fn build_conversion(&self, from: &Type, to: &Type) -> Conversion {
        let signature = Signature::new(to.clone(), vec![from.clone()]);
        let mut chain = Invocation::Direct(basic_conversion(from, to, &signature));
        let mut contributed = false;
        for converter in self.converters.iter().rev() {
            let Some(candidate) = converter.convert_to_type(from, to) else {
                continue;
            };
            if candidate.invocation().signature() != &signature {
                warn!(
                    %from, %to,
                    found = %candidate.invocation().signature(),
                    "ignoring converter with mismatched signature"
                );
                continue;
            }
            match candidate.compose(chain.clone()) {
                Ok(composed) => {
                    chain = composed;
                    contributed = true;
                }
                Err(err) => warn!(%from, %to, error = %err, "ignoring converter"),
            }
        }
        trace!(%from, %to, contributed, "built conversion");
        Conversion {
            contributed,
            invocation: chain,
        }
    }
}

impl std::fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionRegistry")
            .field("converters", &self.converters.len())
            .field("comparators", &self.comparators.len())
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

/// The conversion used when no converter applies: a checked cast if one is
/// well-formed, a failing handle otherwise.
fn basic_conversion(from: &Type, to: &Type, signature: &Signature) -> MethodHandle {
    if types::is_castable(from, to) {
        let target = to.clone();
        MethodHandle::new("cast", signature.clone(), move |args| args[0].convert_to(&target))
    } else {
        let target = to.clone();
        MethodHandle::throwing("cast", signature.clone(), move |args| InvokeError::ClassCast {
            from: args[0].runtime_type(),
            to: target.clone(),
        })
    }
}
