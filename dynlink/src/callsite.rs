//! Call sites and the relinking protocol.
//!
//! A call site starts unlinked. Each invocation tests the installed
//! bindings' guards against the arguments; if none passes, the site asks its
//! linker for a new binding, installs it, and invokes it. Bindings are
//! swapped atomically: concurrent invocations observe either the old or the
//! new binding set, never a partial one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::RelinkPolicy;
use crate::descriptor::CallSiteDescriptor;
use crate::error::{CallResult, InvokeError, LinkError};
use crate::invocation::GuardedInvocation;
use crate::linker::DynamicLinker;
use crate::value::Value;

type Bindings = Arc<[Arc<GuardedInvocation>]>;

/// A relinkable call site.
pub struct CallSite {
    descriptor: CallSiteDescriptor,
    linker: Arc<DynamicLinker>,
    bindings: RwLock<Bindings>,
    relinks: AtomicU64,
}

impl CallSite {
    pub fn new(descriptor: CallSiteDescriptor, linker: Arc<DynamicLinker>) -> Self {
        Self {
            descriptor,
            linker,
            bindings: RwLock::new(Arc::from(Vec::new())),
            relinks: AtomicU64::new(0),
        }
    }

    pub fn descriptor(&self) -> &CallSiteDescriptor {
        &self.descriptor
    }

    /// Number of bindings installed so far, the first link included.
    pub fn relink_count(&self) -> u64 {
        self.relinks.load(Ordering::Acquire)
    }

    pub fn is_linked(&self) -> bool {
        !self.bindings.read().is_empty()
    }

    /// The most recently installed binding.
    pub fn current_binding(&self) -> Option<Arc<GuardedInvocation>> {
        self.bindings.read().first().cloned()
    }

    /// Number of bindings a chained site currently keeps.
    pub fn binding_count(&self) -> usize {
        self.bindings.read().len()
    }

    fn is_unstable(&self) -> bool {
        let threshold = self.linker.config().unstable_relink_threshold;
        threshold > 0 && self.relink_count() >= threshold
    }

    /// Invoke the site with `args`, relinking if no binding accepts them.
    pub fn invoke(&self, args: &[Value]) -> CallResult<Value> {
        let expected = self.descriptor.signature().arity();
        if args.len() != expected {
            return Err(InvokeError::ArityMismatch {
                expected,
                found: args.len(),
            }
            .into());
        }
        let snapshot = self.bindings.read().clone();
        for binding in snapshot.iter() {
            if binding.test(args)? {
                return Ok(binding.invocation().invoke(args)?);
            }
        }
        let binding = self.relink(args)?;
        Ok(binding.invocation().invoke(args)?)
    }

    /// Link a fresh binding for `args` and install it.
    ///
    /// On failure the installed bindings are left untouched.
    pub fn relink(&self, args: &[Value]) -> CallResult<Arc<GuardedInvocation>> {
        let unstable = self.is_unstable();
        let guarded = self.linker.link(&self.descriptor, args, unstable)?;
        if !guarded.test(args)? {
            return Err(LinkError::GuardRejectsArguments {
                operation: self.descriptor.name().to_string(),
                guard: guarded
                    .guard()
                    .map_or_else(|| "switch point".to_string(), |g| g.description().to_string()),
            }
            .into());
        }
        let guarded = Arc::new(guarded);
        {
            let mut bindings = self.bindings.write();
            let next: Bindings = match self.linker.config().relink_policy {
                RelinkPolicy::Monomorphic => Arc::from(vec![guarded.clone()]),
                RelinkPolicy::Chained => {
                    let keep = self.linker.config().max_chain_length.saturating_sub(1);
                    std::iter::once(guarded.clone())
                        .chain(
                            bindings
                                .iter()
                                .filter(|b| !b.has_been_invalidated())
                                .take(keep)
                                .cloned(),
                        )
                        .collect()
                }
            };
            *bindings = next;
        }
        let count = self.relinks.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(
            operation = self.descriptor.name(),
            relinks = count,
            unstable,
            "installed binding"
        );
        Ok(guarded)
    }
}

impl std::fmt::Debug for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSite")
            .field("descriptor", &self.descriptor)
            .field("relinks", &self.relink_count())
            .field("bindings", &self.binding_count())
            .finish()
    }
}
