//! Linker composition.
//!
//! A [`DynamicLinker`] owns an ordered chain of [`GuardingLinker`]s and the
//! [`LinkerServices`] they share. Linking a call asks each linker in turn;
//! the first one that produces a guarded invocation wins, and its answer is
//! adapted to the call site's signature before the call site installs it.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::callsite::CallSite;
use crate::config::LinkerConfig;
use crate::convert::{ConversionComparator, ConversionRegistry, TypeConverter};
use crate::descriptor::CallSiteDescriptor;
use crate::error::{type_list, LinkError, LinkResult};
use crate::invocation::GuardedInvocation;
use crate::services::LinkerServices;
use crate::types::Type;
use crate::value::Value;

/// One request to link a call.
#[derive(Debug, Clone, Copy)]
pub struct LinkRequest<'a> {
    descriptor: &'a CallSiteDescriptor,
    arguments: &'a [Value],
    call_site_unstable: bool,
}

impl<'a> LinkRequest<'a> {
    pub fn new(descriptor: &'a CallSiteDescriptor, arguments: &'a [Value], call_site_unstable: bool) -> Self {
        Self {
            descriptor,
            arguments,
            call_site_unstable,
        }
    }

    pub fn descriptor(&self) -> &'a CallSiteDescriptor {
        self.descriptor
    }

    pub fn arguments(&self) -> &'a [Value] {
        self.arguments
    }

    pub fn receiver(&self) -> Option<&'a Value> {
        self.arguments.first()
    }

    /// The call site relinked often; linkers may prefer a slower but more
    /// general invocation.
    pub fn is_call_site_unstable(&self) -> bool {
        self.call_site_unstable
    }
}

/// A linking strategy.
pub trait GuardingLinker: Send + Sync {
    /// Produce an invocation for the request, or `None` if this linker does
    /// not handle it.
    fn guarded_invocation(
        &self,
        request: &LinkRequest<'_>,
        services: &LinkerServices,
    ) -> LinkResult<Option<GuardedInvocation>>;

    /// Check if receivers of runtime type `ty` may ever be linked by this
    /// linker. Returning `false` lets the chain skip it without asking.
    fn can_link_type(&self, _ty: &Type) -> bool {
        true
    }
}

/// Ordered linkers with receiver-type filtering.
pub struct LinkerChain {
    linkers: Vec<Arc<dyn GuardingLinker>>,
    type_filtering: bool,
    by_receiver: RwLock<FxHashMap<Type, Arc<[usize]>>>,
}

impl LinkerChain {
    pub fn new(linkers: Vec<Arc<dyn GuardingLinker>>, type_filtering: bool) -> Self {
        Self {
            linkers,
            type_filtering,
            by_receiver: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.linkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linkers.is_empty()
    }

    /// Indices of the linkers that may handle `receiver`, in chain order.
    fn candidates(&self, receiver: Option<&Value>) -> Arc<[usize]> {
        let Some(receiver) = receiver.filter(|_| self.type_filtering) else {
            return (0..self.linkers.len()).collect();
        };
        let ty = receiver.runtime_type();
        if let Some(indices) = self.by_receiver.read().get(&ty) {
            return indices.clone();
        }
        let indices: Arc<[usize]> = self
            .linkers
            .iter()
            .enumerate()
            .filter(|(_, linker)| linker.can_link_type(&ty))
            .map(|(i, _)| i)
            .collect();
        trace!(receiver = %ty, linkers = indices.len(), "filtered linker chain");
        self.by_receiver.write().entry(ty).or_insert(indices).clone()
    }
}

impl GuardingLinker for LinkerChain {
    fn guarded_invocation(
        &self,
        request: &LinkRequest<'_>,
        services: &LinkerServices,
    ) -> LinkResult<Option<GuardedInvocation>> {
        for &index in self.candidates(request.receiver()).iter() {
            if let Some(guarded) = self.linkers[index].guarded_invocation(request, services)? {
                trace!(operation = request.descriptor().name(), linker = index, "linker answered");
                return Ok(Some(guarded));
            }
        }
        Ok(None)
    }

    fn can_link_type(&self, ty: &Type) -> bool {
        self.linkers.iter().any(|linker| linker.can_link_type(ty))
    }
}

/// Links call sites through a chain of linkers.
pub struct DynamicLinker {
    chain: LinkerChain,
    services: LinkerServices,
    config: LinkerConfig,
}

impl DynamicLinker {
    pub fn services(&self) -> &LinkerServices {
        &self.services
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Produce a binding for `args` at a call site described by `descriptor`.
    ///
    /// The returned invocation conforms to the descriptor's signature.
    pub fn link(
        &self,
        descriptor: &CallSiteDescriptor,
        args: &[Value],
        call_site_unstable: bool,
    ) -> LinkResult<GuardedInvocation> {
        let request = LinkRequest::new(descriptor, args, call_site_unstable);
        let guarded = self
            .chain
            .guarded_invocation(&request, &self.services)?
            .ok_or_else(|| {
                let types: Vec<Type> = args.iter().map(Value::runtime_type).collect();
                LinkError::NoInvocation {
                    operation: descriptor.name().to_string(),
                    signature: descriptor.signature().clone(),
                    arg_types: type_list(&types),
                }
            })?;
        debug!(operation = descriptor.name(), guarded = guarded.guard().is_some(), "linked");
        self.services.as_type_guarded(guarded, descriptor.signature())
    }

    /// Create an unlinked call site bound to this linker.
    pub fn call_site(self: &Arc<Self>, descriptor: CallSiteDescriptor) -> CallSite {
        CallSite::new(descriptor, Arc::clone(self))
    }
}

/// Builder for [`DynamicLinker`].
///
/// Prioritized linkers are consulted before fallback linkers, each group in
/// registration order.
#[derive(Default)]
pub struct DynamicLinkerFactory {
    prioritized: Vec<Arc<dyn GuardingLinker>>,
    fallback: Vec<Arc<dyn GuardingLinker>>,
    converters: Vec<Arc<dyn TypeConverter>>,
    comparators: Vec<Arc<dyn ConversionComparator>>,
    config: LinkerConfig,
}

impl DynamicLinkerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prioritized_linker(mut self, linker: Arc<dyn GuardingLinker>) -> Self {
        self.prioritized.push(linker);
        self
    }

    pub fn fallback_linker(mut self, linker: Arc<dyn GuardingLinker>) -> Self {
        self.fallback.push(linker);
        self
    }

    pub fn type_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn conversion_comparator(mut self, comparator: Arc<dyn ConversionComparator>) -> Self {
        self.comparators.push(comparator);
        self
    }

    pub fn config(mut self, config: LinkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn create_linker(self) -> Arc<DynamicLinker> {
        let mut linkers = self.prioritized;
        linkers.extend(self.fallback);
        debug!(linkers = linkers.len(), converters = self.converters.len(), "creating dynamic linker");
        Arc::new(DynamicLinker {
            chain: LinkerChain::new(linkers, self.config.type_filtering),
            services: LinkerServices::new(ConversionRegistry::new(self.converters, self.comparators)),
            config: self.config,
        })
    }
}
