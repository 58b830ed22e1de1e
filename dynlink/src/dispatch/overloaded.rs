//! Linking overloaded methods.
//!
//! Resolution happens at link time whenever the call site's declared types
//! pin down a single candidate. Otherwise the binding defers to an
//! [`OverloadSelector`], which resolves once per distinct combination of
//! runtime argument classes and caches the answer.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::convert::Convertibility;
use crate::error::{InvokeError, InvokeResult, LinkResult};
use crate::handle::MethodHandle;
use crate::invocation::{Guard, GuardedInvocation, Invocation, RuntimeSelector};
use crate::services::LinkerServices;
use crate::signature::Signature;
use crate::types::Type;
use crate::value::Value;

use super::applicability::{is_applicable_dynamically, Applicability};
use super::resolver::DispatchResolver;
use super::result::DispatchResult;
use super::simple::SimpleDynamicMethod;

/// A method name with several candidate targets.
#[derive(Debug, Clone)]
pub struct OverloadedDynamicMethod {
    name: Arc<str>,
    methods: Vec<MethodHandle>,
}

impl OverloadedDynamicMethod {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Add a candidate. A candidate with the same parameter types as an
    /// existing one replaces it.
    pub fn add_method(&mut self, method: MethodHandle) {
        match self
            .methods
            .iter_mut()
            .find(|m| m.signature().params().get(1..) == method.signature().params().get(1..))
        {
            Some(existing) => *existing = method,
            None => self.methods.push(method),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodHandle] {
        &self.methods
    }

    /// Link the overload set against a call site signature.
    ///
    /// Returns `None` when no candidate can ever be invoked through the
    /// call site.
    pub fn get_invocation(
        &self,
        call_site: &Signature,
        services: &LinkerServices,
    ) -> LinkResult<Option<GuardedInvocation>> {
        let resolver = DispatchResolver::new(services);
        let arg_types = call_site.params();

        // Candidates applicable in some phase, and the maximal ones of the
        // first non-empty phase.
        let mut statically_applicable = vec![false; self.methods.len()];
        let mut maximal: Vec<usize> = Vec::new();
        for phase in Applicability::PHASES {
            let indices: Vec<usize> = (0..self.methods.len())
                .filter(|&i| phase.is_applicable(&self.methods[i], call_site))
                .collect();
            for &i in &indices {
                statically_applicable[i] = true;
            }
            if maximal.is_empty() && !indices.is_empty() {
                let phase_methods: Vec<MethodHandle> = indices.iter().map(|&i| self.methods[i].clone()).collect();
                maximal = resolver
                    .find_maximal(&phase_methods, phase.is_variable_arity(), Some(arg_types))
                    .into_iter()
                    .map(|j| indices[j])
                    .collect();
            }
        }

        // Candidates that may still apply once runtime classes are known.
        let mut invokables: Vec<usize> = (0..self.methods.len())
            .filter(|&i| !statically_applicable[i])
            .filter(|&i| is_applicable_dynamically(services, call_site, &self.methods[i]))
            .collect();
        if invokables.is_empty() && maximal.len() > 1 {
            debug!(method = %self.name, %call_site, candidates = maximal.len(), "ambiguous at link time, deferring");
        }
        invokables.extend(maximal);
        invokables.sort_unstable();

        match invokables.as_slice() {
            [] => {
                trace!(method = %self.name, %call_site, "no invokable overload");
                Ok(None)
            }
            [single] => {
                let method = &self.methods[*single];
                let Some(invocation) = SimpleDynamicMethod::new(method.clone()).get_invocation(call_site, services)? else {
                    return Ok(None);
                };
                let Some(guard) = applicability_guard(method, call_site, services) else {
                    trace!(method = %self.name, %call_site, "linked single overload");
                    return Ok(Some(GuardedInvocation::unconditional(invocation)));
                };
                // Relinking would pick the same candidate, so arguments it
                // rejects fail the call instead of the binding.
                let rejected = not_applicable(self.name.clone(), method.clone(), call_site.clone());
                trace!(method = %self.name, %call_site, guard = guard.description(), "linked single overload");
                let checked = Invocation::guard_with_test(guard, invocation, Invocation::Direct(rejected))?;
                Ok(Some(GuardedInvocation::unconditional(checked)))
            }
            many => {
                let candidates: Vec<MethodHandle> = many.iter().map(|&i| self.methods[i].clone()).collect();
                trace!(method = %self.name, %call_site, candidates = candidates.len(), "deferring to runtime selection");
                let selector = OverloadSelector::new(self.name.clone(), candidates, call_site.clone(), services.clone());
                Ok(Some(GuardedInvocation::unconditional(Invocation::Deferred(Arc::new(selector)))))
            }
        }
    }
}

/// Guard checking that runtime arguments in positions whose declared type
/// only converts at runtime do convert to `method`'s parameters. `None` if
/// every fixed parameter is statically guaranteed.
fn applicability_guard(method: &MethodHandle, call_site: &Signature, services: &LinkerServices) -> Option<Guard> {
    let params = method.signature().params();
    let fixed = params.len() - usize::from(method.is_varargs());
    let checks: Vec<(usize, Type)> = (1..fixed.min(call_site.arity()))
        .filter(|&i| services.conversion_rank(call_site.param(i), &params[i]) == Convertibility::Runtime)
        .map(|i| (i, params[i].clone()))
        .collect();
    let arity = checks.iter().map(|(i, _)| i + 1).max()?;
    let description = format!("arguments applicable to {}{}", method.name(), method.signature());
    let services = services.clone();
    Some(Guard::new(description, arity, move |args| {
        Ok(checks.iter().all(|(i, ty)| {
            let arg = &args[*i];
            if arg.is_null() {
                ty.is_reference()
            } else {
                services.can_convert(&arg.runtime_type(), ty)
            }
        }))
    }))
}

/// A handle failing with the reason `method` does not accept its arguments:
/// a null for a primitive parameter, or no conversion at all.
fn not_applicable(name: Arc<str>, method: MethodHandle, call_site: Signature) -> MethodHandle {
    MethodHandle::throwing(name.clone(), call_site, move |args| {
        let params = method.signature().params();
        let null_primitive = args
            .iter()
            .zip(params)
            .skip(1)
            .find(|(arg, param)| arg.is_null() && param.is_primitive());
        match null_primitive {
            Some((_, param)) => InvokeError::NullToPrimitive { to: param.clone() },
            None => InvokeError::NoApplicableMethod {
                method: name.to_string(),
                arg_types: crate::error::type_list(&args.iter().map(Value::runtime_type).collect::<Vec<_>>()),
            },
        }
    })
}

/// Selects among overloads by the runtime classes of the arguments.
///
/// Fixed-arity candidates are tried first; variable-arity candidates also
/// take part as fixed-arity ones when their parameter count equals the
/// call's argument count, so an explicitly packed array reaches them
/// unchanged.
pub struct OverloadSelector {
    name: Arc<str>,
    call_site: Signature,
    fixed_arity: Vec<MethodHandle>,
    variable_arity: Vec<MethodHandle>,
    services: LinkerServices,
    cache: RwLock<FxHashMap<Vec<Type>, Arc<Invocation>>>,
}

impl OverloadSelector {
    pub fn new(name: Arc<str>, methods: Vec<MethodHandle>, call_site: Signature, services: LinkerServices) -> Self {
        let argc = call_site.arity();
        let mut fixed_arity = Vec::new();
        let mut variable_arity = Vec::new();
        for method in methods {
            if method.is_varargs() {
                if method.arity() == argc {
                    fixed_arity.push(method.as_fixed_arity());
                }
                variable_arity.push(method);
            } else {
                fixed_arity.push(method);
            }
        }
        Self {
            name,
            call_site,
            fixed_arity,
            variable_arity,
            services,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    fn resolve(&self, arg_types: &[Type]) -> Invocation {
        let resolver = DispatchResolver::new(&self.services);
        let mut result = resolver.resolve(&self.name, arg_types, &self.fixed_arity, false);
        if matches!(result, DispatchResult::NoMatch(_)) && !self.variable_arity.is_empty() {
            result = resolver.resolve(&self.name, arg_types, &self.variable_arity, true);
        }
        let failure = match result {
            DispatchResult::Resolved(method) => {
                match SimpleDynamicMethod::new(method).get_invocation(&self.call_site, &self.services) {
                    Ok(Some(invocation)) => return invocation,
                    Ok(None) => InvokeError::NoApplicableMethod {
                        method: self.name.to_string(),
                        arg_types: crate::error::type_list(arg_types),
                    },
                    Err(err) => InvokeError::Link(err),
                }
            }
            DispatchResult::NoMatch(err) => err.to_invoke_error(),
            DispatchResult::Ambiguous(err) => err.to_invoke_error(),
        };
        debug!(method = %self.name, error = %failure, "runtime overload resolution failed");
        Invocation::Direct(MethodHandle::throwing(
            self.name.clone(),
            self.call_site.clone(),
            move |_| failure.clone(),
        ))
    }
}

impl RuntimeSelector for OverloadSelector {
    fn signature(&self) -> &Signature {
        &self.call_site
    }

    fn resolved_shapes(&self) -> usize {
        self.cache.read().len()
    }

    fn select(&self, args: &[Value]) -> InvokeResult<Arc<Invocation>> {
        let key: Vec<Type> = args.iter().map(Value::runtime_type).collect();
        if let Some(invocation) = self.cache.read().get(&key) {
            return Ok(invocation.clone());
        }
        let invocation = Arc::new(self.resolve(&key));
        trace!(method = %self.name, shapes = self.resolved_shapes() + 1, "resolved runtime overload");
        Ok(self.cache.write().entry(key).or_insert(invocation).clone())
    }
}

impl fmt::Debug for OverloadSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverloadSelector")
            .field("name", &self.name)
            .field("call_site", &self.call_site)
            .field("fixed_arity", &self.fixed_arity)
            .field("variable_arity", &self.variable_arity)
            .finish()
    }
}
