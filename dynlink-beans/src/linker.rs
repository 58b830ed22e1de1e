use std::sync::Arc;

use dynlink::{
    Guard, GuardedInvocation, GuardingLinker, LinkRequest, LinkResult, LinkerServices, MethodHandle, Signature,
    Type, Value, Visibility,
};
use tracing::{debug, trace};

use crate::class::ClassRegistry;
use crate::container;
use crate::facet::{FacetCache, Member, MemberKind};
use crate::BeansError;

/// Links property, method and container operations on host values.
///
/// Supported operations:
///
/// - `dyn:getProp:<name>` and `dyn:getProp` with the name as argument 1
/// - `dyn:setProp:<name>`
/// - `dyn:callMethod:<name>`
/// - `dyn:getElem` on arrays, lists and maps
/// - `dyn:getLength` on arrays, collections and maps
///
/// Members a class restricts to a scope are only linked for call sites
/// whose descriptor carries that scope.
#[derive(Debug)]
pub struct BeansLinker {
    facets: Arc<FacetCache>,
}

impl BeansLinker {
    pub fn new(registry: ClassRegistry) -> Self {
        Self {
            facets: Arc::new(FacetCache::new(registry)),
        }
    }

    pub fn facets(&self) -> &FacetCache {
        &self.facets
    }

    /// Passes while the receiver is an instance of the member's declaring
    /// class and its class still resolves `name` to the same member.
    fn member_guard(&self, kind: MemberKind, name: &str, member: &Arc<Member>) -> Guard {
        let facets = Arc::clone(&self.facets);
        let member = Arc::clone(member);
        let name: Arc<str> = name.into();
        let description = format!("arg0 resolves {kind} `{name}` of {}", member.declaring());
        Guard::new(description, 1, move |args| {
            if !args[0].is_instance_of(member.declaring()) {
                return Ok(false);
            }
            Ok(facets
                .facet(&args[0].runtime_type())
                .is_some_and(|facet| facet.member(kind, &name).is_some_and(|found| Arc::ptr_eq(found, &member))))
        })
    }

    /// Link a member addressed by a fixed name.
    fn member_access(
        &self,
        kind: MemberKind,
        name: &str,
        request: &LinkRequest<'_>,
        services: &LinkerServices,
    ) -> LinkResult<Option<GuardedInvocation>> {
        let Some(receiver) = request.receiver() else {
            return Ok(None);
        };
        let Some(facet) = self.facets.facet(&receiver.runtime_type()) else {
            return Ok(None);
        };
        let Some(member) = facet.member(kind, name) else {
            trace!(%kind, name, class = %receiver.runtime_type(), "no such member");
            return Ok(None);
        };
        if !member.is_visible_to(request.descriptor().visibility()) {
            trace!(%kind, name, class = %receiver.runtime_type(), "member not visible to call site");
            return Ok(None);
        }
        let signature = request.descriptor().signature();
        let Some(guarded) = member.method().get_invocation(signature, services)? else {
            return Ok(None);
        };
        Ok(Some(guarded.with_additional_guard(self.member_guard(kind, name, member))))
    }

    /// One binding for a fixed-name property over every host object, with
    /// the member looked up per call.
    fn megamorphic_getter(
        &self,
        name: &str,
        request: &LinkRequest<'_>,
        services: &LinkerServices,
    ) -> LinkResult<Option<GuardedInvocation>> {
        let signature = request.descriptor().signature();
        if signature.arity() != 1 {
            return Ok(None);
        }
        let name: Arc<str> = name.into();
        let visibility = request.descriptor().visibility().clone();
        let guard = {
            let facets = Arc::clone(&self.facets);
            let name = name.clone();
            let visibility = visibility.clone();
            Guard::new(format!("arg0 has property `{name}`"), 1, move |args| {
                Ok(matches!(args[0], Value::Object(_)) && has_getter(&facets, &args[0].runtime_type(), &name, &visibility))
            })
        };
        let facets = Arc::clone(&self.facets);
        let handle = MethodHandle::new(
            format!("get {name}"),
            Signature::new(Type::object(), vec![Type::object()]),
            move |args| read_property(&facets, &args[0], &name, &visibility),
        );
        debug!(property = %handle.name(), "linking megamorphic property getter");
        let adapted = services.as_type_handle(&handle, signature)?;
        Ok(Some(GuardedInvocation::new(adapted, Some(guard))))
    }

    /// Link `dyn:getProp` with the property name passed as argument 1.
    fn variable_name_getter(
        &self,
        request: &LinkRequest<'_>,
        services: &LinkerServices,
    ) -> LinkResult<Option<GuardedInvocation>> {
        let signature = request.descriptor().signature();
        let Some(receiver) = request.receiver().filter(|_| signature.arity() == 2) else {
            return Ok(None);
        };
        let class = receiver.runtime_type();
        if self.facets.facet(&class).is_none() {
            return Ok(None);
        }
        let facets = Arc::clone(&self.facets);
        let visibility = request.descriptor().visibility().clone();
        let handle = MethodHandle::new(
            "get",
            Signature::new(Type::object(), vec![Type::object(), Type::string()]),
            move |args| match args[1].as_str() {
                Some(name) => read_property(&facets, &args[0], name, &visibility),
                None => Err(BeansError::PropertyNameNotString {
                    found: args[1].runtime_type(),
                }
                .into()),
            },
        );
        let adapted = services.as_type_handle(&handle, signature)?;
        Ok(Some(GuardedInvocation::new(adapted, Some(Guard::is_of_class(0, class)))))
    }
}

fn has_getter(facets: &FacetCache, class: &Type, name: &str, visibility: &Visibility) -> bool {
    facets
        .facet(class)
        .is_some_and(|facet| facet.getter(name).is_some_and(|getter| getter.is_visible_to(visibility)))
}

fn read_property(facets: &FacetCache, receiver: &Value, name: &str, visibility: &Visibility) -> dynlink::InvokeResult<Value> {
    let class = receiver.runtime_type();
    let getter = facets
        .facet(&class)
        .and_then(|facet| facet.getter(name).filter(|getter| getter.is_visible_to(visibility)).cloned())
        .ok_or_else(|| BeansError::NoSuchProperty {
            name: name.to_string(),
            class,
        })?;
    getter.get(receiver)
}

impl GuardingLinker for BeansLinker {
    fn guarded_invocation(
        &self,
        request: &LinkRequest<'_>,
        services: &LinkerServices,
    ) -> LinkResult<Option<GuardedInvocation>> {
        let descriptor = request.descriptor();
        let (Some(operator), Some(receiver)) = (descriptor.operator(), request.receiver()) else {
            return Ok(None);
        };
        let signature = descriptor.signature();
        let name = descriptor.name_operand();
        match (operator, name) {
            ("getLength", None) => container::length_getter(signature, receiver, services),
            ("getElem", None) => container::element_getter(signature, receiver, services),
            ("getProp", None) => self.variable_name_getter(request, services),
            ("getProp", Some(name)) if request.is_call_site_unstable() => {
                if !has_getter(&self.facets, &receiver.runtime_type(), name, descriptor.visibility()) {
                    return Ok(None);
                }
                self.megamorphic_getter(name, request, services)
            }
            ("getProp", Some(name)) => self.member_access(MemberKind::Getter, name, request, services),
            ("setProp", Some(name)) => self.member_access(MemberKind::Setter, name, request, services),
            ("callMethod", Some(name)) => self.member_access(MemberKind::Method, name, request, services),
            _ => Ok(None),
        }
    }

    fn can_link_type(&self, ty: &Type) -> bool {
        ty.is_array()
            || Type::collection().is_assignable_from(ty)
            || Type::map().is_assignable_from(ty)
            || self.facets.knows(ty)
    }
}
