use std::sync::Arc;

use dynlink::{
    CallError, CallSite, CallSiteDescriptor, ClassDef, DynamicLinkerFactory, Guard, GuardedInvocation, InvokeError,
    LinkError, MethodHandle, PrimitiveTy, Signature, Type, TypeConverter, Value,
};
use dynlink_beans::{BeansLinker, ClassRegistry, HostClass};
use pretty_assertions::assert_eq;

fn calc_type() -> Type {
    Type::class(ClassDef::new("Calc"))
}

fn method(name: &str, ret: Type, params: &[Type], result: Value) -> MethodHandle {
    let mut all = vec![calc_type()];
    all.extend_from_slice(params);
    MethodHandle::new(name, Signature::new(ret, all), move |_| Ok(result.clone()))
}

fn variadic(name: &str, params: &[Type], result: Value) -> MethodHandle {
    let mut all = vec![calc_type()];
    all.extend_from_slice(params);
    MethodHandle::variadic(name, Signature::new(Type::int(), all), move |_| Ok(result.clone()))
}

fn calc() -> HostClass {
    let int = Type::int();
    let ints = Type::array(Type::int());
    let string = Type::string();
    HostClass::new(ClassDef::new("Calc"))
        .method(method("add", int.clone(), &[int.clone(), int.clone()], Value::Int(1)))
        .method(method("add", int.clone(), &[int.clone(), int.clone(), int.clone()], Value::Int(2)))
        .method(method("add", string.clone(), &[string.clone(), string], Value::str("x")))
        .method(variadic("add", &[int.clone(), ints.clone()], Value::Int(4)))
        .method(method("boo", int.clone(), &[Type::class_type(), int], Value::Int(1)))
        .method(variadic("boo", &[Type::class_type(), ints], Value::Int(2)))
}

fn double_to_int() -> Arc<dyn TypeConverter> {
    Arc::new(|source: &Type, target: &Type| {
        if target != &Type::int() || !source.is_assignable_from(&Type::boxed(PrimitiveTy::Double)) {
            return None;
        }
        let handle = MethodHandle::new("d2i", Signature::new(Type::int(), vec![source.clone()]), |args| {
            match args[0] {
                Value::Double(d) => Ok(Value::Int(d as i32)),
                ref other => Err(InvokeError::ClassCast {
                    from: other.runtime_type(),
                    to: Type::int(),
                }),
            }
        });
        Some(GuardedInvocation::new(handle, Some(Guard::is_of_class(0, Type::boxed(PrimitiveTy::Double)))))
    })
}

fn call_method(name: &str, args: usize, converters: bool) -> CallSite {
    let mut factory = DynamicLinkerFactory::new()
        .prioritized_linker(Arc::new(BeansLinker::new(ClassRegistry::new().with_class(calc()))));
    if converters {
        factory = factory.type_converter(double_to_int());
    }
    factory
        .create_linker()
        .call_site(CallSiteDescriptor::new(&format!("dyn:callMethod:{name}"), Signature::generic(args + 1)))
}

fn call(site: &CallSite, args: Vec<Value>) -> Result<Value, CallError> {
    let mut all = vec![calc().instantiate()];
    all.extend(args);
    site.invoke(&all)
}

#[test]
fn test_overloads_resolve_by_runtime_arguments() {
    let two = call_method("add", 2, false);
    assert_eq!(call(&two, vec![Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(1));
    assert_eq!(call(&two, vec![Value::str("a"), Value::str("b")]).unwrap(), Value::str("x"));
    // one relink per receiver class, the overload choice happens behind it
    assert_eq!(two.relink_count(), 1);

    let three = call_method("add", 3, false);
    assert_eq!(call(&three, vec![Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(2));

    let four = call_method("add", 4, false);
    let ints = (1..=4).map(Value::Int).collect();
    assert_eq!(call(&four, ints).unwrap(), Value::Int(4));
}

#[test]
fn test_single_vararg_prefers_fixed_arity() {
    let site = call_method("boo", 2, false);
    let class = Value::Type(calc_type());
    assert_eq!(call(&site, vec![class.clone(), Value::Int(1)]).unwrap(), Value::Int(1));

    let site = call_method("boo", 1, false);
    assert_eq!(call(&site, vec![class.clone()]).unwrap(), Value::Int(2));

    let site = call_method("boo", 3, false);
    assert_eq!(call(&site, vec![class, Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(2));
}

#[test]
fn test_converter_enables_fixed_arity_overload() {
    let class = Value::Type(calc_type());

    let site = call_method("boo", 2, true);
    assert_eq!(call(&site, vec![class.clone(), Value::Double(1.0)]).unwrap(), Value::Int(1));

    let site = call_method("boo", 2, false);
    let err = call(&site, vec![class, Value::Double(1.0)]).unwrap_err();
    assert!(matches!(err, CallError::Invoke(InvokeError::NoApplicableMethod { .. })));
}

#[test]
fn test_unmatched_argument_count_fails_the_link() {
    let site = call_method("add", 0, false);
    let err = call(&site, Vec::new()).unwrap_err();
    assert!(matches!(err, CallError::Link(LinkError::NoInvocation { .. })));
}

#[test]
fn test_unknown_method_fails_the_link() {
    let site = call_method("subtract", 2, false);
    let err = call(&site, vec![Value::Int(1), Value::Int(2)]).unwrap_err();
    assert!(matches!(err, CallError::Link(LinkError::NoInvocation { .. })));
}
