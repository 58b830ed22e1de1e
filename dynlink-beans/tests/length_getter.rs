use std::sync::Arc;

use dynlink::{
    CallSiteDescriptor, ClassDef, DynamicLinkerFactory, GuardedInvocation, GuardingLinker, LinkRequest,
    LinkerServices, Signature, Type, Value,
};
use dynlink_beans::{BeansLinker, ClassRegistry};
use pretty_assertions::assert_eq;

fn link_directly(descriptor: &CallSiteDescriptor, receiver: Value) -> GuardedInvocation {
    let linker = BeansLinker::new(ClassRegistry::new());
    let args = [receiver];
    let request = LinkRequest::new(descriptor, &args, false);
    linker
        .guarded_invocation(&request, &LinkerServices::default())
        .unwrap()
        .expect("length getter links")
}

fn length_of(ty: Type) -> CallSiteDescriptor {
    CallSiteDescriptor::new("dyn:getLength", Signature::new(Type::int(), vec![ty]))
}

fn nulls(count: usize) -> Vec<Value> {
    vec![Value::Null; count]
}

fn singleton_map() -> Value {
    let class = Type::class(ClassDef::new("SingletonMap").implements(Type::map()));
    Value::map(class, vec![(Value::str("1"), Value::str("2"))])
}

#[test]
fn test_early_bound_array_length_getter() {
    let elements = [
        Type::byte(),
        Type::short(),
        Type::char(),
        Type::int(),
        Type::long(),
        Type::float(),
        Type::double(),
        Type::object(),
        Type::string(),
    ];
    for element in elements {
        let descriptor = length_of(Type::array(element.clone()));
        let array = Value::array(element, nulls(2));
        let invocation = link_directly(&descriptor, array.clone());
        // the call site guarantees an array
        assert!(invocation.guard().is_none());
        assert_eq!(invocation.invocation().signature(), descriptor.signature());
        assert_eq!(invocation.invocation().invoke(&[array]).unwrap(), Value::Int(2));
    }
}

#[test]
fn test_early_bound_collection_length_getter() {
    let descriptor = length_of(Type::list());
    let empty = Value::collection(Type::array_list(), Vec::new());
    let invocation = link_directly(&descriptor, empty.clone());
    assert!(invocation.guard().is_none());
    assert_eq!(invocation.invocation().signature(), descriptor.signature());
    assert_eq!(invocation.invocation().invoke(&[empty]).unwrap(), Value::Int(0));
    let pair = Value::collection(Type::array_list(), vec![Value::str("a"), Value::str("b")]);
    assert_eq!(invocation.invocation().invoke(&[pair]).unwrap(), Value::Int(2));
}

#[test]
fn test_early_bound_map_length_getter() {
    let descriptor = length_of(Type::map());
    let empty = Value::map(Type::hash_map(), Vec::new());
    let invocation = link_directly(&descriptor, empty.clone());
    assert!(invocation.guard().is_none());
    assert_eq!(invocation.invocation().signature(), descriptor.signature());
    assert_eq!(invocation.invocation().invoke(&[empty]).unwrap(), Value::Int(0));
    assert_eq!(invocation.invocation().invoke(&[singleton_map()]).unwrap(), Value::Int(1));
}

#[test]
fn test_late_bound_length_getter() {
    let site = DynamicLinkerFactory::new()
        .prioritized_linker(Arc::new(BeansLinker::new(ClassRegistry::new())))
        .create_linker()
        .call_site(length_of(Type::object()));
    assert_eq!(site.relink_count(), 0);

    assert_eq!(site.invoke(&[Value::array(Type::int(), nulls(2))]).unwrap(), Value::Int(2));
    assert_eq!(site.relink_count(), 1);
    assert_eq!(site.invoke(&[Value::array(Type::object(), nulls(3))]).unwrap(), Value::Int(3));
    // one binding serves every array class
    assert_eq!(site.relink_count(), 1);
    assert_eq!(site.invoke(&[Value::array(Type::long(), nulls(4))]).unwrap(), Value::Int(4));
    assert_eq!(site.relink_count(), 1);

    assert_eq!(site.invoke(&[Value::collection(Type::array_list(), nulls(5))]).unwrap(), Value::Int(5));
    assert_eq!(site.relink_count(), 2);
    assert_eq!(site.invoke(&[Value::collection(Type::hash_set(), Vec::new())]).unwrap(), Value::Int(0));
    // one binding serves every collection class
    assert_eq!(site.relink_count(), 2);

    assert_eq!(site.invoke(&[singleton_map()]).unwrap(), Value::Int(1));
    assert_eq!(site.relink_count(), 3);
    assert_eq!(site.invoke(&[Value::map(Type::hash_map(), Vec::new())]).unwrap(), Value::Int(0));
    assert_eq!(site.relink_count(), 3);

    assert_eq!(site.invoke(&[Value::array(Type::long(), nulls(6))]).unwrap(), Value::Int(6));
    assert_eq!(site.relink_count(), 4);
}

#[test]
fn test_element_getter() {
    let site = DynamicLinkerFactory::new()
        .prioritized_linker(Arc::new(BeansLinker::new(ClassRegistry::new())))
        .create_linker()
        .call_site(CallSiteDescriptor::new("dyn:getElem", Signature::generic(2)));

    let list = Value::collection(Type::array_list(), vec![Value::str("a"), Value::str("b")]);
    assert_eq!(site.invoke(&[list.clone(), Value::Int(1)]).unwrap(), Value::str("b"));
    let map = Value::map(Type::hash_map(), vec![(Value::str("k"), Value::Int(9))]);
    assert_eq!(site.invoke(&[map, Value::str("k")]).unwrap(), Value::Int(9));
    let array = Value::array(Type::int(), vec![Value::Int(4), Value::Int(5)]);
    assert_eq!(site.invoke(&[array, Value::Int(0)]).unwrap(), Value::Int(4));
    assert_eq!(site.relink_count(), 3);

    assert!(site.invoke(&[list, Value::Int(7)]).is_err());
    assert!(site.invoke(&[Value::collection(Type::hash_set(), Vec::new()), Value::Int(0)]).is_err());
}

proptest::proptest! {
    #[test]
    fn prop_late_bound_length_matches_size(sizes in proptest::collection::vec((0usize..3, 0usize..16), 1..20)) {
        let site = DynamicLinkerFactory::new()
            .prioritized_linker(Arc::new(BeansLinker::new(ClassRegistry::new())))
            .create_linker()
            .call_site(length_of(Type::object()));
        for (kind, size) in sizes {
            let container = match kind {
                0 => Value::array(Type::object(), nulls(size)),
                1 => Value::collection(Type::hash_set(), nulls(size)),
                _ => Value::map(Type::hash_map(), (0..size).map(|i| (Value::Int(i as i32), Value::Null)).collect()),
            };
            proptest::prop_assert_eq!(site.invoke(&[container]).unwrap(), Value::Int(size as i32));
        }
    }
}
