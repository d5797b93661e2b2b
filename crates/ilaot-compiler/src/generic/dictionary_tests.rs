use ilaot_core::{CompilationOptions, Instantiation, TargetDetails};
use ilaot_object::{ObjectDataBuilder, RelocKind, SymbolRef};

use super::{
    DictionaryEntry, DictionaryLayout, DictionaryLayouts, GenericContextOwner, GenericDictionary,
    GenericLookupResult, LookupContext,
};
use crate::nodes::{NodeFactory, NodeKind, SymbolTable, VTableLayouts};
use crate::test_utils::Fixture;

fn list_owner(fx: &Fixture) -> GenericContextOwner {
    GenericContextOwner::Type(fx.list_of(fx.u.canon()))
}

#[test]
fn slot_order_does_not_depend_on_registration_order() {
    let fx = Fixture::new();
    let u = &fx.u;
    let t0 = u.type_var(0);
    let lookups = [
        GenericLookupResult::type_size(u, t0),
        GenericLookupResult::object_allocator(u, fx.open_list()),
        GenericLookupResult::type_handle(u, t0),
        GenericLookupResult::method_entry(u, fx.list_get(fx.open_list()), false),
    ];

    let mut forward = DictionaryLayout::new(list_owner(&fx));
    let mut backward = DictionaryLayout::new(list_owner(&fx));
    for &lookup in &lookups {
        forward.register(lookup);
    }
    for &lookup in lookups.iter().rev() {
        backward.register(lookup);
    }
    forward.freeze(u);
    backward.freeze(u);

    assert_eq!(forward.slots(), backward.slots());
    let names: Vec<String> = forward.slots().iter().map(|l| l.mangled_name(u)).collect();
    assert_eq!(
        names,
        [
            "TypeHandle:!0",
            "MethodEntry:List<!0>::Get:exact",
            "ObjectAllocator:List<!0>",
            "TypeSize:!0",
        ]
    );
    assert_eq!(forward.slot_of(&lookups[0]), Some(3));
}

#[test]
fn registering_twice_keeps_one_slot() {
    let fx = Fixture::new();
    let mut layouts = DictionaryLayouts::new();
    let lookup = GenericLookupResult::type_handle(&fx.u, fx.u.type_var(0));

    assert!(layouts.register(&fx.u, list_owner(&fx), lookup));
    assert!(!layouts.register(&fx.u, list_owner(&fx), lookup));

    let layout = layouts.get(list_owner(&fx)).expect("layout exists");
    assert_eq!(layout.len(), 1);
    assert!(!layout.is_frozen());
}

#[test]
#[should_panic(expected = "before the layout was frozen")]
fn slots_require_freezing() {
    let fx = Fixture::new();
    let layout = DictionaryLayout::new(list_owner(&fx));
    let _ = layout.slots();
}

#[test]
#[should_panic(expected = "after the layout was frozen")]
fn frozen_layout_rejects_registration() {
    let fx = Fixture::new();
    let mut layout = DictionaryLayout::new(list_owner(&fx));
    layout.freeze(&fx.u);
    layout.register(GenericLookupResult::type_handle(&fx.u, fx.u.type_var(0)));
}

#[test]
fn owners_of_dictionary_nodes_are_canonical() {
    let fx = Fixture::new();
    let u = &fx.u;
    let list = fx.list_of(fx.string);

    let (owner, inst) =
        GenericContextOwner::of_dictionary(u, NodeKind::TypeDictionary(list)).expect("type dictionary");
    assert_eq!(owner, list_owner(&fx));
    assert_eq!(inst, Instantiation::for_type(vec![fx.string]));

    let make = fx.make(fx.string);
    let (owner, inst) =
        GenericContextOwner::of_dictionary(u, NodeKind::MethodDictionary(make)).expect("method dictionary");
    assert_eq!(owner, GenericContextOwner::Method(fx.make(u.canon())));
    assert_eq!(inst, Instantiation::new(Vec::new(), vec![fx.string]));
    assert_eq!(owner.name(u), "Util::Make<__Canon>");

    assert_eq!(GenericContextOwner::for_shared_method(u, make), owner);
    assert_eq!(
        GenericContextOwner::for_shared_method(u, fx.list_get(list)),
        list_owner(&fx)
    );
    assert!(GenericContextOwner::of_dictionary(u, NodeKind::ConstructedType(list)).is_none());
}

#[test]
fn concrete_dictionary_writes_pointers_and_scalars() {
    let fx = Fixture::new();
    let u = &fx.u;
    let options = CompilationOptions::default();
    let factory = NodeFactory::new();
    let vtables = VTableLayouts::new(options.vtable_policy);
    let cx = LookupContext {
        types: u,
        options: &options,
        factory: &factory,
        vtables: &vtables,
    };

    let t0 = u.type_var(0);
    let mut layout = DictionaryLayout::new(list_owner(&fx));
    layout.register(GenericLookupResult::type_size(u, t0));
    layout.register(GenericLookupResult::type_handle(u, t0));
    layout.freeze(u);

    let dictionary = GenericDictionary::build(&layout, &cx, Instantiation::for_type(vec![fx.string]));
    let string = factory.constructed_type(fx.string);
    let entries: Vec<DictionaryEntry> = dictionary.slots.iter().map(|&(_, entry)| entry).collect();
    assert_eq!(
        entries,
        [
            DictionaryEntry::Pointer {
                target: string,
                addend: 0,
            },
            DictionaryEntry::Scalar(16),
        ]
    );

    let symbols = SymbolTable::new([(string, "type:String".to_owned())]);
    let mut builder = ObjectDataBuilder::new(TargetDetails::default());
    dictionary.emit(&mut builder, &symbols);
    let data = builder.finalize();

    assert_eq!(data.len(), 16);
    assert_eq!(data.read_le(8, 8), Some(16));
    assert_eq!(data.relocs().len(), 1);
    assert_eq!(data.relocs()[0].kind, RelocKind::Dir64);
    assert_eq!(data.relocs()[0].target, SymbolRef::from_raw(0));
}

#[test]
fn empty_dictionary_still_takes_a_pointer() {
    let fx = Fixture::new();
    let dictionary = GenericDictionary::empty(list_owner(&fx), Instantiation::for_type(vec![fx.string]));
    let mut builder = ObjectDataBuilder::new(TargetDetails::default());
    dictionary.emit(&mut builder, &SymbolTable::default());

    assert!(dictionary.is_empty());
    assert_eq!(builder.finalize().bytes(), &[0; 8]);
}
