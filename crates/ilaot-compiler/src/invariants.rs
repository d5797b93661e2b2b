//! Invariant checks excluded from coverage reports.

#![cfg_attr(coverage_nightly, coverage(off))]

use ilaot_object::SymbolRef;

use crate::generic::GenericLookupResult;
use crate::nodes::{NodeId, NodeKind};

#[inline]
pub(crate) fn ensure_node(found: Option<NodeKind>, node: NodeId) -> NodeKind {
    found.unwrap_or_else(|| panic!("NodeFactory: {node} not found (handle came from another factory)"))
}

#[inline]
pub(crate) fn debug_assert_runtime_determined(determined: bool, variant: &str) {
    debug_assert!(
        determined,
        "GenericLookupResult::{variant} built over a concrete descriptor"
    );
}

#[inline]
pub(crate) fn ensure_concrete_substitution(concrete: bool, name: impl FnOnce() -> String) {
    assert!(
        concrete,
        "instantiation left {} runtime-determined (substitution is not total)",
        name()
    );
}

#[inline]
pub(crate) fn ensure_vtable_slot(found: Option<u32>, method: &str) -> u32 {
    found.unwrap_or_else(|| panic!("VTableLayouts: {method} has no slot in any vtable"))
}

#[cold]
pub(crate) fn panic_not_pointer_valued(lookup: &str) -> ! {
    panic!("GenericLookupResult: {lookup} is a scalar and resolves to no node")
}

#[cold]
pub(crate) fn panic_not_scalar(lookup: &str) -> ! {
    panic!("GenericLookupResult: {lookup} is pointer-valued and has no scalar value")
}

#[inline]
pub(crate) fn assert_layout_open(open: bool) {
    assert!(open, "DictionaryLayout: registration after the layout was frozen");
}

#[inline]
pub(crate) fn ensure_frozen(frozen: Option<&[GenericLookupResult]>) -> &[GenericLookupResult] {
    frozen.unwrap_or_else(|| panic!("DictionaryLayout: slots read before the layout was frozen"))
}

#[inline]
pub(crate) fn ensure_symbol(found: Option<usize>, node: NodeId) -> SymbolRef {
    match found {
        Some(index) => SymbolRef::from_raw(index as u32),
        None => panic!("SymbolTable: {node} is referenced but was never marked"),
    }
}

#[inline]
pub(crate) fn assert_has_data(has_data: bool, name: &str) {
    assert!(has_data, "EmitContext: {name} produces no object data");
}

#[inline]
pub(crate) fn ensure_u16_count(count: usize, what: &str, owner: &str) -> u16 {
    u16::try_from(count)
        .unwrap_or_else(|_| panic!("EmitContext: {owner} has {count} {what}, more than a u16 header field holds"))
}

#[inline]
pub(crate) fn ensure_compiled<T>(found: Option<T>, method: &str) -> T {
    found.unwrap_or_else(|| panic!("EmitContext: no compiled body for {method}"))
}
