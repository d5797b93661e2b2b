//! Invariant checks excluded from coverage reports.

#![cfg_attr(coverage_nightly, coverage(off))]

use crate::type_system::TypeId;

#[inline]
pub(crate) fn ensure_descriptor<T>(found: Option<T>, kind: &str, raw: u32) -> T {
    found.unwrap_or_else(|| {
        panic!("TypeUniverse: {kind} #{raw} not found (handle came from another universe)")
    })
}

#[inline]
pub(crate) fn ensure_substitution(args: &[TypeId], index: u16, sigil: &str) -> TypeId {
    args.get(index as usize).copied().unwrap_or_else(|| {
        panic!(
            "TypeUniverse: no substitution for {sigil}{index} \
             (instantiation has {} arguments)",
            args.len()
        )
    })
}

#[cold]
pub(crate) fn panic_missing_slot_owner(method: &str) -> ! {
    panic!("TypeUniverse: overridden slot of {method} not found in its base chain")
}
