//! Vtable layouts.
//!
//! Under [`VTablePolicy::Lazy`] a slot exists only once some code uses it.
//! Slot order is still declaration order down the base chain, so the final
//! layout does not depend on the order uses were discovered in.

use indexmap::IndexSet;
use tracing::debug;

use ilaot_core::{MethodId, TypeFlavor, TypeId, TypeSystem, VTablePolicy};

/// Byte offset of the first vtable slot in a type's data: a 4-byte size,
/// two 2-byte counts, then base type and dictionary pointers.
pub fn vtable_start(pointer_size: u8) -> u32 {
    8 + 2 * u32::from(pointer_size)
}

/// Every slot-defining method along `ty`'s base chain, root base first,
/// used or not.
pub fn declared_slots(types: &dyn TypeSystem, ty: TypeId) -> Vec<MethodId> {
    let mut chain = vec![ty];
    while let Some(base) = chain.last().and_then(|&t| types.base_type(t)) {
        chain.push(base);
    }
    chain
        .into_iter()
        .rev()
        .flat_map(|t| types.virtual_slots(t))
        .collect()
}

#[derive(Debug)]
pub struct VTableLayouts {
    policy: VTablePolicy,
    /// Canonical slot-defining methods some code calls through.
    used: IndexSet<MethodId>,
}

impl VTableLayouts {
    pub fn new(policy: VTablePolicy) -> Self {
        Self {
            policy,
            used: IndexSet::new(),
        }
    }

    pub fn policy(&self) -> VTablePolicy {
        self.policy
    }

    /// Record a use of `slot` (already canonical and slot-defining).
    /// Returns whether it was new.
    pub fn use_slot(&mut self, types: &dyn TypeSystem, slot: MethodId) -> bool {
        let owner = types.owning_type(slot);
        if types.flavor(owner) == TypeFlavor::Interface {
            return false;
        }
        let added = self.used.insert(slot);
        if added {
            debug!(
                slot = %types.method_name(slot),
                used = self.used.len(),
                "vtable slot used"
            );
        }
        added
    }

    pub fn is_used(&self, types: &dyn TypeSystem, slot: MethodId) -> bool {
        self.policy == VTablePolicy::Full || self.used.contains(&types.canonical_method(slot))
    }

    /// Slots of `ty`'s vtable, root base first.
    pub fn slots(&self, types: &dyn TypeSystem, ty: TypeId) -> Vec<MethodId> {
        declared_slots(types, ty)
            .into_iter()
            .filter(|&slot| self.is_used(types, slot))
            .collect()
    }

    /// Slot number of `decl` in every vtable that contains it.
    pub fn slot_index(&self, types: &dyn TypeSystem, decl: MethodId) -> Option<u32> {
        let slot = types.slot_defining_method(decl);
        let owner = types.owning_type(slot);
        self.slots(types, owner)
            .iter()
            .position(|&m| m == slot)
            .map(|index| index as u32)
    }

    /// Byte offset of `decl`'s slot within type data.
    pub fn slot_offset(&self, types: &dyn TypeSystem, decl: MethodId, pointer_size: u8) -> Option<u32> {
        self.slot_index(types, decl)
            .map(|slot| vtable_start(pointer_size) + slot * u32::from(pointer_size))
    }
}
