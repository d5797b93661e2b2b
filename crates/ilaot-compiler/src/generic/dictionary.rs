//! Dictionary layouts and concrete dictionaries.
//!
//! A layout belongs to the canonical owner of some shared code and lists the
//! lookups that code performs. It only grows during analysis. Once analysis
//! is done it is frozen into slot order by the lookup comparer, so the slot
//! numbers do not depend on the order lookups were discovered in.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use ilaot_core::{Instantiation, MethodId, TypeId, TypeSystem};
use ilaot_object::ObjectDataBuilder;

use super::lookup::{DictionaryEntry, GenericLookupResult, write_entry};
use super::LookupContext;
use crate::invariants::{assert_layout_open, ensure_frozen};
use crate::nodes::{NodeKind, SymbolTable};

/// Canonical owner of a generic context.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GenericContextOwner {
    Type(TypeId),
    Method(MethodId),
}

impl GenericContextOwner {
    /// Owner of the dictionary shared code for `method` reads from: its own
    /// method dictionary if it has a method instantiation, else the owning
    /// type's dictionary.
    pub fn for_shared_method(types: &dyn TypeSystem, method: MethodId) -> Self {
        let canonical = types.canonical_method(method);
        if types.method_instantiation(canonical).is_empty() {
            Self::Type(types.owning_type(canonical))
        } else {
            Self::Method(canonical)
        }
    }

    /// Owner and instantiation of a dictionary node.
    pub fn of_dictionary(types: &dyn TypeSystem, kind: NodeKind) -> Option<(Self, Instantiation)> {
        match kind {
            NodeKind::TypeDictionary(ty) => Some((
                Self::Type(types.canonical_type(ty)),
                Instantiation::for_type(types.type_instantiation(ty)),
            )),
            NodeKind::MethodDictionary(method) => Some((
                Self::Method(types.canonical_method(method)),
                Instantiation::new(
                    types.type_instantiation(types.owning_type(method)),
                    types.method_instantiation(method),
                ),
            )),
            _ => None,
        }
    }

    pub fn name(&self, types: &dyn TypeSystem) -> String {
        match *self {
            Self::Type(ty) => types.type_name(ty),
            Self::Method(method) => types.method_name(method),
        }
    }
}

#[derive(Debug)]
pub struct DictionaryLayout {
    owner: GenericContextOwner,
    entries: IndexSet<GenericLookupResult>,
    frozen: Option<Vec<GenericLookupResult>>,
}

impl DictionaryLayout {
    pub fn new(owner: GenericContextOwner) -> Self {
        Self {
            owner,
            entries: IndexSet::new(),
            frozen: None,
        }
    }

    pub fn owner(&self) -> GenericContextOwner {
        self.owner
    }

    /// Add a lookup. Returns whether it was new.
    pub fn register(&mut self, lookup: GenericLookupResult) -> bool {
        assert_layout_open(self.frozen.is_none());
        self.entries.insert(lookup)
    }

    /// Lookups in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &GenericLookupResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn freeze(&mut self, types: &dyn TypeSystem) {
        if self.frozen.is_some() {
            return;
        }
        let mut slots: Vec<GenericLookupResult> = self.entries.iter().copied().collect();
        slots.sort_by(|a, b| a.compare(b, types));
        self.frozen = Some(slots);
    }

    /// Lookups in slot order.
    ///
    /// # Panics
    /// Panics if the layout is not frozen yet.
    pub fn slots(&self) -> &[GenericLookupResult] {
        ensure_frozen(self.frozen.as_deref())
    }

    pub fn slot_of(&self, lookup: &GenericLookupResult) -> Option<usize> {
        self.slots().iter().position(|slot| slot == lookup)
    }
}

/// All layouts of one compilation, keyed by canonical owner.
#[derive(Debug, Default)]
pub struct DictionaryLayouts {
    layouts: IndexMap<GenericContextOwner, DictionaryLayout>,
}

impl DictionaryLayouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        types: &dyn TypeSystem,
        owner: GenericContextOwner,
        lookup: GenericLookupResult,
    ) -> bool {
        let layout = self
            .layouts
            .entry(owner)
            .or_insert_with(|| DictionaryLayout::new(owner));
        let added = layout.register(lookup);
        if added {
            debug!(
                owner = %owner.name(types),
                lookup = %lookup.mangled_name(types),
                slots = layout.len(),
                "dictionary layout grew"
            );
        }
        added
    }

    pub fn get(&self, owner: GenericContextOwner) -> Option<&DictionaryLayout> {
        self.layouts.get(&owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DictionaryLayout> {
        self.layouts.values()
    }

    pub fn freeze_all(&mut self, types: &dyn TypeSystem) {
        for layout in self.layouts.values_mut() {
            layout.freeze(types);
        }
    }
}

/// Resolved slots of one concrete dictionary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericDictionary {
    pub owner: GenericContextOwner,
    pub instantiation: Instantiation,
    pub slots: Vec<(GenericLookupResult, DictionaryEntry)>,
}

impl GenericDictionary {
    /// Resolve every slot of a frozen `layout` under `instantiation`.
    pub fn build(
        layout: &DictionaryLayout,
        cx: &LookupContext<'_>,
        instantiation: Instantiation,
    ) -> Self {
        let slots = layout
            .slots()
            .iter()
            .map(|&lookup| (lookup, lookup.dictionary_entry(cx, &instantiation)))
            .collect();
        Self {
            owner: layout.owner(),
            instantiation,
            slots,
        }
    }

    /// An owner whose shared code performs no lookups.
    pub fn empty(owner: GenericContextOwner, instantiation: Instantiation) -> Self {
        Self {
            owner,
            instantiation,
            slots: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write slots `pointer_size` apart. An empty dictionary still takes
    /// one pointer so its symbol has an address of its own.
    pub fn emit(&self, builder: &mut ObjectDataBuilder, symbols: &SymbolTable) {
        if self.slots.is_empty() {
            builder.emit_zero_pointer();
            return;
        }
        for &(_, entry) in &self.slots {
            write_entry(builder, symbols, entry);
        }
    }
}
