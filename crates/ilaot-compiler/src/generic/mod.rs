//! Generic lookups and the dictionaries that hold them.
//!
//! Shared canonical code cannot embed instantiation-specific addresses. It
//! names what it needs as [`GenericLookupResult`]s; each concrete
//! instantiation gets a dictionary with one resolved slot per lookup.

mod dictionary;
mod lookup;

#[cfg(test)]
mod dictionary_tests;

use ilaot_core::{CompilationOptions, TypeSystem};

use crate::nodes::{NodeFactory, VTableLayouts};

pub use dictionary::{DictionaryLayout, DictionaryLayouts, GenericContextOwner, GenericDictionary};
pub use lookup::{
    ConverterKind, DictionaryEntry, FAT_POINTER_TAG, GenericLookupResult, INDIRECTION_TAG,
    ReferenceKind,
};

/// What lookups need to resolve: the oracle, the options, node interning
/// and (for vtable offsets) the vtable layouts.
#[derive(Clone, Copy)]
pub struct LookupContext<'a> {
    pub types: &'a dyn TypeSystem,
    pub options: &'a CompilationOptions,
    pub factory: &'a NodeFactory,
    pub vtables: &'a VTableLayouts,
}
