#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Object data emission for ilaot.
//!
//! - `reloc` - relocation kinds, records and opaque symbol references
//! - `builder` - append-only byte buffer with reservations and relocations
//! - `object_data` - immutable snapshot handed to the object writer
//! - `native_format` - compressed unsigned integer encoding

pub mod builder;
mod invariants;
pub mod native_format;
pub mod object_data;
pub mod reloc;

#[cfg(test)]
mod builder_tests;
#[cfg(test)]
mod reloc_tests;

pub use builder::{ObjectDataBuilder, Reservation};
pub use native_format::{NativeFormatError, decode_compressed_uint, encode_compressed_uint};
pub use object_data::{DefinedSymbol, ObjectData};
pub use reloc::{RelocKind, Relocation, SymbolRef, UnknownRelocKind};
