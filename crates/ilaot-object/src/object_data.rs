//! Finalized object data.

use crate::reloc::{Relocation, SymbolRef};

/// A symbol defined at an offset within the object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DefinedSymbol {
    pub symbol: SymbolRef,
    pub offset: u32,
}

/// Immutable output of one [`ObjectDataBuilder`](crate::ObjectDataBuilder).
///
/// Relocations are sorted by offset; placeholder bytes under them are zero.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ObjectData {
    bytes: Box<[u8]>,
    relocs: Box<[Relocation]>,
    alignment: u32,
    defined_symbols: Box<[DefinedSymbol]>,
}

impl ObjectData {
    pub(crate) fn new(
        bytes: Vec<u8>,
        relocs: Vec<Relocation>,
        alignment: u32,
        defined_symbols: Vec<DefinedSymbol>,
    ) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
            relocs: relocs.into_boxed_slice(),
            alignment,
            defined_symbols: defined_symbols.into_boxed_slice(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn relocs(&self) -> &[Relocation] {
        &self.relocs
    }

    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    pub fn defined_symbols(&self) -> &[DefinedSymbol] {
        &self.defined_symbols
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a little-endian unsigned value of `width` bytes at `offset`.
    ///
    /// Returns `None` if the range falls outside the data.
    pub fn read_le(&self, offset: usize, width: usize) -> Option<u64> {
        let end = offset.checked_add(width)?;
        let slice = self.bytes.get(offset..end)?;
        Some(
            slice
                .iter()
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
        )
    }
}
