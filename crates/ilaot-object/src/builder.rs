//! Append-only byte buffer for one object.
//!
//! Scalars are written little-endian. "Natural" values are pointer-sized for
//! the target, "half natural" values are half that. Relocations are recorded
//! at the cursor and reserve their width in zero bytes; the addend lives in
//! the record, never in the buffer.

use ilaot_core::TargetDetails;

use crate::invariants::{assert_alignment, assert_fits};
use crate::native_format::encode_compressed_uint;
use crate::object_data::{DefinedSymbol, ObjectData};
use crate::reloc::{RelocKind, Relocation, SymbolRef};

/// Ticket for bytes reserved now and patched later.
///
/// Tickets are consumed when redeemed, so redeeming one twice does not
/// compile. Debug builds also track outstanding tickets per builder.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be redeemed before finalize"]
pub struct Reservation {
    offset: u32,
    width: u8,
}

impl Reservation {
    pub fn offset(&self) -> u32 {
        self.offset
    }
}

#[derive(Debug)]
pub struct ObjectDataBuilder {
    target: TargetDetails,
    bytes: Vec<u8>,
    relocs: Vec<Relocation>,
    alignment: u32,
    defined_symbols: Vec<DefinedSymbol>,
    #[cfg(debug_assertions)]
    pending: Vec<(u32, u8)>,
}

impl ObjectDataBuilder {
    pub fn new(target: TargetDetails) -> Self {
        Self {
            target,
            bytes: Vec::new(),
            relocs: Vec::new(),
            alignment: 1,
            defined_symbols: Vec::new(),
            #[cfg(debug_assertions)]
            pending: Vec::new(),
        }
    }

    pub fn target(&self) -> TargetDetails {
        self.target
    }

    /// Current write offset.
    #[inline]
    pub fn count_bytes(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// Raise the object's alignment requirement. Never lowers it.
    pub fn require_initial_alignment(&mut self, align: u32) {
        assert_alignment(align);
        self.alignment = self.alignment.max(align);
    }

    /// Pad with zeros up to the next multiple of `align`.
    pub fn pad_alignment(&mut self, align: u32) {
        assert_alignment(align);
        let len = self.count_bytes();
        let padded = len.div_ceil(align) * align;
        self.emit_zeros((padded - len) as usize);
    }

    /// Require `align` for the object and pad the cursor to it.
    pub fn emit_alignment(&mut self, align: u32) {
        self.require_initial_alignment(align);
        self.pad_alignment(align);
    }

    fn emit_le(&mut self, value: u64, width: u8) {
        for i in 0..width {
            self.bytes.push((value >> (8 * u32::from(i))) as u8);
        }
    }

    fn patch_le(&mut self, offset: u32, value: u64, width: u8) {
        for i in 0..width {
            self.bytes[offset as usize + i as usize] = (value >> (8 * u32::from(i))) as u8;
        }
    }

    pub fn emit_byte(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn emit_short(&mut self, value: i16) {
        self.emit_le(value as u16 as u64, 2);
    }

    pub fn emit_ushort(&mut self, value: u16) {
        self.emit_le(u64::from(value), 2);
    }

    pub fn emit_int(&mut self, value: i32) {
        self.emit_le(value as u32 as u64, 4);
    }

    pub fn emit_uint(&mut self, value: u32) {
        self.emit_le(u64::from(value), 4);
    }

    pub fn emit_long(&mut self, value: i64) {
        self.emit_le(value as u64, 8);
    }

    pub fn emit_ulong(&mut self, value: u64) {
        self.emit_le(value, 8);
    }

    /// Pointer-sized signed integer.
    pub fn emit_natural_int(&mut self, value: i64) {
        let width = self.target.pointer_size();
        if width == 4 {
            assert_fits(i32::try_from(value).is_ok(), value, width);
        }
        self.emit_le(value as u64, width);
    }

    pub fn emit_natural_uint(&mut self, value: u64) {
        let width = self.target.pointer_size();
        if width == 4 {
            assert_fits(u32::try_from(value).is_ok(), value as i64, width);
        }
        self.emit_le(value, width);
    }

    /// Half-pointer-sized signed integer.
    pub fn emit_half_natural_int(&mut self, value: i32) {
        let width = self.target.pointer_size() / 2;
        if width == 2 {
            assert_fits(i16::try_from(value).is_ok(), i64::from(value), width);
        }
        self.emit_le(value as u32 as u64, width);
    }

    pub fn emit_half_natural_uint(&mut self, value: u32) {
        let width = self.target.pointer_size() / 2;
        if width == 2 {
            assert_fits(u16::try_from(value).is_ok(), i64::from(value), width);
        }
        self.emit_le(u64::from(value), width);
    }

    pub fn emit_compressed_uint(&mut self, value: u32) {
        encode_compressed_uint(value, &mut self.bytes);
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn emit_zeros(&mut self, count: usize) {
        self.bytes.resize(self.bytes.len() + count, 0);
    }

    pub fn emit_zero_pointer(&mut self) {
        self.emit_zeros(self.target.pointer_size() as usize);
    }

    fn reserve(&mut self, width: u8) -> Reservation {
        let offset = self.count_bytes();
        self.emit_zeros(width as usize);
        #[cfg(debug_assertions)]
        self.pending.push((offset, width));
        Reservation { offset, width }
    }

    fn redeem(&mut self, ticket: Reservation, width: u8, value: u64) {
        #[cfg(debug_assertions)]
        {
            let found = self
                .pending
                .iter()
                .position(|&p| p == (ticket.offset, ticket.width));
            let index = crate::invariants::ensure_pending_reservation(found, ticket.offset);
            self.pending.swap_remove(index);
        }
        debug_assert_eq!(ticket.width, width, "reservation redeemed at wrong width");
        self.patch_le(ticket.offset, value, width);
    }

    pub fn reserve_byte(&mut self) -> Reservation {
        self.reserve(1)
    }

    pub fn reserve_short(&mut self) -> Reservation {
        self.reserve(2)
    }

    pub fn reserve_int(&mut self) -> Reservation {
        self.reserve(4)
    }

    pub fn emit_reserved_byte(&mut self, ticket: Reservation, value: u8) {
        self.redeem(ticket, 1, u64::from(value));
    }

    pub fn emit_reserved_short(&mut self, ticket: Reservation, value: u16) {
        self.redeem(ticket, 2, u64::from(value));
    }

    pub fn emit_reserved_int(&mut self, ticket: Reservation, value: u32) {
        self.redeem(ticket, 4, u64::from(value));
    }

    /// Record a relocation at the cursor and advance by its width.
    ///
    /// Instruction-embedded kinds advance by zero: emit them just before the
    /// instruction whose bits they patch.
    pub fn emit_reloc(&mut self, target: SymbolRef, kind: RelocKind, addend: i64) {
        let offset = self.count_bytes();
        self.relocs.push(Relocation {
            kind,
            offset,
            target,
            addend,
        });
        self.emit_zeros(kind.width() as usize);
    }

    /// Record a relocation over bytes already in the buffer.
    pub fn add_reloc_at(&mut self, offset: u32, target: SymbolRef, kind: RelocKind, addend: i64) {
        debug_assert!(
            offset as usize + (kind.width().max(4) as usize) <= self.bytes.len(),
            "relocation at {offset} is past the emitted bytes"
        );
        self.relocs.push(Relocation {
            kind,
            offset,
            target,
            addend,
        });
    }

    /// Pointer-sized absolute relocation.
    pub fn emit_pointer_reloc(&mut self, target: SymbolRef, addend: i64) {
        let kind = RelocKind::pointer(self.target.pointer_size());
        self.emit_reloc(target, kind, addend);
    }

    /// Define `symbol` at the cursor.
    pub fn add_symbol(&mut self, symbol: SymbolRef) {
        let offset = self.count_bytes();
        self.defined_symbols.push(DefinedSymbol { symbol, offset });
    }

    pub fn finalize(self) -> ObjectData {
        #[cfg(debug_assertions)]
        crate::invariants::assert_no_pending_reservations(&self.pending);
        let mut relocs = self.relocs;
        relocs.sort_by_key(|r| r.offset);
        ObjectData::new(self.bytes, relocs, self.alignment, self.defined_symbols)
    }
}
