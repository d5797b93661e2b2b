use ilaot_core::{Architecture, TargetDetails};

use crate::{ObjectDataBuilder, RelocKind, SymbolRef};

fn builder(arch: Architecture) -> ObjectDataBuilder {
    ObjectDataBuilder::new(TargetDetails::new(arch))
}

#[test]
fn scalars_are_little_endian() {
    let mut b = builder(Architecture::X64);
    b.emit_byte(0xAB);
    b.emit_ushort(0x1122);
    b.emit_uint(0x3344_5566);
    b.emit_short(-2);

    let data = b.finalize();
    assert_eq!(
        data.bytes(),
        &[0xAB, 0x22, 0x11, 0x66, 0x55, 0x44, 0x33, 0xFE, 0xFF]
    );
}

#[test]
fn natural_int_matches_pointer_width() {
    for (arch, value) in [
        (Architecture::X64, -0x1234_5678_9ABC_i64),
        (Architecture::Arm64, 42),
        (Architecture::X86, -7),
        (Architecture::Arm, 0x7FFF_FFFF),
    ] {
        let mut b = builder(arch);
        b.emit_byte(0);
        b.emit_natural_int(value);

        let width = arch.pointer_size() as usize;
        let data = b.finalize();
        assert_eq!(data.len(), 1 + width);

        let raw = data.read_le(1, width).unwrap();
        let read = if width == 8 {
            raw as i64
        } else {
            i64::from(raw as u32 as i32)
        };
        assert_eq!(read, value, "{arch:?}");
    }
}

#[test]
fn half_natural_is_half_pointer_width() {
    let mut wide = builder(Architecture::X64);
    wide.emit_half_natural_uint(0xDEAD_BEEF);
    assert_eq!(wide.finalize().bytes(), &[0xEF, 0xBE, 0xAD, 0xDE]);

    let mut narrow = builder(Architecture::X86);
    narrow.emit_half_natural_int(-1);
    assert_eq!(narrow.finalize().bytes(), &[0xFF, 0xFF]);
}

#[test]
fn patched_reservation_equals_direct_write() {
    let mut patched = builder(Architecture::X64);
    let ticket = patched.reserve_int();
    patched.emit_bytes(b"tail");
    patched.emit_reserved_int(ticket, 0x0102_0304);

    let mut direct = builder(Architecture::X64);
    direct.emit_uint(0x0102_0304);
    direct.emit_bytes(b"tail");

    assert_eq!(patched.finalize(), direct.finalize());
}

#[test]
fn reservations_of_each_width() {
    let mut b = builder(Architecture::X86);
    let byte = b.reserve_byte();
    let short = b.reserve_short();
    assert_eq!(short.offset(), 1);
    b.emit_reserved_short(short, 0xBEEF);
    b.emit_reserved_byte(byte, 9);

    assert_eq!(b.finalize().bytes(), &[9, 0xEF, 0xBE]);
}

#[test]
fn relocations_advance_by_width() {
    let mut b = builder(Architecture::X64);
    b.emit_pointer_reloc(SymbolRef::from_raw(1), 2);
    b.emit_reloc(SymbolRef::from_raw(2), RelocKind::Rel32, -4);
    b.emit_reloc(SymbolRef::from_raw(3), RelocKind::Arm64Branch26, 0);
    b.emit_uint(0x9400_0000);

    let data = b.finalize();
    assert_eq!(data.len(), 16);
    assert!(data.bytes()[..12].iter().all(|&x| x == 0));

    let listing: Vec<String> = data
        .relocs()
        .iter()
        .map(|r| format!("{:04x} {} {} {:+}", r.offset, r.kind, r.target, r.addend))
        .collect();
    insta::assert_snapshot!(listing.join("\n"), @r"
    0000 dir64 sym#1 +2
    0008 rel32 sym#2 -4
    000c arm64-branch26 sym#3 +0
    ");
}

#[test]
fn pointer_reloc_is_abs32_on_32_bit_targets() {
    let mut b = builder(Architecture::Arm);
    b.emit_pointer_reloc(SymbolRef::from_raw(7), 0);

    let data = b.finalize();
    assert_eq!(data.len(), 4);
    assert_eq!(data.relocs()[0].kind, RelocKind::Abs32);
}

#[test]
fn relocations_are_sorted_at_finalize() {
    let mut b = builder(Architecture::Arm64);
    b.emit_uint(0);
    b.emit_reloc(SymbolRef::from_raw(1), RelocKind::Rel32, 0);
    b.add_reloc_at(0, SymbolRef::from_raw(2), RelocKind::Arm64Branch26, 0);

    let offsets: Vec<u32> = b.finalize().relocs().iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![0, 4]);
}

#[test]
fn alignment_only_grows() {
    let mut b = builder(Architecture::X64);
    b.require_initial_alignment(8);
    b.require_initial_alignment(4);
    assert_eq!(b.alignment(), 8);

    b.emit_byte(1);
    b.emit_alignment(16);
    assert_eq!(b.count_bytes(), 16);
    assert_eq!(b.finalize().alignment(), 16);
}

#[test]
fn symbols_are_defined_at_cursor() {
    let mut b = builder(Architecture::X64);
    b.add_symbol(SymbolRef::from_raw(10));
    b.emit_zero_pointer();
    b.add_symbol(SymbolRef::from_raw(11));

    let data = b.finalize();
    let defined: Vec<(u32, u32)> = data
        .defined_symbols()
        .iter()
        .map(|d| (d.symbol.as_u32(), d.offset))
        .collect();
    assert_eq!(defined, vec![(10, 0), (11, 8)]);
}

#[test]
fn compressed_uint_goes_through_buffer() {
    let mut b = builder(Architecture::X64);
    b.emit_compressed_uint(127);
    b.emit_compressed_uint(128);

    assert_eq!(b.finalize().bytes(), &[0xFE, 0x01, 0x02]);
}

#[test]
#[should_panic(expected = "not a power of two")]
fn rejects_non_power_of_two_alignment() {
    builder(Architecture::X64).require_initial_alignment(3);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "unredeemed reservations")]
fn finalize_with_outstanding_reservation_panics() {
    let mut b = builder(Architecture::X64);
    let _ticket = b.reserve_int();
    b.finalize();
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "is not outstanding")]
fn foreign_reservation_panics() {
    let mut a = builder(Architecture::X64);
    let mut b = builder(Architecture::X64);
    b.emit_bytes(&[0; 8]);
    let ticket = a.reserve_short();
    b.emit_reserved_short(ticket, 1);
}
