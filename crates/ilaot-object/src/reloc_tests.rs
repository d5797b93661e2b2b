use crate::{RelocKind, UnknownRelocKind};

const ALL: [RelocKind; 7] = [
    RelocKind::Abs32,
    RelocKind::Rel32,
    RelocKind::Dir64,
    RelocKind::SecRel,
    RelocKind::RelPtr32,
    RelocKind::Arm64Branch26,
    RelocKind::ThumbBranch24,
];

#[test]
fn widths() {
    let widths: Vec<u8> = ALL.iter().map(|k| k.width()).collect();
    assert_eq!(widths, vec![4, 4, 8, 4, 4, 0, 0]);
    assert!(RelocKind::Arm64Branch26.is_instruction_embedded());
    assert!(!RelocKind::Dir64.is_instruction_embedded());
}

#[test]
fn codes_roundtrip() {
    for kind in ALL {
        assert_eq!(RelocKind::try_from(kind.code()), Ok(kind));
    }
}

#[test]
fn unknown_code_is_rejected() {
    let err = RelocKind::try_from(0x42).unwrap_err();
    assert_eq!(err, UnknownRelocKind(0x42));
    assert_eq!(err.to_string(), "unknown relocation kind: 0x42");
}

#[test]
fn pointer_kind_follows_width() {
    assert_eq!(RelocKind::pointer(8), RelocKind::Dir64);
    assert_eq!(RelocKind::pointer(4), RelocKind::Abs32);
}
