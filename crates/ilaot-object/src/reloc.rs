//! Relocation records.

use std::fmt;

/// Opaque reference to a symbol the object writer resolves.
///
/// The object crate never interprets it; the compiler maps its node handles
/// onto these.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolRef(u32);

impl SymbolRef {
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym#{}", self.0)
    }
}

/// Relocation kinds understood by the object writer.
///
/// Instruction-embedded kinds patch bits of an instruction that is already
/// in the buffer and occupy no bytes of their own.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[repr(u8)]
pub enum RelocKind {
    /// 32-bit absolute address.
    Abs32 = 0x01,
    /// 32-bit PC-relative displacement.
    Rel32 = 0x02,
    /// 64-bit absolute address.
    Dir64 = 0x03,
    /// 32-bit offset from the start of the target's section.
    SecRel = 0x04,
    /// 32-bit offset relative to the relocation's own location.
    RelPtr32 = 0x05,
    /// ARM64 `b`/`bl` 26-bit branch immediate.
    Arm64Branch26 = 0x10,
    /// Thumb-2 24-bit branch immediate.
    ThumbBranch24 = 0x11,
}

impl RelocKind {
    /// Bytes the relocation occupies in the buffer.
    pub fn width(self) -> u8 {
        match self {
            Self::Abs32 | Self::Rel32 | Self::SecRel | Self::RelPtr32 => 4,
            Self::Dir64 => 8,
            Self::Arm64Branch26 | Self::ThumbBranch24 => 0,
        }
    }

    pub fn is_instruction_embedded(self) -> bool {
        self.width() == 0
    }

    /// Absolute pointer relocation for the given pointer width.
    pub fn pointer(pointer_size: u8) -> Self {
        match pointer_size {
            8 => Self::Dir64,
            _ => Self::Abs32,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RelocKind {
    type Error = UnknownRelocKind;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0x01 => Self::Abs32,
            0x02 => Self::Rel32,
            0x03 => Self::Dir64,
            0x04 => Self::SecRel,
            0x05 => Self::RelPtr32,
            0x10 => Self::Arm64Branch26,
            0x11 => Self::ThumbBranch24,
            _ => return Err(UnknownRelocKind(code)),
        })
    }
}

impl fmt::Display for RelocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Abs32 => "abs32",
            Self::Rel32 => "rel32",
            Self::Dir64 => "dir64",
            Self::SecRel => "secrel",
            Self::RelPtr32 => "relptr32",
            Self::Arm64Branch26 => "arm64-branch26",
            Self::ThumbBranch24 => "thumb-branch24",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown relocation kind: {0:#04x}")]
pub struct UnknownRelocKind(pub u8);

/// One relocation: patch `kind` at `offset` with the address of `target`
/// plus `addend`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Relocation {
    pub kind: RelocKind,
    pub offset: u32,
    pub target: SymbolRef,
    pub addend: i64,
}
