//! Relocation records forwarded into the output.
//!
//! Content sections collect their fragments' relocation records so the
//! driver can emit a `reloc.*` companion section, which is what lets
//! downstream tools keep patching the image after this link. The record
//! layout is fixed by the format's linking convention and has to match
//! the LLVM toolchain bit for bit.

use anyhow::{anyhow, Result};

use crate::encode;

/// Relocation type codes (`R_WASM_*`) defined by the linking convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RelocKind {
    FunctionIndexLeb = 0,
    TableIndexSleb = 1,
    TableIndexI32 = 2,
    MemoryAddrLeb = 3,
    MemoryAddrSleb = 4,
    MemoryAddrI32 = 5,
    TypeIndexLeb = 6,
    GlobalIndexLeb = 7,
    FunctionOffsetI32 = 8,
    SectionOffsetI32 = 9,
    EventIndexLeb = 10,
    MemoryAddrRelSleb = 11,
    TableIndexRelSleb = 12,
    GlobalIndexI32 = 13,
    MemoryAddrLeb64 = 14,
    MemoryAddrSleb64 = 15,
    MemoryAddrI64 = 16,
    MemoryAddrRelSleb64 = 17,
    TableIndexSleb64 = 18,
    TableIndexI64 = 19,
    TableNumberLeb = 20,
    MemoryAddrTlsSleb = 21,
    FunctionOffsetI64 = 22,
    MemoryAddrLocrelI32 = 23,
    TableIndexRelSleb64 = 24,
    MemoryAddrTlsSleb64 = 25,
    FunctionIndexI32 = 26,
}

// Indexed by type code; from_code relies on the order.
const KINDS: [RelocKind; 27] = [
    RelocKind::FunctionIndexLeb,
    RelocKind::TableIndexSleb,
    RelocKind::TableIndexI32,
    RelocKind::MemoryAddrLeb,
    RelocKind::MemoryAddrSleb,
    RelocKind::MemoryAddrI32,
    RelocKind::TypeIndexLeb,
    RelocKind::GlobalIndexLeb,
    RelocKind::FunctionOffsetI32,
    RelocKind::SectionOffsetI32,
    RelocKind::EventIndexLeb,
    RelocKind::MemoryAddrRelSleb,
    RelocKind::TableIndexRelSleb,
    RelocKind::GlobalIndexI32,
    RelocKind::MemoryAddrLeb64,
    RelocKind::MemoryAddrSleb64,
    RelocKind::MemoryAddrI64,
    RelocKind::MemoryAddrRelSleb64,
    RelocKind::TableIndexSleb64,
    RelocKind::TableIndexI64,
    RelocKind::TableNumberLeb,
    RelocKind::MemoryAddrTlsSleb,
    RelocKind::FunctionOffsetI64,
    RelocKind::MemoryAddrLocrelI32,
    RelocKind::TableIndexRelSleb64,
    RelocKind::MemoryAddrTlsSleb64,
    RelocKind::FunctionIndexI32,
];

/// Width of the addend field a relocation type carries, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddendKind {
    None,
    Sleb32,
    Sleb64,
}

impl RelocKind {
    /// Raw type code as stored in relocation entries.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Maps a raw type code from an input object back to the known table.
    pub fn from_code(code: u8) -> Result<Self> {
        KINDS
            .get(code as usize)
            .copied()
            .ok_or_else(|| anyhow!("Unsupported relocation type code: {}", code))
    }

    /// Which addend field, if any, records of this type carry.
    pub fn addend_kind(self) -> AddendKind {
        use RelocKind::*;
        match self {
            MemoryAddrLeb | MemoryAddrSleb | MemoryAddrI32 | FunctionOffsetI32
            | SectionOffsetI32 | MemoryAddrRelSleb | MemoryAddrTlsSleb
            | MemoryAddrLocrelI32 => AddendKind::Sleb32,
            MemoryAddrLeb64 | MemoryAddrSleb64 | MemoryAddrI64 | FunctionOffsetI64
            | MemoryAddrRelSleb64 | MemoryAddrTlsSleb64 => AddendKind::Sleb64,
            _ => AddendKind::None,
        }
    }
}

/// A single relocation record. `offset` stays local to the fragment that
/// owns the record until a section translates it into body coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocEntry {
    pub kind: RelocKind,
    /// Byte offset of the patch target within the owning fragment.
    pub offset: u32,
    /// Symbol table index (type index for `TypeIndexLeb`, section index
    /// for `SectionOffsetI32`) the patch refers to.
    pub index: u32,
    /// Meaningful only when `kind.addend_kind()` says so.
    pub addend: i64,
}

impl RelocEntry {
    /// Encodes the record with `offset` shifted by `section_offset` into
    /// the owning section's body coordinates.
    pub fn write(&self, out: &mut Vec<u8>, section_offset: usize) {
        let offset = (self.offset as usize)
            .checked_add(section_offset)
            .and_then(|total| u32::try_from(total).ok())
            .expect("relocation offset overflows the format's u32 field");
        encode::write_u8(out, self.kind.code(), "reloc type");
        encode::write_uleb128(out, u64::from(offset), "reloc offset");
        encode::write_uleb128(out, u64::from(self.index), "reloc index");
        match self.kind.addend_kind() {
            AddendKind::None => {}
            AddendKind::Sleb32 => {
                let addend = i32::try_from(self.addend)
                    .expect("32-bit relocation addend out of range");
                encode::write_sleb128(out, i64::from(addend), "reloc addend");
            }
            AddendKind::Sleb64 => encode::write_sleb128(out, self.addend, "reloc addend"),
        }
    }
}
