//! Output section assembly for a WebAssembly linker.
//!
//! This library is the serialization half of a linker's write phase. An
//! external driver resolves symbols, orders fragments and assigns file
//! offsets; this crate turns that fixed plan into the exact bytes of the
//! output module's section list. It is organized into several modules:
//! - `encode`: LEB128 and string field writers.
//! - `fragment`: read-only capabilities of driver-owned input content.
//! - `reloc`: relocation record model and encoding.
//! - `section`: section builders and the finalize/place/write lifecycle.
//!
//! Sections move through three states: a builder is consumed by
//! `finalize()` into an immutable [`section::FinalizedSection`] (header
//! and sizes fixed), which is `place()`d at a driver-assigned offset, and
//! only the resulting [`section::PlacedSection`] can emit bytes.
//! Mis-ordering those steps is a compile error. Writes are plain memory
//! copies into disjoint ranges of one caller-owned buffer; nothing here
//! performs I/O or spawns threads.

pub mod encode;
pub mod fragment;
pub mod reloc;
pub mod section;
