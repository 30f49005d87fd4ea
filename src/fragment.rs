//! Capabilities of the input content that sections assemble.
//!
//! Fragments are produced upstream (object readers, synthesis passes)
//! and stay owned by the driver; sections only borrow them and never
//! mutate them. A fragment knows its encoded size, how to write itself
//! into a caller-provided slice, and which relocation records it
//! carries.

use crate::reloc::RelocEntry;

/// A resolved, immutable unit of section content, such as a compiled
/// function body or one input's slice of a custom section.
pub trait Fragment {
    /// Exact number of bytes `write` emits.
    fn size(&self) -> usize;

    /// Writes the fragment's encoding into `out`. Sections hand each
    /// fragment exactly its own `size()`-byte window of the body, so a
    /// fragment cannot clobber its neighbours.
    fn write(&self, out: &mut [u8]);

    /// Relocation records owned by this fragment, with offsets relative
    /// to the start of its own encoding. Synthesized content usually has
    /// none.
    fn relocations(&self) -> &[RelocEntry] {
        &[]
    }
}

/// Placement of an active data segment in linear memory. The data
/// section derives the segment's header (memory index, init expression,
/// size) from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Index of the linear memory the segment initializes.
    pub memory_index: u32,
    /// Base address, emitted as an `i32.const` initializer.
    pub base: i32,
}

/// A resolved data segment: raw bytes plus the descriptor its header is
/// encoded from.
pub trait SegmentFragment: Fragment {
    fn descriptor(&self) -> SegmentDescriptor;
}
