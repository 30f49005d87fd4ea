//! Output section assembly.
//!
//! The driver decides which sections exist and in what order; this
//! module turns each planned section into bytes. A builder (one per
//! section shape) is consumed by `finalize()`, which fixes the body
//! layout and encodes the section header. The resulting
//! [`FinalizedSection`] is immutable: it can report sizes, forward its
//! fragments' relocation records, and be `place()`d at a file offset.
//! Only the [`PlacedSection`] handle obtained from placement can write
//! bytes, so a section cannot be emitted before its layout and position
//! are fixed.
//!
//! Custom sections with the same name from different inputs are merged
//! by concatenating their payloads after a single leading name blob.
//! Relocation sections are derived last, once the final section order
//! (and with it each target's index) is known.

use std::borrow::Cow;
use std::fmt;

use tracing::debug;

use crate::encode;
use crate::fragment::{Fragment, SegmentFragment};

/// Section type tags of the container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SectionKind {
    Custom = 0,
    Type = 1,
    Import = 2,
    Function = 3,
    Table = 4,
    Memory = 5,
    Global = 6,
    Export = 7,
    Start = 8,
    Element = 9,
    Code = 10,
    Data = 11,
    DataCount = 12,
}

impl SectionKind {
    /// Tag byte as stored in the section header.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Uppercase name, matching what binary inspection tools print.
    pub fn display_name(self) -> &'static str {
        match self {
            SectionKind::Custom => "CUSTOM",
            SectionKind::Type => "TYPE",
            SectionKind::Import => "IMPORT",
            SectionKind::Function => "FUNCTION",
            SectionKind::Table => "TABLE",
            SectionKind::Memory => "MEMORY",
            SectionKind::Global => "GLOBAL",
            SectionKind::Export => "EXPORT",
            SectionKind::Start => "START",
            SectionKind::Element => "ELEM",
            SectionKind::Code => "CODE",
            SectionKind::Data => "DATA",
            SectionKind::DataCount => "DATACOUNT",
        }
    }
}

/// Encodes a section header: the tag byte followed by the body size as
/// a ULEB128.
fn encode_header(kind: SectionKind, body_size: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(6);
    encode::write_u8(&mut header, kind.code(), "section type");
    encode::write_uleb128(&mut header, body_size as u64, "section size");
    header
}

/// Assembles the code section from resolved function bodies. The order
/// of `functions` is the function index order the driver already fixed
/// during symbol resolution.
pub struct CodeSection<'a> {
    functions: &'a [&'a dyn Fragment],
}

impl<'a> CodeSection<'a> {
    /// The driver must omit the section entirely rather than build it
    /// with no functions.
    pub fn new(functions: &'a [&'a dyn Fragment]) -> Self {
        assert!(!functions.is_empty(), "code section built with no functions");
        Self { functions }
    }

    pub fn finalize(self) -> FinalizedSection<'a> {
        let mut count_prefix = Vec::new();
        encode::write_uleb128(&mut count_prefix, self.functions.len() as u64, "function count");

        let mut starts = Vec::with_capacity(self.functions.len());
        let mut body_size = count_prefix.len();
        for function in self.functions {
            starts.push(body_size);
            body_size += function.size();
        }

        FinalizedSection::new(
            SectionKind::Code,
            None,
            body_size,
            FinalizedBody::Code { functions: self.functions, count_prefix, starts },
        )
    }
}

/// Assembles the data section from resolved active segments.
pub struct DataSection<'a> {
    segments: &'a [&'a dyn SegmentFragment],
}

impl<'a> DataSection<'a> {
    /// As with code, an empty segment list means the driver should have
    /// omitted the section.
    pub fn new(segments: &'a [&'a dyn SegmentFragment]) -> Self {
        assert!(!segments.is_empty(), "data section built with no segments");
        Self { segments }
    }

    pub fn finalize(self) -> FinalizedSection<'a> {
        let mut count_prefix = Vec::new();
        encode::write_uleb128(&mut count_prefix, self.segments.len() as u64, "data segment count");

        let mut headers = Vec::with_capacity(self.segments.len());
        let mut data_starts = Vec::with_capacity(self.segments.len());
        let mut body_size = count_prefix.len();
        for segment in self.segments {
            let descriptor = segment.descriptor();
            let mut header = Vec::new();
            encode::write_uleb128(&mut header, u64::from(descriptor.memory_index), "memory index");
            encode::write_i32_const_expr(&mut header, descriptor.base, "segment base");
            encode::write_uleb128(&mut header, segment.size() as u64, "segment size");

            body_size += header.len();
            data_starts.push(body_size);
            body_size += segment.size();
            headers.push(header);
        }

        FinalizedSection::new(
            SectionKind::Data,
            None,
            body_size,
            FinalizedBody::Data { segments: self.segments, count_prefix, headers, data_starts },
        )
    }
}

/// Merges the same-named custom sections of every input into one output
/// section. The format keys custom sections by name; the payloads are
/// concatenated in input order after a single leading name blob.
pub struct CustomSection<'a> {
    name: &'a str,
    parts: &'a [&'a dyn Fragment],
}

impl<'a> CustomSection<'a> {
    pub fn new(name: &'a str, parts: &'a [&'a dyn Fragment]) -> Self {
        assert!(!parts.is_empty(), "custom section {name:?} built with no input fragments");
        Self { name, parts }
    }

    pub fn finalize(self) -> FinalizedSection<'a> {
        let mut name_data = Vec::new();
        encode::write_str(&mut name_data, self.name, "section name");

        let mut starts = Vec::with_capacity(self.parts.len());
        let mut payload_size = 0usize;
        for part in self.parts {
            starts.push(name_data.len() + payload_size);
            payload_size += part.size();
        }

        FinalizedSection::new(
            SectionKind::Custom,
            Some(Cow::Borrowed(self.name)),
            name_data.len() + payload_size,
            FinalizedBody::Custom { parts: self.parts, name_data, starts, payload_size },
        )
    }
}

/// A section whose body the linker generates itself instead of merging
/// from inputs: relocation tables, and the fixed-form sections the
/// driver synthesizes (type, function, memory and the rest).
///
/// The body is built by appending to [`SyntheticSection::stream`]. For
/// named sections the length-prefixed name is written at construction,
/// before any other content, since the format requires the name to open
/// the body.
pub struct SyntheticSection {
    kind: SectionKind,
    name: Option<String>,
    body: Vec<u8>,
}

impl SyntheticSection {
    /// A synthetic section with one of the numbered section types.
    pub fn standard(kind: SectionKind) -> Self {
        assert!(kind != SectionKind::Custom, "custom synthetic sections need a name");
        Self { kind, name: None, body: Vec::new() }
    }

    /// A synthetic custom section; `name` is encoded into the body
    /// immediately.
    pub fn custom(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut body = Vec::new();
        encode::write_str(&mut body, &name, "section name");
        Self { kind: SectionKind::Custom, name: Some(name), body }
    }

    /// Append-only stream the body is built through.
    pub fn stream(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    pub fn finalize(self) -> FinalizedSection<'static> {
        let body_size = self.body.len();
        FinalizedSection::new(
            self.kind,
            self.name.map(Cow::Owned),
            body_size,
            FinalizedBody::Synthetic { body: self.body },
        )
    }
}

/// Describes the relocations of one already-finalized section. Built
/// last, after the driver fixed the section order, because the body
/// opens with the target's index in that order.
pub struct RelocSection<'a> {
    name: String,
    target: &'a FinalizedSection<'a>,
    target_index: u32,
}

impl<'a> RelocSection<'a> {
    /// Names follow the reserved `reloc.` convention: `reloc.CODE`,
    /// `reloc.DATA`, or `reloc.<name>` for a custom target.
    pub fn new(target: &'a FinalizedSection<'a>, target_index: u32) -> Self {
        let name = match target.name() {
            Some(name) => format!("reloc.{name}"),
            None => format!("reloc.{}", target.kind().display_name()),
        };
        Self { name, target, target_index }
    }

    /// Snapshots the target's records into an owned body, so the result
    /// no longer borrows the target.
    pub fn finalize(self) -> FinalizedSection<'static> {
        let mut section = SyntheticSection::custom(self.name);
        let out = section.stream();
        encode::write_uleb128(out, u64::from(self.target_index), "reloc target section");
        encode::write_uleb128(out, u64::from(self.target.relocation_count()), "reloc count");
        self.target.write_relocations(out);
        section.finalize()
    }
}

/// A planned output section. The driver's section plan is a list of
/// these, in module order; the set of section shapes is closed.
pub enum OutputSection<'a> {
    Code(CodeSection<'a>),
    Data(DataSection<'a>),
    Custom(CustomSection<'a>),
    Synthetic(SyntheticSection),
    Reloc(RelocSection<'a>),
}

impl<'a> OutputSection<'a> {
    pub fn finalize(self) -> FinalizedSection<'a> {
        match self {
            OutputSection::Code(section) => section.finalize(),
            OutputSection::Data(section) => section.finalize(),
            OutputSection::Custom(section) => section.finalize(),
            OutputSection::Synthetic(section) => section.finalize(),
            OutputSection::Reloc(section) => section.finalize(),
        }
    }
}

impl<'a> From<CodeSection<'a>> for OutputSection<'a> {
    fn from(section: CodeSection<'a>) -> Self {
        OutputSection::Code(section)
    }
}

impl<'a> From<DataSection<'a>> for OutputSection<'a> {
    fn from(section: DataSection<'a>) -> Self {
        OutputSection::Data(section)
    }
}

impl<'a> From<CustomSection<'a>> for OutputSection<'a> {
    fn from(section: CustomSection<'a>) -> Self {
        OutputSection::Custom(section)
    }
}

impl<'a> From<SyntheticSection> for OutputSection<'a> {
    fn from(section: SyntheticSection) -> Self {
        OutputSection::Synthetic(section)
    }
}

impl<'a> From<RelocSection<'a>> for OutputSection<'a> {
    fn from(section: RelocSection<'a>) -> Self {
        OutputSection::Reloc(section)
    }
}

/// Body layout fixed by `finalize()`. Fragment start offsets are cached
/// here, relative to the body start, so writing and relocation
/// translation agree on coordinates.
enum FinalizedBody<'a> {
    Code {
        functions: &'a [&'a dyn Fragment],
        count_prefix: Vec<u8>,
        starts: Vec<usize>,
    },
    Data {
        segments: &'a [&'a dyn SegmentFragment],
        count_prefix: Vec<u8>,
        headers: Vec<Vec<u8>>,
        data_starts: Vec<usize>,
    },
    Custom {
        parts: &'a [&'a dyn Fragment],
        name_data: Vec<u8>,
        starts: Vec<usize>,
        payload_size: usize,
    },
    Synthetic {
        body: Vec<u8>,
    },
}

/// A section whose content layout and header are fixed.
pub struct FinalizedSection<'a> {
    kind: SectionKind,
    name: Option<Cow<'a, str>>,
    header: Vec<u8>,
    body_size: usize,
    body: FinalizedBody<'a>,
}

impl<'a> FinalizedSection<'a> {
    fn new(
        kind: SectionKind,
        name: Option<Cow<'a, str>>,
        body_size: usize,
        body: FinalizedBody<'a>,
    ) -> Self {
        let header = encode_header(kind, body_size);
        let section = Self { kind, name, header, body_size, body };
        debug!(body = body_size, total = section.size(), "finalized section {}", section);
        section
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    /// Name, for custom sections only.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Encoded section header: tag byte plus body size.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn body_size(&self) -> usize {
        self.body_size
    }

    /// Total on-file size, header included.
    pub fn size(&self) -> usize {
        self.header.len() + self.body_size
    }

    /// Merged payload bytes of a custom section, excluding the leading
    /// name blob. `None` for every other kind.
    pub fn payload_size(&self) -> Option<usize> {
        match &self.body {
            FinalizedBody::Custom { payload_size, .. } => Some(*payload_size),
            _ => None,
        }
    }

    /// Number of relocation records this section forwards.
    pub fn relocation_count(&self) -> u32 {
        let count: usize = match &self.body {
            FinalizedBody::Code { functions, .. } => {
                functions.iter().map(|function| function.relocations().len()).sum()
            }
            FinalizedBody::Data { segments, .. } => {
                segments.iter().map(|segment| segment.relocations().len()).sum()
            }
            FinalizedBody::Custom { parts, .. } => {
                parts.iter().map(|part| part.relocations().len()).sum()
            }
            FinalizedBody::Synthetic { .. } => 0,
        };
        u32::try_from(count).expect("relocation count overflows u32")
    }

    /// Appends every relocation record to `out` in fragment order, with
    /// offsets translated into this section's body coordinates.
    pub fn write_relocations(&self, out: &mut Vec<u8>) {
        match &self.body {
            FinalizedBody::Code { functions, starts, .. } => {
                for (function, start) in functions.iter().zip(starts) {
                    for entry in function.relocations() {
                        entry.write(out, *start);
                    }
                }
            }
            FinalizedBody::Data { segments, data_starts, .. } => {
                for (segment, start) in segments.iter().zip(data_starts) {
                    for entry in segment.relocations() {
                        entry.write(out, *start);
                    }
                }
            }
            FinalizedBody::Custom { parts, starts, .. } => {
                for (part, start) in parts.iter().zip(starts) {
                    for entry in part.relocations() {
                        entry.write(out, *start);
                    }
                }
            }
            FinalizedBody::Synthetic { .. } => {}
        }
    }

    /// Assigns the absolute file position this section will occupy.
    /// Placement can be redone when the driver recomputes the layout;
    /// whichever handle is used for writing wins. Offset 0 is always a
    /// driver bug, the module preamble owns the start of the file.
    pub fn place(&self, offset: usize) -> PlacedSection<'_> {
        assert!(offset != 0, "section {} placed at offset 0, inside the module preamble", self);
        debug!(offset, size = self.size(), "placing section {}", self);
        PlacedSection { section: self, offset }
    }

    fn write_body(&self, out: &mut [u8]) {
        match &self.body {
            FinalizedBody::Code { functions, count_prefix, starts } => {
                out[..count_prefix.len()].copy_from_slice(count_prefix);
                for (function, start) in functions.iter().zip(starts) {
                    function.write(&mut out[*start..*start + function.size()]);
                }
            }
            FinalizedBody::Data { segments, count_prefix, headers, data_starts } => {
                out[..count_prefix.len()].copy_from_slice(count_prefix);
                for ((segment, header), data_start) in
                    segments.iter().zip(headers).zip(data_starts)
                {
                    let header_start = *data_start - header.len();
                    out[header_start..*data_start].copy_from_slice(header);
                    segment.write(&mut out[*data_start..*data_start + segment.size()]);
                }
            }
            FinalizedBody::Custom { parts, name_data, starts, .. } => {
                out[..name_data.len()].copy_from_slice(name_data);
                for (part, start) in parts.iter().zip(starts) {
                    part.write(&mut out[*start..*start + part.size()]);
                }
            }
            FinalizedBody::Synthetic { body } => {
                out.copy_from_slice(body);
            }
        }
    }
}

impl fmt::Display for FinalizedSection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({})", self.kind.display_name(), name),
            None => write!(f, "{}", self.kind.display_name()),
        }
    }
}

/// A finalized section paired with its assigned file offset; the only
/// state from which bytes reach the output buffer.
#[derive(Clone, Copy)]
pub struct PlacedSection<'s> {
    section: &'s FinalizedSection<'s>,
    offset: usize,
}

impl<'s> PlacedSection<'s> {
    pub fn section(&self) -> &'s FinalizedSection<'s> {
        self.section
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// First byte past the section, the next section's natural offset.
    pub fn end(&self) -> usize {
        self.offset + self.section.size()
    }

    /// Copies header then body into `buf` at `offset..end()`. The driver
    /// guarantees placed ranges are disjoint; the buffer bound is
    /// checked here.
    pub fn write(&self, buf: &mut [u8]) {
        let end = self.end();
        assert!(
            end <= buf.len(),
            "section {} at {}..{} does not fit the output buffer of {} bytes",
            self.section,
            self.offset,
            end,
            buf.len()
        );
        debug!(offset = self.offset, end, "writing section {}", self.section);

        let out = &mut buf[self.offset..end];
        let header = self.section.header();
        out[..header.len()].copy_from_slice(header);
        self.section.write_body(&mut out[header.len()..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::SegmentDescriptor;
    use crate::reloc::{RelocEntry, RelocKind};

    struct TestFragment {
        bytes: Vec<u8>,
        relocs: Vec<RelocEntry>,
    }

    impl TestFragment {
        fn new(bytes: &[u8]) -> Self {
            Self { bytes: bytes.to_vec(), relocs: Vec::new() }
        }

        fn with_reloc(mut self, kind: RelocKind, offset: u32, index: u32) -> Self {
            self.relocs.push(RelocEntry { kind, offset, index, addend: 0 });
            self
        }
    }

    impl Fragment for TestFragment {
        fn size(&self) -> usize {
            self.bytes.len()
        }

        fn write(&self, out: &mut [u8]) {
            out.copy_from_slice(&self.bytes);
        }

        fn relocations(&self) -> &[RelocEntry] {
            &self.relocs
        }
    }

    struct TestSegment {
        fragment: TestFragment,
        descriptor: SegmentDescriptor,
    }

    impl Fragment for TestSegment {
        fn size(&self) -> usize {
            self.fragment.size()
        }

        fn write(&self, out: &mut [u8]) {
            self.fragment.write(out);
        }

        fn relocations(&self) -> &[RelocEntry] {
            self.fragment.relocations()
        }
    }

    impl SegmentFragment for TestSegment {
        fn descriptor(&self) -> SegmentDescriptor {
            self.descriptor
        }
    }

    fn decode_uleb(bytes: &[u8]) -> (u64, usize) {
        let mut value = 0u64;
        let mut shift = 0;
        for (i, byte) in bytes.iter().enumerate() {
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return (value, i + 1);
            }
            shift += 7;
        }
        panic!("unterminated uleb128");
    }

    #[test]
    fn section_tags_match_the_format() {
        let tags = [
            (SectionKind::Custom, 0, "CUSTOM"),
            (SectionKind::Type, 1, "TYPE"),
            (SectionKind::Import, 2, "IMPORT"),
            (SectionKind::Function, 3, "FUNCTION"),
            (SectionKind::Table, 4, "TABLE"),
            (SectionKind::Memory, 5, "MEMORY"),
            (SectionKind::Global, 6, "GLOBAL"),
            (SectionKind::Export, 7, "EXPORT"),
            (SectionKind::Start, 8, "START"),
            (SectionKind::Element, 9, "ELEM"),
            (SectionKind::Code, 10, "CODE"),
            (SectionKind::Data, 11, "DATA"),
            (SectionKind::DataCount, 12, "DATACOUNT"),
        ];
        for (kind, code, name) in tags {
            assert_eq!(kind.code(), code);
            assert_eq!(kind.display_name(), name);
        }
    }

    #[test]
    fn header_round_trips_across_varint_widths() {
        for body_len in [0usize, 127, 128, 16383, 16384] {
            let mut section = SyntheticSection::standard(SectionKind::Type);
            section.stream().resize(body_len, 0);
            let finalized = section.finalize();

            let header = finalized.header();
            assert_eq!(header[0], SectionKind::Type.code());
            let (decoded, used) = decode_uleb(&header[1..]);
            assert_eq!(decoded, body_len as u64);
            assert_eq!(header.len(), 1 + used);
            assert_eq!(finalized.size(), header.len() + body_len);
        }
    }

    #[test]
    fn code_section_sums_function_sizes() {
        let f1 = TestFragment::new(&[1, 2, 3, 4, 5]);
        let f2 = TestFragment::new(&[6, 7, 8, 9, 10, 11, 12]);
        let functions: Vec<&dyn Fragment> = vec![&f1, &f2];
        let section = CodeSection::new(&functions).finalize();

        // one count byte, then the two bodies
        assert_eq!(section.body_size(), 1 + 5 + 7);
        assert_eq!(section.size(), section.header().len() + section.body_size());
        assert_eq!(section.payload_size(), None);

        let placed = section.place(8);
        let mut buf = vec![0u8; placed.end()];
        placed.write(&mut buf);
        assert_eq!(buf[8], SectionKind::Code.code());
        assert_eq!(buf[9], 13); // body size
        assert_eq!(buf[10], 2); // function count
        assert_eq!(buf[11..16], [1, 2, 3, 4, 5]);
        assert_eq!(buf[16..23], [6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn code_relocations_shift_by_function_start() {
        let f1 = TestFragment::new(&[1, 2, 3, 4, 5])
            .with_reloc(RelocKind::FunctionIndexLeb, 1, 7);
        let f2 = TestFragment::new(&[6, 7, 8, 9, 10, 11, 12])
            .with_reloc(RelocKind::TypeIndexLeb, 2, 3);
        let functions: Vec<&dyn Fragment> = vec![&f1, &f2];
        let section = CodeSection::new(&functions).finalize();

        assert_eq!(section.relocation_count(), 2);
        let mut out = Vec::new();
        section.write_relocations(&mut out);
        // f1 starts right after the count byte, f2 five bytes later
        assert_eq!(out, [0x00, 2, 7, 0x06, 8, 3]);
    }

    #[test]
    fn data_section_encodes_segment_headers() {
        let seg = TestSegment {
            fragment: TestFragment::new(b"abc").with_reloc(RelocKind::MemoryAddrI32, 0, 2),
            descriptor: SegmentDescriptor { memory_index: 0, base: 1024 },
        };
        let segments: Vec<&dyn SegmentFragment> = vec![&seg];
        let section = DataSection::new(&segments).finalize();

        // count, then per segment: memory index + init expr + size, then bytes
        let segment_header = [0x00, 0x41, 0x80, 0x08, 0x0b, 0x03];
        assert_eq!(section.body_size(), 1 + segment_header.len() + 3);
        assert_eq!(section.size(), section.header().len() + section.body_size());

        let placed = section.place(2);
        let mut buf = vec![0u8; placed.end()];
        placed.write(&mut buf);
        assert_eq!(buf[2], SectionKind::Data.code());
        assert_eq!(buf[3], 10); // body size
        assert_eq!(buf[4], 1); // segment count
        assert_eq!(buf[5..11], segment_header);
        assert_eq!(buf[11..14], *b"abc");

        // local offset 0 lands on the segment's first data byte
        let mut records = Vec::new();
        section.write_relocations(&mut records);
        assert_eq!(records, [5, 7, 2, 0]);
    }

    #[test]
    fn custom_section_merges_same_named_inputs() {
        let a = TestFragment::new(&[0xaa; 10]).with_reloc(RelocKind::SectionOffsetI32, 4, 1);
        let b = TestFragment::new(&[0xbb; 20]).with_reloc(RelocKind::SectionOffsetI32, 6, 1);
        let parts: Vec<&dyn Fragment> = vec![&a, &b];
        let section = CustomSection::new("env.meta", &parts).finalize();

        assert_eq!(section.payload_size(), Some(30));
        let name_len = 1 + "env.meta".len();
        assert_eq!(section.body_size(), name_len + 30);

        let placed = section.place(16);
        let mut buf = vec![0u8; placed.end()];
        placed.write(&mut buf);
        let body = &buf[16 + section.header().len()..];
        assert_eq!(body[0], 8); // name length
        assert_eq!(body[1..9], *b"env.meta");
        assert_eq!(body[9..19], [0xaa; 10]);
        assert_eq!(body[19..39], [0xbb; 20]);

        // both offsets shift past the name blob, the second also past
        // the first fragment's ten bytes
        let mut records = Vec::new();
        section.write_relocations(&mut records);
        assert_eq!(records, [9, 13, 1, 0, 9, 25, 1, 0]);
    }

    #[test]
    fn synthetic_custom_sections_lead_with_their_name() {
        let mut section = SyntheticSection::custom("producers");
        section.stream().extend_from_slice(&[1, 2, 3]);
        let finalized = section.finalize();
        assert_eq!(finalized.kind(), SectionKind::Custom);
        assert_eq!(finalized.name(), Some("producers"));
        assert_eq!(finalized.body_size(), 1 + 9 + 3);
        assert_eq!(finalized.relocation_count(), 0);

        let placed = finalized.place(1);
        let mut buf = vec![0u8; placed.end()];
        placed.write(&mut buf);
        assert_eq!(buf[1], 0); // custom tag
        assert_eq!(buf[2], 13); // body size
        assert_eq!(buf[3], 9); // name length
        assert_eq!(buf[4..13], *b"producers");
        assert_eq!(buf[13..16], [1, 2, 3]);
    }

    #[test]
    fn reloc_section_over_target_without_records() {
        let f = TestFragment::new(&[0x0b]);
        let functions: Vec<&dyn Fragment> = vec![&f];
        let code = CodeSection::new(&functions).finalize();

        let reloc = RelocSection::new(&code, 3).finalize();
        assert_eq!(reloc.kind(), SectionKind::Custom);
        assert_eq!(reloc.name(), Some("reloc.CODE"));
        // name blob, then just the target index and a zero count
        assert_eq!(reloc.body_size(), 1 + "reloc.CODE".len() + 2);

        let placed = reloc.place(4);
        let mut buf = vec![0u8; placed.end()];
        placed.write(&mut buf);
        let body = &buf[4 + reloc.header().len()..];
        assert_eq!(body[11..], [3, 0]);
    }

    #[test]
    fn reloc_section_forwards_translated_records() {
        let f = TestFragment::new(&[1, 2, 3, 4]).with_reloc(RelocKind::FunctionIndexLeb, 2, 5);
        let functions: Vec<&dyn Fragment> = vec![&f];
        let code = CodeSection::new(&functions).finalize();

        let reloc = RelocSection::new(&code, 1).finalize();
        let placed = reloc.place(100);
        let mut buf = vec![0u8; placed.end()];
        placed.write(&mut buf);
        let body = &buf[100 + reloc.header().len()..];
        // after the name: target index, count, then the shifted record
        assert_eq!(body[11..], [1, 1, 0x00, 3, 5]);
    }

    #[test]
    fn reloc_sections_over_custom_targets_use_their_name() {
        let part = TestFragment::new(&[0xcc; 4]);
        let parts: Vec<&dyn Fragment> = vec![&part];
        let custom = CustomSection::new("env.meta", &parts).finalize();

        let reloc = RelocSection::new(&custom, 5).finalize();
        assert_eq!(reloc.name(), Some("reloc.env.meta"));
    }

    #[test]
    fn display_names_sections_like_the_tools_do() {
        let f = TestFragment::new(&[0]);
        let functions: Vec<&dyn Fragment> = vec![&f];
        let code = CodeSection::new(&functions).finalize();
        assert_eq!(code.to_string(), "CODE");

        let parts: Vec<&dyn Fragment> = vec![&f];
        let custom = CustomSection::new("env", &parts).finalize();
        assert_eq!(custom.to_string(), "CUSTOM(env)");

        let reloc = RelocSection::new(&code, 0).finalize();
        assert_eq!(reloc.to_string(), "CUSTOM(reloc.CODE)");
    }

    #[test]
    fn section_plans_finalize_through_the_closed_enum() {
        let f = TestFragment::new(&[9, 9]);
        let functions: Vec<&dyn Fragment> = vec![&f];
        let mut type_section = SyntheticSection::standard(SectionKind::Type);
        type_section.stream().push(0);

        let plan: Vec<OutputSection> = vec![
            OutputSection::from(type_section),
            OutputSection::from(CodeSection::new(&functions)),
        ];
        let finalized: Vec<FinalizedSection> =
            plan.into_iter().map(OutputSection::finalize).collect();
        assert_eq!(finalized[0].kind(), SectionKind::Type);
        assert_eq!(finalized[1].kind(), SectionKind::Code);
    }

    #[test]
    #[should_panic(expected = "no functions")]
    fn empty_code_sections_are_a_driver_bug() {
        let functions: Vec<&dyn Fragment> = Vec::new();
        CodeSection::new(&functions);
    }

    #[test]
    #[should_panic(expected = "no segments")]
    fn empty_data_sections_are_a_driver_bug() {
        let segments: Vec<&dyn SegmentFragment> = Vec::new();
        DataSection::new(&segments);
    }

    #[test]
    #[should_panic(expected = "no input fragments")]
    fn empty_custom_sections_are_a_driver_bug() {
        let parts: Vec<&dyn Fragment> = Vec::new();
        CustomSection::new("env.meta", &parts);
    }

    #[test]
    #[should_panic(expected = "need a name")]
    fn standard_synthetic_sections_cannot_be_custom() {
        SyntheticSection::standard(SectionKind::Custom);
    }

    #[test]
    #[should_panic(expected = "offset 0")]
    fn placing_at_offset_zero_is_rejected() {
        let mut section = SyntheticSection::standard(SectionKind::Memory);
        section.stream().push(0);
        section.finalize().place(0);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn writing_past_the_buffer_is_rejected() {
        let mut section = SyntheticSection::standard(SectionKind::Memory);
        section.stream().extend_from_slice(&[0, 1]);
        let finalized = section.finalize();
        let placed = finalized.place(4);
        let mut buf = vec![0u8; placed.end() - 1];
        placed.write(&mut buf);
    }
}
