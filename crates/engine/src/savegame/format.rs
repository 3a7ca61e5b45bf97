use std::fmt;

use sha2::{Digest, Sha256};

use crate::world::Id;

use super::SaveError;

pub const MAGIC: &[u8; 4] = b"LSAV";
pub const SAVE_MAJOR_VERSION: u16 = 22;
pub const SAVE_MINOR_VERSION: u16 = 7;

const SECTION_END: &[u8; 4] = b"\0END";
const HEADER_LEN: usize = 8;
const DIGEST_LEN: usize = 32;

/// Four-byte section identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag([u8; 4]);

impl Tag {
    pub const SCREENSHOT: Tag = Tag::new(*b"SIMG");
    pub const ENGINE: Tag = Tag::new(*b"ENGN");
    pub const RENDERER: Tag = Tag::new(*b"DRVR");
    pub const AUDIO: Tag = Tag::new(*b"SOUN");
    pub const MOVIE: Tag = Tag::new(*b"MOVI");
    pub const IRIS: Tag = Tag::new(*b"IRIS");
    pub const SCRIPT: Tag = Tag::new(*b"SCRP");
    pub const DIGEST: Tag = Tag::new(*b"DGST");

    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveHeader {
    pub major: u16,
    pub minor: u16,
}

impl SaveHeader {
    pub fn is_compatible(self) -> bool {
        self.major == SAVE_MAJOR_VERSION && self.minor <= SAVE_MINOR_VERSION
    }
}

/// Location of one tagged section inside a save stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionInfo {
    pub tag: Tag,
    pub offset: usize,
    pub payload_len: usize,
}

/// Append-only encoder for the tagged-section save format.
///
/// Scalars are little-endian, strings carry a u32 byte length. Sections are
/// framed as tag, payload length, payload and the end marker; the length is
/// patched in when the section closes.
#[derive(Debug)]
pub struct SaveWriter {
    bytes: Vec<u8>,
    open_section: Option<usize>,
    minor: u16,
}

impl Default for SaveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveWriter {
    pub fn new() -> Self {
        Self::with_version(SAVE_MINOR_VERSION)
    }

    /// Writer stamped with an older minor version, so minor-gated fields are left out.
    pub fn with_version(minor: u16) -> Self {
        let mut bytes = Vec::with_capacity(4096);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&SAVE_MAJOR_VERSION.to_le_bytes());
        bytes.extend_from_slice(&minor.to_le_bytes());
        Self {
            bytes,
            open_section: None,
            minor,
        }
    }

    pub fn minor(&self) -> u16 {
        self.minor
    }

    pub fn begin_section(&mut self, tag: Tag) {
        if self.open_section.is_some() {
            self.end_section();
        }
        self.bytes.extend_from_slice(&tag.bytes());
        self.open_section = Some(self.bytes.len());
        self.bytes.extend_from_slice(&0u32.to_le_bytes());
    }

    pub fn end_section(&mut self) {
        let Some(len_offset) = self.open_section.take() else {
            return;
        };
        let payload_len = (self.bytes.len() - len_offset - 4) as u32;
        self.bytes[len_offset..len_offset + 4].copy_from_slice(&payload_len.to_le_bytes());
        self.bytes.extend_from_slice(SECTION_END);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.bytes.extend_from_slice(value.as_bytes());
    }

    /// Length-prefixed opaque block, used by collaborators with their own encoding.
    pub fn write_blob(&mut self, value: &[u8]) {
        self.write_u32(value.len() as u32);
        self.bytes.extend_from_slice(value);
    }

    pub fn write_id<T>(&mut self, id: Option<Id<T>>) {
        self.write_u32(id.map_or(0, Id::raw));
    }

    /// Closes any open section and appends the digest section covering every byte so far.
    pub fn finish(mut self) -> Vec<u8> {
        self.end_section();
        let digest = sha256_bytes(&self.bytes);
        self.begin_section(Tag::DIGEST);
        self.bytes.extend_from_slice(&digest);
        self.end_section();
        self.bytes
    }
}

/// Bounds-checked decoder over a complete save stream.
#[derive(Debug)]
pub struct SaveReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    header: SaveHeader,
    section: Option<(Tag, usize)>,
}

impl<'a> SaveReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, SaveError> {
        let header = read_header(bytes)?;
        Ok(Self {
            bytes,
            cursor: HEADER_LEN,
            header,
            section: None,
        })
    }

    pub fn header(&self) -> SaveHeader {
        self.header
    }

    pub fn minor(&self) -> u16 {
        self.header.minor
    }

    pub fn is_compatible(&self) -> bool {
        self.header.is_compatible()
    }

    /// Checks the trailing digest section against the bytes that precede it.
    pub fn verify_digest(&self) -> Result<(), SaveError> {
        verify_digest(self.bytes)
    }

    pub fn begin_section(&mut self, expected: Tag) -> Result<(), SaveError> {
        if let Some((open, _)) = self.section {
            return Err(SaveError::invalid_format(format!(
                "section {expected} started while {open} is still open"
            )));
        }
        let found = Tag::new(self.take_array::<4>()?);
        if found != expected {
            return Err(SaveError::UnexpectedSection { expected, found });
        }
        let payload_len = u32::from_le_bytes(self.take_array::<4>()?) as usize;
        let end = self.cursor.saturating_add(payload_len);
        if end > self.bytes.len() {
            return Err(SaveError::invalid_format(format!(
                "section {found} runs past end of stream"
            )));
        }
        self.section = Some((found, end));
        Ok(())
    }

    pub fn end_section(&mut self) -> Result<(), SaveError> {
        let Some((tag, end)) = self.section.take() else {
            return Err(SaveError::invalid_format("no section is open"));
        };
        if self.cursor != end {
            return Err(SaveError::invalid_format(format!(
                "section {tag} payload length mismatch"
            )));
        }
        let marker = self.take_array::<4>()?;
        if &marker != SECTION_END {
            return Err(SaveError::invalid_format(format!(
                "section {tag} missing end marker"
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, SaveError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, SaveError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SaveError::invalid_format(format!(
                "invalid bool encoding {other}"
            ))),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, SaveError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, SaveError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, SaveError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, SaveError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_string(&mut self) -> Result<String, SaveError> {
        let len = self.read_u32()? as usize;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| SaveError::invalid_format("invalid UTF-8 string"))
    }

    pub fn read_blob(&mut self) -> Result<Vec<u8>, SaveError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_id<T>(&mut self) -> Result<Option<Id<T>>, SaveError> {
        Ok(Id::from_raw(self.read_u32()?))
    }

    /// Bytes left in the open section, or in the stream when no section is open.
    pub fn remaining(&self) -> usize {
        self.limit().saturating_sub(self.cursor)
    }

    fn limit(&self) -> usize {
        self.section.map_or(self.bytes.len(), |(_, end)| end)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SaveError> {
        let end = self.cursor.saturating_add(len);
        if end > self.limit() {
            let context = self
                .section
                .map_or_else(|| "stream".to_string(), |(tag, _)| format!("section {tag}"));
            return Err(SaveError::invalid_format(format!(
                "unexpected end of {context}"
            )));
        }
        let out = &self.bytes[self.cursor..end];
        self.cursor = end;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], SaveError> {
        self.take(N)?
            .try_into()
            .map_err(|_| SaveError::invalid_format("invalid scalar encoding"))
    }
}

/// Walks the section framing without decoding payloads.
pub fn list_sections(bytes: &[u8]) -> Result<(SaveHeader, Vec<SectionInfo>), SaveError> {
    let header = read_header(bytes)?;
    let mut sections = Vec::new();
    let mut cursor = HEADER_LEN;
    while cursor < bytes.len() {
        let offset = cursor;
        let frame = bytes
            .get(cursor..cursor + 8)
            .ok_or_else(|| SaveError::invalid_format("truncated section header"))?;
        let tag = Tag::new([frame[0], frame[1], frame[2], frame[3]]);
        let payload_len = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;
        let payload_end = (cursor + 8).saturating_add(payload_len);
        let marker = bytes
            .get(payload_end..payload_end.saturating_add(4))
            .ok_or_else(|| SaveError::invalid_format(format!("section {tag} truncated")))?;
        if marker != SECTION_END {
            return Err(SaveError::invalid_format(format!(
                "section {tag} missing end marker"
            )));
        }
        sections.push(SectionInfo {
            tag,
            offset,
            payload_len,
        });
        cursor = payload_end + 4;
    }
    Ok((header, sections))
}

pub fn verify_digest(bytes: &[u8]) -> Result<(), SaveError> {
    let (_, sections) = list_sections(bytes)?;
    let last = sections
        .last()
        .filter(|section| section.tag == Tag::DIGEST)
        .ok_or_else(|| SaveError::invalid_format("missing digest section"))?;
    if last.payload_len != DIGEST_LEN {
        return Err(SaveError::invalid_format("digest section has wrong length"));
    }
    let stored = &bytes[last.offset + 8..last.offset + 8 + DIGEST_LEN];
    if stored != sha256_bytes(&bytes[..last.offset]) {
        return Err(SaveError::DigestMismatch);
    }
    Ok(())
}

fn read_header(bytes: &[u8]) -> Result<SaveHeader, SaveError> {
    let header = bytes
        .get(..HEADER_LEN)
        .ok_or_else(|| SaveError::invalid_format("truncated header"))?;
    if &header[..4] != MAGIC {
        return Err(SaveError::invalid_format("invalid magic"));
    }
    Ok(SaveHeader {
        major: u16::from_le_bytes([header[4], header[5]]),
        minor: u16::from_le_bytes([header[6], header[7]]),
    })
}

fn sha256_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stream() -> Vec<u8> {
        let mut sink = SaveWriter::new();
        sink.begin_section(Tag::ENGINE);
        sink.write_u32(42);
        sink.write_string("mo_ddtws");
        sink.write_bool(true);
        sink.write_f32(1.5);
        sink.end_section();
        sink.begin_section(Tag::IRIS);
        sink.write_i32(-3);
        sink.end_section();
        sink.finish()
    }

    #[test]
    fn sections_decode_in_written_order() {
        let bytes = sample_stream();
        let mut source = SaveReader::new(&bytes).expect("header");
        assert!(source.is_compatible());

        source.begin_section(Tag::ENGINE).expect("engine");
        assert_eq!(source.read_u32().expect("u32"), 42);
        assert_eq!(source.read_string().expect("string"), "mo_ddtws");
        assert!(source.read_bool().expect("bool"));
        assert_eq!(source.read_f32().expect("f32"), 1.5);
        source.end_section().expect("engine end");

        source.begin_section(Tag::IRIS).expect("iris");
        assert_eq!(source.read_i32().expect("i32"), -3);
        source.end_section().expect("iris end");
        source.verify_digest().expect("digest");
    }

    #[test]
    fn wrong_tag_is_reported_with_both_tags() {
        let bytes = sample_stream();
        let mut source = SaveReader::new(&bytes).expect("header");
        let error = source.begin_section(Tag::SCRIPT).expect_err("tag mismatch");
        assert!(matches!(
            error,
            SaveError::UnexpectedSection { expected, found }
                if expected == Tag::SCRIPT && found == Tag::ENGINE
        ));
    }

    #[test]
    fn reads_never_cross_the_section_boundary() {
        let bytes = sample_stream();
        let mut source = SaveReader::new(&bytes).expect("header");
        source.begin_section(Tag::IRIS).expect_err("first section is engine");

        let mut source = SaveReader::new(&bytes).expect("header");
        source.begin_section(Tag::ENGINE).expect("engine");
        source.read_u32().expect("u32");
        source.read_string().expect("string");
        source.read_bool().expect("bool");
        source.read_f32().expect("f32");
        assert_eq!(source.remaining(), 0);
        assert!(matches!(
            source.read_u32(),
            Err(SaveError::InvalidFormat(_))
        ));
    }

    #[test]
    fn unread_payload_fails_end_section() {
        let bytes = sample_stream();
        let mut source = SaveReader::new(&bytes).expect("header");
        source.begin_section(Tag::ENGINE).expect("engine");
        source.read_u32().expect("u32");
        assert!(source.end_section().is_err());
    }

    #[test]
    fn tampered_payload_fails_digest() {
        let mut bytes = sample_stream();
        bytes[HEADER_LEN + 8] ^= 0xff;
        let source = SaveReader::new(&bytes).expect("header");
        assert!(matches!(
            source.verify_digest(),
            Err(SaveError::DigestMismatch)
        ));
    }

    #[test]
    fn section_table_lists_every_section() {
        let bytes = sample_stream();
        let (header, sections) = list_sections(&bytes).expect("framing");
        assert_eq!(header.major, SAVE_MAJOR_VERSION);
        let tags = sections.iter().map(|section| section.tag).collect::<Vec<_>>();
        assert_eq!(tags, vec![Tag::ENGINE, Tag::IRIS, Tag::DIGEST]);
        assert_eq!(sections[1].payload_len, 4);
    }

    #[test]
    fn compatibility_requires_same_major_and_known_minor() {
        let ok = SaveHeader {
            major: SAVE_MAJOR_VERSION,
            minor: 3,
        };
        let newer_minor = SaveHeader {
            major: SAVE_MAJOR_VERSION,
            minor: SAVE_MINOR_VERSION + 1,
        };
        let other_major = SaveHeader {
            major: SAVE_MAJOR_VERSION + 1,
            minor: 0,
        };
        assert!(ok.is_compatible());
        assert!(!newer_minor.is_compatible());
        assert!(!other_major.is_compatible());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = sample_stream();
        bytes[0] = b'X';
        assert!(matches!(
            SaveReader::new(&bytes),
            Err(SaveError::InvalidFormat(_))
        ));
    }
}
