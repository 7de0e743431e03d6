//! Binary record container format stored on tags
//!
//! A message is a sequence of records. Each record starts with a header
//! byte (MB, ME, CF, SR, IL flags plus a 3-bit type name format), followed
//! by the type length, payload length (1 byte for short records, else 4
//! bytes big-endian), optional id length, then type, id and payload.

use super::uri;
use thiserror::Error;

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// Well-known record type for URIs
pub const URI_TYPE: &[u8] = b"U";

/// External record type of the platform-hint record
pub const ANDROID_APP_TYPE: &[u8] = b"android.com:pkg";

/// Errors parsing or building binary records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Record data ended after {0} bytes")]
    Truncated(usize),

    #[error("First record is missing the message-begin flag")]
    MissingMessageBegin,

    #[error("Chunked records are not supported")]
    ChunkedRecord,

    #[error("{0} unexpected bytes after the final record")]
    TrailingBytes(usize),

    #[error("Record {field} length {len} exceeds 255 bytes")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("Record profile is invalid: {0}")]
    InvalidProfile(String),
}

/// Type name format of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tnf {
    Empty = 0x00,
    WellKnown = 0x01,
    Media = 0x02,
    AbsoluteUri = 0x03,
    External = 0x04,
    Unknown = 0x05,
    Unchanged = 0x06,
    Reserved = 0x07,
}

impl Tnf {
    fn from_bits(bits: u8) -> Self {
        match bits & TNF_MASK {
            0x00 => Tnf::Empty,
            0x01 => Tnf::WellKnown,
            0x02 => Tnf::Media,
            0x03 => Tnf::AbsoluteUri,
            0x04 => Tnf::External,
            0x05 => Tnf::Unknown,
            0x06 => Tnf::Unchanged,
            _ => Tnf::Reserved,
        }
    }
}

/// A single typed content block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    tnf: Tnf,
    record_type: Vec<u8>,
    id: Vec<u8>,
    payload: Vec<u8>,
}

impl NdefRecord {
    /// Build an arbitrary record
    pub fn new(
        tnf: Tnf,
        record_type: impl Into<Vec<u8>>,
        id: impl Into<Vec<u8>>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Self, CodecError> {
        let record_type = record_type.into();
        let id = id.into();
        if record_type.len() > u8::MAX as usize {
            return Err(CodecError::FieldTooLong { field: "type", len: record_type.len() });
        }
        if id.len() > u8::MAX as usize {
            return Err(CodecError::FieldTooLong { field: "id", len: id.len() });
        }
        Ok(Self {
            tnf,
            record_type,
            id,
            payload: payload.into(),
        })
    }

    /// Well-known URI record with the longest matching prefix abbreviated
    pub fn uri(uri: &str) -> Self {
        let (code, tail) = uri::abbreviate(uri);
        let mut payload = Vec::with_capacity(tail.len() + 1);
        payload.push(code);
        payload.extend_from_slice(tail.as_bytes());
        Self {
            tnf: Tnf::WellKnown,
            record_type: URI_TYPE.to_vec(),
            id: Vec::new(),
            payload,
        }
    }

    /// External platform-hint record naming an application package
    pub fn android_application(package: &str) -> Self {
        Self {
            tnf: Tnf::External,
            record_type: ANDROID_APP_TYPE.to_vec(),
            id: Vec::new(),
            payload: package.as_bytes().to_vec(),
        }
    }

    pub fn tnf(&self) -> Tnf {
        self.tnf
    }

    pub fn record_type(&self) -> &[u8] {
        &self.record_type
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Full URI if this is a well-formed well-known URI record
    pub fn uri_content(&self) -> Option<String> {
        if self.tnf != Tnf::WellKnown || self.record_type != URI_TYPE {
            return None;
        }
        let (code, tail) = self.payload.split_first()?;
        let tail = std::str::from_utf8(tail).ok()?;
        uri::expand(*code, tail)
    }

    /// Package name if this is a platform-hint record
    pub fn android_package(&self) -> Option<&str> {
        if self.tnf != Tnf::External || self.record_type != ANDROID_APP_TYPE {
            return None;
        }
        std::str::from_utf8(&self.payload).ok()
    }

    fn is_short(&self) -> bool {
        self.payload.len() <= u8::MAX as usize
    }

    fn encoded_len(&self) -> usize {
        let payload_len_field = if self.is_short() { 1 } else { 4 };
        let id_len_field = if self.id.is_empty() { 0 } else { 1 };
        2 + payload_len_field
            + id_len_field
            + self.record_type.len()
            + self.id.len()
            + self.payload.len()
    }

    fn write_to(&self, out: &mut Vec<u8>, first: bool, last: bool) {
        let mut header = self.tnf as u8;
        if first {
            header |= FLAG_MB;
        }
        if last {
            header |= FLAG_ME;
        }
        if self.is_short() {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }

        out.push(header);
        out.push(self.record_type.len() as u8);
        if self.is_short() {
            out.push(self.payload.len() as u8);
        } else {
            out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        }
        if !self.id.is_empty() {
            out.push(self.id.len() as u8);
        }
        out.extend_from_slice(&self.record_type);
        out.extend_from_slice(&self.id);
        out.extend_from_slice(&self.payload);
    }
}

/// Ordered set of records exchanged with a tag in one read or write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdefMessage {
    records: Vec<NdefRecord>,
}

/// Encoding of a message without records (a single empty record)
const EMPTY_MESSAGE: [u8; 3] = [FLAG_MB | FLAG_ME | FLAG_SR, 0x00, 0x00];

impl NdefMessage {
    pub fn new(records: Vec<NdefRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[NdefRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encoded size in bytes; this is what must fit in tag capacity
    pub fn byte_len(&self) -> usize {
        if self.records.is_empty() {
            return EMPTY_MESSAGE.len();
        }
        self.records.iter().map(NdefRecord::encoded_len).sum()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        if self.records.is_empty() {
            return EMPTY_MESSAGE.to_vec();
        }

        let mut out = Vec::with_capacity(self.byte_len());
        let last = self.records.len() - 1;
        for (i, record) in self.records.iter().enumerate() {
            record.write_to(&mut out, i == 0, i == last);
        }
        out
    }

    /// Parse a complete message
    ///
    /// A message consisting of one empty record parses to no records.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut records = Vec::new();
        let mut pos = 0usize;

        loop {
            let header = *bytes.get(pos).ok_or(CodecError::Truncated(pos))?;
            if pos == 0 && header & FLAG_MB == 0 {
                return Err(CodecError::MissingMessageBegin);
            }
            if header & FLAG_CF != 0 {
                return Err(CodecError::ChunkedRecord);
            }
            pos += 1;

            let type_len = take(bytes, &mut pos, 1)?[0] as usize;
            let payload_len = if header & FLAG_SR != 0 {
                take(bytes, &mut pos, 1)?[0] as usize
            } else {
                let raw = take(bytes, &mut pos, 4)?;
                u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            };
            let id_len = if header & FLAG_IL != 0 {
                take(bytes, &mut pos, 1)?[0] as usize
            } else {
                0
            };

            let record_type = take(bytes, &mut pos, type_len)?.to_vec();
            let id = take(bytes, &mut pos, id_len)?.to_vec();
            let payload = take(bytes, &mut pos, payload_len)?.to_vec();

            records.push(NdefRecord {
                tnf: Tnf::from_bits(header),
                record_type,
                id,
                payload,
            });

            if header & FLAG_ME != 0 {
                break;
            }
        }

        if pos != bytes.len() {
            return Err(CodecError::TrailingBytes(bytes.len() - pos));
        }

        if records.len() == 1 && records[0].tnf == Tnf::Empty {
            records.clear();
        }

        Ok(Self { records })
    }
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], CodecError> {
    let end = pos.checked_add(len).ok_or(CodecError::Truncated(*pos))?;
    let slice = bytes.get(*pos..end).ok_or(CodecError::Truncated(bytes.len()))?;
    *pos = end;
    Ok(slice)
}
