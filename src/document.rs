//! In-memory record of a single stored document.
//!
//! A [`Document`] is what the storage engine hands back for a key: the key itself, an opaque
//! metadata blob, the body (which may not have been read yet), and the bookkeeping fields the
//! engine uses for change tracking. It does no I/O of its own. [`Document::write_to`] and
//! [`Document::read_from`] give a compact packing the engine can store as-is.
//!
//! A record that has never been committed has `exists == false` and `sequence == 0`; both clear
//! operations keep that relationship intact.

use crate::{
    error::{Error, Result},
    varint,
};
use byteorder::{BigEndian, ByteOrder};
use log::trace;
use serde::{Deserialize, Serialize};

const FLAG_EXISTS: u8 = 0x01;
const FLAG_DELETED: u8 = 0x02;
const FLAG_BODY: u8 = 0x04;
const FLAG_MASK: u8 = FLAG_EXISTS | FLAG_DELETED | FLAG_BODY;

// Flags byte plus three varints.
const MAX_HEADER_LEN: usize = 1 + 3 * varint::MAX_VARINT_LEN;

/// Width of a body holding a single integer.
pub const INTEGER_BODY_LEN: usize = 8;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDocument")]
pub struct Document {
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    meta: Vec<u8>,
    #[serde(with = "serde_bytes")]
    body: Option<Vec<u8>>,
    body_size: u64,
    sequence: u64,
    offset: u64,
    deleted: bool,
    exists: bool,
}

// Deserialized fields, before the record invariants are checked.
#[derive(Deserialize)]
struct RawDocument {
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    meta: Vec<u8>,
    #[serde(with = "serde_bytes")]
    body: Option<Vec<u8>>,
    body_size: u64,
    sequence: u64,
    offset: u64,
    deleted: bool,
    exists: bool,
}

impl TryFrom<RawDocument> for Document {
    type Error = Error;

    fn try_from(raw: RawDocument) -> Result<Self> {
        check_record(raw.exists, raw.sequence)?;
        if let Some(body) = &raw.body {
            if body.len() as u64 != raw.body_size {
                return Err(Error::BadEncode(format!(
                    "Loaded body is {} bytes, but body size is {}",
                    body.len(),
                    raw.body_size
                )));
            }
        }
        Ok(Document {
            key: raw.key,
            meta: raw.meta,
            body: raw.body,
            body_size: raw.body_size,
            sequence: raw.sequence,
            offset: raw.offset,
            deleted: raw.deleted,
            exists: raw.exists,
        })
    }
}

// A record that was never committed can't have a sequence number.
fn check_record(exists: bool, sequence: u64) -> Result<()> {
    if !exists && sequence != 0 {
        return Err(Error::BadEncode(format!(
            "Uncommitted document has sequence number {}",
            sequence
        )));
    }
    Ok(())
}

impl Document {
    /// An empty, uncommitted record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// A committed record as found in storage, with the body not yet read. `body_size` is the
    /// stored length of the body.
    pub fn loaded(
        key: impl Into<Vec<u8>>,
        meta: impl Into<Vec<u8>>,
        body_size: u64,
        sequence: u64,
        offset: u64,
        deleted: bool,
    ) -> Self {
        Self {
            key: key.into(),
            meta: meta.into(),
            body: None,
            body_size,
            sequence,
            offset,
            deleted,
            exists: true,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn meta(&self) -> &[u8] {
        &self.meta
    }

    /// The body, if it has been loaded or set. Use [`body_size`][Self::body_size] for the length
    /// of a body that hasn't been read.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn is_body_loaded(&self) -> bool {
        self.body.is_some()
    }

    pub fn body_size(&self) -> u64 {
        self.body_size
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn set_key(&mut self, key: impl Into<Vec<u8>>) {
        self.key = key.into();
    }

    pub fn set_meta(&mut self, meta: impl Into<Vec<u8>>) {
        self.meta = meta.into();
    }

    /// Replace the body. The body size follows the new body's length.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        let body = body.into();
        self.body_size = body.len() as u64;
        self.body = Some(body);
    }

    /// Reset everything but the key, leaving a fresh uncommitted record.
    pub fn clear_meta_and_body(&mut self) {
        trace!(
            "Clearing document record (sequence {}, {} body bytes)",
            self.sequence,
            self.body_size
        );
        self.meta.clear();
        self.body = None;
        self.body_size = 0;
        self.sequence = 0;
        self.offset = 0;
        self.deleted = false;
        self.exists = false;
    }

    /// Reset the record completely, key included.
    pub fn clear(&mut self) {
        self.clear_meta_and_body();
        self.key.clear();
    }

    /// Read the body as a big-endian integer. A body shorter than 8 bytes (including no body at
    /// all) reads as 0.
    pub fn body_as_integer(&self) -> u64 {
        match self.body.as_deref() {
            Some(body) if body.len() >= INTEGER_BODY_LEN => {
                BigEndian::read_u64(&body[..INTEGER_BODY_LEN])
            }
            _ => 0,
        }
    }

    pub fn set_body_as_integer(&mut self, n: u64) {
        let mut body = vec![0u8; INTEGER_BODY_LEN];
        BigEndian::write_u64(&mut body, n);
        self.set_body(body);
    }

    /// Append the packed form of this record to `buf`.
    ///
    /// The layout is a flags byte, then varints for the sequence number, offset, and body size,
    /// then the varint-prefixed key and metadata, and finally the body bytes if the body is
    /// loaded.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        let mut flags = 0u8;
        if self.exists {
            flags |= FLAG_EXISTS;
        }
        if self.deleted {
            flags |= FLAG_DELETED;
        }
        if self.body.is_some() {
            flags |= FLAG_BODY;
        }

        let mut header = [0u8; MAX_HEADER_LEN];
        let written = {
            let mut cursor: &mut [u8] = &mut header[1..];
            for n in [self.sequence, self.offset, self.body_size] {
                // The header array always has room for three varints
                let ok = varint::write_advancing(&mut cursor, n);
                debug_assert!(ok);
            }
            MAX_HEADER_LEN - 1 - cursor.len()
        };
        header[0] = flags;
        buf.extend_from_slice(&header[..1 + written]);

        varint::write_vec(buf, self.key.len() as u64);
        buf.extend_from_slice(&self.key);
        varint::write_vec(buf, self.meta.len() as u64);
        buf.extend_from_slice(&self.meta);
        if let Some(body) = &self.body {
            buf.extend_from_slice(body);
        }
    }

    /// Read one packed record from the front of `input`, advancing past it on success.
    pub fn read_from(input: &mut &[u8]) -> Result<Document> {
        let mut raw = *input;

        let (&flags, rest) = raw.split_first().ok_or(Error::LengthTooShort {
            step: "get document flags",
            actual: 0,
            expected: 1,
        })?;
        raw = rest;
        if flags & !FLAG_MASK != 0 {
            return Err(Error::BadEncode(format!(
                "Unknown document flags 0x{:02x}",
                flags
            )));
        }

        let sequence = read_varint(&mut raw, "get document sequence")?;
        let offset = read_varint(&mut raw, "get document offset")?;
        let body_size = read_varint(&mut raw, "get document body size")?;
        let exists = flags & FLAG_EXISTS != 0;
        check_record(exists, sequence)?;

        let key = read_bytes(&mut raw, "get document key")?;
        let meta = read_bytes(&mut raw, "get document metadata")?;
        let body = if flags & FLAG_BODY != 0 {
            Some(take(&mut raw, body_size, "get document body")?.to_vec())
        } else {
            None
        };

        trace!(
            "Read document record: {} key bytes, sequence {}, body loaded: {}",
            key.len(),
            sequence,
            body.is_some()
        );
        *input = raw;
        Ok(Document {
            key: key.to_vec(),
            meta: meta.to_vec(),
            body,
            body_size,
            sequence,
            offset,
            deleted: flags & FLAG_DELETED != 0,
            exists,
        })
    }
}

fn read_varint(raw: &mut &[u8], step: &'static str) -> Result<u64> {
    let actual = raw.len();
    varint::read_advancing(raw).ok_or(Error::LengthTooShort {
        step,
        actual,
        expected: actual.saturating_add(1).min(varint::MAX_VARINT_LEN),
    })
}

fn take<'a>(raw: &mut &'a [u8], len: u64, step: &'static str) -> Result<&'a [u8]> {
    let actual = raw.len();
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= actual)
        .ok_or(Error::LengthTooShort {
            step,
            actual,
            expected: usize::try_from(len).unwrap_or(usize::MAX),
        })?;
    let (bytes, rest) = raw.split_at(len);
    *raw = rest;
    Ok(bytes)
}

fn read_bytes<'a>(raw: &mut &'a [u8], step: &'static str) -> Result<&'a [u8]> {
    let len = read_varint(raw, step)?;
    take(raw, len, step)
}

#[cfg(test)]
mod test {
    use super::*;

    fn packed(doc: &Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.write_to(&mut buf);
        buf
    }

    #[test]
    fn new_is_empty() {
        let doc = Document::new();
        assert!(doc.key().is_empty());
        assert!(doc.meta().is_empty());
        assert!(!doc.is_body_loaded());
        assert_eq!(doc.body_size(), 0);
        assert_eq!(doc.sequence(), 0);
        assert!(!doc.exists());
        assert!(!doc.deleted());
    }

    #[test]
    fn set_body_updates_size() {
        let mut doc = Document::with_key("k");
        doc.set_body(b"hello".to_vec());
        assert_eq!(doc.body_size(), 5);
        assert_eq!(doc.body(), Some(&b"hello"[..]));
        doc.set_body(Vec::new());
        assert_eq!(doc.body_size(), 0);
        assert!(doc.is_body_loaded());
    }

    #[test]
    fn clear_meta_and_body_keeps_key() {
        let mut doc = Document::loaded("key", "meta", 30, 12, 4096, true);
        doc.set_body(vec![7u8; 30]);
        doc.clear_meta_and_body();
        assert_eq!(doc.key(), b"key");
        assert!(doc.meta().is_empty());
        assert_eq!(doc.body(), None);
        assert_eq!(doc.body_size(), 0);
        assert_eq!(doc.sequence(), 0);
        assert_eq!(doc.offset(), 0);
        assert!(!doc.exists());
        assert!(!doc.deleted());
    }

    #[test]
    fn clear_resets_everything() {
        let mut doc = Document::loaded("key", "meta", 8, 3, 10, false);
        doc.set_body_as_integer(99);
        doc.clear();
        assert!(!doc.exists());
        assert_eq!(doc.sequence(), 0);
        assert_eq!(doc.body_size(), 0);
        assert!(doc.key().is_empty());
        assert_eq!(doc, Document::new());
    }

    #[test]
    fn body_as_integer() {
        let mut doc = Document::new();
        for n in [0, 1, u64::MAX] {
            doc.set_body_as_integer(n);
            assert_eq!(doc.body_as_integer(), n);
            assert_eq!(doc.body_size(), 8);
        }
        doc.set_body_as_integer(0x0102);
        assert_eq!(doc.body(), Some(&[0, 0, 0, 0, 0, 0, 1, 2][..]));
    }

    #[test]
    fn short_body_is_zero() {
        let mut doc = Document::new();
        assert_eq!(doc.body_as_integer(), 0);
        doc.set_body(vec![0xffu8; 7]);
        assert_eq!(doc.body_as_integer(), 0);
        doc.set_body(vec![0u8, 0, 0, 0, 0, 0, 0, 5, 0xff]);
        assert_eq!(doc.body_as_integer(), 5);
    }

    #[test]
    fn clone_is_independent() {
        let mut a = Document::with_key("a");
        a.set_body(b"one".to_vec());
        let mut b = a.clone();
        b.set_body(b"two".to_vec());
        b.set_key("b");
        assert_eq!(a.body(), Some(&b"one"[..]));
        assert_eq!(a.key(), b"a");
    }

    #[test]
    fn take_leaves_default() {
        let mut a = Document::loaded("a", "m", 0, 1, 2, false);
        let b = std::mem::take(&mut a);
        assert_eq!(a, Document::new());
        assert_eq!(b.sequence(), 1);
        assert!(b.exists());
    }

    #[test]
    fn pack_unloaded() {
        let doc = Document::loaded("key", "meta", 300, 5, 1024, false);
        let buf = packed(&doc);
        let mut expected = vec![FLAG_EXISTS, 5, 0x80, 0x08, 0xac, 0x02];
        expected.push(3);
        expected.extend_from_slice(b"key");
        expected.push(4);
        expected.extend_from_slice(b"meta");
        assert_eq!(buf, expected);

        let mut input = &buf[..];
        let read = Document::read_from(&mut input).unwrap();
        assert!(input.is_empty());
        assert_eq!(read, doc);
    }

    #[test]
    fn pack_loaded() {
        let mut doc = Document::loaded("k", "", 0, 77, 9, true);
        doc.set_body_as_integer(12345);
        let mut buf = packed(&doc);
        let first_len = buf.len();
        Document::new().write_to(&mut buf);

        let mut input = &buf[..];
        let read = Document::read_from(&mut input).unwrap();
        assert_eq!(input.len(), buf.len() - first_len);
        assert_eq!(read, doc);
        assert_eq!(read.body_as_integer(), 12345);
        assert!(read.deleted());
        let second = Document::read_from(&mut input).unwrap();
        assert_eq!(second, Document::new());
        assert!(input.is_empty());
    }

    #[test]
    fn read_rejects_bad_records() {
        let mut empty: &[u8] = &[];
        assert!(matches!(
            Document::read_from(&mut empty),
            Err(Error::LengthTooShort { .. })
        ));

        let mut unknown: &[u8] = &[0x08, 0, 0, 0, 0, 0];
        assert!(matches!(
            Document::read_from(&mut unknown),
            Err(Error::BadEncode(_))
        ));

        let mut sequenced: &[u8] = &[0, 3, 0, 0, 0, 0];
        assert!(matches!(
            Document::read_from(&mut sequenced),
            Err(Error::BadEncode(_))
        ));

        let mut doc = Document::with_key("abc");
        doc.set_body(b"body".to_vec());
        let buf = packed(&doc);
        for cut in 0..buf.len() {
            let mut input = &buf[..cut];
            assert!(
                Document::read_from(&mut input).is_err(),
                "Truncated at {} should fail",
                cut
            );
            assert_eq!(input.len(), cut, "Cursor moved on failure");
        }
    }

    #[test]
    fn huge_length_is_error() {
        let mut buf = vec![FLAG_EXISTS | FLAG_BODY, 1, 0];
        varint::write_vec(&mut buf, u64::MAX);
        buf.extend_from_slice(&[0, 0]);
        let mut input = &buf[..];
        assert!(matches!(
            Document::read_from(&mut input),
            Err(Error::LengthTooShort { .. })
        ));
    }

    #[test]
    fn serde_json_form() {
        let mut doc = Document::loaded("k", "m", 0, 1, 0, false);
        doc.set_body(vec![1u8, 2]);
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn serde_checks_record() {
        let uncommitted = r#"{"key":[],"meta":[],"body":null,"body_size":0,
            "sequence":5,"offset":0,"deleted":false,"exists":false}"#;
        assert!(serde_json::from_str::<Document>(uncommitted).is_err());

        let wrong_size = r#"{"key":[],"meta":[],"body":[1,2,3],"body_size":10,
            "sequence":5,"offset":0,"deleted":false,"exists":true}"#;
        assert!(serde_json::from_str::<Document>(wrong_size).is_err());

        // An unloaded body may have any size
        let unloaded = r#"{"key":[107],"meta":[],"body":null,"body_size":10,
            "sequence":5,"offset":0,"deleted":false,"exists":true}"#;
        let doc: Document = serde_json::from_str(unloaded).unwrap();
        assert_eq!(doc, Document::loaded("k", "", 10, 5, 0, false));

        let mut buf = Vec::new();
        doc.write_to(&mut buf);
        assert_eq!(Document::read_from(&mut &buf[..]).unwrap(), doc);
    }

    #[test]
    fn collatable_form() {
        let doc = Document::loaded("key", "meta", 3, 2, 1, false);
        let bytes = crate::to_vec(&doc).unwrap();
        let back: Document = crate::from_slice(&bytes).unwrap();
        assert_eq!(back, doc);
    }
}
