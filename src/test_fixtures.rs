//! Synthetic pack construction for unit tests.
//!
//! Builds byte-exact v4 pack images: opaque 12-byte header, sorted hash
//! table, framed identity and path dictionaries, then whatever object
//! bytes a test appends. The prefix layout is frozen on the first
//! `append` so appended offsets stay valid in the finished pack.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::object_id::ObjectId;
use crate::pack::Pack;
use crate::pack_window::SliceWindows;
use crate::varint::encode_varint;

/// A 20-byte identifier with every byte set to `b`.
pub(crate) fn oid(b: u8) -> ObjectId {
    ObjectId::new([b; 20])
}

/// Compresses `data` as a zlib stream.
pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Frames dictionary records as stored in a pack: a varint inflated
/// size followed by the compressed records.
pub(crate) fn framed_dict(records: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_varint(records.len() as u64, &mut out);
    out.extend_from_slice(&zlib(records));
    out
}

/// Encodes a v4 object header: `(size << 4) | type_tag` as a varint.
pub(crate) fn object_header(size: u64, type_tag: u8) -> Vec<u8> {
    let mut out = Vec::new();
    encode_varint((size << 4) | u64::from(type_tag), &mut out);
    out
}

pub(crate) struct PackFixture {
    hashes: Vec<ObjectId>,
    ident: Vec<u8>,
    paths: Vec<u8>,
    tail: Vec<u8>,
    prefix_len: Option<u64>,
}

impl PackFixture {
    pub(crate) fn new() -> Self {
        Self {
            hashes: Vec::new(),
            ident: Vec::new(),
            paths: Vec::new(),
            tail: Vec::new(),
            prefix_len: None,
        }
    }

    /// Sets the hash table. Must be called before the first `append`.
    pub(crate) fn hashes(&mut self, ids: &[ObjectId]) {
        assert!(self.prefix_len.is_none(), "hash table frozen by append");
        self.hashes = ids.to_vec();
    }

    /// Adds an identity record (timezone prefix plus string).
    pub(crate) fn ident_entry(&mut self, tz: i16, text: &str) {
        assert!(self.prefix_len.is_none(), "dictionaries frozen by append");
        self.ident.extend_from_slice(&tz.to_be_bytes());
        self.ident.extend_from_slice(text.as_bytes());
        self.ident.push(0);
    }

    /// Adds a path record (mode prefix plus name).
    pub(crate) fn path_entry(&mut self, mode: u16, name: &str) {
        assert!(self.prefix_len.is_none(), "dictionaries frozen by append");
        self.paths.extend_from_slice(&mode.to_be_bytes());
        self.paths.extend_from_slice(name.as_bytes());
        self.paths.push(0);
    }

    fn build_prefix(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; 12];
        for id in &self.hashes {
            bytes.extend_from_slice(id.as_slice());
        }
        bytes.extend_from_slice(&framed_dict(&self.ident));
        bytes.extend_from_slice(&framed_dict(&self.paths));
        bytes
    }

    /// Appends object bytes, returning their pack offset.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> u64 {
        if self.prefix_len.is_none() {
            self.prefix_len = Some(self.build_prefix().len() as u64);
        }
        let at = self.prefix_len.unwrap() + self.tail.len() as u64;
        self.tail.extend_from_slice(bytes);
        at
    }

    fn build_bytes(&self) -> Vec<u8> {
        let mut bytes = self.build_prefix();
        bytes.extend_from_slice(&self.tail);
        bytes
    }

    pub(crate) fn into_pack(self) -> Pack<SliceWindows> {
        let num_objects = self.hashes.len() as u32;
        Pack::new(SliceWindows::new(self.build_bytes()), num_objects)
    }

    /// Builds the pack with windows capped at `window_len`, to exercise
    /// window re-acquisition.
    pub(crate) fn into_pack_windowed(self, window_len: usize) -> Pack<SliceWindows> {
        let num_objects = self.hashes.len() as u32;
        Pack::new(
            SliceWindows::with_window_len(self.build_bytes(), window_len),
            num_objects,
        )
    }
}
