//! CARv1 archive decoding.
//!
//! A content-addressable archive is a varint-framed byte sequence: one
//! header section (dag-cbor, version and roots) followed by sections of
//! binary CID plus raw block bytes. Blocks are opaque at this layer; the
//! export walk interprets them. The header is skipped rather than parsed:
//! the export root always comes from the request resource, so the roots
//! list carries nothing we use. CARv2 framing fails as malformed.

use std::collections::HashMap;
use std::io::Cursor;

use bytes::{Buf, Bytes};
use cid::Cid;
use prost::encoding::decode_varint;

use crate::types::{HatchwayError, Result};

/// In-memory lookup from block identifier to raw block bytes.
/// Immutable once built; the export walk pulls from it on demand.
#[derive(Debug, Default)]
pub struct BlockMap {
    blocks: HashMap<Cid, Bytes>,
}

impl BlockMap {
    pub fn get(&self, cid: &Cid) -> Option<&Bytes> {
        self.blocks.get(cid)
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.blocks.contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Insert a block directly. Used when assembling a map from something
    /// other than an archive body (tests, local stores).
    pub fn insert(&mut self, cid: Cid, data: Bytes) {
        self.blocks.insert(cid, data);
    }
}

/// Decode a CARv1 body into a [`BlockMap`].
pub fn decode(body: Bytes) -> Result<BlockMap> {
    let mut buf = body;

    let header_len = read_section_len(&mut buf)?;
    if header_len == 0 {
        return Err(HatchwayError::MalformedArchive("empty header".to_string()));
    }
    if buf.remaining() < header_len {
        return Err(HatchwayError::MalformedArchive("truncated header".to_string()));
    }
    buf.advance(header_len);

    let mut map = BlockMap::default();
    while buf.has_remaining() {
        let section_len = read_section_len(&mut buf)?;
        if section_len == 0 || buf.remaining() < section_len {
            return Err(HatchwayError::MalformedArchive(
                "truncated block section".to_string(),
            ));
        }
        let section = buf.copy_to_bytes(section_len);

        let mut cursor = Cursor::new(&section[..]);
        let cid = Cid::read_bytes(&mut cursor)
            .map_err(|e| HatchwayError::MalformedArchive(format!("bad block cid: {}", e)))?;
        let data = section.slice(cursor.position() as usize..);
        map.insert(cid, data);
    }

    Ok(map)
}

fn read_section_len(buf: &mut Bytes) -> Result<usize> {
    decode_varint(buf)
        .map(|len| len as usize)
        .map_err(|e| HatchwayError::MalformedArchive(format!("bad length prefix: {}", e)))
}
