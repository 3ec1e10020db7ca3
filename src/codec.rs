//! Byte-stream to text codec.
//!
//! Retrieval results travel as base-64 text. `Plain` is bare RFC 4648
//! base-64; `SelfDescribing` carries a multibase prefix so the encoding is
//! identifiable without external context. Decoding inverts `Plain` only and
//! is used for inline upload content.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::types::{HatchwayError, Result};

/// Output encoding for retrieved content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Bare base-64
    Plain,
    /// Multibase-tagged base-64 (`m` prefix)
    SelfDescribing,
}

/// Drain a finite, single-use chunk stream and encode it as text.
pub fn encode<I>(stream: I, encoding: Encoding) -> Result<String>
where
    I: IntoIterator<Item = Result<Bytes>>,
{
    let mut data = Vec::new();
    for chunk in stream {
        data.extend_from_slice(&chunk?);
    }
    Ok(encode_bytes(&data, encoding))
}

/// Encode an already-materialized buffer as text.
pub fn encode_bytes(data: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Plain => STANDARD.encode(data),
        Encoding::SelfDescribing => multibase::encode(multibase::Base::Base64, data),
    }
}

/// Decode plain base-64 text back into bytes.
pub fn decode(text: &str) -> Result<Bytes> {
    STANDARD
        .decode(text.trim())
        .map(Bytes::from)
        .map_err(HatchwayError::InvalidEncoding)
}
