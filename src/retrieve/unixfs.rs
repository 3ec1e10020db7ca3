//! dag-pb / UnixFS node decoding.
//!
//! Directory and multi-block file structures arrive as dag-pb nodes whose
//! data field carries UnixFS metadata. Field numbering follows the IPLD
//! dag-pb and UnixFS schemas.

use prost::Message;

use crate::types::{HatchwayError, Result};

/// Multicodec for raw leaf blocks
pub const RAW_CODEC: u64 = 0x55;
/// Multicodec for dag-pb nodes
pub const DAG_PB_CODEC: u64 = 0x70;

/// Link from a dag-pb node to a child block
#[derive(Clone, PartialEq, prost::Message)]
pub struct PbLink {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub hash: Option<Vec<u8>>,
    #[prost(string, optional, tag = "2")]
    pub name: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    pub tsize: Option<u64>,
}

/// A dag-pb node: ordered child links plus an opaque data field
#[derive(Clone, PartialEq, prost::Message)]
pub struct PbNode {
    #[prost(message, repeated, tag = "2")]
    pub links: Vec<PbLink>,
    #[prost(bytes = "vec", optional, tag = "1")]
    pub data: Option<Vec<u8>>,
}

/// UnixFS metadata embedded in a dag-pb node's data field
#[derive(Clone, PartialEq, prost::Message)]
pub struct UnixFsData {
    #[prost(uint64, optional, tag = "1")]
    pub node_type: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub data: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "3")]
    pub filesize: Option<u64>,
    #[prost(uint64, repeated, packed = "false", tag = "4")]
    pub blocksizes: Vec<u64>,
}

/// Interpreted UnixFS node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Raw,
    Directory,
    File,
    Metadata,
    Symlink,
    HamtShard,
    Unknown(u64),
}

impl UnixFsData {
    pub fn kind(&self) -> NodeKind {
        match self.node_type.unwrap_or(0) {
            0 => NodeKind::Raw,
            1 => NodeKind::Directory,
            2 => NodeKind::File,
            3 => NodeKind::Metadata,
            4 => NodeKind::Symlink,
            5 => NodeKind::HamtShard,
            other => NodeKind::Unknown(other),
        }
    }
}

pub fn decode_node(bytes: &[u8]) -> Result<PbNode> {
    PbNode::decode(bytes)
        .map_err(|e| HatchwayError::MalformedArchive(format!("bad dag-pb node: {}", e)))
}

pub fn decode_unixfs(node: &PbNode) -> Result<UnixFsData> {
    let data = node.data.as_deref().ok_or_else(|| {
        HatchwayError::MalformedArchive("dag-pb node without unixfs metadata".to_string())
    })?;
    UnixFsData::decode(data)
        .map_err(|e| HatchwayError::MalformedArchive(format!("bad unixfs metadata: {}", e)))
}
