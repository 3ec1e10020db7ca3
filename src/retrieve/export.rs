//! Pull-based content export from a decoded archive.
//!
//! Resolves the request path through directory nodes, then walks the target
//! file DAG as a lazy, single-pass byte stream. Blocks are pulled from the
//! [`BlockMap`] on demand; any reference the archive does not satisfy fails
//! with `BlockNotFound` instead of yielding truncated output.

use bytes::Bytes;
use cid::Cid;

use crate::retrieve::car::BlockMap;
use crate::retrieve::unixfs::{self, NodeKind, PbLink, DAG_PB_CODEC, RAW_CODEC};
use crate::types::{HatchwayError, Result};

/// Build the export stream for the entity at `pathname` below `root`.
///
/// Directory traversal happens eagerly; file content is pulled lazily by
/// the returned iterator. A query-like suffix on the final segment is not
/// part of the entry name and is ignored during traversal.
pub fn export(blocks: BlockMap, root: Cid, pathname: &str) -> Result<ExportStream> {
    let target = resolve_path(&blocks, root, pathname)?;
    Ok(ExportStream {
        blocks,
        stack: vec![target],
        done: false,
    })
}

fn resolve_path(blocks: &BlockMap, root: Cid, pathname: &str) -> Result<Cid> {
    let path = pathname.split('?').next().unwrap_or_default();
    let mut current = root;

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let block = blocks
            .get(&current)
            .ok_or(HatchwayError::BlockNotFound(current))?;
        if current.codec() != DAG_PB_CODEC {
            return Err(HatchwayError::NotExportable(format!(
                "cannot traverse into a leaf block for segment {}",
                segment
            )));
        }
        let node = unixfs::decode_node(block)?;
        let meta = unixfs::decode_unixfs(&node)?;
        match meta.kind() {
            NodeKind::Directory => {
                let link = node
                    .links
                    .iter()
                    .find(|link| link.name.as_deref() == Some(segment))
                    .ok_or_else(|| HatchwayError::PathNotFound(segment.to_string()))?;
                current = link_cid(link)?;
            }
            NodeKind::HamtShard => {
                return Err(HatchwayError::NotExportable(
                    "sharded directories are not supported".to_string(),
                ));
            }
            other => {
                return Err(HatchwayError::NotExportable(format!(
                    "cannot traverse into {:?} node for segment {}",
                    other, segment
                )));
            }
        }
    }

    // The final target must be file-shaped; a directory has no byte stream.
    if current.codec() == DAG_PB_CODEC {
        let block = blocks
            .get(&current)
            .ok_or(HatchwayError::BlockNotFound(current))?;
        let meta = unixfs::decode_unixfs(&unixfs::decode_node(block)?)?;
        match meta.kind() {
            NodeKind::File | NodeKind::Raw => {}
            other => {
                return Err(HatchwayError::NotExportable(format!(
                    "cannot export {:?} node as a byte stream",
                    other
                )));
            }
        }
    }

    Ok(current)
}

fn link_cid(link: &PbLink) -> Result<Cid> {
    let hash = link
        .hash
        .as_deref()
        .ok_or_else(|| HatchwayError::MalformedArchive("link without hash".to_string()))?;
    Cid::try_from(hash)
        .map_err(|e| HatchwayError::MalformedArchive(format!("bad link cid: {}", e)))
}

/// Lazy, single-pass, non-restartable byte stream over a file DAG.
///
/// Each `next` call pulls at most one block from the lookup. After the
/// first error the stream is exhausted; there is no partial continuation.
#[derive(Debug)]
pub struct ExportStream {
    blocks: BlockMap,
    stack: Vec<Cid>,
    done: bool,
}

impl ExportStream {
    /// Drain the stream into one buffer.
    pub fn collect_bytes(self) -> Result<Bytes> {
        let mut out = Vec::new();
        for chunk in self {
            out.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(out))
    }

    fn fail(&mut self, err: HatchwayError) -> Option<Result<Bytes>> {
        self.done = true;
        Some(Err(err))
    }
}

impl Iterator for ExportStream {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some(cid) = self.stack.pop() {
            let block = match self.blocks.get(&cid) {
                Some(block) => block.clone(),
                None => return self.fail(HatchwayError::BlockNotFound(cid)),
            };

            match cid.codec() {
                RAW_CODEC => return Some(Ok(block)),
                DAG_PB_CODEC => {
                    let node = match unixfs::decode_node(&block) {
                        Ok(node) => node,
                        Err(e) => return self.fail(e),
                    };
                    let meta = match unixfs::decode_unixfs(&node) {
                        Ok(meta) => meta,
                        Err(e) => return self.fail(e),
                    };
                    match meta.kind() {
                        NodeKind::File | NodeKind::Raw => {
                            // Children are pulled in link order; push in
                            // reverse so the first link is next off the stack.
                            for link in node.links.iter().rev() {
                                match link_cid(link) {
                                    Ok(child) => self.stack.push(child),
                                    Err(e) => return self.fail(e),
                                }
                            }
                            let own = meta.data.unwrap_or_default();
                            if !own.is_empty() {
                                return Some(Ok(Bytes::from(own)));
                            }
                        }
                        other => {
                            return self.fail(HatchwayError::NotExportable(format!(
                                "unexpected {:?} node inside file structure",
                                other
                            )));
                        }
                    }
                }
                other => {
                    return self.fail(HatchwayError::NotExportable(format!(
                        "unsupported block codec 0x{:x}",
                        other
                    )));
                }
            }
        }

        self.done = true;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::unixfs::{PbNode, UnixFsData};
    use multihash_codetable::{Code, MultihashDigest};
    use prost::Message;

    fn raw_block(map: &mut BlockMap, data: &[u8]) -> Cid {
        let cid = Cid::new_v1(RAW_CODEC, Code::Sha2_256.digest(data));
        map.insert(cid, Bytes::copy_from_slice(data));
        cid
    }

    fn pb_block(map: &mut BlockMap, node: &PbNode) -> Cid {
        let bytes = node.encode_to_vec();
        let cid = Cid::new_v1(DAG_PB_CODEC, Code::Sha2_256.digest(&bytes));
        map.insert(cid, Bytes::from(bytes));
        cid
    }

    fn file_node(children: &[(Cid, u64)]) -> PbNode {
        let meta = UnixFsData {
            node_type: Some(2),
            data: None,
            filesize: Some(children.iter().map(|(_, size)| size).sum()),
            blocksizes: children.iter().map(|(_, size)| *size).collect(),
        };
        PbNode {
            links: children
                .iter()
                .map(|(cid, _)| PbLink {
                    hash: Some(cid.to_bytes()),
                    name: Some(String::new()),
                    tsize: None,
                })
                .collect(),
            data: Some(meta.encode_to_vec()),
        }
    }

    fn dir_node(entries: &[(&str, Cid)]) -> PbNode {
        let meta = UnixFsData {
            node_type: Some(1),
            data: None,
            filesize: None,
            blocksizes: Vec::new(),
        };
        PbNode {
            links: entries
                .iter()
                .map(|(name, cid)| PbLink {
                    hash: Some(cid.to_bytes()),
                    name: Some(name.to_string()),
                    tsize: None,
                })
                .collect(),
            data: Some(meta.encode_to_vec()),
        }
    }

    #[test]
    fn test_export_raw_leaf() {
        let mut map = BlockMap::default();
        let cid = raw_block(&mut map, b"hello world");

        let bytes = export(map, cid, "/").unwrap().collect_bytes().unwrap();
        assert_eq!(&bytes[..], b"hello world");
    }

    #[test]
    fn test_export_multi_block_file_in_order() {
        let mut map = BlockMap::default();
        let a = raw_block(&mut map, b"hello ");
        let b = raw_block(&mut map, b"world");
        let root = pb_block(&mut map, &file_node(&[(a, 6), (b, 5)]));

        let bytes = export(map, root, "/").unwrap().collect_bytes().unwrap();
        assert_eq!(&bytes[..], b"hello world");
    }

    #[test]
    fn test_export_through_directory_path() {
        let mut map = BlockMap::default();
        let content = raw_block(&mut map, b"readme contents");
        let dir = pb_block(&mut map, &dir_node(&[("readme.txt", content)]));

        let bytes = export(map, dir, "/readme.txt")
            .unwrap()
            .collect_bytes()
            .unwrap();
        assert_eq!(&bytes[..], b"readme contents");
    }

    #[test]
    fn test_query_suffix_ignored_during_traversal() {
        let mut map = BlockMap::default();
        let content = raw_block(&mut map, b"readme contents");
        let dir = pb_block(&mut map, &dir_node(&[("readme.txt", content)]));

        let bytes = export(map, dir, "/readme.txt?download=true")
            .unwrap()
            .collect_bytes()
            .unwrap();
        assert_eq!(&bytes[..], b"readme contents");
    }

    #[test]
    fn test_missing_path_segment() {
        let mut map = BlockMap::default();
        let content = raw_block(&mut map, b"data");
        let dir = pb_block(&mut map, &dir_node(&[("present.txt", content)]));

        assert!(matches!(
            export(map, dir, "/absent.txt"),
            Err(HatchwayError::PathNotFound(segment)) if segment == "absent.txt"
        ));
    }

    #[test]
    fn test_missing_block_fails_not_truncates() {
        let mut map = BlockMap::default();
        let a = raw_block(&mut map, b"hello ");
        // b is referenced by the file node but never inserted
        let b = Cid::new_v1(RAW_CODEC, Code::Sha2_256.digest(b"world"));
        let root = pb_block(&mut map, &file_node(&[(a, 6), (b, 5)]));

        let result = export(map, root, "/").unwrap().collect_bytes();
        assert!(matches!(result, Err(HatchwayError::BlockNotFound(cid)) if cid == b));
    }

    #[test]
    fn test_stream_is_single_pass() {
        let mut map = BlockMap::default();
        let cid = raw_block(&mut map, b"once");

        let mut stream = export(map, cid, "/").unwrap();
        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_directory_target_not_exportable() {
        let mut map = BlockMap::default();
        let content = raw_block(&mut map, b"data");
        let dir = pb_block(&mut map, &dir_node(&[("file", content)]));

        assert!(matches!(
            export(map, dir, "/"),
            Err(HatchwayError::NotExportable(_))
        ));
    }

    #[test]
    fn test_traversal_into_leaf_rejected() {
        let mut map = BlockMap::default();
        let leaf = raw_block(&mut map, b"data");

        assert!(matches!(
            export(map, leaf, "/child"),
            Err(HatchwayError::NotExportable(_))
        ));
    }
}
