//! Resource locators for content-addressed retrieval.
//!
//! Accepts multiple locator formats and normalizes them to one structured
//! descriptor:
//! - Bare: `bafy.../readme.txt`
//! - Gateway path: `/ipfs/bafy.../readme.txt`
//! - Protocol URL: `ipfs://bafy.../readme.txt`
//!
//! All three resolve to an equal [`Resource`] when the identifier is equal.

use std::fmt;

use cid::Cid;

use crate::types::{HatchwayError, Result};

/// Protocol tag carried by every resource
pub const PROTOCOL: &str = "ipfs";

/// A parsed content locator: identifier plus opaque subpath
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Content identifier naming the root of the addressed structure
    pub cid: Cid,
    /// Subpath below the identifier, always with a leading slash.
    /// Preserved verbatim, including nested segments and query suffixes.
    pub pathname: String,
}

impl Resource {
    pub fn protocol(&self) -> &'static str {
        PROTOCOL
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", PROTOCOL, self.cid, self.pathname)
    }
}

/// Parse a textual locator into a [`Resource`].
///
/// Tries the accepted forms in priority order: bare identifier, `/ipfs/`
/// gateway path, `ipfs://` protocol URL. The identifier must be a
/// structurally valid CID; everything after it is kept as-is.
pub fn parse(path: &str) -> Result<Resource> {
    let raw = path.trim();
    if raw.is_empty() {
        return Err(HatchwayError::InvalidPath("empty path".to_string()));
    }

    let candidate = if let Some(rest) = raw.strip_prefix("/ipfs/") {
        rest
    } else if let Some(rest) = raw.strip_prefix("ipfs://") {
        rest
    } else {
        raw
    };

    let (identifier, rest) = match candidate.find('/') {
        Some(i) => (&candidate[..i], &candidate[i..]),
        None => (candidate, ""),
    };

    let cid = Cid::try_from(identifier)
        .map_err(|e| HatchwayError::InvalidPath(format!("{}: {}", identifier, e)))?;

    let pathname = if rest.is_empty() {
        "/".to_string()
    } else {
        rest.to_string()
    };

    Ok(Resource { cid, pathname })
}
