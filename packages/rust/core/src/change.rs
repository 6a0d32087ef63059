//! Content fingerprinting and change detection.
//!
//! A resource is ingested only when its fingerprint differs from the latest
//! stored capture of the same origin URL, or when no capture exists yet.

use sha2::{Digest, Sha256};

use sitegraph_shared::{Result, SiteGraphError};

/// How a new fingerprint relates to the latest stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// No prior capture of this origin URL.
    New,
    /// Prior capture exists with a different fingerprint.
    Changed,
    /// Prior capture has the same fingerprint.
    Unchanged,
}

/// SHA-256 of `bytes` as lowercase hex (64 chars).
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Validate `raw` as UTF-8 text.
///
/// Fails with [`SiteGraphError::Decode`], never with an empty-content or
/// language condition.
pub fn decode_text(raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw).map_err(|e| SiteGraphError::decode(e.to_string()))
}

pub fn classify(previous: Option<&str>, new: &str) -> ChangeStatus {
    match previous {
        None => ChangeStatus::New,
        Some(prev) if prev == new => ChangeStatus::Unchanged,
        Some(_) => ChangeStatus::Changed,
    }
}

/// `true` unless `previous` exists and equals `new`.
pub fn has_changed(previous: Option<&str>, new: &str) -> bool {
    classify(previous, new) != ChangeStatus::Unchanged
}
