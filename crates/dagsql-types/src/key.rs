use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Canonical map-key ordering: shorter keys first, then bytewise.
///
/// Encoder, decoder and every store backend must agree on this order for
/// the output to be byte-stable.
pub fn canonical_key_cmp(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Map key bytes ordered by [`canonical_key_cmp`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalKey(pub Vec<u8>);

impl CanonicalKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&[u8]> for CanonicalKey {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for CanonicalKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl PartialOrd for CanonicalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_key_cmp(&self.0, &other.0)
    }
}
