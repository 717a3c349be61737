/*
    AttachmentTable - which prefixes are delegated to which peer

    One peer per prefix; attaching again replaces the mapping.
    A path is routed to the longest attached prefix it lies strictly under,
    so with `a -> P` and `a.b -> Q`, `a.b.c` goes to Q as `c` and `a.x` goes to P as `x`.
    The prefix itself (`a`) is not forwarded.
*/

use std::collections::BTreeMap;

use super::transport::PeerId;
use crate::core_path::Path;

/// Where a path is forwarded to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub prefix: Path,
    pub peer: PeerId,
    /// Path with the prefix stripped, as the peer sees it
    pub relative: Path,
}

#[derive(Debug, Default, Clone)]
pub struct AttachmentTable {
    entries: BTreeMap<Path, PeerId>,
}

impl AttachmentTable {
    pub fn new() -> Self {
        AttachmentTable::default()
    }

    /// Map `prefix` to `peer`, returning the peer it replaced
    pub fn attach(&mut self, prefix: Path, peer: PeerId) -> Option<PeerId> {
        self.entries.insert(prefix, peer)
    }

    pub fn detach(&mut self, prefix: &Path) -> Option<PeerId> {
        self.entries.remove(prefix)
    }

    /// Longest-prefix match for `path`
    pub fn resolve(&self, path: &Path) -> Option<Route> {
        self.entries
            .iter()
            .filter(|(prefix, _)| path.is_under(prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .and_then(|(prefix, peer)| {
                Some(Route {
                    prefix: prefix.clone(),
                    peer: peer.clone(),
                    relative: path.strip_prefix(prefix)?,
                })
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &PeerId)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
