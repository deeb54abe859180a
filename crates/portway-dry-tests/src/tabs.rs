// SPDX-License-Identifier: Apache-2.0
//! Static tab directory.

use std::sync::{Mutex, MutexGuard};

use portway_proto::TabId;
use portway_router::{PeerId, TabDirectory};

/// [`TabDirectory`] backed by a fixed peer → tab table.
///
/// Peers are reported as open windows in insertion order.
#[derive(Debug, Default)]
pub struct StaticTabDirectory {
    tabs: Mutex<Vec<(PeerId, TabId)>>,
}

impl StaticTabDirectory {
    /// Empty directory; every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StaticTabDirectory::insert`].
    pub fn with_tab(self, peer: PeerId, tab: &str) -> Self {
        self.insert(peer, tab);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(PeerId, TabId)>> {
        self.tabs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Map `peer` to `tab`, replacing any earlier mapping.
    pub fn insert(&self, peer: PeerId, tab: &str) {
        let mut tabs = self.lock();
        tabs.retain(|(p, _)| *p != peer);
        tabs.push((peer, TabId(tab.to_owned())));
    }

    /// Forget `peer` (simulates a closed tab).
    pub fn remove(&self, peer: PeerId) {
        self.lock().retain(|(p, _)| *p != peer);
    }
}

impl TabDirectory for StaticTabDirectory {
    fn resolve_tab_id(&self, peer: PeerId) -> Option<TabId> {
        self.lock()
            .iter()
            .find(|(p, _)| *p == peer)
            .map(|(_, tab)| tab.clone())
    }

    fn current_windows(&self) -> Vec<PeerId> {
        self.lock().iter().map(|(peer, _)| *peer).collect()
    }
}
