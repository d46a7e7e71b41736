use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use super::peer::{Peer, PeerId, PeerKind};

/// Which peers a search pane may show, set by the screen that opens it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeersFilter(u32);

impl PeersFilter {
    pub const ONLY_WRITEABLE: Self = Self(1 << 0);
    pub const ONLY_PRIVATE_CHATS: Self = Self(1 << 1);
    pub const ONLY_GROUPS: Self = Self(1 << 2);
    pub const ONLY_CHANNELS: Self = Self(1 << 3);
    pub const EXCLUDE_CHANNELS: Self = Self(1 << 4);
    pub const EXCLUDE_SAVED_MESSAGES: Self = Self(1 << 5);
    pub const EXCLUDE_SECRET_CHATS: Self = Self(1 << 6);
    pub const DO_NOT_SEARCH_MESSAGES: Self = Self(1 << 7);
    pub const EXCLUDE_RECENT: Self = Self(1 << 8);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether a search hit may be listed at all.
    pub fn admits(self, peer: &Peer, account_peer_id: PeerId) -> bool {
        if self.contains(Self::EXCLUDE_SAVED_MESSAGES) && peer.id == account_peer_id {
            return false;
        }
        if self.contains(Self::EXCLUDE_SECRET_CHATS) && peer.kind == PeerKind::SecretChat {
            return false;
        }
        if self.contains(Self::ONLY_PRIVATE_CHATS) && !peer.kind.is_user() {
            return false;
        }
        if self.contains(Self::ONLY_GROUPS) && !peer.kind.is_group() {
            return false;
        }
        if self.contains(Self::ONLY_CHANNELS) {
            return peer.kind.is_channel();
        }
        if self.contains(Self::EXCLUDE_CHANNELS) && peer.kind.is_channel() {
            return false;
        }
        true
    }

    /// Whether a recent-list row is usable under this filter.
    pub fn enables(self, peer: &Peer) -> bool {
        if self.contains(Self::ONLY_WRITEABLE) && !peer.can_send_messages {
            return false;
        }
        if self.contains(Self::ONLY_PRIVATE_CHATS) && !peer.kind.is_private() {
            return false;
        }
        if self.contains(Self::ONLY_GROUPS) && !peer.kind.is_group() {
            return false;
        }
        true
    }
}

impl BitOr for PeersFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}
