use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::diff::Identifiable;
use crate::models::{Peer, PeerId, PeersFilter, UnreadBadge};

/// A peer the user opened from search before.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentlySearchedPeer {
    pub peer: Peer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<UnreadBadge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<u32>,
}

impl From<Peer> for RecentlySearchedPeer {
    fn from(peer: Peer) -> Self {
        Self {
            peer,
            unread: None,
            subscribers: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum RecentEntryId {
    TopPeers,
    Peer(PeerId),
}

/// Row of the list shown while the search field is empty.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RecentEntry {
    TopPeers { peers: Vec<Peer> },
    Peer { index: usize, peer: RecentlySearchedPeer },
}

impl RecentEntry {
    pub fn id(&self) -> RecentEntryId {
        match self {
            Self::TopPeers { .. } => RecentEntryId::TopPeers,
            Self::Peer { peer, .. } => RecentEntryId::Peer(peer.peer.id),
        }
    }

    pub fn precedes(&self, other: &Self) -> bool {
        let order = match (self, other) {
            (Self::Peer { index: lhs, .. }, Self::Peer { index: rhs, .. }) => lhs.cmp(rhs),
            (Self::TopPeers { .. }, Self::TopPeers { .. }) => Ordering::Equal,
            (Self::TopPeers { .. }, Self::Peer { .. }) => Ordering::Less,
            (Self::Peer { .. }, Self::TopPeers { .. }) => Ordering::Greater,
        };
        order == Ordering::Less
    }
}

impl Identifiable for RecentEntry {
    type Id = RecentEntryId;

    fn stable_id(&self) -> RecentEntryId {
        self.id()
    }
}

/// Keeps recently searched peers where the user last saw them. Peers already on
/// screen keep their relative order; peers new to the list go on top.
#[derive(Debug, Default)]
pub struct RecentOrder {
    order: Vec<PeerId>,
}

impl RecentOrder {
    pub fn arrange(&mut self, peers: Vec<RecentlySearchedPeer>) -> Vec<RecentlySearchedPeer> {
        let mut remaining: Vec<Option<RecentlySearchedPeer>> = peers.into_iter().map(Some).collect();
        let mut kept = Vec::with_capacity(remaining.len());
        let mut updated = Vec::with_capacity(remaining.len());

        for id in &self.order {
            let found = remaining
                .iter_mut()
                .find(|slot| matches!(slot, Some(peer) if peer.peer.id == *id));
            if let Some(peer) = found.and_then(Option::take) {
                updated.push(*id);
                kept.push(peer);
            }
        }

        let fresh: Vec<RecentlySearchedPeer> = remaining.into_iter().flatten().collect();
        let mut result = Vec::with_capacity(fresh.len() + kept.len());
        let mut order = Vec::with_capacity(fresh.len() + updated.len());
        for peer in fresh {
            if order.contains(&peer.peer.id) || updated.contains(&peer.peer.id) {
                continue;
            }
            order.push(peer.peer.id);
            result.push(peer);
        }
        order.extend(updated);
        result.extend(kept);

        self.order = order;
        result
    }

    pub fn reset(&mut self) {
        self.order.clear();
    }
}

/// Builds the recent list: the top-peers strip first (unless only groups may
/// be picked), then every usable recently searched peer once.
pub fn build_recent_entries(
    has_top_peers: bool,
    top_peers: Vec<Peer>,
    peers: &[RecentlySearchedPeer],
    filter: PeersFilter,
) -> Vec<RecentEntry> {
    let mut entries = Vec::with_capacity(peers.len() + 1);
    if has_top_peers && !filter.contains(PeersFilter::ONLY_GROUPS) {
        entries.push(RecentEntry::TopPeers { peers: top_peers });
    }

    let mut seen = HashSet::new();
    let mut index = 0;
    for searched in peers {
        if !filter.enables(&searched.peer) || !seen.insert(searched.peer.id) {
            continue;
        }
        entries.push(RecentEntry::Peer {
            index,
            peer: searched.clone(),
        });
        index += 1;
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PeerKind;

    fn searched(id: i64) -> RecentlySearchedPeer {
        Peer::user(id, format!("Peer {id}")).into()
    }

    fn ids(peers: &[RecentlySearchedPeer]) -> Vec<i64> {
        peers.iter().map(|peer| peer.peer.id.0).collect()
    }

    #[test]
    fn test_order_is_stable_across_reloads() {
        let mut order = RecentOrder::default();
        let first = order.arrange(vec![searched(1), searched(2), searched(3)]);
        assert_eq!(ids(&first), vec![1, 2, 3]);

        // Opening peer 3 moves it to the top of the store, but not on screen
        let second = order.arrange(vec![searched(3), searched(1), searched(2)]);
        assert_eq!(ids(&second), vec![1, 2, 3]);

        let third = order.arrange(vec![searched(4), searched(3), searched(1)]);
        assert_eq!(ids(&third), vec![4, 1, 3]);

        order.reset();
        let fourth = order.arrange(vec![searched(3), searched(1)]);
        assert_eq!(ids(&fourth), vec![3, 1]);
    }

    #[test]
    fn test_build_recent_entries() {
        let group: RecentlySearchedPeer = Peer::new(5, PeerKind::Group, "Family").into();
        let peers = vec![searched(1), group, searched(1), searched(2)];

        let entries = build_recent_entries(true, Vec::new(), &peers, PeersFilter::empty());
        let ids: Vec<RecentEntryId> = entries.iter().map(RecentEntry::id).collect();
        assert_eq!(
            ids,
            vec![
                RecentEntryId::TopPeers,
                RecentEntryId::Peer(PeerId(1)),
                RecentEntryId::Peer(PeerId(5)),
                RecentEntryId::Peer(PeerId(2)),
            ]
        );
        assert!(entries[0].precedes(&entries[1]));
        assert!(entries[1].precedes(&entries[2]));

        let groups_only = build_recent_entries(true, Vec::new(), &peers, PeersFilter::ONLY_GROUPS);
        assert_eq!(groups_only.len(), 1);
        assert_eq!(groups_only[0].id(), RecentEntryId::Peer(PeerId(5)));
    }
}
