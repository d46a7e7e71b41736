use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::diff::Identifiable;
use crate::models::{FoundPeer, MessageId, Peer, PeerId, ReadState, SearchMessage, UnreadBadge};

/// Header state of a capped peer section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionExpand {
    #[default]
    None,
    Expand,
    Collapse,
}

impl SectionExpand {
    pub fn for_section(total: usize, expanded: bool, cap: usize) -> Self {
        if total <= cap {
            Self::None
        } else if expanded {
            Self::Collapse
        } else {
            Self::Expand
        }
    }

    pub fn limits_rows(self) -> bool {
        matches!(self, Self::Expand)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    LocalPeers,
    GlobalPeers,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum EntryId {
    LocalPeer(PeerId),
    GlobalPeer(PeerId),
    Message(MessageId),
    AddContact,
}

/// One row of the chat-list search results.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SearchEntry {
    LocalPeer {
        peer: Peer,
        associated_peer: Option<Peer>,
        unread: Option<UnreadBadge>,
        index: usize,
        expand: SectionExpand,
    },
    GlobalPeer {
        peer: FoundPeer,
        unread: Option<UnreadBadge>,
        index: usize,
        expand: SectionExpand,
    },
    Message {
        message: SearchMessage,
        read_state: Option<ReadState>,
        total_count: u32,
        selected: Option<bool>,
        display_custom_header: bool,
    },
    AddContact {
        phone_number: String,
    },
}

impl SearchEntry {
    pub fn id(&self) -> EntryId {
        match self {
            Self::LocalPeer { peer, .. } => EntryId::LocalPeer(peer.id),
            Self::GlobalPeer { peer, .. } => EntryId::GlobalPeer(peer.peer.id),
            Self::Message { message, .. } => EntryId::Message(message.id),
            Self::AddContact { .. } => EntryId::AddContact,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Self::LocalPeer { .. } => 0,
            Self::GlobalPeer { .. } => 1,
            Self::Message { .. } => 2,
            Self::AddContact { .. } => 3,
        }
    }

    /// Strict weak ordering of rows within one result list.
    pub fn precedes(&self, other: &Self) -> bool {
        self.order(other) == Ordering::Less
    }

    fn order(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::LocalPeer { index: lhs, .. }, Self::LocalPeer { index: rhs, .. })
            | (Self::GlobalPeer { index: lhs, .. }, Self::GlobalPeer { index: rhs, .. }) => {
                lhs.cmp(rhs)
            }
            // Newest first
            (Self::Message { message: lhs, .. }, Self::Message { message: rhs, .. }) => {
                rhs.index().cmp(&lhs.index())
            }
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }

    pub fn peer(&self) -> Option<&Peer> {
        match self {
            Self::LocalPeer { peer, .. } => Some(peer),
            Self::GlobalPeer { peer, .. } => Some(&peer.peer),
            Self::Message { message, .. } => Some(&message.peer),
            Self::AddContact { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&SearchMessage> {
        match self {
            Self::Message { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_peer_row(&self) -> bool {
        matches!(self, Self::LocalPeer { .. } | Self::GlobalPeer { .. })
    }

    pub fn expand(&self) -> Option<SectionExpand> {
        match self {
            Self::LocalPeer { expand, .. } | Self::GlobalPeer { expand, .. } => Some(*expand),
            _ => None,
        }
    }
}

impl Identifiable for SearchEntry {
    type Id = EntryId;

    fn stable_id(&self) -> EntryId {
        self.id()
    }
}

/// True when no row is ordered before its predecessor.
pub fn is_sorted(entries: &[SearchEntry]) -> bool {
    entries.windows(2).all(|pair| !pair[1].precedes(&pair[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageTags;

    fn local(id: i64, index: usize) -> SearchEntry {
        SearchEntry::LocalPeer {
            peer: Peer::user(id, format!("Peer {id}")),
            associated_peer: None,
            unread: None,
            index,
            expand: SectionExpand::None,
        }
    }

    fn global(id: i64, index: usize) -> SearchEntry {
        SearchEntry::GlobalPeer {
            peer: Peer::user(id, format!("Peer {id}")).into(),
            unread: None,
            index,
            expand: SectionExpand::None,
        }
    }

    fn message(id: i32, timestamp: i32) -> SearchEntry {
        SearchEntry::Message {
            message: SearchMessage {
                id: MessageId::cloud(PeerId(9), id),
                timestamp,
                peer: Peer::user(9, "Chat"),
                author: None,
                text: "hello".to_string(),
                tags: MessageTags::empty(),
            },
            read_state: None,
            total_count: 1,
            selected: None,
            display_custom_header: false,
        }
    }

    #[test]
    fn test_variant_priority() {
        let add = SearchEntry::AddContact {
            phone_number: "+1555".to_string(),
        };
        assert!(local(1, 5).precedes(&global(2, 0)));
        assert!(global(2, 9).precedes(&message(1, 0)));
        assert!(message(1, 0).precedes(&add));
        assert!(!add.precedes(&local(1, 0)));
    }

    #[test]
    fn test_messages_newest_first_then_higher_id() {
        assert!(message(1, 200).precedes(&message(2, 100)));
        assert!(message(3, 100).precedes(&message(2, 100)));
        assert!(!message(2, 100).precedes(&message(2, 100)));
    }

    #[test]
    fn test_identity_ignores_payload() {
        let a = local(1, 0);
        let b = SearchEntry::LocalPeer {
            peer: Peer::user(1, "Renamed"),
            associated_peer: None,
            unread: Some(UnreadBadge {
                count: 3,
                muted: false,
            }),
            index: 0,
            expand: SectionExpand::Expand,
        };
        assert_eq!(a.stable_id(), b.stable_id());
        assert_ne!(a, b);
        assert_ne!(local(1, 0).stable_id(), global(1, 0).stable_id());
    }

    #[test]
    fn test_is_sorted() {
        assert!(is_sorted(&[local(1, 0), local(2, 1), global(3, 0), message(1, 50)]));
        assert!(!is_sorted(&[global(3, 0), local(1, 0)]));
    }

    #[test]
    fn test_section_expand() {
        assert_eq!(SectionExpand::for_section(3, false, 3), SectionExpand::None);
        assert_eq!(SectionExpand::for_section(4, false, 3), SectionExpand::Expand);
        assert_eq!(SectionExpand::for_section(4, true, 3), SectionExpand::Collapse);
    }
}
