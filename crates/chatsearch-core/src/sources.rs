//! Data-access seam of the search panes.
//!
//! The panes never touch a database or the network directly; every lookup goes
//! through [`SearchSources`], whose futures are spawned on their own tasks.

use std::collections::HashMap;

use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::contacts::DeviceContact;
use crate::error::SearchError;
use crate::link::MessageLink;
use crate::models::{
    FolderId, FoundPeer, MessageId, MessageTags, Peer, PeerId, Presence, ReadState,
    RenderedPeer, SearchMessage, SearchOptions, UnreadBadge,
};
use crate::recent::RecentlySearchedPeer;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalPeers {
    pub peers: Vec<RenderedPeer>,
    pub unread: HashMap<PeerId, UnreadBadge>,
}

/// Remote directory hits, split into chats the account already knows and the rest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemotePeers {
    pub local: Vec<FoundPeer>,
    pub global: Vec<FoundPeer>,
}

/// Opaque continuation handed back by the message search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchState(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope")]
pub enum SearchLocation {
    Peer {
        peer_id: PeerId,
        tags: Option<MessageTags>,
        min_date: Option<i32>,
        max_date: Option<i32>,
    },
    Folder {
        folder_id: FolderId,
        tags: Option<MessageTags>,
        min_date: Option<i32>,
        max_date: Option<i32>,
    },
    General {
        tags: Option<MessageTags>,
        min_date: Option<i32>,
        max_date: Option<i32>,
    },
}

impl SearchLocation {
    /// A peer option narrows to that chat, otherwise the pane's folder, otherwise everything.
    pub fn resolve(
        options: Option<&SearchOptions>,
        folder_id: Option<FolderId>,
        tags: Option<MessageTags>,
    ) -> Self {
        let (min_date, max_date) = options.map(SearchOptions::date_bounds).unwrap_or_default();
        match (options.and_then(|options| options.peer.as_ref()), folder_id) {
            (Some(scope), _) => Self::Peer {
                peer_id: scope.peer_id,
                tags,
                min_date,
                max_date,
            },
            (None, Some(folder_id)) => Self::Folder {
                folder_id,
                tags,
                min_date,
                max_date,
            },
            (None, None) => Self::General {
                tags,
                min_date,
                max_date,
            },
        }
    }

    pub fn tags(&self) -> Option<MessageTags> {
        match self {
            Self::Peer { tags, .. } | Self::Folder { tags, .. } | Self::General { tags, .. } => {
                *tags
            }
        }
    }

    pub fn date_bounds(&self) -> (Option<i32>, Option<i32>) {
        match self {
            Self::Peer {
                min_date, max_date, ..
            }
            | Self::Folder {
                min_date, max_date, ..
            }
            | Self::General {
                min_date, max_date, ..
            } => (*min_date, *max_date),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageSearchRequest {
    pub location: SearchLocation,
    pub query: String,
    /// `None` requests the first page
    pub state: Option<SearchState>,
    pub limit: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessagePage {
    pub messages: Vec<SearchMessage>,
    pub read_states: HashMap<PeerId, ReadState>,
    pub total_count: u32,
    /// No further pages exist
    pub completed: bool,
    pub state: Option<SearchState>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecentPeers {
    Peers(Vec<Peer>),
    Disabled,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalContacts {
    pub peers: Vec<Peer>,
    pub presences: HashMap<PeerId, Presence>,
}

pub trait SearchSources: Send + Sync {
    fn local_peers(&self, query: &str) -> BoxFuture<'static, Result<LocalPeers, SearchError>>;

    fn remote_peers(&self, query: &str) -> BoxFuture<'static, Result<RemotePeers, SearchError>>;

    fn search_messages(
        &self,
        request: MessageSearchRequest,
    ) -> BoxFuture<'static, Result<MessagePage, SearchError>>;

    fn resolve_message_link(
        &self,
        link: MessageLink,
    ) -> BoxFuture<'static, Result<Option<SearchMessage>, SearchError>>;

    fn recent_peers(&self) -> BoxFuture<'static, Result<RecentPeers, SearchError>> {
        future::ready(Ok(RecentPeers::Disabled)).boxed()
    }

    fn recently_searched_peers(
        &self,
    ) -> BoxFuture<'static, Result<Vec<RecentlySearchedPeer>, SearchError>> {
        future::ready(Ok(Vec::new())).boxed()
    }

    fn add_recently_searched_peer(&self, _peer_id: PeerId) -> Result<(), SearchError> {
        Ok(())
    }

    fn remove_recently_searched_peer(&self, _peer_id: PeerId) -> Result<(), SearchError> {
        Ok(())
    }

    fn clear_recently_searched_peers(&self) -> Result<(), SearchError> {
        Ok(())
    }

    fn search_contacts(&self, _query: &str) -> BoxFuture<'static, Result<LocalContacts, SearchError>> {
        future::ready(Ok(LocalContacts::default())).boxed()
    }

    fn search_device_contacts(
        &self,
        _query: &str,
    ) -> BoxFuture<'static, Result<Vec<DeviceContact>, SearchError>> {
        future::ready(Ok(Vec::new())).boxed()
    }

    fn delete_messages(&self, _ids: &[MessageId]) -> Result<(), SearchError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, PeerScope};

    #[test]
    fn test_location_prefers_peer_scope() {
        let options = SearchOptions {
            peer: Some(PeerScope {
                peer_id: PeerId(5),
                is_group: false,
                title: "Ann".to_string(),
            }),
            date: Some(DateRange::before(900, "Before")),
        };
        let location =
            SearchLocation::resolve(Some(&options), Some(FolderId(2)), Some(MessageTags::FILE));
        assert!(matches!(location, SearchLocation::Peer { peer_id: PeerId(5), .. }));
        assert_eq!(location.tags(), Some(MessageTags::FILE));
        assert_eq!(location.date_bounds(), (None, Some(900)));
    }

    #[test]
    fn test_location_falls_back_to_folder_then_general() {
        assert!(matches!(
            SearchLocation::resolve(None, Some(FolderId(2)), None),
            SearchLocation::Folder { folder_id: FolderId(2), .. }
        ));
        assert_eq!(
            SearchLocation::resolve(None, None, None),
            SearchLocation::General {
                tags: None,
                min_date: None,
                max_date: None,
            }
        );
    }
}
