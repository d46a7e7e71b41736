//! In-memory [`SearchSources`] backed by a JSON dataset. Used by the CLI and
//! the tests; per-source latency and failures can be configured.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::contacts::DeviceContact;
use crate::error::SearchError;
use crate::link::{LinkTarget, MessageLink};
use crate::models::{
    FolderId, FoundPeer, MessageId, Peer, PeerId, Presence, ReadState, RenderedPeer,
    SearchMessage, UnreadBadge,
};
use crate::phone::normalize_phone_number;
use crate::recent::RecentlySearchedPeer;
use crate::search::{parse_search_terms, peer_matches_query, text_contains_all_terms};
use crate::sources::{
    LocalContacts, LocalPeers, MessagePage, MessageSearchRequest, RecentPeers, RemotePeers,
    SearchLocation, SearchSources, SearchState,
};

/// A chat in the local store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChat {
    pub peer: Peer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_peer: Option<Peer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<UnreadBadge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_state: Option<ReadState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
    /// In the account's cloud contact list
    #[serde(default)]
    pub contact: bool,
}

impl From<Peer> for StoredChat {
    fn from(peer: Peer) -> Self {
        Self {
            peer,
            associated_peer: None,
            unread: None,
            read_state: None,
            presence: None,
            contact: false,
        }
    }
}

/// A peer reachable through the remote directory search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryPeer {
    pub peer: Peer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<u32>,
    /// Already known to the account; reported in the local half of the result
    #[serde(default)]
    pub known: bool,
}

impl From<Peer> for DirectoryPeer {
    fn from(peer: Peer) -> Self {
        Self {
            peer,
            subscribers: None,
            known: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFolder {
    pub id: FolderId,
    pub peer_ids: Vec<PeerId>,
}

/// Artificial response delay per source, in milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceLatency {
    pub local_peers_ms: u64,
    pub remote_peers_ms: u64,
    pub messages_ms: u64,
    pub message_link_ms: u64,
    pub contacts_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryDataset {
    pub chats: Vec<StoredChat>,
    pub directory: Vec<DirectoryPeer>,
    pub messages: Vec<SearchMessage>,
    pub folders: Vec<StoredFolder>,
    /// `None` disables the top-peers strip
    pub top_peers: Option<Vec<PeerId>>,
    /// Most recent first
    pub recently_searched: Vec<PeerId>,
    pub device_contacts: Vec<DeviceContact>,
    pub latency: SourceLatency,
}

impl MemoryDataset {
    pub fn load(path: &Path) -> Result<Self, SearchError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn find_peer(&self, peer_id: PeerId) -> Option<&Peer> {
        self.chats
            .iter()
            .map(|chat| &chat.peer)
            .chain(self.directory.iter().map(|entry| &entry.peer))
            .find(|peer| peer.id == peer_id)
    }

    fn chat(&self, peer_id: PeerId) -> Option<&StoredChat> {
        self.chats.iter().find(|chat| chat.peer.id == peer_id)
    }

    fn location_admits(&self, location: &SearchLocation, message: &SearchMessage) -> bool {
        let in_scope = match location {
            SearchLocation::Peer { peer_id, .. } => message.peer.id == *peer_id,
            SearchLocation::Folder { folder_id, .. } => self
                .folders
                .iter()
                .find(|folder| folder.id == *folder_id)
                .is_some_and(|folder| folder.peer_ids.contains(&message.peer.id)),
            SearchLocation::General { .. } => true,
        };
        let tagged = location
            .tags()
            .map_or(true, |tags| message.tags.contains(tags));
        let (min_date, max_date) = location.date_bounds();
        let dated = min_date.map_or(true, |min| message.timestamp >= min)
            && max_date.map_or(true, |max| message.timestamp <= max);
        in_scope && tagged && dated
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    LocalPeers,
    RemotePeers,
    Messages,
    MessageLink,
    RecentPeers,
    RecentlySearched,
    Contacts,
    DeviceContacts,
}

impl SourceKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::LocalPeers => "local_peers",
            Self::RemotePeers => "remote_peers",
            Self::Messages => "messages",
            Self::MessageLink => "message_link",
            Self::RecentPeers => "recent_peers",
            Self::RecentlySearched => "recently_searched",
            Self::Contacts => "contacts",
            Self::DeviceContacts => "device_contacts",
        }
    }
}

#[derive(Default)]
pub struct MemorySources {
    data: RwLock<MemoryDataset>,
    calls: Mutex<HashMap<SourceKind, usize>>,
    failing: Mutex<HashMap<SourceKind, String>>,
}

impl MemorySources {
    pub fn new(dataset: MemoryDataset) -> Self {
        Self {
            data: RwLock::new(dataset),
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashMap::new()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, SearchError> {
        Ok(Self::new(MemoryDataset::load(path)?))
    }

    /// Number of lookups issued against a source so far.
    pub fn call_count(&self, kind: SourceKind) -> usize {
        self.calls.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Makes every following lookup of `kind` fail with `reason`.
    pub fn fail(&self, kind: SourceKind, reason: impl Into<String>) {
        self.failing.lock().insert(kind, reason.into());
    }

    pub fn recover(&self, kind: SourceKind) {
        self.failing.lock().remove(&kind);
    }

    pub fn set_latency(&self, latency: SourceLatency) {
        self.data.write().latency = latency;
    }

    pub fn dataset(&self) -> MemoryDataset {
        self.data.read().clone()
    }

    fn begin(&self, kind: SourceKind) -> Result<(), SearchError> {
        *self.calls.lock().entry(kind).or_insert(0) += 1;
        match self.failing.lock().get(&kind) {
            Some(reason) => Err(SearchError::unavailable(kind.name(), reason.clone())),
            None => Ok(()),
        }
    }

    /// Runs `lookup` now and hands its result out after `delay_ms`.
    fn respond<T, F>(
        &self,
        kind: SourceKind,
        delay_ms: u64,
        lookup: F,
    ) -> BoxFuture<'static, Result<T, SearchError>>
    where
        T: Send + 'static,
        F: FnOnce(&MemoryDataset) -> T,
    {
        let result = self.begin(kind).map(|()| lookup(&*self.data.read()));
        async move {
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            result
        }
        .boxed()
    }

    fn recently_searched(data: &MemoryDataset) -> Vec<RecentlySearchedPeer> {
        data.recently_searched
            .iter()
            .filter_map(|peer_id| {
                let peer = data.find_peer(*peer_id)?.clone();
                let unread = data.chat(*peer_id).and_then(|chat| chat.unread);
                let subscribers = data
                    .directory
                    .iter()
                    .find(|entry| entry.peer.id == *peer_id)
                    .and_then(|entry| entry.subscribers);
                Some(RecentlySearchedPeer {
                    peer,
                    unread,
                    subscribers,
                })
            })
            .collect()
    }
}

impl SearchSources for MemorySources {
    fn local_peers(&self, query: &str) -> BoxFuture<'static, Result<LocalPeers, SearchError>> {
        let delay = self.data.read().latency.local_peers_ms;
        self.respond(SourceKind::LocalPeers, delay, |data| {
            let mut result = LocalPeers::default();
            for chat in &data.chats {
                let matches = peer_matches_query(&chat.peer, query)
                    || chat
                        .associated_peer
                        .as_ref()
                        .is_some_and(|peer| peer_matches_query(peer, query));
                if !matches {
                    continue;
                }
                if let Some(unread) = chat.unread {
                    result.unread.insert(chat.peer.id, unread);
                }
                result.peers.push(RenderedPeer {
                    peer: chat.peer.clone(),
                    associated_peer: chat.associated_peer.clone(),
                });
            }
            result
        })
    }

    fn remote_peers(&self, query: &str) -> BoxFuture<'static, Result<RemotePeers, SearchError>> {
        let delay = self.data.read().latency.remote_peers_ms;
        self.respond(SourceKind::RemotePeers, delay, |data| {
            let mut result = RemotePeers::default();
            for entry in &data.directory {
                if !peer_matches_query(&entry.peer, query) {
                    continue;
                }
                let found = FoundPeer {
                    peer: entry.peer.clone(),
                    subscribers: entry.subscribers,
                };
                if entry.known {
                    result.local.push(found);
                } else {
                    result.global.push(found);
                }
            }
            result
        })
    }

    fn search_messages(
        &self,
        request: MessageSearchRequest,
    ) -> BoxFuture<'static, Result<MessagePage, SearchError>> {
        let delay = self.data.read().latency.messages_ms;
        self.respond(SourceKind::Messages, delay, |data| {
            let terms = parse_search_terms(&request.query);
            let mut matches: Vec<&SearchMessage> = data
                .messages
                .iter()
                .filter(|message| data.location_admits(&request.location, message))
                .filter(|message| text_contains_all_terms(&message.text, &terms))
                .collect();
            matches.sort_by(|lhs, rhs| rhs.index().cmp(&lhs.index()));

            // Continuation is the offset of the next page
            let offset = request
                .state
                .as_ref()
                .and_then(|state| state.0.parse::<usize>().ok())
                .unwrap_or(0)
                .min(matches.len());
            let end = offset.saturating_add(request.limit).min(matches.len());
            let messages: Vec<SearchMessage> =
                matches[offset..end].iter().map(|message| (*message).clone()).collect();

            let read_states: HashMap<PeerId, ReadState> = messages
                .iter()
                .filter_map(|message| {
                    let state = data.chat(message.peer.id)?.read_state?;
                    Some((message.peer.id, state))
                })
                .collect();
            let completed = end >= matches.len();
            MessagePage {
                messages,
                read_states,
                total_count: u32::try_from(matches.len()).unwrap_or(u32::MAX),
                completed,
                state: (!completed).then(|| SearchState(end.to_string())),
            }
        })
    }

    fn resolve_message_link(
        &self,
        link: MessageLink,
    ) -> BoxFuture<'static, Result<Option<SearchMessage>, SearchError>> {
        let delay = self.data.read().latency.message_link_ms;
        self.respond(SourceKind::MessageLink, delay, |data| {
            let peer_id = match &link.target {
                LinkTarget::Username(username) => data
                    .chats
                    .iter()
                    .map(|chat| &chat.peer)
                    .chain(data.directory.iter().map(|entry| &entry.peer))
                    .find(|peer| {
                        peer.username
                            .as_deref()
                            .is_some_and(|name| name.eq_ignore_ascii_case(username))
                    })
                    .map(|peer| peer.id),
                LinkTarget::PrivateChannel(channel_id) => Some(PeerId(*channel_id)),
            }?;
            data.messages
                .iter()
                .find(|message| message.peer.id == peer_id && message.id.id == link.message_id)
                .cloned()
        })
    }

    fn recent_peers(&self) -> BoxFuture<'static, Result<RecentPeers, SearchError>> {
        self.respond(SourceKind::RecentPeers, 0, |data| match &data.top_peers {
            Some(ids) => RecentPeers::Peers(
                ids.iter()
                    .filter_map(|peer_id| data.find_peer(*peer_id).cloned())
                    .collect(),
            ),
            None => RecentPeers::Disabled,
        })
    }

    fn recently_searched_peers(
        &self,
    ) -> BoxFuture<'static, Result<Vec<RecentlySearchedPeer>, SearchError>> {
        self.respond(SourceKind::RecentlySearched, 0, Self::recently_searched)
    }

    fn add_recently_searched_peer(&self, peer_id: PeerId) -> Result<(), SearchError> {
        let mut data = self.data.write();
        data.recently_searched.retain(|id| *id != peer_id);
        data.recently_searched.insert(0, peer_id);
        Ok(())
    }

    fn remove_recently_searched_peer(&self, peer_id: PeerId) -> Result<(), SearchError> {
        self.data.write().recently_searched.retain(|id| *id != peer_id);
        Ok(())
    }

    fn clear_recently_searched_peers(&self) -> Result<(), SearchError> {
        self.data.write().recently_searched.clear();
        Ok(())
    }

    fn search_contacts(&self, query: &str) -> BoxFuture<'static, Result<LocalContacts, SearchError>> {
        let delay = self.data.read().latency.contacts_ms;
        self.respond(SourceKind::Contacts, delay, |data| {
            let mut result = LocalContacts::default();
            for chat in data.chats.iter().filter(|chat| chat.contact) {
                if !peer_matches_query(&chat.peer, query) {
                    continue;
                }
                if let Some(presence) = chat.presence {
                    result.presences.insert(chat.peer.id, presence);
                }
                result.peers.push(chat.peer.clone());
            }
            result
        })
    }

    fn search_device_contacts(
        &self,
        query: &str,
    ) -> BoxFuture<'static, Result<Vec<DeviceContact>, SearchError>> {
        let delay = self.data.read().latency.contacts_ms;
        self.respond(SourceKind::DeviceContacts, delay, |data| {
            let terms = parse_search_terms(query);
            let digits = normalize_phone_number(query);
            data.device_contacts
                .iter()
                .filter(|contact| {
                    let by_name = !terms.is_empty()
                        && text_contains_all_terms(&contact.display_name(), &terms);
                    let by_phone = !digits.is_empty()
                        && contact
                            .phone_numbers
                            .iter()
                            .any(|phone| normalize_phone_number(phone).contains(&digits));
                    by_name || by_phone
                })
                .cloned()
                .collect()
        })
    }

    fn delete_messages(&self, ids: &[MessageId]) -> Result<(), SearchError> {
        self.data
            .write()
            .messages
            .retain(|message| !ids.contains(&message.id));
        tracing::debug!(count = ids.len(), "deleted messages");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageTags, PeerKind};
    use std::io::Write;

    fn message(peer: &Peer, id: i32, timestamp: i32, text: &str) -> SearchMessage {
        SearchMessage {
            id: MessageId::cloud(peer.id, id),
            timestamp,
            peer: peer.clone(),
            author: None,
            text: text.to_string(),
            tags: MessageTags::empty(),
        }
    }

    fn dataset() -> MemoryDataset {
        let team = Peer::new(10, PeerKind::Group, "Team").with_username("team");
        MemoryDataset {
            chats: vec![
                Peer::user(2, "Ann Lee").into(),
                Peer::user(3, "Bob").into(),
                team.clone().into(),
            ],
            directory: vec![
                DirectoryPeer {
                    known: true,
                    ..DirectoryPeer::from(Peer::user(2, "Ann Lee"))
                },
                Peer::user(4, "Annie").into(),
            ],
            messages: (1..=5)
                .map(|id| message(&team, id, id * 100, "annual report"))
                .collect(),
            ..Default::default()
        }
    }

    fn request(query: &str, state: Option<&str>, limit: usize) -> MessageSearchRequest {
        MessageSearchRequest {
            location: SearchLocation::General {
                tags: None,
                min_date: None,
                max_date: None,
            },
            query: query.to_string(),
            state: state.map(|state| SearchState(state.to_string())),
            limit,
        }
    }

    #[tokio::test]
    async fn test_peer_lookups() {
        let sources = MemorySources::new(dataset());
        let local = sources.local_peers("ann").await.unwrap();
        let ids: Vec<PeerId> = local.peers.iter().map(|p| p.peer.id).collect();
        assert_eq!(ids, vec![PeerId(2)]);

        let remote = sources.remote_peers("ann").await.unwrap();
        assert_eq!(remote.local.len(), 1);
        assert_eq!(remote.global[0].peer.id, PeerId(4));
        assert_eq!(sources.call_count(SourceKind::RemotePeers), 1);
    }

    #[tokio::test]
    async fn test_message_paging() {
        let sources = MemorySources::new(dataset());
        let first = sources.search_messages(request("annual", None, 2)).await.unwrap();
        let ids: Vec<i32> = first.messages.iter().map(|m| m.id.id).collect();
        assert_eq!(ids, vec![5, 4]);
        assert_eq!(first.total_count, 5);
        assert!(!first.completed);

        let state = first.state.as_ref().map(|s| s.0.clone());
        let last = sources
            .search_messages(request("annual", state.as_deref(), 10))
            .await
            .unwrap();
        assert_eq!(last.messages.len(), 3);
        assert!(last.completed);
        assert!(last.state.is_none());
    }

    #[tokio::test]
    async fn test_link_resolution_and_deletion() {
        let sources = MemorySources::new(dataset());
        let link = MessageLink {
            target: LinkTarget::Username("Team".to_string()),
            message_id: 3,
        };
        let resolved = sources.resolve_message_link(link.clone()).await.unwrap();
        assert_eq!(resolved.map(|m| m.id.id), Some(3));

        sources
            .delete_messages(&[MessageId::cloud(PeerId(10), 3)])
            .unwrap();
        assert!(sources.resolve_message_link(link).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let sources = MemorySources::new(dataset());
        sources.fail(SourceKind::LocalPeers, "offline");
        assert!(matches!(
            sources.local_peers("ann").await,
            Err(SearchError::SourceUnavailable { .. })
        ));
        sources.recover(SourceKind::LocalPeers);
        assert!(sources.local_peers("ann").await.is_ok());
        assert_eq!(sources.call_count(SourceKind::LocalPeers), 2);
    }

    #[tokio::test]
    async fn test_recently_searched_mutations() {
        let sources = MemorySources::new(dataset());
        sources.add_recently_searched_peer(PeerId(3)).unwrap();
        sources.add_recently_searched_peer(PeerId(2)).unwrap();
        sources.add_recently_searched_peer(PeerId(3)).unwrap();
        let ids: Vec<PeerId> = sources
            .recently_searched_peers()
            .await
            .unwrap()
            .iter()
            .map(|p| p.peer.id)
            .collect();
        assert_eq!(ids, vec![PeerId(3), PeerId(2)]);

        sources.clear_recently_searched_peers().unwrap();
        assert!(sources.recently_searched_peers().await.unwrap().is_empty());
    }

    #[test]
    fn test_load_dataset_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"chats": [{{"peer": {{"id": 2, "kind": "user", "title": "Ann"}}, "contact": true}}],
                "topPeers": [2]}}"#
        )
        .unwrap();

        let dataset = MemoryDataset::load(file.path()).unwrap();
        assert_eq!(dataset.chats.len(), 1);
        assert!(dataset.chats[0].contact);
        assert_eq!(dataset.top_peers, Some(vec![PeerId(2)]));
        assert!(dataset.messages.is_empty());
    }
}
