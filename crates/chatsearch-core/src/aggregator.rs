//! Fans one query generation out to the sources and merges what comes back.
//!
//! Lookups run on spawned tasks and report through an unbounded channel as
//! [`SourceEvent`]s. The owner of the receiving end feeds them back through
//! [`SearchAggregator::apply`], which drops anything tagged with an older
//! generation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::builder::{build_entries, BuildContext};
use crate::config::SearchConfig;
use crate::entry::SearchEntry;
use crate::error::SearchError;
use crate::generation::{Generation, SourceTasks};
use crate::link::parse_message_link;
use crate::models::{
    FolderId, MessageId, MessageTags, Peer, PeerId, PeersFilter, ReadState, SearchMessage,
    SearchOptions,
};
use crate::pane::PaneSearchState;
use crate::recent::{build_recent_entries, RecentEntry, RecentOrder, RecentlySearchedPeer};
use crate::sources::{
    LocalPeers, MessagePage, MessageSearchRequest, RecentPeers, RemotePeers, SearchLocation,
    SearchSources, SearchState,
};

/// What a pane is opened for. Fixed for the pane's lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct PaneSettings {
    pub account_peer: Peer,
    pub filter: PeersFilter,
    /// Persistent media filter of a tab such as "Media" or "Links"
    pub tag: Option<MessageTags>,
    pub folder_id: Option<FolderId>,
}

impl PaneSettings {
    pub fn new(account_peer: Peer) -> Self {
        Self {
            account_peer,
            filter: PeersFilter::empty(),
            tag: None,
            folder_id: None,
        }
    }

    pub fn with_filter(mut self, filter: PeersFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_tag(mut self, tag: Option<MessageTags>) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_folder(mut self, folder_id: Option<FolderId>) -> Self {
        self.folder_id = folder_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentSnapshot {
    pub top_peers: RecentPeers,
    pub searched: Vec<RecentlySearchedPeer>,
}

#[derive(Debug)]
pub enum SourceResult {
    LocalPeers(Result<LocalPeers, SearchError>),
    RemotePeers(Result<RemotePeers, SearchError>),
    Messages(Result<MessagePage, SearchError>),
    MoreMessages(Result<MessagePage, SearchError>),
    MessageLink(Result<Option<SearchMessage>, SearchError>),
    Recent(RecentSnapshot),
}

impl SourceResult {
    fn source_name(&self) -> &'static str {
        match self {
            Self::LocalPeers(_) => "local_peers",
            Self::RemotePeers(_) => "remote_peers",
            Self::Messages(_) => "messages",
            Self::MoreMessages(_) => "more_messages",
            Self::MessageLink(_) => "message_link",
            Self::Recent(_) => "recent",
        }
    }
}

#[derive(Debug)]
pub struct SourceEvent {
    pub generation: Generation,
    pub result: SourceResult,
}

/// Accumulated message search of one generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageSearchContext {
    /// Newest first
    pub messages: Vec<SearchMessage>,
    pub read_states: HashMap<PeerId, ReadState>,
    pub total_count: u32,
    pub has_more: bool,
    pub state: Option<SearchState>,
    pub loading_more: bool,
}

impl MessageSearchContext {
    pub fn from_page(page: MessagePage) -> Self {
        let mut context = Self::default();
        context.append(page);
        context
    }

    /// Appends a page, keeping the first copy of every message id.
    pub fn append(&mut self, page: MessagePage) {
        let mut known: HashSet<MessageId> = self.messages.iter().map(|message| message.id).collect();
        self.messages.extend(
            page.messages
                .into_iter()
                .filter(|message| known.insert(message.id)),
        );
        self.messages
            .sort_by(|lhs, rhs| rhs.index().cmp(&lhs.index()));
        self.read_states.extend(page.read_states);
        self.total_count = page.total_count;
        self.has_more = !page.completed;
        self.state = page.state;
        self.loading_more = false;
    }
}

/// Source results of the current generation; `None` means still pending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateInputs {
    pub local: Option<LocalPeers>,
    pub remote: Option<RemotePeers>,
    pub messages: Option<MessageSearchContext>,
    pub resolved: Option<SearchMessage>,
    pub link_pending: bool,
}

impl AggregateInputs {
    pub fn is_searching(&self) -> bool {
        self.local.is_none() || self.remote.is_none() || self.messages.is_none() || self.link_pending
    }
}

/// Merged view of one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub generation: Generation,
    pub entries: Vec<SearchEntry>,
    pub is_searching: bool,
}

#[derive(Debug)]
pub enum Applied {
    Updated,
    Recent(Vec<RecentEntry>),
    Stale,
}

pub struct SearchAggregator {
    sources: Arc<dyn SearchSources>,
    config: SearchConfig,
    settings: PaneSettings,
    generation: Generation,
    recent_generation: Generation,
    query: Option<String>,
    options: Option<SearchOptions>,
    inputs: Option<AggregateInputs>,
    tasks: SourceTasks<SourceEvent>,
    recent_tasks: SourceTasks<SourceEvent>,
    recent_order: RecentOrder,
}

impl SearchAggregator {
    pub fn new(
        sources: Arc<dyn SearchSources>,
        config: SearchConfig,
        settings: PaneSettings,
    ) -> (Self, UnboundedReceiver<SourceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let aggregator = Self {
            sources,
            config,
            settings,
            generation: Generation::default(),
            recent_generation: Generation::default(),
            query: None,
            options: None,
            inputs: None,
            tasks: SourceTasks::new(tx.clone()),
            recent_tasks: SourceTasks::new(tx),
            recent_order: RecentOrder::default(),
        };
        (aggregator, rx)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn settings(&self) -> &PaneSettings {
        &self.settings
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn options(&self) -> Option<&SearchOptions> {
        self.options.as_ref()
    }

    /// Whether anything should be shown at all.
    pub fn is_active(&self) -> bool {
        self.inputs.is_some()
    }

    pub fn inputs(&self) -> Option<&AggregateInputs> {
        self.inputs.as_ref()
    }

    fn location(&self) -> SearchLocation {
        SearchLocation::resolve(self.options.as_ref(), self.settings.folder_id, self.settings.tag)
    }

    /// Starts a new generation and fans out to the sources. Lookups of the
    /// previous generation are aborted.
    pub fn restart(&mut self, query: Option<String>, options: Option<SearchOptions>) -> Generation {
        self.tasks.abort_all();
        self.generation = self.generation.next();
        self.query = query;
        self.options = options;

        let generation = self.generation;
        if self.query.is_none() && self.options.is_none() && self.settings.tag.is_none() {
            tracing::debug!(%generation, "search cleared");
            self.inputs = None;
            return generation;
        }

        let mut inputs = AggregateInputs::default();
        let debounce = Some(self.config.remote_debounce());

        match self.query.clone() {
            Some(query) => {
                let sources = self.sources.clone();
                let local_query = query.clone();
                self.tasks.spawn(
                    None,
                    move || sources.local_peers(&local_query),
                    move |result| SourceEvent {
                        generation,
                        result: SourceResult::LocalPeers(result),
                    },
                );

                let sources = self.sources.clone();
                let remote_query = query.clone();
                self.tasks.spawn(
                    debounce,
                    move || sources.remote_peers(&remote_query),
                    move |result| SourceEvent {
                        generation,
                        result: SourceResult::RemotePeers(result),
                    },
                );

                if let Some(link) = parse_message_link(&query) {
                    tracing::debug!(%generation, ?link, "resolving message link");
                    inputs.link_pending = true;
                    let sources = self.sources.clone();
                    self.tasks.spawn(
                        None,
                        move || sources.resolve_message_link(link),
                        move |result| SourceEvent {
                            generation,
                            result: SourceResult::MessageLink(result),
                        },
                    );
                }
            }
            None => {
                inputs.local = Some(LocalPeers::default());
                inputs.remote = Some(RemotePeers::default());
            }
        }

        if self.settings.filter.contains(PeersFilter::DO_NOT_SEARCH_MESSAGES) {
            inputs.messages = Some(MessageSearchContext::default());
        } else {
            let request = MessageSearchRequest {
                location: self.location(),
                query: self.query.clone().unwrap_or_default(),
                state: None,
                limit: self.config.first_page_limit,
            };
            let sources = self.sources.clone();
            self.tasks.spawn(
                debounce,
                move || sources.search_messages(request),
                move |result| SourceEvent {
                    generation,
                    result: SourceResult::Messages(result),
                },
            );
        }

        tracing::debug!(
            %generation,
            query = self.query.as_deref().unwrap_or_default(),
            has_options = self.options.is_some(),
            "search restarted"
        );
        self.inputs = Some(inputs);
        generation
    }

    /// Requests the next message page. Returns false when there is nothing
    /// more to load or a page is already on its way.
    pub fn load_more(&mut self) -> bool {
        let location = self.location();
        let query = self.query.clone().unwrap_or_default();
        let limit = self.config.next_page_limit;
        let generation = self.generation;

        let Some(context) = self
            .inputs
            .as_mut()
            .and_then(|inputs| inputs.messages.as_mut())
        else {
            return false;
        };
        if !context.has_more || context.loading_more {
            return false;
        }
        context.loading_more = true;

        let request = MessageSearchRequest {
            location,
            query,
            state: context.state.clone(),
            limit,
        };
        tracing::debug!(%generation, loaded = context.messages.len(), "loading more messages");
        let sources = self.sources.clone();
        self.tasks.spawn(
            None,
            move || sources.search_messages(request),
            move |result| SourceEvent {
                generation,
                result: SourceResult::MoreMessages(result),
            },
        );
        true
    }

    /// Folds a source event into the current generation.
    pub fn apply(&mut self, event: SourceEvent) -> Applied {
        let source = event.result.source_name();
        let result = match event.result {
            SourceResult::Recent(snapshot) => {
                if event.generation != self.recent_generation {
                    tracing::trace!(generation = %event.generation, "dropping stale recent list");
                    return Applied::Stale;
                }
                return Applied::Recent(self.recent_entries(snapshot));
            }
            result => result,
        };

        if event.generation != self.generation {
            tracing::trace!(
                source,
                generation = %event.generation,
                current = %self.generation,
                "dropping stale source result"
            );
            return Applied::Stale;
        }
        let generation = self.generation;
        let Some(inputs) = self.inputs.as_mut() else {
            return Applied::Stale;
        };

        match result {
            SourceResult::LocalPeers(result) => {
                inputs.local = Some(or_empty(source, generation, result));
            }
            SourceResult::RemotePeers(result) => {
                inputs.remote = Some(or_empty(source, generation, result));
            }
            SourceResult::Messages(result) => {
                let page = or_empty(source, generation, result);
                inputs.messages = Some(MessageSearchContext::from_page(page));
            }
            SourceResult::MoreMessages(result) => {
                let Some(context) = inputs.messages.as_mut() else {
                    return Applied::Stale;
                };
                match result {
                    Ok(page) => context.append(page),
                    Err(error) => {
                        tracing::warn!(source, %generation, %error, "search source failed");
                        context.loading_more = false;
                    }
                }
            }
            SourceResult::MessageLink(result) => {
                inputs.link_pending = false;
                inputs.resolved = or_empty(source, generation, result);
            }
            SourceResult::Recent(_) => return Applied::Stale,
        }
        Applied::Updated
    }

    pub fn snapshot(
        &self,
        state: &PaneSearchState,
        selection: Option<&HashSet<MessageId>>,
    ) -> Option<Snapshot> {
        let inputs = self.inputs.as_ref()?;
        let context = BuildContext {
            query: self.query.as_deref().unwrap_or_default(),
            settings: &self.settings,
            config: &self.config,
            state,
            selection,
        };
        let entries = build_entries(&context, inputs);
        debug_assert!(
            crate::entry::is_sorted(&entries) || inputs.resolved.is_some(),
            "builder produced unsorted entries"
        );
        Some(Snapshot {
            generation: self.generation,
            entries,
            is_searching: inputs.is_searching(),
        })
    }

    /// No lookup of the current generation is outstanding.
    pub fn is_settled(&self) -> bool {
        self.inputs.as_ref().map_or(true, |inputs| {
            !inputs.is_searching()
                && !inputs
                    .messages
                    .as_ref()
                    .is_some_and(|messages| messages.loading_more)
        })
    }

    /// Reloads top peers and recently searched peers.
    pub fn refresh_recent(&mut self) -> Generation {
        self.recent_tasks.abort_all();
        self.recent_generation = self.recent_generation.next();
        let generation = self.recent_generation;

        let sources = self.sources.clone();
        self.recent_tasks.spawn(
            None,
            move || {
                async move {
                    let (top_peers, searched) =
                        futures::join!(sources.recent_peers(), sources.recently_searched_peers());
                    let top_peers = top_peers.unwrap_or_else(|error| {
                        tracing::warn!(%error, "top peers unavailable");
                        RecentPeers::Disabled
                    });
                    let searched = searched.unwrap_or_else(|error| {
                        tracing::warn!(%error, "recently searched peers unavailable");
                        Vec::new()
                    });
                    Ok(RecentSnapshot {
                        top_peers,
                        searched,
                    })
                }
                .boxed()
            },
            move |result: Result<RecentSnapshot, SearchError>| SourceEvent {
                generation,
                result: SourceResult::Recent(result.unwrap_or(RecentSnapshot {
                    top_peers: RecentPeers::Disabled,
                    searched: Vec::new(),
                })),
            },
        );
        generation
    }

    pub fn reset_recent_order(&mut self) {
        self.recent_order.reset();
    }

    fn recent_entries(&mut self, snapshot: RecentSnapshot) -> Vec<RecentEntry> {
        let searched = self.recent_order.arrange(snapshot.searched);
        let (has_top_peers, top_peers) = match snapshot.top_peers {
            RecentPeers::Peers(peers) => (!peers.is_empty(), peers),
            RecentPeers::Disabled => (false, Vec::new()),
        };
        build_recent_entries(has_top_peers, top_peers, &searched, self.settings.filter)
    }

    pub fn sources(&self) -> &Arc<dyn SearchSources> {
        &self.sources
    }
}

fn or_empty<T: Default>(
    source: &'static str,
    generation: Generation,
    result: Result<T, SearchError>,
) -> T {
    result.unwrap_or_else(|error| {
        tracing::warn!(source, %generation, %error, "search source failed, showing no results from it");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySources;
    use crate::models::{MessageNamespace, PeerKind};

    fn message(id: i32, timestamp: i32) -> SearchMessage {
        SearchMessage {
            id: MessageId {
                peer_id: PeerId(9),
                namespace: MessageNamespace::Cloud,
                id,
            },
            timestamp,
            peer: Peer::new(9, PeerKind::Group, "Team"),
            author: None,
            text: String::new(),
            tags: MessageTags::empty(),
        }
    }

    fn page(ids: &[(i32, i32)], completed: bool) -> MessagePage {
        MessagePage {
            messages: ids.iter().map(|&(id, ts)| message(id, ts)).collect(),
            total_count: 10,
            completed,
            state: Some(SearchState("next".to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn test_append_dedupes_and_orders_newest_first() {
        let mut context = MessageSearchContext::from_page(page(&[(1, 100), (3, 300)], false));
        assert!(context.has_more);
        context.loading_more = true;
        context.append(page(&[(3, 300), (2, 200)], true));

        let ids: Vec<i32> = context.messages.iter().map(|m| m.id.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(!context.has_more);
        assert!(!context.loading_more);
    }

    #[test]
    fn test_is_searching_tracks_pending_sources() {
        let mut inputs = AggregateInputs::default();
        assert!(inputs.is_searching());
        inputs.local = Some(LocalPeers::default());
        inputs.remote = Some(RemotePeers::default());
        inputs.messages = Some(MessageSearchContext::default());
        assert!(!inputs.is_searching());
        inputs.link_pending = true;
        assert!(inputs.is_searching());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_search_shows_nothing() {
        let sources = Arc::new(MemorySources::default());
        let (mut aggregator, _rx) = SearchAggregator::new(
            sources,
            SearchConfig::default(),
            PaneSettings::new(Peer::user(1, "Me")),
        );
        let first = aggregator.restart(Some("ann".to_string()), None);
        let second = aggregator.restart(None, None);
        assert!(second > first);
        assert!(!aggregator.is_active());
        assert!(aggregator
            .snapshot(&PaneSearchState::default(), None)
            .is_none());
        assert!(aggregator.is_settled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_event_is_dropped() {
        let sources = Arc::new(MemorySources::default());
        let (mut aggregator, _rx) = SearchAggregator::new(
            sources,
            SearchConfig::default(),
            PaneSettings::new(Peer::user(1, "Me")),
        );
        let old = aggregator.restart(Some("an".to_string()), None);
        aggregator.restart(Some("ann".to_string()), None);

        let stale = SourceEvent {
            generation: old,
            result: SourceResult::LocalPeers(Ok(LocalPeers {
                peers: vec![Peer::user(2, "Andrew").into()],
                unread: HashMap::new(),
            })),
        };
        assert!(matches!(aggregator.apply(stale), Applied::Stale));
        assert_eq!(aggregator.inputs().and_then(|inputs| inputs.local.as_ref()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_of_old_generation_is_dropped() {
        let sources = Arc::new(MemorySources::default());
        let (mut aggregator, _rx) = SearchAggregator::new(
            sources,
            SearchConfig::default(),
            PaneSettings::new(Peer::user(1, "Me")),
        );
        let old = aggregator.restart(Some("report".to_string()), None);
        assert!(!aggregator.load_more());
        aggregator.apply(SourceEvent {
            generation: old,
            result: SourceResult::Messages(Ok(page(&[(1, 100)], false))),
        });
        assert!(aggregator.load_more());

        aggregator.restart(Some("reports".to_string()), None);
        let late_page = SourceEvent {
            generation: old,
            result: SourceResult::MoreMessages(Ok(page(&[(2, 50)], true))),
        };
        assert!(matches!(aggregator.apply(late_page), Applied::Stale));
        assert!(aggregator
            .inputs()
            .is_some_and(|inputs| inputs.messages.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_degrades_to_empty() {
        let sources = Arc::new(MemorySources::default());
        let (mut aggregator, _rx) = SearchAggregator::new(
            sources,
            SearchConfig::default(),
            PaneSettings::new(Peer::user(1, "Me")),
        );
        let generation = aggregator.restart(Some("ann".to_string()), None);
        let failed = SourceEvent {
            generation,
            result: SourceResult::RemotePeers(Err(SearchError::unavailable(
                "remote_peers",
                "offline",
            ))),
        };
        assert!(matches!(aggregator.apply(failed), Applied::Updated));
        assert_eq!(
            aggregator.inputs().and_then(|inputs| inputs.remote.clone()),
            Some(RemotePeers::default())
        );
    }
}
