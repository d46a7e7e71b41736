//! Pane controller: owns what is on screen and turns aggregator snapshots
//! into ordered list transitions.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::aggregator::{Applied, PaneSettings, SearchAggregator, SourceEvent};
use crate::config::SearchConfig;
use crate::diff::{merge_lists_stable_with_updates, ListDiff};
use crate::entry::{SearchEntry, Section};
use crate::error::SearchError;
use crate::generation::Generation;
use crate::models::{MessageId, MessageTags, PeerId, PeersFilter, SearchOptions};
use crate::recent::RecentEntry;
use crate::sources::SearchSources;

/// One incremental update of the results list, applied in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTransition {
    pub generation: Generation,
    pub diff: ListDiff<SearchEntry>,
    /// False while the pane shows the recent list instead of results
    pub displaying_results: bool,
    pub is_empty: bool,
    pub is_loading: bool,
    pub query: Option<String>,
    pub animated: bool,
    pub first_time: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTransition {
    pub generation: Generation,
    pub diff: ListDiff<RecentEntry>,
    pub first_time: bool,
}

/// Receives transitions once the rendering side is ready for them.
pub trait TransitionListener: Send {
    fn on_transition(&mut self, transition: SearchTransition);

    fn on_recent_transition(&mut self, _transition: RecentTransition) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneState {
    Idle,
    Aggregating,
    Displaying,
    Empty,
}

/// User-driven view state. Replaced as a whole and republished only when it changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaneSearchState {
    pub expand_local: bool,
    pub expand_global: bool,
    pub deleted_message_ids: HashSet<MessageId>,
    /// Cloud message ids deleted from every chat at once
    pub deleted_global_message_ids: HashSet<i32>,
}

/// Explanation shown in place of an empty results list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum EmptyResultsHint {
    Query(String),
    Filter(Option<MessageTags>),
    Generic,
}

impl EmptyResultsHint {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Filter(_) => "Nothing Here Yet",
            Self::Query(_) | Self::Generic => "No Results",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Query(query) => format!("There were no results for \"{query}\". Try a new search."),
            Self::Filter(Some(tag)) if *tag == MessageTags::PHOTO_OR_VIDEO => {
                "No photos or videos match this search.".to_string()
            }
            Self::Filter(Some(tag)) if *tag == MessageTags::WEB_PAGE => {
                "No links match this search.".to_string()
            }
            Self::Filter(Some(tag)) if *tag == MessageTags::FILE => {
                "No files match this search.".to_string()
            }
            Self::Filter(Some(tag)) if *tag == MessageTags::MUSIC => {
                "No music matches this search.".to_string()
            }
            Self::Filter(Some(tag)) if *tag == MessageTags::VOICE => {
                "No voice messages match this search.".to_string()
            }
            Self::Filter(_) | Self::Generic => "Try a new search.".to_string(),
        }
    }
}

#[derive(Debug)]
enum QueuedTransition {
    Search(SearchTransition),
    Recent(RecentTransition),
}

pub struct PaneController {
    aggregator: SearchAggregator,
    events: UnboundedReceiver<SourceEvent>,
    listener: Box<dyn TransitionListener>,
    search_state: PaneSearchState,
    selection: Option<HashSet<MessageId>>,
    selection_toggled: bool,
    displayed: Option<Vec<SearchEntry>>,
    recent_displayed: Option<Vec<RecentEntry>>,
    awaiting_first_event: bool,
    state: PaneState,
    queue: VecDeque<QueuedTransition>,
    layout_ready: bool,
}

impl PaneController {
    pub fn new(
        sources: Arc<dyn SearchSources>,
        config: SearchConfig,
        settings: PaneSettings,
        listener: Box<dyn TransitionListener>,
    ) -> Self {
        let (aggregator, events) = SearchAggregator::new(sources, config, settings);
        Self {
            aggregator,
            events,
            listener,
            search_state: PaneSearchState::default(),
            selection: None,
            selection_toggled: false,
            displayed: None,
            recent_displayed: None,
            awaiting_first_event: false,
            state: PaneState::Idle,
            queue: VecDeque::new(),
            layout_ready: true,
        }
    }

    pub fn state(&self) -> PaneState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.aggregator.generation()
    }

    pub fn search_state(&self) -> &PaneSearchState {
        &self.search_state
    }

    /// Rows currently on screen, `None` while the recent list is shown.
    pub fn displayed(&self) -> Option<&[SearchEntry]> {
        self.displayed.as_deref()
    }

    pub fn recent_displayed(&self) -> Option<&[RecentEntry]> {
        self.recent_displayed.as_deref()
    }

    pub fn pending_transitions(&self) -> usize {
        self.queue.len()
    }

    pub fn set_query(&mut self, query: Option<String>) {
        let query = query.filter(|query| !query.is_empty());
        if query.as_deref() == self.aggregator.query() {
            return;
        }
        let options = self.aggregator.options().cloned();
        self.restart(query, options);
    }

    pub fn set_options(&mut self, options: Option<SearchOptions>) {
        let options = options.filter(|options| !options.is_empty());
        if options.as_ref() == self.aggregator.options() {
            return;
        }
        let query = self.aggregator.query().map(str::to_string);
        self.restart(query, options);
    }

    fn restart(&mut self, query: Option<String>, options: Option<SearchOptions>) {
        let generation = self.aggregator.restart(query, options);
        let pending = self
            .aggregator
            .inputs()
            .is_some_and(|inputs| inputs.is_searching());
        if pending {
            tracing::debug!(%generation, "waiting for first source result");
            self.awaiting_first_event = true;
            self.state = PaneState::Aggregating;
        } else {
            self.awaiting_first_event = false;
            self.publish();
        }
    }

    pub fn load_more(&mut self) -> bool {
        self.aggregator.load_more()
    }

    pub fn toggle_expand(&mut self, section: Section) {
        let mut state = self.search_state.clone();
        match section {
            Section::LocalPeers => state.expand_local = !state.expand_local,
            Section::GlobalPeers => state.expand_global = !state.expand_global,
        }
        self.update_search_state(state);
    }

    /// Hides messages the user deleted from the results of this session.
    pub fn delete_messages(&mut self, ids: &[MessageId]) -> Result<(), SearchError> {
        self.aggregator.sources().delete_messages(ids)?;
        if let Some(selection) = self.selection.as_mut() {
            for id in ids {
                selection.remove(id);
            }
        }
        let mut state = self.search_state.clone();
        state.deleted_message_ids.extend(ids.iter().copied());
        self.update_search_state(state);
        Ok(())
    }

    fn update_search_state(&mut self, state: PaneSearchState) {
        if state == self.search_state {
            return;
        }
        self.search_state = state;
        if !self.awaiting_first_event && self.aggregator.is_active() {
            self.publish();
        }
    }

    pub fn set_selection_mode(&mut self, enabled: bool) {
        if enabled == self.selection.is_some() {
            return;
        }
        self.selection = enabled.then(HashSet::new);
        self.selection_toggled = true;
        if !self.awaiting_first_event && self.aggregator.is_active() {
            self.publish();
        }
    }

    /// Returns whether the message ended up selected. No-op outside selection mode.
    pub fn toggle_message_selection(&mut self, id: MessageId) -> bool {
        let Some(selection) = self.selection.as_mut() else {
            return false;
        };
        let selected = if selection.remove(&id) {
            false
        } else {
            selection.insert(id);
            true
        };
        if !self.awaiting_first_event && self.aggregator.is_active() {
            self.publish();
        }
        selected
    }

    pub fn selected_messages(&self) -> Option<&HashSet<MessageId>> {
        self.selection.as_ref()
    }

    /// Transitions queue while the layout is not ready. Each ready signal
    /// delivers the oldest queued transition; later ones wait for the next signal.
    pub fn set_layout_ready(&mut self, ready: bool) {
        self.layout_ready = ready;
        if ready {
            if let Some(transition) = self.queue.pop_front() {
                self.deliver(transition);
            }
        }
    }

    pub async fn next_event(&mut self) -> Option<SourceEvent> {
        self.events.recv().await
    }

    /// Folds one source event in. Returns true when a transition was produced.
    pub fn handle_event(&mut self, event: SourceEvent) -> bool {
        match self.aggregator.apply(event) {
            Applied::Updated => {
                self.awaiting_first_event = false;
                self.publish();
                true
            }
            Applied::Recent(entries) => {
                self.publish_recent(entries);
                true
            }
            Applied::Stale => false,
        }
    }

    /// Waits for and handles the next source event.
    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => self.handle_event(event),
            None => false,
        }
    }

    /// Handles events until no lookup of the current generation is outstanding.
    pub async fn settle(&mut self) {
        while !self.is_settled() {
            if self.next_event().await.map(|event| self.handle_event(event)).is_none() {
                break;
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        !self.awaiting_first_event && self.aggregator.is_settled()
    }

    fn hides_peer_rows(&self) -> bool {
        self.aggregator.settings().tag.is_some()
            || self
                .aggregator
                .options()
                .is_some_and(|options| options.peer.is_some() || options.date.is_some())
    }

    fn publish(&mut self) {
        let snapshot = self
            .aggregator
            .snapshot(&self.search_state, self.selection.as_ref());
        let hide_peers = self.hides_peer_rows();

        let (generation, entries, is_searching, displaying_results) = match snapshot {
            Some(snapshot) => {
                let mut entries = snapshot.entries;
                if hide_peers {
                    entries.retain(|entry| !entry.is_peer_row());
                }
                (snapshot.generation, entries, snapshot.is_searching, true)
            }
            None => (self.aggregator.generation(), Vec::new(), false, false),
        };

        let first_time = self.displayed.is_none() && displaying_results;
        let previous = self.displayed.take().unwrap_or_default();
        let diff = merge_lists_stable_with_updates(&previous, &entries);
        let is_empty = displaying_results && !is_searching && entries.is_empty();

        self.state = if !displaying_results {
            PaneState::Idle
        } else if is_empty {
            PaneState::Empty
        } else if entries.is_empty() {
            PaneState::Aggregating
        } else {
            PaneState::Displaying
        };

        tracing::debug!(
            %generation,
            entries = entries.len(),
            deletions = diff.deletions.len(),
            insertions = diff.insertions.len(),
            updates = diff.updates.len(),
            is_searching,
            state = ?self.state,
            "publishing search transition"
        );

        let transition = SearchTransition {
            generation,
            diff,
            displaying_results,
            is_empty,
            is_loading: is_searching,
            query: self.aggregator.query().map(str::to_string),
            animated: std::mem::take(&mut self.selection_toggled),
            first_time,
        };
        self.displayed = displaying_results.then_some(entries);
        self.enqueue(QueuedTransition::Search(transition));
    }

    fn enqueue(&mut self, transition: QueuedTransition) {
        if self.layout_ready && self.queue.is_empty() {
            self.deliver(transition);
        } else {
            self.queue.push_back(transition);
        }
    }

    fn deliver(&mut self, transition: QueuedTransition) {
        match transition {
            QueuedTransition::Search(transition) => self.listener.on_transition(transition),
            QueuedTransition::Recent(transition) => self.listener.on_recent_transition(transition),
        }
    }

    pub fn empty_results_hint(&self) -> Option<EmptyResultsHint> {
        if self.state != PaneState::Empty {
            return None;
        }
        if let Some(query) = self.aggregator.query() {
            return Some(EmptyResultsHint::Query(query.to_string()));
        }
        if self.aggregator.options().is_none() {
            return Some(EmptyResultsHint::Filter(self.aggregator.settings().tag));
        }
        Some(EmptyResultsHint::Generic)
    }

    fn recent_enabled(&self) -> bool {
        !self
            .aggregator
            .settings()
            .filter
            .contains(PeersFilter::EXCLUDE_RECENT)
    }

    /// Loads the recent list. Panes opened with `EXCLUDE_RECENT` never show one.
    pub fn refresh_recent(&mut self) -> Option<Generation> {
        if !self.recent_enabled() {
            return None;
        }
        Some(self.aggregator.refresh_recent())
    }

    pub fn record_opened_peer(&mut self, peer_id: PeerId) -> Result<(), SearchError> {
        self.aggregator
            .sources()
            .add_recently_searched_peer(peer_id)?;
        self.refresh_recent();
        Ok(())
    }

    pub fn remove_recent_peer(&mut self, peer_id: PeerId) -> Result<(), SearchError> {
        self.aggregator
            .sources()
            .remove_recently_searched_peer(peer_id)?;
        self.refresh_recent();
        Ok(())
    }

    pub fn clear_recent_peers(&mut self) -> Result<(), SearchError> {
        self.aggregator.sources().clear_recently_searched_peers()?;
        self.aggregator.reset_recent_order();
        self.refresh_recent();
        Ok(())
    }

    fn publish_recent(&mut self, entries: Vec<RecentEntry>) {
        let first_time = self.recent_displayed.is_none();
        let previous = self.recent_displayed.take().unwrap_or_default();
        let diff = merge_lists_stable_with_updates(&previous, &entries);
        tracing::debug!(
            entries = entries.len(),
            changes = diff.deletions.len() + diff.insertions.len() + diff.updates.len(),
            "publishing recent transition"
        );
        self.recent_displayed = Some(entries);
        let transition = RecentTransition {
            generation: self.aggregator.generation(),
            diff,
            first_time,
        };
        self.enqueue(QueuedTransition::Recent(transition));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySources;
    use crate::models::Peer;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<SearchTransition>>>);

    impl TransitionListener for Recorder {
        fn on_transition(&mut self, transition: SearchTransition) {
            self.0.lock().push(transition);
        }
    }

    fn controller(recorder: &Recorder, settings: PaneSettings) -> PaneController {
        PaneController::new(
            Arc::new(MemorySources::default()),
            SearchConfig::default(),
            settings,
            Box::new(recorder.clone()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_query_publishes_idle_transition() {
        let recorder = Recorder::default();
        let mut pane = controller(&recorder, PaneSettings::new(Peer::user(1, "Me")));

        pane.set_query(Some("ann".to_string()));
        assert_eq!(pane.state(), PaneState::Aggregating);
        assert!(recorder.0.lock().is_empty());

        pane.set_query(Some(String::new()));
        assert_eq!(pane.state(), PaneState::Idle);
        let transitions = recorder.0.lock();
        assert_eq!(transitions.len(), 1);
        assert!(!transitions[0].displaying_results);
        assert!(!transitions[0].is_empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_query_does_not_restart() {
        let recorder = Recorder::default();
        let mut pane = controller(&recorder, PaneSettings::new(Peer::user(1, "Me")));
        pane.set_query(Some("ann".to_string()));
        let generation = pane.generation();
        pane.set_query(Some("ann".to_string()));
        pane.set_options(Some(SearchOptions::default()));
        assert_eq!(pane.generation(), generation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_search_reports_query_hint() {
        let recorder = Recorder::default();
        let mut pane = controller(&recorder, PaneSettings::new(Peer::user(1, "Me")));
        pane.set_query(Some("zzz".to_string()));
        pane.settle().await;

        assert_eq!(pane.state(), PaneState::Empty);
        assert_eq!(
            pane.empty_results_hint(),
            Some(EmptyResultsHint::Query("zzz".to_string()))
        );
        let last = recorder.0.lock().last().cloned();
        assert!(last.is_some_and(|transition| transition.is_empty && !transition.is_loading));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_queue_until_layout_ready() {
        let recorder = Recorder::default();
        let mut pane = controller(&recorder, PaneSettings::new(Peer::user(1, "Me")));
        pane.set_layout_ready(false);
        pane.set_query(Some("zzz".to_string()));
        pane.settle().await;
        pane.set_query(None);

        assert!(recorder.0.lock().is_empty());
        let queued = pane.pending_transitions();
        assert!(queued >= 2);

        pane.set_layout_ready(true);
        assert_eq!(recorder.0.lock().len(), 1);
        assert_eq!(pane.pending_transitions(), queued - 1);

        // A new transition lines up behind the backlog
        pane.set_query(Some("zz".to_string()));
        pane.settle().await;
        let backlog = pane.pending_transitions();
        assert!(backlog >= queued);
        assert_eq!(recorder.0.lock().len(), 1);

        for _ in 0..backlog {
            pane.set_layout_ready(true);
        }
        assert_eq!(pane.pending_transitions(), 0);
        let transitions = recorder.0.lock();
        assert_eq!(transitions.len(), backlog + 1);
        assert!(transitions
            .windows(2)
            .all(|pair| pair[0].generation <= pair[1].generation));
        assert_eq!(transitions.last().and_then(|t| t.query.clone()), Some("zz".to_string()));
    }

    #[test]
    fn test_filter_hint_text() {
        assert_eq!(
            EmptyResultsHint::Filter(Some(MessageTags::WEB_PAGE)).text(),
            "No links match this search."
        );
        assert_eq!(EmptyResultsHint::Generic.text(), "Try a new search.");
    }
}
