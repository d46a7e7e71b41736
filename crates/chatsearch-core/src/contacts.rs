//! Contacts search overlay: cloud contacts, global directory users and
//! address-book entries, merged into one list with an add-contact suggestion.

use std::collections::{HashSet, VecDeque};
use std::ops::BitOr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::config::SearchConfig;
use crate::diff::{merge_lists_stable_with_updates, Identifiable, ListDiff};
use crate::error::SearchError;
use crate::generation::{Generation, SourceTasks};
use crate::models::{FoundPeer, Peer, PeerId, Presence};
use crate::phone::{is_viable_phone_number, normalize_phone_number};
use crate::sources::{LocalContacts, RemotePeers, SearchSources};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactsSearchCategories(u32);

impl ContactsSearchCategories {
    pub const CLOUD_CONTACTS: Self = Self(1 << 0);
    pub const GLOBAL: Self = Self(1 << 1);
    pub const DEVICE_CONTACTS: Self = Self(1 << 2);

    pub const fn all() -> Self {
        Self(Self::CLOUD_CONTACTS.0 | Self::GLOBAL.0 | Self::DEVICE_CONTACTS.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl Default for ContactsSearchCategories {
    fn default() -> Self {
        Self::all()
    }
}

impl BitOr for ContactsSearchCategories {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContactListFilter {
    ExcludeSelf,
    Exclude(Vec<PeerId>),
    /// Listed but not selectable
    Disable(Vec<PeerId>),
}

/// An address-book entry, optionally linked to a known user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContact {
    pub stable_id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<PeerId>,
}

impl DeviceContact {
    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            _ => self.last_name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ContactListPeer {
    Peer {
        peer: Peer,
        is_global: bool,
        subscribers: Option<u32>,
    },
    DeviceContact(DeviceContact),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ContactListPeerId {
    Peer(PeerId),
    DeviceContact(String),
}

impl ContactListPeer {
    pub fn id(&self) -> ContactListPeerId {
        match self {
            Self::Peer { peer, .. } => ContactListPeerId::Peer(peer.id),
            Self::DeviceContact(contact) => ContactListPeerId::DeviceContact(contact.stable_id.clone()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSearchGroup {
    Contacts,
    Global,
    DeviceContacts,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ContactSearchEntryId {
    AddContact,
    Peer(ContactListPeerId),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ContactSearchEntry {
    AddContact {
        phone_number: String,
    },
    Peer {
        index: usize,
        peer: ContactListPeer,
        presence: Option<Presence>,
        group: ContactSearchGroup,
        enabled: bool,
    },
}

impl ContactSearchEntry {
    pub fn id(&self) -> ContactSearchEntryId {
        match self {
            Self::AddContact { .. } => ContactSearchEntryId::AddContact,
            Self::Peer { peer, .. } => ContactSearchEntryId::Peer(peer.id()),
        }
    }

    pub fn precedes(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::AddContact { .. }, Self::Peer { .. }) => true,
            (Self::Peer { index: lhs, .. }, Self::Peer { index: rhs, .. }) => lhs < rhs,
            _ => false,
        }
    }
}

impl Identifiable for ContactSearchEntry {
    type Id = ContactSearchEntryId;

    fn stable_id(&self) -> ContactSearchEntryId {
        self.id()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContactsSearchSettings {
    pub account_peer_id: PeerId,
    pub only_writeable: bool,
    pub categories: ContactsSearchCategories,
    pub filters: Vec<ContactListFilter>,
    pub allow_add_contact: bool,
}

impl ContactsSearchSettings {
    pub fn new(account_peer_id: PeerId) -> Self {
        Self {
            account_peer_id,
            only_writeable: false,
            categories: ContactsSearchCategories::all(),
            filters: vec![ContactListFilter::ExcludeSelf],
            allow_add_contact: true,
        }
    }
}

/// Contact source results of one generation; `None` means still pending.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContactInputs {
    pub local: Option<LocalContacts>,
    pub remote: Option<RemotePeers>,
    pub device: Option<Vec<DeviceContact>>,
}

impl ContactInputs {
    pub fn is_searching(&self) -> bool {
        self.local.is_none() || self.remote.is_none() || self.device.is_none()
    }
}

/// Builds the contacts list: the add-contact suggestion, then cloud contacts,
/// global users and address-book entries not already listed.
pub fn build_contact_entries(
    query: &str,
    settings: &ContactsSearchSettings,
    inputs: &ContactInputs,
) -> Vec<ContactSearchEntry> {
    let mut entries = Vec::new();
    if settings.allow_add_contact && is_viable_phone_number(query) {
        entries.push(ContactSearchEntry::AddContact {
            phone_number: query.to_string(),
        });
    }

    let mut existing: HashSet<PeerId> = HashSet::new();
    let mut disabled: HashSet<PeerId> = HashSet::new();
    for filter in &settings.filters {
        match filter {
            ContactListFilter::ExcludeSelf => {
                existing.insert(settings.account_peer_id);
            }
            ContactListFilter::Exclude(ids) => existing.extend(ids.iter().copied()),
            ContactListFilter::Disable(ids) => disabled.extend(ids.iter().copied()),
        }
    }

    let searches_device = settings
        .categories
        .contains(ContactsSearchCategories::DEVICE_CONTACTS);
    let mut known_phones: HashSet<String> = HashSet::new();
    let mut index = 0;
    let mut push_peer = |entries: &mut Vec<ContactSearchEntry>,
                         known_phones: &mut HashSet<String>,
                         peer: &Peer,
                         subscribers: Option<u32>,
                         presence: Option<Presence>,
                         group: ContactSearchGroup| {
        let enabled = !disabled.contains(&peer.id) && (!settings.only_writeable || peer.can_send_messages);
        if searches_device {
            if let Some(phone) = &peer.phone {
                known_phones.insert(normalize_phone_number(phone));
            }
        }
        entries.push(ContactSearchEntry::Peer {
            index,
            peer: ContactListPeer::Peer {
                peer: peer.clone(),
                is_global: group == ContactSearchGroup::Global,
                subscribers,
            },
            presence,
            group,
            enabled,
        });
        index += 1;
    };

    if let Some(local) = &inputs.local {
        for peer in &local.peers {
            if !existing.insert(peer.id) {
                continue;
            }
            let presence = local.presences.get(&peer.id).copied();
            push_peer(
                &mut entries,
                &mut known_phones,
                peer,
                None,
                presence,
                ContactSearchGroup::Contacts,
            );
        }
    }

    if let Some(remote) = &inputs.remote {
        let users = remote
            .local
            .iter()
            .chain(&remote.global)
            .filter(|found: &&FoundPeer| found.peer.kind.is_user());
        for found in users {
            if !existing.insert(found.peer.id) {
                continue;
            }
            push_peer(
                &mut entries,
                &mut known_phones,
                &found.peer,
                found.subscribers,
                None,
                ContactSearchGroup::Global,
            );
        }

        if let Some(device) = &inputs.device {
            for contact in device {
                let listed_phone = contact
                    .phone_numbers
                    .iter()
                    .any(|phone| known_phones.contains(&normalize_phone_number(phone)));
                let listed_peer = contact.peer_id.is_some_and(|id| existing.contains(&id));
                if listed_phone || listed_peer {
                    continue;
                }
                entries.push(ContactSearchEntry::Peer {
                    index,
                    peer: ContactListPeer::DeviceContact(contact.clone()),
                    presence: None,
                    group: ContactSearchGroup::DeviceContacts,
                    enabled: true,
                });
                index += 1;
            }
        }
    }

    entries
}

#[derive(Debug)]
pub enum ContactsResult {
    Local(Result<LocalContacts, SearchError>),
    Remote(Result<RemotePeers, SearchError>),
    Device(Result<Vec<DeviceContact>, SearchError>),
}

#[derive(Debug)]
pub struct ContactsEvent {
    pub generation: Generation,
    pub result: ContactsResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactsTransition {
    pub generation: Generation,
    pub diff: ListDiff<ContactSearchEntry>,
    /// False when the query is empty and the overlay shows nothing
    pub displaying_results: bool,
    pub is_loading: bool,
}

pub trait ContactsTransitionListener: Send {
    fn on_transition(&mut self, transition: ContactsTransition);
}

pub struct ContactsSearchController {
    sources: Arc<dyn SearchSources>,
    config: SearchConfig,
    settings: ContactsSearchSettings,
    generation: Generation,
    query: Option<String>,
    inputs: Option<ContactInputs>,
    tasks: SourceTasks<ContactsEvent>,
    events: UnboundedReceiver<ContactsEvent>,
    listener: Box<dyn ContactsTransitionListener>,
    displayed: Vec<ContactSearchEntry>,
    queue: VecDeque<ContactsTransition>,
    layout_ready: bool,
}

impl ContactsSearchController {
    pub fn new(
        sources: Arc<dyn SearchSources>,
        config: SearchConfig,
        settings: ContactsSearchSettings,
        listener: Box<dyn ContactsTransitionListener>,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        Self {
            sources,
            config,
            settings,
            generation: Generation::default(),
            query: None,
            inputs: None,
            tasks: SourceTasks::new(tx),
            events,
            listener,
            displayed: Vec::new(),
            queue: VecDeque::new(),
            layout_ready: true,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn displayed(&self) -> &[ContactSearchEntry] {
        &self.displayed
    }

    pub fn set_query(&mut self, query: Option<String>) {
        let query = query.filter(|query| !query.is_empty());
        if query == self.query {
            return;
        }
        self.tasks.abort_all();
        self.generation = self.generation.next();
        self.query = query;
        let generation = self.generation;

        let Some(query) = self.query.clone() else {
            tracing::debug!(%generation, "contacts search cleared");
            self.inputs = None;
            self.publish();
            return;
        };

        let categories = self.settings.categories;
        let mut inputs = ContactInputs::default();

        if categories.contains(ContactsSearchCategories::CLOUD_CONTACTS) {
            let sources = self.sources.clone();
            let local_query = query.to_lowercase();
            self.tasks.spawn(
                None,
                move || sources.search_contacts(&local_query),
                move |result| ContactsEvent {
                    generation,
                    result: ContactsResult::Local(result),
                },
            );
        } else {
            inputs.local = Some(LocalContacts::default());
        }

        if categories.contains(ContactsSearchCategories::GLOBAL) {
            let sources = self.sources.clone();
            let remote_query = query.clone();
            self.tasks.spawn(
                Some(self.config.contacts_debounce()),
                move || sources.remote_peers(&remote_query),
                move |result| ContactsEvent {
                    generation,
                    result: ContactsResult::Remote(result),
                },
            );
        } else {
            inputs.remote = Some(RemotePeers::default());
        }

        if categories.contains(ContactsSearchCategories::DEVICE_CONTACTS) {
            let sources = self.sources.clone();
            self.tasks.spawn(
                None,
                move || sources.search_device_contacts(&query),
                move |result| ContactsEvent {
                    generation,
                    result: ContactsResult::Device(result),
                },
            );
        } else {
            inputs.device = Some(Vec::new());
        }

        tracing::debug!(%generation, "contacts search restarted");
        let ready = inputs.local.is_some();
        self.inputs = Some(inputs);
        if ready {
            self.publish();
        }
    }

    pub async fn next_event(&mut self) -> Option<ContactsEvent> {
        self.events.recv().await
    }

    pub fn handle_event(&mut self, event: ContactsEvent) -> bool {
        if event.generation != self.generation {
            tracing::trace!(generation = %event.generation, "dropping stale contacts result");
            return false;
        }
        let generation = self.generation;
        let Some(inputs) = self.inputs.as_mut() else {
            return false;
        };
        match event.result {
            ContactsResult::Local(result) => {
                inputs.local = Some(or_empty("contacts", generation, result));
            }
            ContactsResult::Remote(result) => {
                inputs.remote = Some(or_empty("remote_peers", generation, result));
            }
            ContactsResult::Device(result) => {
                inputs.device = Some(or_empty("device_contacts", generation, result));
            }
        }
        // Nothing is shown before the cloud contacts are in
        if inputs.local.is_none() {
            return false;
        }
        self.publish();
        true
    }

    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => self.handle_event(event),
            None => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.inputs
            .as_ref()
            .map_or(true, |inputs| !inputs.is_searching())
    }

    pub async fn settle(&mut self) {
        while !self.is_settled() {
            let Some(event) = self.next_event().await else {
                break;
            };
            self.handle_event(event);
        }
    }

    /// Delivers the oldest queued transition, if any.
    pub fn set_layout_ready(&mut self, ready: bool) {
        self.layout_ready = ready;
        if ready {
            if let Some(transition) = self.queue.pop_front() {
                self.listener.on_transition(transition);
            }
        }
    }

    pub fn pending_transitions(&self) -> usize {
        self.queue.len()
    }

    fn publish(&mut self) {
        let (entries, displaying_results, is_loading) = match (&self.inputs, &self.query) {
            (Some(inputs), Some(query)) => (
                build_contact_entries(query, &self.settings, inputs),
                true,
                inputs.is_searching(),
            ),
            _ => (Vec::new(), false, false),
        };
        let diff = merge_lists_stable_with_updates(&self.displayed, &entries);
        tracing::debug!(
            generation = %self.generation,
            entries = entries.len(),
            is_loading,
            "publishing contacts transition"
        );
        self.displayed = entries;

        let transition = ContactsTransition {
            generation: self.generation,
            diff,
            displaying_results,
            is_loading,
        };
        if self.layout_ready && self.queue.is_empty() {
            self.listener.on_transition(transition);
        } else {
            self.queue.push_back(transition);
        }
    }
}

fn or_empty<T: Default>(
    source: &'static str,
    generation: Generation,
    result: Result<T, SearchError>,
) -> T {
    result.unwrap_or_else(|error| {
        tracing::warn!(source, %generation, %error, "contacts source failed, showing no results from it");
        T::default()
    })
}
