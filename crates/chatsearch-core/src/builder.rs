//! Assembles the ranked entry list from whatever the sources delivered so far.

use std::collections::HashSet;

use crate::aggregator::{AggregateInputs, PaneSettings};
use crate::config::SearchConfig;
use crate::entry::{SearchEntry, SectionExpand};
use crate::models::{
    FoundPeer, MessageId, MessageNamespace, Peer, PeerId, PeersFilter, UnreadBadge,
};
use crate::pane::PaneSearchState;
use crate::phone::is_viable_phone_number;

const SAVED_MESSAGES_QUERY: &str = "saved messages";

struct LocalRow {
    peer: Peer,
    associated_peer: Option<Peer>,
    unread: Option<UnreadBadge>,
}

pub struct BuildContext<'a> {
    pub query: &'a str,
    pub settings: &'a PaneSettings,
    pub config: &'a SearchConfig,
    pub state: &'a PaneSearchState,
    pub selection: Option<&'a HashSet<MessageId>>,
}

impl BuildContext<'_> {
    fn admits(&self, peer: &Peer) -> bool {
        self.settings
            .filter
            .admits(peer, self.settings.account_peer.id)
    }

    /// The account's own chat, retitled, when the query spells out its name.
    fn saved_messages_peer(&self) -> Option<Peer> {
        let query = self.query.to_lowercase();
        if query.chars().count() <= 1 {
            return None;
        }
        let title = &self.config.saved_messages_title;
        let matches =
            title.to_lowercase().starts_with(&query) || SAVED_MESSAGES_QUERY.starts_with(&query);
        matches.then(|| Peer {
            title: title.clone(),
            ..self.settings.account_peer.clone()
        })
    }

    fn is_deleted(&self, id: &MessageId) -> bool {
        self.state.deleted_message_ids.contains(id)
            || (id.namespace == MessageNamespace::Cloud
                && self.state.deleted_global_message_ids.contains(&id.id))
    }
}

/// Builds entries in display order: saved messages, local peers, global peers,
/// the resolved link message, messages, then the add-contact suggestion.
/// Every identity is emitted once; the first occurrence wins.
pub fn build_entries(context: &BuildContext<'_>, inputs: &AggregateInputs) -> Vec<SearchEntry> {
    let settings = context.settings;
    let account_id = settings.account_peer.id;
    let cap = context.config.section_cap;

    let local_store: Vec<_> = inputs
        .local
        .iter()
        .flat_map(|local| local.peers.iter())
        .filter(|rendered| rendered.peer.id != account_id && context.admits(&rendered.peer))
        .collect();
    let (remote_local, remote_global): (&[FoundPeer], &[FoundPeer]) = match &inputs.remote {
        Some(remote) => (remote.local.as_slice(), remote.global.as_slice()),
        None => (&[], &[]),
    };

    let saved = context
        .saved_messages_peer()
        .filter(|saved| context.admits(saved));

    // One dedup pass over every source, before any section is capped
    let mut seen: HashSet<PeerId> = saved.iter().map(|saved| saved.id).collect();
    let mut local_rows: Vec<LocalRow> = Vec::new();
    for rendered in local_store {
        if seen.insert(rendered.peer.id) {
            local_rows.push(LocalRow {
                peer: rendered.peer.clone(),
                associated_peer: rendered.associated_peer.clone(),
                unread: inputs
                    .local
                    .as_ref()
                    .and_then(|local| local.unread.get(&rendered.peer.id).copied()),
            });
        }
    }
    for found in remote_local {
        if context.admits(&found.peer) && seen.insert(found.peer.id) {
            local_rows.push(LocalRow {
                peer: found.peer.clone(),
                associated_peer: None,
                unread: None,
            });
        }
    }
    let global_rows: Vec<&FoundPeer> = remote_global
        .iter()
        .filter(|found| context.admits(&found.peer) && seen.insert(found.peer.id))
        .collect();

    let local_expand =
        SectionExpand::for_section(local_rows.len(), context.state.expand_local, cap);
    let global_expand =
        SectionExpand::for_section(global_rows.len(), context.state.expand_global, cap);

    let mut entries = Vec::new();
    let mut index = 0;
    if let Some(saved) = saved {
        entries.push(SearchEntry::LocalPeer {
            peer: saved,
            associated_peer: None,
            unread: None,
            index,
            expand: local_expand,
        });
        index += 1;
    }

    let local_shown = if local_expand.limits_rows() { cap } else { local_rows.len() };
    for row in local_rows.into_iter().take(local_shown) {
        entries.push(SearchEntry::LocalPeer {
            peer: row.peer,
            associated_peer: row.associated_peer,
            unread: row.unread,
            index,
            expand: local_expand,
        });
        index += 1;
    }

    if settings.tag.is_none() {
        let global_shown = if global_expand.limits_rows() { cap } else { global_rows.len() };
        for (index, found) in global_rows.into_iter().take(global_shown).enumerate() {
            entries.push(SearchEntry::GlobalPeer {
                peer: found.clone(),
                unread: None,
                index,
                expand: global_expand,
            });
        }
    }

    let mut seen_messages: HashSet<MessageId> = HashSet::new();
    if let Some(message) = &inputs.resolved {
        seen_messages.insert(message.id);
        entries.push(SearchEntry::Message {
            message: message.clone(),
            read_state: None,
            total_count: 1,
            selected: None,
            display_custom_header: true,
        });
    }

    // Messages wait for the peer sections so the list does not jump
    if let (Some(_), Some(found)) = (&inputs.remote, &inputs.messages) {
        let mut first_header = None;
        for message in &found.messages {
            if context.is_deleted(&message.id) || !seen_messages.insert(message.id) {
                continue;
            }
            let header = message.date_header_id();
            let newest_bucket = *first_header.get_or_insert(header);
            entries.push(SearchEntry::Message {
                message: message.clone(),
                read_state: found.read_states.get(&message.id.peer_id).copied(),
                total_count: found.total_count,
                selected: context
                    .selection
                    .map(|selection| selection.contains(&message.id)),
                display_custom_header: header == newest_bucket,
            });
        }
    }

    if settings.tag.is_none()
        && !settings.filter.contains(PeersFilter::EXCLUDE_RECENT)
        && is_viable_phone_number(context.query)
    {
        entries.push(SearchEntry::AddContact {
            phone_number: context.query.to_string(),
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::MessageSearchContext;
    use crate::entry::EntryId;
    use crate::models::{MessageTags, PeerKind, RenderedPeer, SearchMessage};
    use crate::sources::{LocalPeers, MessagePage, RemotePeers};

    fn settings() -> PaneSettings {
        PaneSettings::new(Peer::user(1, "Me"))
    }

    fn local(ids: &[i64]) -> LocalPeers {
        LocalPeers {
            peers: ids
                .iter()
                .map(|id| RenderedPeer::from(Peer::user(*id, format!("Ann {id}"))))
                .collect(),
            unread: Default::default(),
        }
    }

    fn found(ids: &[i64]) -> Vec<FoundPeer> {
        ids.iter()
            .map(|id| FoundPeer::from(Peer::user(*id, format!("Ann {id}"))))
            .collect()
    }

    fn message(id: i32, timestamp: i32) -> SearchMessage {
        SearchMessage {
            id: MessageId::cloud(PeerId(50), id),
            timestamp,
            peer: Peer::new(50, PeerKind::Group, "Team"),
            author: None,
            text: "ann said hi".to_string(),
            tags: MessageTags::empty(),
        }
    }

    fn build(query: &str, settings: &PaneSettings, state: &PaneSearchState, inputs: &AggregateInputs) -> Vec<SearchEntry> {
        let config = SearchConfig::default();
        let context = BuildContext {
            query,
            settings,
            config: &config,
            state,
            selection: None,
        };
        build_entries(&context, inputs)
    }

    fn ids(entries: &[SearchEntry]) -> Vec<EntryId> {
        entries.iter().map(SearchEntry::id).collect()
    }

    #[test]
    fn test_dedup_prefers_local_store() {
        let inputs = AggregateInputs {
            local: Some(local(&[2, 3])),
            remote: Some(RemotePeers {
                local: found(&[3, 4]),
                global: found(&[2, 5]),
            }),
            messages: Some(MessageSearchContext::default()),
            ..Default::default()
        };
        let entries = build("ann", &settings(), &PaneSearchState::default(), &inputs);
        assert_eq!(
            ids(&entries),
            vec![
                EntryId::LocalPeer(PeerId(2)),
                EntryId::LocalPeer(PeerId(3)),
                EntryId::LocalPeer(PeerId(4)),
                EntryId::GlobalPeer(PeerId(5)),
            ]
        );
        assert!(crate::entry::is_sorted(&entries));
    }

    #[test]
    fn test_local_section_is_capped() {
        let inputs = AggregateInputs {
            local: Some(local(&(2..12).collect::<Vec<_>>())),
            remote: Some(RemotePeers::default()),
            ..Default::default()
        };
        let mut state = PaneSearchState::default();
        let capped = build("ann", &settings(), &state, &inputs);
        assert_eq!(capped.len(), 3);
        assert!(capped
            .iter()
            .all(|entry| entry.expand() == Some(SectionExpand::Expand)));

        state.expand_local = true;
        let expanded = build("ann", &settings(), &state, &inputs);
        assert_eq!(expanded.len(), 10);
        assert!(expanded
            .iter()
            .all(|entry| entry.expand() == Some(SectionExpand::Collapse)));
    }

    #[test]
    fn test_capped_local_hit_never_moves_to_global() {
        let inputs = AggregateInputs {
            local: Some(local(&(2..12).collect::<Vec<_>>())),
            remote: Some(RemotePeers {
                local: Vec::new(),
                global: found(&[7, 20]),
            }),
            ..Default::default()
        };
        let mut state = PaneSearchState::default();
        let capped = build("ann", &settings(), &state, &inputs);
        assert_eq!(
            ids(&capped),
            vec![
                EntryId::LocalPeer(PeerId(2)),
                EntryId::LocalPeer(PeerId(3)),
                EntryId::LocalPeer(PeerId(4)),
                EntryId::GlobalPeer(PeerId(20)),
            ]
        );
        assert_eq!(capped[3].expand(), Some(SectionExpand::None));

        state.expand_local = true;
        let expanded = build("ann", &settings(), &state, &inputs);
        assert_eq!(expanded.len(), 11);
        let expanded_ids = ids(&expanded);
        assert!(expanded_ids.contains(&EntryId::LocalPeer(PeerId(7))));
        assert!(!expanded_ids.contains(&EntryId::GlobalPeer(PeerId(7))));
    }

    #[test]
    fn test_saved_messages_row() {
        let inputs = AggregateInputs {
            local: Some(local(&[1, 2])),
            ..Default::default()
        };
        let entries = build("sav", &settings(), &PaneSearchState::default(), &inputs);
        assert_eq!(entries[0].id(), EntryId::LocalPeer(PeerId(1)));
        assert_eq!(entries[0].peer().map(|peer| peer.title.as_str()), Some("Saved Messages"));
        // The account peer itself never shows up as a plain local hit
        assert_eq!(entries.len(), 2);

        let single = build("s", &settings(), &PaneSearchState::default(), &inputs);
        assert_eq!(ids(&single), vec![EntryId::LocalPeer(PeerId(2))]);

        let excluded = settings().with_filter(PeersFilter::EXCLUDE_SAVED_MESSAGES);
        let entries = build("saved", &excluded, &PaneSearchState::default(), &inputs);
        assert_eq!(ids(&entries), vec![EntryId::LocalPeer(PeerId(2))]);
    }

    #[test]
    fn test_messages_wait_for_remote_peers() {
        let mut inputs = AggregateInputs {
            local: Some(LocalPeers::default()),
            messages: Some(MessageSearchContext::from_page(MessagePage {
                messages: vec![message(1, 100), message(2, 200)],
                total_count: 2,
                completed: true,
                ..Default::default()
            })),
            ..Default::default()
        };
        assert!(build("ann", &settings(), &PaneSearchState::default(), &inputs).is_empty());

        inputs.remote = Some(RemotePeers::default());
        let entries = build("ann", &settings(), &PaneSearchState::default(), &inputs);
        assert_eq!(
            ids(&entries),
            vec![
                EntryId::Message(MessageId::cloud(PeerId(50), 2)),
                EntryId::Message(MessageId::cloud(PeerId(50), 1)),
            ]
        );
    }

    #[test]
    fn test_deleted_and_duplicate_messages_are_skipped() {
        let mut state = PaneSearchState::default();
        state.deleted_message_ids.insert(MessageId::cloud(PeerId(50), 1));
        let inputs = AggregateInputs {
            local: Some(LocalPeers::default()),
            remote: Some(RemotePeers::default()),
            messages: Some(MessageSearchContext::from_page(MessagePage {
                messages: vec![message(3, 300), message(1, 100)],
                total_count: 2,
                completed: true,
                ..Default::default()
            })),
            resolved: Some(message(3, 300)),
            ..Default::default()
        };
        let entries = build("t.me/team/3", &settings(), &state, &inputs);
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            SearchEntry::Message {
                total_count,
                display_custom_header,
                ..
            } => {
                assert_eq!(*total_count, 1);
                assert!(*display_custom_header);
            }
            other => panic!("expected resolved message, got {other:?}"),
        }
    }

    #[test]
    fn test_add_contact_suggestion() {
        let inputs = AggregateInputs {
            local: Some(LocalPeers::default()),
            remote: Some(RemotePeers::default()),
            messages: Some(MessageSearchContext::default()),
            ..Default::default()
        };
        let entries = build("+1 555 0100", &settings(), &PaneSearchState::default(), &inputs);
        assert_eq!(ids(&entries), vec![EntryId::AddContact]);

        let tagged = settings().with_tag(Some(MessageTags::FILE));
        assert!(build("+1 555 0100", &tagged, &PaneSearchState::default(), &inputs).is_empty());

        let no_recent = settings().with_filter(PeersFilter::EXCLUDE_RECENT);
        assert!(build("+1 555 0100", &no_recent, &PaneSearchState::default(), &inputs).is_empty());
    }

    #[test]
    fn test_tag_hides_global_peers() {
        let inputs = AggregateInputs {
            local: Some(local(&[2])),
            remote: Some(RemotePeers {
                local: Vec::new(),
                global: found(&[5]),
            }),
            ..Default::default()
        };
        let tagged = settings().with_tag(Some(MessageTags::PHOTO_OR_VIDEO));
        let entries = build("ann", &tagged, &PaneSearchState::default(), &inputs);
        assert_eq!(ids(&entries), vec![EntryId::LocalPeer(PeerId(2))]);
    }
}
