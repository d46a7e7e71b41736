use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chatsearch_core::contacts::{
    ContactSearchEntry, ContactsSearchController, ContactsSearchSettings, ContactsTransition,
    ContactsTransitionListener,
};
use chatsearch_core::memory::MemorySources;
use chatsearch_core::models::{
    MessageTags, PeerId, PeerScope, PeersFilter, SearchOptions, TimeFilter,
};
use chatsearch_core::pane::EmptyResultsHint;
use chatsearch_core::recent::RecentEntry;
use chatsearch_core::runner::ChannelListener;
use chatsearch_core::{
    spawn_pane, Generation, PaneController, PaneSettings, PaneState, SearchEntry, Section,
};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedSender};

use super::config::CliConfig;
use super::output::print_json;

#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    /// Successive contents of the search field
    pub keystrokes: Vec<String>,
    pub expand: Vec<Section>,
    pub load_more: usize,
    pub tag: Option<MessageTags>,
    /// Restrict messages to one chat of the fixture
    pub peer: Option<PeerId>,
    pub last: Option<TimeFilter>,
    pub filter: PeersFilter,
    pub typing_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Search(SearchArgs),
    Contacts { keystrokes: Vec<String> },
    Recent {
        open: Vec<PeerId>,
        remove: Vec<PeerId>,
        clear: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchSummary<'a> {
    generation: Generation,
    state: PaneState,
    #[serde(skip_serializing_if = "Option::is_none")]
    empty_hint: Option<HintSummary>,
    entries: &'a [SearchEntry],
}

#[derive(Serialize)]
struct HintSummary {
    title: &'static str,
    text: String,
}

impl From<EmptyResultsHint> for HintSummary {
    fn from(hint: EmptyResultsHint) -> Self {
        Self {
            title: hint.title(),
            text: hint.text(),
        }
    }
}

#[derive(Serialize)]
struct ContactsSummary<'a> {
    generation: Generation,
    entries: &'a [ContactSearchEntry],
}

#[derive(Serialize)]
struct RecentSummary<'a> {
    entries: &'a [RecentEntry],
}

struct ForwardContacts(UnboundedSender<ContactsTransition>);

impl ContactsTransitionListener for ForwardContacts {
    fn on_transition(&mut self, transition: ContactsTransition) {
        if self.0.send(transition).is_err() {
            tracing::trace!("contacts transition receiver dropped");
        }
    }
}

/// Run one scripted session against a fixture and print every transition.
#[tokio::main]
pub async fn run(command: SessionCommand, config: CliConfig, fixture: &Path, pretty: bool) -> Result<()> {
    let sources = Arc::new(
        MemorySources::load(fixture)
            .with_context(|| format!("Failed to load fixture: {}", fixture.display()))?,
    );
    match command {
        SessionCommand::Search(args) => run_search(sources, config, args, pretty).await,
        SessionCommand::Contacts { keystrokes } => {
            run_contacts(sources, config, keystrokes, pretty).await
        }
        SessionCommand::Recent {
            open,
            remove,
            clear,
        } => run_recent(sources, config, open, remove, clear, pretty).await,
    }
}

fn unix_now() -> i32 {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    i32::try_from(seconds).unwrap_or(i32::MAX)
}

fn search_options(sources: &MemorySources, args: &SearchArgs) -> Result<Option<SearchOptions>> {
    let peer = match args.peer {
        Some(peer_id) => {
            let dataset = sources.dataset();
            let chat = dataset
                .chats
                .iter()
                .find(|chat| chat.peer.id == peer_id)
                .with_context(|| format!("Peer {peer_id} is not a chat in the fixture"))?;
            Some(PeerScope {
                peer_id,
                is_group: chat.peer.kind.is_group(),
                title: chat.peer.title.clone(),
            })
        }
        None => None,
    };
    let options = SearchOptions {
        peer,
        date: args.last.map(|filter| filter.range_ending_at(unix_now())),
    };
    Ok((!options.is_empty()).then_some(options))
}

async fn run_search(
    sources: Arc<MemorySources>,
    config: CliConfig,
    args: SearchArgs,
    pretty: bool,
) -> Result<()> {
    let options = search_options(&sources, &args)?;
    let settings = PaneSettings::new(config.account.clone())
        .with_filter(args.filter)
        .with_tag(args.tag);
    let (listener, mut outputs) = ChannelListener::channel();
    let controller = PaneController::new(sources, config.search.clone(), settings, Box::new(listener));
    let (handle, task) = spawn_pane(controller);

    if options.is_some() {
        handle.set_options(options)?;
    }
    for keystroke in &args.keystrokes {
        handle.set_query(keystroke.clone())?;
        if args.typing_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.typing_delay_ms)).await;
        }
    }
    handle.wait_settled().await?;

    for section in &args.expand {
        handle.toggle_expand(*section)?;
    }
    for _ in 0..args.load_more {
        handle.load_more()?;
        handle.wait_settled().await?;
    }
    handle.shutdown()?;
    let controller = task.await.context("Pane task failed")?;

    while let Ok(output) = outputs.try_recv() {
        print_json(&output, pretty)?;
    }
    print_json(
        &SearchSummary {
            generation: controller.generation(),
            state: controller.state(),
            empty_hint: controller.empty_results_hint().map(HintSummary::from),
            entries: controller.displayed().unwrap_or_default(),
        },
        pretty,
    )
}

async fn run_contacts(
    sources: Arc<MemorySources>,
    config: CliConfig,
    keystrokes: Vec<String>,
    pretty: bool,
) -> Result<()> {
    let (tx, mut transitions) = mpsc::unbounded_channel();
    let mut controller = ContactsSearchController::new(
        sources,
        config.search.clone(),
        ContactsSearchSettings::new(config.account.id),
        Box::new(ForwardContacts(tx)),
    );
    for keystroke in keystrokes {
        controller.set_query(Some(keystroke));
    }
    controller.settle().await;

    while let Ok(transition) = transitions.try_recv() {
        print_json(&transition, pretty)?;
    }
    print_json(
        &ContactsSummary {
            generation: controller.generation(),
            entries: controller.displayed(),
        },
        pretty,
    )
}

async fn run_recent(
    sources: Arc<MemorySources>,
    config: CliConfig,
    open: Vec<PeerId>,
    remove: Vec<PeerId>,
    clear: bool,
    pretty: bool,
) -> Result<()> {
    let (listener, mut outputs) = ChannelListener::channel();
    let mut pane = PaneController::new(
        sources,
        config.search.clone(),
        PaneSettings::new(config.account.clone()),
        Box::new(listener),
    );

    pane.refresh_recent();
    pane.process_next().await;
    for peer_id in open {
        pane.record_opened_peer(peer_id)?;
        pane.process_next().await;
    }
    for peer_id in remove {
        pane.remove_recent_peer(peer_id)?;
        pane.process_next().await;
    }
    if clear {
        pane.clear_recent_peers()?;
        pane.process_next().await;
    }

    while let Ok(output) = outputs.try_recv() {
        print_json(&output, pretty)?;
    }
    print_json(
        &RecentSummary {
            entries: pane.recent_displayed().unwrap_or_default(),
        },
        pretty,
    )
}
