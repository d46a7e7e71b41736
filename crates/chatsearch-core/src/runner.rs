//! Runs a pane on its own task. Every mutation of the pane happens there;
//! callers talk to it through a [`PaneHandle`].

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::entry::Section;
use crate::error::SearchError;
use crate::models::{MessageId, PeerId, SearchOptions};
use crate::pane::{PaneController, RecentTransition, SearchTransition, TransitionListener};

pub enum PaneCommand {
    SetQuery(Option<String>),
    SetOptions(Option<SearchOptions>),
    LoadMore,
    ToggleExpand(Section),
    SetSelectionMode(bool),
    ToggleMessageSelection(MessageId),
    DeleteMessages(Vec<MessageId>),
    SetLayoutReady(bool),
    RefreshRecent,
    RecordOpenedPeer(PeerId),
    RemoveRecentPeer(PeerId),
    ClearRecentPeers,
    /// Replies once no lookup of the current generation is outstanding
    WaitSettled(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Clone)]
pub struct PaneHandle {
    commands: UnboundedSender<PaneCommand>,
}

impl PaneHandle {
    pub fn send(&self, command: PaneCommand) -> Result<(), SearchError> {
        self.commands
            .send(command)
            .map_err(|_| SearchError::ChannelClosed)
    }

    pub fn set_query(&self, query: impl Into<String>) -> Result<(), SearchError> {
        self.send(PaneCommand::SetQuery(Some(query.into())))
    }

    pub fn clear_query(&self) -> Result<(), SearchError> {
        self.send(PaneCommand::SetQuery(None))
    }

    pub fn set_options(&self, options: Option<SearchOptions>) -> Result<(), SearchError> {
        self.send(PaneCommand::SetOptions(options))
    }

    pub fn load_more(&self) -> Result<(), SearchError> {
        self.send(PaneCommand::LoadMore)
    }

    pub fn toggle_expand(&self, section: Section) -> Result<(), SearchError> {
        self.send(PaneCommand::ToggleExpand(section))
    }

    pub async fn wait_settled(&self) -> Result<(), SearchError> {
        let (tx, rx) = oneshot::channel();
        self.send(PaneCommand::WaitSettled(tx))?;
        rx.await.map_err(|_| SearchError::ChannelClosed)
    }

    pub fn shutdown(&self) -> Result<(), SearchError> {
        self.send(PaneCommand::Shutdown)
    }
}

/// Output of a pane running behind a [`ChannelListener`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "list", content = "transition")]
pub enum PaneOutput {
    Search(SearchTransition),
    Recent(RecentTransition),
}

/// Forwards transitions into a channel, for consumers living on another task.
pub struct ChannelListener {
    tx: UnboundedSender<PaneOutput>,
}

impl ChannelListener {
    pub fn channel() -> (Self, UnboundedReceiver<PaneOutput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TransitionListener for ChannelListener {
    fn on_transition(&mut self, transition: SearchTransition) {
        if self.tx.send(PaneOutput::Search(transition)).is_err() {
            tracing::trace!("transition receiver dropped");
        }
    }

    fn on_recent_transition(&mut self, transition: RecentTransition) {
        if self.tx.send(PaneOutput::Recent(transition)).is_err() {
            tracing::trace!("transition receiver dropped");
        }
    }
}

/// Moves the controller onto a task. The task ends on `Shutdown` or when every
/// handle is dropped, and hands the controller back.
pub fn spawn_pane(controller: PaneController) -> (PaneHandle, JoinHandle<PaneController>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_pane(controller, rx));
    (PaneHandle { commands: tx }, task)
}

async fn run_pane(
    mut controller: PaneController,
    mut commands: UnboundedReceiver<PaneCommand>,
) -> PaneController {
    let mut settle_waiters: Vec<oneshot::Sender<()>> = Vec::new();

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(PaneCommand::Shutdown) | None => break,
                    Some(PaneCommand::WaitSettled(reply)) => settle_waiters.push(reply),
                    Some(command) => execute(&mut controller, command),
                }
            }
            Some(event) = controller.next_event() => {
                controller.handle_event(event);
            }
        }

        if controller.is_settled() {
            for waiter in settle_waiters.drain(..) {
                // Waiter may have given up
                let _ = waiter.send(());
            }
        }
    }

    tracing::debug!(generation = %controller.generation(), "pane task stopped");
    controller
}

fn execute(controller: &mut PaneController, command: PaneCommand) {
    let result = match command {
        PaneCommand::SetQuery(query) => {
            controller.set_query(query);
            Ok(())
        }
        PaneCommand::SetOptions(options) => {
            controller.set_options(options);
            Ok(())
        }
        PaneCommand::LoadMore => {
            if !controller.load_more() {
                tracing::debug!("load more ignored, nothing left or already loading");
            }
            Ok(())
        }
        PaneCommand::ToggleExpand(section) => {
            controller.toggle_expand(section);
            Ok(())
        }
        PaneCommand::SetSelectionMode(enabled) => {
            controller.set_selection_mode(enabled);
            Ok(())
        }
        PaneCommand::ToggleMessageSelection(id) => {
            controller.toggle_message_selection(id);
            Ok(())
        }
        PaneCommand::DeleteMessages(ids) => controller.delete_messages(&ids),
        PaneCommand::SetLayoutReady(ready) => {
            controller.set_layout_ready(ready);
            Ok(())
        }
        PaneCommand::RefreshRecent => {
            controller.refresh_recent();
            Ok(())
        }
        PaneCommand::RecordOpenedPeer(peer_id) => controller.record_opened_peer(peer_id),
        PaneCommand::RemoveRecentPeer(peer_id) => controller.remove_recent_peer(peer_id),
        PaneCommand::ClearRecentPeers => controller.clear_recent_peers(),
        PaneCommand::WaitSettled(_) | PaneCommand::Shutdown => Ok(()),
    };
    if let Err(error) = result {
        tracing::warn!(%error, "pane command failed");
    }
}
