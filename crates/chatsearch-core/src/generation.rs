use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::error::SearchError;

/// Token of one query/options change. Results tagged with an older value are stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// In-flight source lookups of one pane. Each lookup runs on its own task and
/// reports back over the pane's event channel.
pub struct SourceTasks<E> {
    sender: UnboundedSender<E>,
    handles: Vec<JoinHandle<()>>,
}

impl<E: Send + 'static> SourceTasks<E> {
    pub fn new(sender: UnboundedSender<E>) -> Self {
        Self {
            sender,
            handles: Vec::new(),
        }
    }

    /// Runs `lookup` after `delay`. The lookup is only created once the delay
    /// has elapsed, so aborting during the debounce never reaches the source.
    pub fn spawn<T, F, W>(&mut self, delay: Option<Duration>, lookup: F, wrap: W)
    where
        T: Send + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<T, SearchError>> + Send + 'static,
        W: FnOnce(Result<T, SearchError>) -> E + Send + 'static,
    {
        self.handles.retain(|handle| !handle.is_finished());

        let sender = self.sender.clone();
        self.handles.push(tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let result = lookup().await;
            if sender.send(wrap(result)).is_err() {
                tracing::trace!("pane dropped before source result was delivered");
            }
        }));
    }

    pub fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl<E> Drop for SourceTasks<E> {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
