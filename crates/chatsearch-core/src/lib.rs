pub mod aggregator;
pub mod builder;
pub mod config;
pub mod contacts;
pub mod diff;
pub mod entry;
pub mod error;
pub mod generation;
pub mod link;
pub mod memory;
pub mod models;
pub mod pane;
pub mod phone;
pub mod recent;
pub mod runner;
pub mod search;
pub mod sources;
pub mod tracing_setup;

pub use aggregator::{PaneSettings, SearchAggregator, SourceEvent, SourceResult};
pub use config::SearchConfig;
pub use diff::{merge_lists_stable_with_updates, Identifiable, ListDiff, ListInsert, ListUpdate};
pub use entry::{EntryId, Section, SearchEntry, SectionExpand};
pub use error::SearchError;
pub use generation::Generation;
pub use pane::{PaneController, PaneState, SearchTransition, TransitionListener};
pub use runner::{spawn_pane, PaneCommand, PaneHandle};
pub use sources::SearchSources;
