pub mod filter;
pub mod message;
pub mod options;
pub mod peer;
pub mod time_filter;

pub use filter::PeersFilter;
pub use message::{MessageId, MessageIndex, MessageNamespace, MessageTags, ReadState, SearchMessage};
pub use options::{DateRange, FolderId, PeerScope, SearchOptions};
pub use peer::{FoundPeer, Peer, PeerId, PeerKind, Presence, RenderedPeer, UnreadBadge};
pub use time_filter::TimeFilter;
