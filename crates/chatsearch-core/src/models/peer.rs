use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub i64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerKind {
    User,
    Bot,
    SecretChat,
    Group,
    Supergroup,
    /// Broadcast channel
    Channel,
}

impl PeerKind {
    /// Users and bots share the cloud-user namespace
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User | Self::Bot)
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::User | Self::Bot | Self::SecretChat)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }

    pub fn is_channel(&self) -> bool {
        matches!(self, Self::Channel)
    }
}

fn default_can_send() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub id: PeerId,
    pub kind: PeerKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default = "default_can_send")]
    pub can_send_messages: bool,
    /// Secret chats point at the user they were opened with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_peer_id: Option<PeerId>,
}

impl Peer {
    pub fn new(id: i64, kind: PeerKind, title: impl Into<String>) -> Self {
        Self {
            id: PeerId(id),
            kind,
            title: title.into(),
            username: None,
            phone: None,
            can_send_messages: true,
            associated_peer_id: None,
        }
    }

    pub fn user(id: i64, title: impl Into<String>) -> Self {
        Self::new(id, PeerKind::User, title)
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.can_send_messages = false;
        self
    }
}

/// A hit from the remote directory search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundPeer {
    pub peer: Peer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<u32>,
}

impl From<Peer> for FoundPeer {
    fn from(peer: Peer) -> Self {
        Self {
            peer,
            subscribers: None,
        }
    }
}

/// A local store hit together with the peer it is associated with, if loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPeer {
    pub peer: Peer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_peer: Option<Peer>,
}

impl From<Peer> for RenderedPeer {
    fn from(peer: Peer) -> Self {
        Self {
            peer,
            associated_peer: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadBadge {
    pub count: u32,
    pub muted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i32>,
}
