use std::ops::BitOr;

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};

use super::peer::{Peer, PeerId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageNamespace {
    Cloud,
    Local,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageId {
    pub peer_id: PeerId,
    pub namespace: MessageNamespace,
    pub id: i32,
}

impl MessageId {
    pub fn cloud(peer_id: PeerId, id: i32) -> Self {
        Self {
            peer_id,
            namespace: MessageNamespace::Cloud,
            id,
        }
    }
}

/// Chronological position of a message. Field order gives the `Ord`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageIndex {
    pub timestamp: i32,
    pub id: MessageId,
}

/// Media categories a message belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageTags(u32);

impl MessageTags {
    pub const PHOTO_OR_VIDEO: Self = Self(1 << 0);
    pub const FILE: Self = Self(1 << 1);
    pub const MUSIC: Self = Self(1 << 2);
    pub const VOICE: Self = Self(1 << 3);
    pub const WEB_PAGE: Self = Self(1 << 4);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "media" | "photo" | "video" => Some(Self::PHOTO_OR_VIDEO),
            "file" | "files" => Some(Self::FILE),
            "music" => Some(Self::MUSIC),
            "voice" => Some(Self::VOICE),
            "link" | "links" => Some(Self::WEB_PAGE),
            _ => None,
        }
    }
}

impl BitOr for MessageTags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMessage {
    pub id: MessageId,
    pub timestamp: i32,
    /// Chat the message lives in
    pub peer: Peer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<PeerId>,
    pub text: String,
    #[serde(default)]
    pub tags: MessageTags,
}

impl SearchMessage {
    pub fn index(&self) -> MessageIndex {
        MessageIndex {
            timestamp: self.timestamp,
            id: self.id,
        }
    }

    /// Month bucket used to group results under date headers.
    pub fn date_header_id(&self) -> i64 {
        DateTime::from_timestamp(i64::from(self.timestamp), 0)
            .map(|date| i64::from(date.year()) * 12 + i64::from(date.month0()))
            .unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadState {
    pub max_read_id: i32,
    pub unread_count: u32,
}
