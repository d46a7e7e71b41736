use serde::{Deserialize, Serialize};

use super::peer::PeerId;

/// Restricts a message search to one chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerScope {
    pub peer_id: PeerId,
    pub is_group: bool,
    pub title: String,
}

/// Inclusive date window in unix seconds. An open lower bound means "before max_date".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<i32>,
    pub max_date: i32,
    pub title: String,
}

impl DateRange {
    pub fn before(max_date: i32, title: impl Into<String>) -> Self {
        Self {
            min_date: None,
            max_date,
            title: title.into(),
        }
    }

    pub fn contains(&self, timestamp: i32) -> bool {
        self.min_date.map_or(true, |min| timestamp >= min) && timestamp <= self.max_date
    }
}

/// Chat folder a pane is opened from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub i32);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateRange>,
}

impl SearchOptions {
    pub fn is_empty(&self) -> bool {
        self.peer.is_none() && self.date.is_none()
    }

    pub fn with_peer(&self, peer: Option<PeerScope>) -> Self {
        Self {
            peer,
            date: self.date.clone(),
        }
    }

    pub fn with_date(&self, date: Option<DateRange>) -> Self {
        Self {
            peer: self.peer.clone(),
            date,
        }
    }

    pub fn date_bounds(&self) -> (Option<i32>, Option<i32>) {
        match &self.date {
            Some(range) => (range.min_date, Some(range.max_date)),
            None => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builders() {
        let options = SearchOptions::default();
        assert!(options.is_empty());

        let scoped = options.with_peer(Some(PeerScope {
            peer_id: PeerId(7),
            is_group: true,
            title: "Team".to_string(),
        }));
        assert!(!scoped.is_empty());

        let dated = scoped.with_date(Some(DateRange::before(500, "Before 500")));
        assert_eq!(dated.date_bounds(), (None, Some(500)));
        assert_eq!(dated.peer.as_ref().map(|p| p.peer_id), Some(PeerId(7)));
        assert!(dated.with_peer(None).with_date(None).is_empty());
    }

    #[test]
    fn test_date_range_contains() {
        let range = DateRange {
            min_date: Some(100),
            max_date: 200,
            title: String::new(),
        };
        assert!(range.contains(100));
        assert!(range.contains(200));
        assert!(!range.contains(99));
        assert!(!range.contains(201));
        assert!(DateRange::before(200, "").contains(-5));
    }
}
