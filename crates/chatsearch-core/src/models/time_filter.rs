use serde::{Deserialize, Serialize};

use super::options::DateRange;

/// Relative date presets offered by the date option chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFilter {
    OneHour,
    FourHours,
    TwelveHours,
    TwentyFourHours,
    SevenDays,
}

impl TimeFilter {
    pub fn seconds(&self) -> i32 {
        match self {
            Self::OneHour => 3_600,
            Self::FourHours => 14_400,
            Self::TwelveHours => 43_200,
            Self::TwentyFourHours => 86_400,
            Self::SevenDays => 604_800,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::TwelveHours => "12h",
            Self::TwentyFourHours => "24h",
            Self::SevenDays => "7d",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [
            Self::OneHour,
            Self::FourHours,
            Self::TwelveHours,
            Self::TwentyFourHours,
            Self::SevenDays,
        ]
        .into_iter()
        .find(|filter| filter.label() == label)
    }

    /// Window ending at `now` (unix seconds).
    pub fn range_ending_at(&self, now: i32) -> DateRange {
        DateRange {
            min_date: Some(now.saturating_sub(self.seconds())),
            max_date: now,
            title: format!("Last {}", self.label()),
        }
    }
}
