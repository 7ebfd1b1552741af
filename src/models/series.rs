use crate::domain::{SeriesId, Weekday};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A series airing in the current season, as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesCatalogEntry {
    pub id: SeriesId,
    pub title: String,
    /// `None` when the catalog has no broadcast slot or an unknown day.
    pub broadcast_weekday: Option<Weekday>,
    /// Cumulative across parts for multi-part series; `None` or 0 when not
    /// announced.
    pub declared_episode_count: Option<i32>,
    pub cover_image_url: Option<String>,
}

/// One "watching" entry from the user's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchListEntry {
    pub series_id: SeriesId,
    pub episodes_watched: i32,
    pub user_score: i32,
}

/// Next scheduled episode as reported by the airing oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAiring {
    /// Part-local episode number.
    pub episode: i32,
    pub airing_at: i64,
    pub seconds_until_airing: i64,
}

/// Live schedule data for one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AiringInfo {
    /// Episode count of the currently airing part only.
    pub authoritative_episode_count: Option<i32>,
    pub next_airing: Option<NextAiring>,
}

/// Total episode count after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeTotal {
    Known(i32),
    Unknown,
}

impl EpisodeTotal {
    /// First positive candidate wins; zero and `None` both mean "not announced".
    #[must_use]
    pub fn first_positive(candidates: &[Option<i32>]) -> Self {
        candidates
            .iter()
            .flatten()
            .copied()
            .find(|n| *n > 0)
            .map_or(Self::Unknown, Self::Known)
    }

    #[must_use]
    pub const fn known(self) -> Option<i32> {
        match self {
            Self::Known(n) => Some(n),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for EpisodeTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(n) => write!(f, "{n}"),
            Self::Unknown => f.write_str("?"),
        }
    }
}

impl Serialize for EpisodeTotal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Known(n) => serializer.serialize_i32(*n),
            Self::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    CaughtUp,
    Behind,
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaughtUp => f.write_str("Caught up"),
            Self::Behind => f.write_str("Behind"),
        }
    }
}

/// Output unit of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledSeries {
    pub title: String,
    pub series_id: SeriesId,
    pub episodes_watched: i32,
    pub total_episodes: EpisodeTotal,
    /// Next episode number in the catalog's (cumulative) numbering.
    pub next_episode: Option<i32>,
    pub next_airing_at: Option<DateTime<Utc>>,
    pub next_airing_in_hours: Option<i64>,
    pub status: WatchStatus,
    pub cover_image_url: Option<String>,
    pub weekday: Weekday,
    pub user_score: i32,
}

/// Seven weekday buckets, Sunday first. Order inside a bucket follows the
/// watch-list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeekdayBoard {
    days: [Vec<ReconciledSeries>; 7],
}

impl WeekdayBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, series: ReconciledSeries) {
        self.days[series.weekday.index()].push(series);
    }

    #[must_use]
    pub fn day(&self, weekday: Weekday) -> &[ReconciledSeries] {
        &self.days[weekday.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &[ReconciledSeries])> {
        Weekday::ALL
            .into_iter()
            .map(|w| (w, self.days[w.index()].as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.days.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, id: SeriesId) -> Option<&ReconciledSeries> {
        self.days.iter().flatten().find(|s| s.series_id == id)
    }
}

impl Serialize for WeekdayBoard {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(7))?;
        for (weekday, series) in self.iter() {
            map.serialize_entry(weekday.as_str(), series)?;
        }
        map.end()
    }
}
