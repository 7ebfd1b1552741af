//! Domain primitives for seasonal tracking with strong typing.
//!
//! Series identifiers, broadcast weekdays and airing seasons are modelled as
//! dedicated types so that raw integers and strings coming off the wire are
//! validated once, at the client boundary.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a series in the progress-tracking service.
///
/// The airing oracle is queried with this same identifier (as its external
/// id), so it is the join key for the whole reconciliation pass.
///
/// # Examples
///
/// ```rust
/// use catchup::domain::SeriesId;
///
/// let id = SeriesId::new(52991);
/// assert_eq!(id.value(), 52991);
/// assert_eq!(id.to_string(), "52991");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SeriesId(i32);

impl SeriesId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for SeriesId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl From<SeriesId> for i32 {
    fn from(id: SeriesId) -> Self {
        id.0
    }
}

/// Broadcast weekday, Sunday first to match the board layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub const ALL: [Self; 7] = [
        Self::Sunday,
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
    ];

    /// Parses the broadcast day reported by the catalog (`"monday"`,
    /// `"Monday"`, ...). Anything else, including `"other"`, is unresolvable.
    #[must_use]
    pub fn parse(day: &str) -> Option<Self> {
        let day = day.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|w| w.as_str() == day)
    }

    /// Position in the Sunday-first week, `0..7`.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "sunday",
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sunday => "Sunday",
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
        };
        write!(f, "{s}")
    }
}

/// Airing season, one per calendar quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Maps a calendar month (1-12) onto its season using fixed quarter
    /// boundaries. Out-of-range months fall into `Fall`.
    #[must_use]
    pub const fn from_month(month: u32) -> Self {
        match month {
            1..=3 => Self::Winter,
            4..=6 => Self::Spring,
            7..=9 => Self::Summer,
            _ => Self::Fall,
        }
    }

    /// Season and year that `date` falls in.
    #[must_use]
    pub fn current(date: NaiveDate) -> (Self, i32) {
        (Self::from_month(date.month()), date.year())
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Winter => "winter",
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Fall => "fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
