//! Event stream identifiers and entries

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CacheError;

/// Log-assigned event id: `<millis>-<sequence>`
///
/// Ids are totally ordered first by milliseconds, then by sequence, so a
/// timestamp `t` maps onto the first id at or after it as `t-0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId {
    pub millis: u64,
    pub seq: u64,
}

impl EventId {
    /// `0-0`, which precedes every appended event
    pub const ZERO: Self = Self { millis: 0, seq: 0 };

    pub const fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    /// The id a log assigns to the entry appended after `self` at wall-clock
    /// time `now_millis`; ids stay strictly increasing even if the clock
    /// goes backwards.
    pub fn next(self, now_millis: u64) -> Self {
        if now_millis > self.millis {
            Self { millis: now_millis, seq: 0 }
        } else {
            Self { millis: self.millis, seq: self.seq.saturating_add(1) }
        }
    }
}

impl Ord for EventId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.millis, self.seq).cmp(&(other.millis, other.seq))
    }
}

impl PartialOrd for EventId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for EventId {
    type Err = CacheError;

    /// Accepts `<millis>-<seq>` or a bare `<millis>` (sequence 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CacheError::serialization(format!("invalid event id '{s}'"));
        let (millis, seq) = match s.split_once('-') {
            Some((millis, seq)) => (millis, seq),
            None => (s, "0"),
        };
        let millis = millis.parse::<u64>().map_err(|_| invalid())?;
        let seq = seq.parse::<u64>().map_err(|_| invalid())?;
        Ok(Self { millis, seq })
    }
}

impl TryFrom<String> for EventId {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.to_string()
    }
}

/// An appended, immutable stream entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: EventId,
    pub stream: String,
    pub payload: Vec<u8>,
}

impl StreamEvent {
    pub fn new(stream: impl Into<String>, id: EventId, payload: Vec<u8>) -> Self {
        Self { id, stream: stream.into(), payload }
    }

    /// Payload as UTF-8, if it is valid UTF-8
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Starting point of a replay (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayFrom {
    /// Milliseconds since the UNIX epoch
    Timestamp(u64),
    /// A specific event id
    Id(EventId),
}

impl ReplayFrom {
    /// Replay the whole retained log
    pub const BEGINNING: Self = Self::Id(EventId::ZERO);

    /// Replay from a wall-clock instant; instants before the epoch start at
    /// the beginning.
    pub fn since(instant: DateTime<Utc>) -> Self {
        Self::Timestamp(u64::try_from(instant.timestamp_millis()).unwrap_or(0))
    }

    /// The first id included by the replay
    pub fn start_id(self) -> EventId {
        match self {
            Self::Timestamp(millis) => EventId::new(millis, 0),
            Self::Id(id) => id,
        }
    }
}

impl From<EventId> for ReplayFrom {
    fn from(id: EventId) -> Self {
        Self::Id(id)
    }
}
