//! Core data types shared by the discovery, zone and records modules.

use crate::errors::ValidationError;
use serde::de::Error as _;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A backend cluster, one per game platform.
///
/// The declaration order matches the numeric ids so the derived `Ord` sorts
/// sources the same way their ids do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "PC", alias = "pc")]
    Pc,
    #[serde(rename = "XB1", alias = "xb1")]
    Xb1,
    #[serde(rename = "PS4", alias = "ps4")]
    Ps4,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Pc, Source::Xb1, Source::Ps4];

    /// Numeric id used in the compact record encoding.
    pub const fn id(self) -> i32 {
        match self {
            Source::Pc => 1,
            Source::Xb1 => 2,
            Source::Ps4 => 4,
        }
    }

    pub fn from_id(id: i32) -> Option<Source> {
        Source::ALL.into_iter().find(|source| source.id() == id)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Source::Pc => "PC",
            Source::Xb1 => "XB1",
            Source::Ps4 => "PS4",
        }
    }

    /// Lowercase form used in hostnames and metric tags.
    pub const fn slug(self) -> &'static str {
        match self {
            Source::Pc => "pc",
            Source::Xb1 => "xb1",
            Source::Ps4 => "ps4",
        }
    }

    pub fn default_bootstrap_url(self) -> String {
        format!(
            "http://init-{}.turbo.trackmania.com/game/request.php",
            self.slug()
        )
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Source::ALL
            .into_iter()
            .find(|source| source.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownSource(trimmed.to_string()))
    }
}

/// The set of sources a query aggregates over.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceSet(BTreeSet<Source>);

impl SourceSet {
    pub fn all() -> Self {
        Source::ALL.into_iter().collect()
    }

    /// Parses `"all"` or a comma separated list of source names (`"pc,xb1"`).
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        if input.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }

        let set = input
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Source::from_str)
            .collect::<Result<BTreeSet<_>, _>>()?;

        if set.is_empty() {
            return Err(ValidationError::EmptySourceSet);
        }

        Ok(SourceSet(set))
    }

    pub fn iter(&self) -> impl Iterator<Item = Source> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, source: Source) -> bool {
        self.0.contains(&source)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Source> for SourceSet {
    fn from_iter<T: IntoIterator<Item = Source>>(iter: T) -> Self {
        SourceSet(iter.into_iter().collect())
    }
}

/// One leaderboard entry as reported by a single source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// 1-based position within the source's own list
    pub source_rank: u32,
    /// Time in milliseconds. `None` for entries without a time.
    pub time: Option<i32>,
    /// Number of runs folded into this entry
    pub count: u32,
    pub source: Source,
}

/// A record placed in the merged, multi-source ranking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedRecord {
    pub rank: u32,
    #[serde(flatten)]
    pub record: Record,
}

/// Array encoding of a [`RankedRecord`]: `[rank, sourceRank, timeMs, count, sourceId]`,
/// with `-1` standing in for a missing time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompactRecord(pub RankedRecord);

const NO_TIME: i64 = -1;

impl Serialize for CompactRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let RankedRecord { rank, record } = self.0;
        let mut tuple = serializer.serialize_tuple(5)?;
        tuple.serialize_element(&rank)?;
        tuple.serialize_element(&record.source_rank)?;
        tuple.serialize_element(&record.time.map_or(NO_TIME, i64::from))?;
        tuple.serialize_element(&record.count)?;
        tuple.serialize_element(&record.source.id())?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for CompactRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (rank, source_rank, time, count, source_id) =
            <(u32, u32, i64, u32, i32)>::deserialize(deserializer)?;

        let time = match time {
            NO_TIME => None,
            ms => Some(i32::try_from(ms).map_err(|_| D::Error::custom("time out of range"))?),
        };
        let source = Source::from_id(source_id)
            .ok_or_else(|| D::Error::custom(format!("unknown source id {source_id}")))?;

        Ok(CompactRecord(RankedRecord {
            rank,
            record: Record {
                source_rank,
                time,
                count,
                source,
            },
        }))
    }
}

/// A region/league node. `name` is the fully qualified `Parent|Child` path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Zone {
    #[serde(rename = "displayName")]
    pub name: String,
    /// Every source that reports this zone
    #[serde(rename = "platforms")]
    pub sources: BTreeSet<Source>,
}

pub type ZoneMap = BTreeMap<String, Zone>;
