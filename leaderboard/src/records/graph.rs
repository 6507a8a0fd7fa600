use crate::model::{RankedRecord, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BUCKET_MS: i64 = 100;
const WINDOW_MS: i64 = 10_000;
const BUCKETS_PER_LABEL: usize = 10;

/// Histogram of run counts over the first ten seconds after each source's
/// fastest time, in 100ms buckets. A record exactly ten seconds behind lands
/// in a final bucket of its own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionGraph {
    /// One label per bucket; only every full second is labelled
    pub x: Vec<String>,
    pub y: BTreeMap<Source, Vec<u32>>,
}

/// Builds the graph from an already ranked list.
///
/// Each source is walked in ranking order from its own fastest record. The
/// walk stops at the first record without a time or once a record is more than
/// ten seconds behind the fastest. Buckets are fixed offsets from the fastest
/// time, so bucket `i` covers the same range in every series and gaps are
/// zero. A source without timed records has no series.
pub fn distribution_graph(records: &[RankedRecord]) -> DistributionGraph {
    let mut y = BTreeMap::new();

    for source in Source::ALL {
        let mut timed = records
            .iter()
            .filter(|ranked| ranked.record.source == source)
            .map_while(|ranked| ranked.record.time.map(|time| (time, ranked.record.count)));

        let Some((fastest, count)) = timed.next() else {
            continue;
        };

        let mut series = vec![count];
        for (time, count) in timed {
            let elapsed = i64::from(time) - i64::from(fastest);
            if elapsed > WINDOW_MS {
                break;
            }

            let index = (elapsed / BUCKET_MS) as usize;
            if series.len() <= index {
                series.resize(index + 1, 0);
            }
            series[index] = series[index].saturating_add(count);
        }

        y.insert(source, series);
    }

    let len = y.values().map(Vec::len).max().unwrap_or(0);
    let x = (0..len)
        .map(|index| {
            if index % BUCKETS_PER_LABEL == 0 {
                format!("+{}s", index / BUCKETS_PER_LABEL)
            } else {
                String::new()
            }
        })
        .collect();

    DistributionGraph { x, y }
}
