use crate::model::{RankedRecord, Record};
use std::cmp::Ordering;

/// Global order of merged records.
///
/// Faster times first, records without a time last, then fewer runs first.
/// Source and source rank make the order total so the result does not depend
/// on which source answered first.
pub fn compare_records(a: &Record, b: &Record) -> Ordering {
    let by_time = match (a.time, b.time) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_time
        .then(a.count.cmp(&b.count))
        .then(a.source.cmp(&b.source))
        .then(a.source_rank.cmp(&b.source_rank))
}

/// Sorts `records` and assigns competition ranks.
///
/// Equal times share a rank and the next distinct time skips ahead by the size
/// of the tie group (1, 1, 3). Records without a time take the rank that is
/// current when the walk reaches them and never advance it.
pub fn rank_records(mut records: Vec<Record>) -> Vec<RankedRecord> {
    records.sort_by(compare_records);

    let mut ranked = Vec::with_capacity(records.len());
    let mut rank = 1;
    let mut tied = 0;
    let mut previous_time = None;

    for record in records {
        if let Some(time) = record.time {
            if previous_time == Some(time) {
                tied += 1;
            } else {
                rank += tied;
                tied = 1;
            }
            previous_time = Some(time);
        }

        ranked.push(RankedRecord { rank, record });
    }

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;

    fn record(source: Source, source_rank: u32, time: Option<i32>, count: u32) -> Record {
        Record {
            source_rank,
            time,
            count,
            source,
        }
    }

    fn ranks(ranked: &[RankedRecord]) -> Vec<(u32, Source, Option<i32>)> {
        ranked
            .iter()
            .map(|r| (r.rank, r.record.source, r.record.time))
            .collect()
    }

    #[test]
    fn test_ties_share_rank_and_skip() {
        let ranked = rank_records(vec![
            record(Source::Pc, 1, Some(1000), 1),
            record(Source::Pc, 2, Some(1000), 1),
            record(Source::Pc, 3, Some(1000), 2),
            record(Source::Pc, 4, Some(1200), 1),
            record(Source::Pc, 5, Some(1300), 1),
        ]);
        assert_eq!(
            ranked.iter().map(|r| r.rank).collect::<Vec<_>>(),
            [1, 1, 1, 4, 5]
        );
    }

    #[test]
    fn test_absent_times_sort_last_and_keep_current_rank() {
        let ranked = rank_records(vec![
            record(Source::Pc, 1, None, 9),
            record(Source::Pc, 2, Some(5000), 1),
            record(Source::Pc, 3, Some(4000), 1),
            record(Source::Pc, 4, None, 1),
        ]);
        assert_eq!(
            ranks(&ranked),
            [
                (1, Source::Pc, Some(4000)),
                (2, Source::Pc, Some(5000)),
                (2, Source::Pc, None),
                (2, Source::Pc, None),
            ]
        );
        // Fewer runs first among records without a time
        assert_eq!(ranked[2].record.count, 1);
    }

    #[test]
    fn test_three_source_tie() {
        let ranked = rank_records(vec![
            record(Source::Pc, 1, Some(41000), 1),
            record(Source::Pc, 2, Some(42000), 1),
            record(Source::Xb1, 1, Some(41000), 1),
            record(Source::Xb1, 2, Some(43000), 1),
            record(Source::Ps4, 1, None, 1),
            record(Source::Ps4, 2, None, 1),
        ]);
        assert_eq!(
            ranks(&ranked),
            [
                (1, Source::Pc, Some(41000)),
                (1, Source::Xb1, Some(41000)),
                (3, Source::Pc, Some(42000)),
                (4, Source::Xb1, Some(43000)),
                (4, Source::Ps4, None),
                (4, Source::Ps4, None),
            ]
        );
    }

    #[test]
    fn test_ranking_ignores_arrival_order() {
        let pc = vec![
            record(Source::Pc, 1, Some(900), 2),
            record(Source::Pc, 2, Some(950), 1),
            record(Source::Pc, 3, None, 1),
        ];
        let xb1 = vec![
            record(Source::Xb1, 1, Some(900), 2),
            record(Source::Xb1, 2, Some(1000), 4),
        ];
        let ps4 = vec![
            record(Source::Ps4, 1, Some(950), 1),
            record(Source::Ps4, 2, None, 1),
        ];

        let orders = [
            [&pc, &xb1, &ps4],
            [&pc, &ps4, &xb1],
            [&xb1, &pc, &ps4],
            [&xb1, &ps4, &pc],
            [&ps4, &pc, &xb1],
            [&ps4, &xb1, &pc],
        ];

        let expected = rank_records(orders[0].iter().flat_map(|r| r.iter().copied()).collect());
        for order in &orders[1..] {
            let merged = order.iter().flat_map(|r| r.iter().copied()).collect();
            assert_eq!(rank_records(merged), expected);
        }
    }

    #[test]
    fn test_empty() {
        assert!(rank_records(Vec::new()).is_empty());
    }
}
