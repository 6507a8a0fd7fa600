use super::SourceRecords;
use crate::errors::BackendError;
use crate::model::{Record, Source};
use crate::protocol::XmlElement;
use chrono::DateTime;

/// Wire value for "no time". Backends render it signed or unsigned.
const NO_TIME: i32 = -1;

/// Turns the `<c>` content of a `GetLeaderBoardSummary` response into records.
///
/// Each `<i>` becomes one record in source order. A missing `<s>` or `<c>`
/// counts as `0`; a value that is present but not a number fails the whole
/// payload.
pub fn decode_records(source: Source, content: &XmlElement) -> Result<SourceRecords, BackendError> {
    let timestamp = content
        .child_text("d")
        .and_then(|d| d.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    let records = content
        .children("i")
        .enumerate()
        .map(|(index, item)| {
            let time = item
                .child_text("s")
                .map(|raw| parse_time(source, raw))
                .transpose()?
                .unwrap_or(Some(0));

            let count = match item.child_text("c") {
                Some(raw) => raw.parse::<u32>().map_err(|_| {
                    BackendError::Malformed(source, format!("invalid record count {raw:?}"))
                })?,
                None => 0,
            };

            Ok(Record {
                source_rank: index as u32 + 1,
                time,
                count,
                source,
            })
        })
        .collect::<Result<Vec<_>, BackendError>>()?;

    Ok(SourceRecords {
        timestamp,
        records,
        error: None,
    })
}

fn parse_time(source: Source, raw: &str) -> Result<Option<i32>, BackendError> {
    let ms = raw
        .parse::<u32>()
        .map(|unsigned| unsigned as i32)
        .or_else(|_| raw.parse::<i32>().map_err(|_| ()))
        .ok()
        .filter(|ms| *ms >= 0 || *ms == NO_TIME)
        .ok_or_else(|| BackendError::Malformed(source, format!("invalid record time {raw:?}")))?;

    Ok((ms != NO_TIME).then_some(ms))
}
