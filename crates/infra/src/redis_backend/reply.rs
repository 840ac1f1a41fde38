//! Stream reply decoding

use layercache_domain::constants::STREAM_PAYLOAD_FIELD;
use layercache_domain::{CacheError, CacheResult, EventId, StreamEvent};
use redis::streams::{StreamId, StreamKey};
use tracing::warn;

/// Decode one stream entry; the payload is the `message` field
pub(crate) fn stream_event(stream: &str, entry: &StreamId) -> CacheResult<StreamEvent> {
    let id: EventId = entry.id.parse()?;
    let payload: Vec<u8> = entry.get(STREAM_PAYLOAD_FIELD).ok_or_else(|| {
        CacheError::serialization(format!(
            "stream entry {id} on '{stream}' has no '{STREAM_PAYLOAD_FIELD}' field"
        ))
    })?;
    Ok(StreamEvent::new(stream, id, payload))
}

/// Decode entries, skipping (and logging) any that are malformed
pub(crate) fn stream_events<'a>(
    stream: &str,
    entries: impl IntoIterator<Item = &'a StreamId>,
) -> Vec<StreamEvent> {
    entries
        .into_iter()
        .filter_map(|entry| match stream_event(stream, entry) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(stream, id = %entry.id, error = %err, "skipping malformed stream entry");
                None
            }
        })
        .collect()
}

/// Entries of `stream` in an `XREADGROUP` reply
pub(crate) fn read_reply_events(stream: &str, keys: &[StreamKey]) -> Vec<StreamEvent> {
    keys.iter()
        .filter(|key| key.key == stream)
        .flat_map(|key| stream_events(stream, &key.ids))
        .collect()
}
