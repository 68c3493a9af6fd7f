use super::{EventContext, EventHandler, HandlerError};
use crate::entities::trace_path::NewTracePath;
use crate::store::{EventRow, IngestRecord};
use meshhub_sdk::objects::TraceDataPayload;
use serde_json::Value;

/// Stores path traces, deduplicated by initiator tag.
pub struct TraceHandler;

impl EventHandler for TraceHandler {
    fn prepare(
        &self,
        ctx: &EventContext<'_>,
        payload: &Value,
    ) -> Result<Option<IngestRecord>, HandlerError> {
        let trace: TraceDataPayload = ctx.decode(payload)?;
        let Some(initiator_tag) = trace.initiator_tag else {
            return Ok(ctx.missing("initiator_tag"));
        };

        let hop_count = trace
            .hop_count
            .or_else(|| trace.path_hashes.as_ref().map(|h| h.len() as i32));

        Ok(Some(IngestRecord {
            receiver: ctx.receiver_sighting(),
            subject: None,
            row: EventRow::TracePath(NewTracePath {
                initiator_tag,
                path_len: trace.path_len,
                flags: trace.flags,
                auth: trace.auth,
                path_hashes: trace.path_hashes,
                snr_values: trace.snr_values,
                hop_count,
                event_hash: ctx.hash.trace(initiator_tag),
            }),
            snr: None,
            received_at: ctx.received_at,
        }))
    }
}
