use super::{EventContext, EventHandler, HandlerError};
use crate::entities::event_log::NewEventLog;
use crate::store::{EventRow, IngestRecord};
use serde_json::Value;
use tracing::debug;

/// Fallback for event names without a dedicated handler.
pub struct EventLogHandler;

impl EventHandler for EventLogHandler {
    fn prepare(
        &self,
        ctx: &EventContext<'_>,
        payload: &Value,
    ) -> Result<Option<IngestRecord>, HandlerError> {
        debug!(event_type = %ctx.event_name, "No dedicated handler, logging raw payload");
        Ok(Some(IngestRecord {
            receiver: ctx.receiver_sighting(),
            subject: None,
            row: EventRow::Log(NewEventLog {
                event_type: ctx.event_name.to_string(),
                payload: payload.clone(),
            }),
            snr: None,
            received_at: ctx.received_at,
        }))
    }
}
