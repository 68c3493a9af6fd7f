use super::{EventContext, EventHandler, HandlerError, normalize_public_key};
use crate::entities::node::NodeSighting;
use crate::entities::telemetry::NewTelemetry;
use crate::store::{EventRow, IngestRecord};
use meshhub_sdk::objects::TelemetryResponsePayload;
use serde_json::Value;

/// Stores telemetry and marks the reporting node as seen.
pub struct TelemetryHandler;

impl EventHandler for TelemetryHandler {
    fn prepare(
        &self,
        ctx: &EventContext<'_>,
        payload: &Value,
    ) -> Result<Option<IngestRecord>, HandlerError> {
        let report: TelemetryResponsePayload = ctx.decode(payload)?;
        let Some(node_public_key) = normalize_public_key(report.node_public_key.as_deref())
        else {
            return Ok(ctx.missing("node_public_key"));
        };

        let event_hash = ctx.hash.telemetry(
            &node_public_key,
            report.parsed_data.as_ref(),
            ctx.received_at.unix_timestamp(),
        );

        Ok(Some(IngestRecord {
            receiver: ctx.receiver_sighting(),
            subject: Some(NodeSighting::bare(node_public_key.clone(), ctx.received_at)),
            row: EventRow::Telemetry(NewTelemetry {
                node_public_key,
                lpp_data: report.lpp_data,
                parsed_data: report.parsed_data,
                event_hash,
            }),
            snr: None,
            received_at: ctx.received_at,
        }))
    }
}
