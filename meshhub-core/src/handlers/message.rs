use super::{EventContext, EventHandler, HandlerError};
use crate::entities::message::{MessageType, NewMessage};
use crate::hashing::MessageSender;
use crate::store::{EventRow, IngestRecord};
use meshhub_sdk::objects::{ChannelMessagePayload, ContactMessagePayload};
use serde_json::Value;

/// Direct messages received by the gateway.
pub struct ContactMessageHandler;

/// Channel broadcasts received by the gateway.
pub struct ChannelMessageHandler;

impl EventHandler for ContactMessageHandler {
    fn prepare(
        &self,
        ctx: &EventContext<'_>,
        payload: &Value,
    ) -> Result<Option<IngestRecord>, HandlerError> {
        let msg: ContactMessagePayload = ctx.decode(payload)?;
        let snr = msg.reported_snr();
        let Some(text) = msg.text.filter(|t| !t.is_empty()) else {
            return Ok(ctx.missing("text"));
        };

        let event_hash = ctx.hash.message(
            &text,
            MessageSender::Contact(msg.pubkey_prefix.as_deref()),
            msg.txt_type,
            msg.sender_timestamp,
        );

        Ok(Some(record(
            ctx,
            NewMessage {
                message_type: MessageType::Contact,
                pubkey_prefix: msg.pubkey_prefix,
                channel_idx: None,
                text,
                path_len: msg.path_len,
                txt_type: msg.txt_type,
                signature: msg.signature,
                snr,
                sender_timestamp: msg.sender_timestamp,
                event_hash,
            },
        )))
    }
}

impl EventHandler for ChannelMessageHandler {
    fn prepare(
        &self,
        ctx: &EventContext<'_>,
        payload: &Value,
    ) -> Result<Option<IngestRecord>, HandlerError> {
        let msg: ChannelMessagePayload = ctx.decode(payload)?;
        let snr = msg.reported_snr();
        let Some(text) = msg.text.filter(|t| !t.is_empty()) else {
            return Ok(ctx.missing("text"));
        };

        let event_hash = ctx.hash.message(
            &text,
            MessageSender::Channel(msg.channel_idx),
            msg.txt_type,
            msg.sender_timestamp,
        );

        Ok(Some(record(
            ctx,
            NewMessage {
                message_type: MessageType::Channel,
                pubkey_prefix: None,
                channel_idx: msg.channel_idx,
                text,
                path_len: msg.path_len,
                txt_type: msg.txt_type,
                signature: None,
                snr,
                sender_timestamp: msg.sender_timestamp,
                event_hash,
            },
        )))
    }
}

fn record(ctx: &EventContext<'_>, message: NewMessage) -> IngestRecord {
    IngestRecord {
        receiver: ctx.receiver_sighting(),
        subject: None,
        snr: message.snr,
        row: EventRow::Message(message),
        received_at: ctx.received_at,
    }
}
