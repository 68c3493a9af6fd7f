use super::{EventContext, EventHandler, HandlerError, normalize_public_key};
use crate::entities::advertisement::NewAdvertisement;
use crate::entities::node::NodeSighting;
use crate::hashing::AdvertisementIdentity;
use crate::store::{EventRow, IngestRecord};
use meshhub_sdk::objects::AdvertisementPayload;
use serde_json::Value;

/// Stores advertisements and refreshes the advertised node's details.
pub struct AdvertisementHandler;

impl EventHandler for AdvertisementHandler {
    fn prepare(
        &self,
        ctx: &EventContext<'_>,
        payload: &Value,
    ) -> Result<Option<IngestRecord>, HandlerError> {
        let advert: AdvertisementPayload = ctx.decode(payload)?;
        let Some(public_key) = normalize_public_key(advert.public_key.as_deref()) else {
            return Ok(ctx.missing("public_key"));
        };

        let event_hash = ctx.hash.advertisement(
            AdvertisementIdentity {
                public_key: &public_key,
                name: advert.name.as_deref(),
                adv_type: advert.adv_type.as_deref(),
                flags: advert.flags,
            },
            ctx.received_at.unix_timestamp(),
        );

        let subject = NodeSighting {
            public_key: public_key.clone(),
            name: advert.name.clone(),
            adv_type: advert.adv_type.clone(),
            flags: advert.flags,
            seen_at: ctx.received_at,
        };

        Ok(Some(IngestRecord {
            receiver: ctx.receiver_sighting(),
            subject: Some(subject),
            row: EventRow::Advertisement(NewAdvertisement {
                public_key,
                name: advert.name,
                adv_type: advert.adv_type,
                flags: advert.flags,
                event_hash,
            }),
            snr: None,
            received_at: ctx.received_at,
        }))
    }
}
