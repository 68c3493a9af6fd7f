pub mod events;
pub mod webhook;

pub use events::{
    AdvertisementPayload, ChannelMessagePayload, ContactMessagePayload,
    TelemetryResponsePayload, TraceDataPayload,
};
pub use webhook::WebhookEnvelope;
