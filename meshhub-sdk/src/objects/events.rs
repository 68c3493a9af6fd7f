//! Payloads published by gateways on `<prefix>/<public_key>/event/<name>`.
//!
//! Every field is optional on the wire. Which fields are *required* for an
//! event to be persisted is decided by the ingestion handlers, not here, so
//! a malformed event can still be logged verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `advertisement`: a node announcing its identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvertisementPayload {
    pub public_key: Option<String>,
    #[serde(alias = "adv_name")]
    pub name: Option<String>,
    pub adv_type: Option<String>,
    pub flags: Option<i64>,
}

/// `contact_msg_recv`: a direct message addressed to the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactMessagePayload {
    pub pubkey_prefix: Option<String>,
    pub text: Option<String>,
    pub path_len: Option<i32>,
    pub txt_type: Option<i32>,
    pub signature: Option<String>,
    pub snr: Option<f64>,
    /// Older firmware spells the field `SNR`; some gateways send both.
    #[serde(rename = "SNR", skip_serializing_if = "Option::is_none")]
    pub snr_legacy: Option<f64>,
    pub sender_timestamp: Option<i64>,
}

impl ContactMessagePayload {
    /// `snr`, falling back to `SNR`.
    pub fn reported_snr(&self) -> Option<f64> {
        self.snr.or(self.snr_legacy)
    }
}

/// `channel_msg_recv`: a message broadcast on a numbered channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessagePayload {
    pub channel_idx: Option<i32>,
    pub text: Option<String>,
    pub path_len: Option<i32>,
    pub txt_type: Option<i32>,
    pub snr: Option<f64>,
    #[serde(rename = "SNR", skip_serializing_if = "Option::is_none")]
    pub snr_legacy: Option<f64>,
    pub sender_timestamp: Option<i64>,
}

impl ChannelMessagePayload {
    /// `snr`, falling back to `SNR`.
    pub fn reported_snr(&self) -> Option<f64> {
        self.snr.or(self.snr_legacy)
    }
}

/// `trace_data`: the result of a path trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceDataPayload {
    #[serde(alias = "tag")]
    pub initiator_tag: Option<i64>,
    pub path_len: Option<i32>,
    pub flags: Option<i32>,
    pub auth: Option<i64>,
    pub path_hashes: Option<Vec<String>>,
    pub snr_values: Option<Vec<f64>>,
    pub hop_count: Option<i32>,
}

/// `telemetry_response`: sensor readings reported by a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryResponsePayload {
    #[serde(alias = "pubkey")]
    pub node_public_key: Option<String>,
    pub lpp_data: Option<String>,
    pub parsed_data: Option<Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_accepts_uppercase_snr() {
        let payload: ChannelMessagePayload = serde_json::from_str(
            r#"{"channel_idx": 2, "text": "hi", "SNR": 7.5, "sender_timestamp": 1700000000}"#,
        )
        .unwrap();
        assert_eq!(payload.channel_idx, Some(2));
        assert_eq!(payload.reported_snr(), Some(7.5));
    }

    #[test]
    fn test_message_accepts_both_snr_spellings() {
        let payload: ChannelMessagePayload = serde_json::from_str(
            r#"{"channel_idx": 0, "text": "hi", "snr": 5.0, "SNR": 4.0}"#,
        )
        .unwrap();
        assert_eq!(payload.reported_snr(), Some(5.0));

        let payload: ContactMessagePayload = serde_json::from_str(
            r#"{"pubkey_prefix": "abcdef", "text": "hi", "SNR": 3.5, "snr": 6.0}"#,
        )
        .unwrap();
        assert_eq!(payload.reported_snr(), Some(6.0));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let payload: AdvertisementPayload = serde_json::from_str(
            r#"{"public_key": "ab", "adv_name": "Relay", "lat": 1.0, "lon": 2.0}"#,
        )
        .unwrap();
        assert_eq!(payload.name.as_deref(), Some("Relay"));
        assert!(payload.adv_type.is_none());
    }
}
