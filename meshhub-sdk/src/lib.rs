//! Wire-level types for meshhub.
//!
//! Everything a third party needs to talk to the ingestion pipeline without
//! pulling in the database or runtime: the MQTT topic scheme, the typed JSON
//! payloads published by gateways, and the webhook envelope together with
//! its signature scheme.

#![forbid(unsafe_code)]

pub mod objects;
pub mod signature;
pub mod topic;
