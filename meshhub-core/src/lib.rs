#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod entities;
pub mod events;
pub mod filter;
pub mod framework;
pub mod handlers;
pub mod hashing;
pub mod processors;
pub mod store;

#[cfg(test)]
mod test_utils;
