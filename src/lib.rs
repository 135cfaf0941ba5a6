//! Outreach: influencer name collection and idempotent campaign sends.

pub mod campaign;
pub mod channels;
pub mod collector;
pub mod config;
pub mod error;
pub mod normalize;
pub mod store;
