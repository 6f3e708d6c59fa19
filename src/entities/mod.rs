//! SeaORM entity models for the gateway's tables

pub mod prelude;

pub mod api_tokens;
pub mod channel_stream_ids;
pub mod channels;
pub mod epg_programs;
pub mod sessions;
pub mod subscriptions;
