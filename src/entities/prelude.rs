pub use super::api_tokens::Entity as ApiTokens;
pub use super::channel_stream_ids::Entity as ChannelStreamIds;
pub use super::channels::Entity as Channels;
pub use super::epg_programs::Entity as EpgPrograms;
pub use super::sessions::Entity as Sessions;
pub use super::subscriptions::Entity as Subscriptions;
