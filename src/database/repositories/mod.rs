//! SeaORM repository implementations
//!
//! Repositories return `DbErr` and leave the mapping to the calling service:
//! the session store surfaces failures as `StoreUnavailable`, catalog reads as
//! plain database errors.

pub mod channel;
pub mod credential;
pub mod epg_program;
pub mod session;
pub mod stream_id;

pub use channel::{ChannelCreateRequest, ChannelSeaOrmRepository};
pub use credential::CredentialSeaOrmRepository;
pub use epg_program::EpgProgramSeaOrmRepository;
pub use session::SessionSeaOrmRepository;
pub use stream_id::StreamIdSeaOrmRepository;
