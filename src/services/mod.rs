pub mod admission;
pub mod background;
pub mod catalog;
pub mod credentials;
pub mod entitlements;
pub mod playback;
pub mod scheduler;
pub mod session_store;
pub mod signer;

pub use admission::AdmissionController;
pub use background::{BackgroundTasks, BackgroundWorker};
pub use catalog::{CatalogService, EpgWindow};
pub use credentials::CredentialService;
pub use entitlements::{EntitlementResolver, EntitlementService, PlanCache};
pub use playback::PlaybackService;
pub use scheduler::ScheduledTask;
pub use session_store::SessionStore;
pub use signer::CapabilitySigner;
