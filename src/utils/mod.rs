pub mod clock;
pub mod hashing;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock, system_clock};
pub use hashing::{generate_token, hash_token, log_prefix};
