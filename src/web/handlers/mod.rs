pub mod channels;
pub mod health;
pub mod play;
pub mod playlist;
pub mod sessions;
pub mod xtream;
