//! M3U playlist front door

pub mod generator;

pub use generator::{M3U_CONTENT_TYPE, PlaylistGenerator};
