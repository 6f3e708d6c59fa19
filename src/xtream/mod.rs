//! Xtream Codes front door

pub mod models;
pub mod service;

pub use models::{XtreamApiRequest, XtreamAuthFailure};
pub use service::XtreamService;
