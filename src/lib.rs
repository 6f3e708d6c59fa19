pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod models;
pub mod playlist;
pub mod services;
pub mod utils;
pub mod web;
pub mod xtream;
