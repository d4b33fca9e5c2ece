#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod progression;
pub mod seed;
pub mod server;
pub mod store;

pub use config::Config;
