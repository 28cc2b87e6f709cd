pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod poll;
pub mod session;
