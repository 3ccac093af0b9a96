pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod google_oauth;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use error::RelayError;
pub use router::{RelayState, relay_router};
