pub mod auth;

pub use auth::{RequireKeyAuth, ensure_authorized};
