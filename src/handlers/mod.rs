pub mod admin;
pub mod google_oauth;
pub mod webhook;
