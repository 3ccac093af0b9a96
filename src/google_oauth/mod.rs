//! Google OAuth2: token endpoint access and the token lifecycle built on it.

pub mod endpoints;
pub mod service;

pub use endpoints::{GoogleOauthEndpoints, TokenEndpoint, TokenGrant};
pub use service::TokenManager;
