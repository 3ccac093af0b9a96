pub mod credentials;
pub mod record;
pub mod sheets;
