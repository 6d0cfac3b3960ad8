pub mod client;
pub mod store;

pub use client::{AuthClient, AuthSession, UserProfile, is_strong_password, is_valid_email};
pub use store::CredentialStore;
