//! Admin credential storage.
//!
//! Reads only need the project's public anon key. Writes to `site_content`
//! pass row-level security only with an admin access token, which
//! `CredentialStore` keeps in the OS keychain per project URL.

pub mod credentials;

pub use credentials::CredentialStore;
