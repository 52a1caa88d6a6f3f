//! REST API client module for the hosted content backend.
//!
//! This module provides the `ApiClient` for reading and upserting rows of
//! the `site_content` table through the backend's PostgREST endpoint.
//!
//! Every request carries the project's anon key in the `apikey` header.
//! Writes additionally need an admin access token sent as a bearer token.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
