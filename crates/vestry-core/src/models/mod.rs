//! Data models for website content.
//!
//! - `SectionId`: validated key naming one editable HTML slot
//! - `ContentRecord`: a row of the hosted `site_content` table

pub mod content;

pub use content::{ContentRecord, SectionId};
