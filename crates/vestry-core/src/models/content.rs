use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// Name of one editable HTML slot on a public page, e.g. `testimonials`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectionId(String);

impl SectionId {
    pub fn new(section: impl Into<String>) -> Result<Self, ApiError> {
        let section = section.into();
        if section.trim().is_empty() {
            return Err(ApiError::InvalidSection(section));
        }
        Ok(Self(section))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SectionId {
    type Error = ApiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SectionId {
    type Error = ApiError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SectionId> for String {
    fn from(id: SectionId) -> Self {
        id.0
    }
}

/// One row of the `site_content` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ContentRecord {
    #[serde(default)]
    pub id: String,
    pub section: String,
    /// Stored HTML; the column is nullable
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContentRecord {
    /// HTML body, or an empty string when the column is null
    pub fn html(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn display_updated(&self) -> String {
        match self.updated_at {
            Some(ts) => ts.format("%b %d, %Y %H:%M").to_string(),
            None => "never".to_string(),
        }
    }
}
