//! Persisted biography records.
//!
//! The JSON field names and date encoding here are load-bearing: records
//! written by earlier releases must keep parsing, so every field
//! serializes under exactly the name shown on the struct and dates encode
//! as RFC 3339 strings. Decoding additionally tolerates epoch-seconds
//! timestamps found in the oldest records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A generated biography: metadata for one document/thumbnail pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biography {
    /// Unique identifier, also the stem of the on-disk filenames.
    pub id: String,
    /// Display title.
    pub title: String,
    /// The narrative text (or final status message for remote results).
    pub content: String,
    /// Path to the rendered PDF.
    pub pdf_path: PathBuf,
    /// Path to the thumbnail image, if one was generated.
    pub thumbnail_path: Option<PathBuf>,
    /// When the biography was first created.
    #[serde(with = "flexible_date")]
    pub created_at: DateTime<Utc>,
    /// When the record was last modified (rename, cover update).
    #[serde(with = "flexible_date")]
    pub updated_at: DateTime<Utc>,
}

impl Biography {
    /// Create a new record with both timestamps set to now.
    pub fn new(id: String, title: String, content: String, pdf_path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            content,
            pdf_path,
            thumbnail_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// RFC 3339 encoding with lenient decoding.
///
/// Serializes as an RFC 3339 string. Accepts either that string form or a
/// numeric unix timestamp (seconds) when reading.
mod flexible_date {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DateRepr {
        Text(String),
        Seconds(f64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match DateRepr::deserialize(deserializer)? {
            DateRepr::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| de::Error::custom(format!("invalid RFC 3339 date '{}': {}", s, e))),
            DateRepr::Seconds(secs) => Utc
                .timestamp_opt(secs as i64, 0)
                .single()
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", secs))),
        }
    }
}
