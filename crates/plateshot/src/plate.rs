//! The recognised-plate record.
//!
//! A [`PlateResult`] is created once per successful recognition and is what
//! the result store persists, the gallery lists and sync exchanges.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recognised numberplate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateResult {
    /// Opaque identifier, derived from the creation time.
    pub id: String,

    /// The recognised plate text.
    pub numberplate: String,

    /// Creation time in epoch milliseconds.
    pub timestamp: i64,

    /// Recognition confidence in `[0, 1]`, when the API reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Archived copy of the submitted image, when one was kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

impl PlateResult {
    /// Create a result stamped with the current time.
    #[must_use]
    pub fn new(numberplate: impl Into<String>, confidence: Option<f64>) -> Self {
        Self::at(Utc::now().timestamp_millis(), numberplate, confidence)
    }

    /// Create a result for the given epoch-millisecond timestamp.
    ///
    /// The id is the timestamp in decimal.
    #[must_use]
    pub fn at(timestamp: i64, numberplate: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            id: timestamp.to_string(),
            numberplate: numberplate.into(),
            timestamp,
            confidence,
            image: None,
        }
    }

    /// Attach the path of an archived image.
    #[must_use]
    pub fn with_image(mut self, image: PathBuf) -> Self {
        self.image = Some(image);
        self
    }

    /// The creation time as a `DateTime`, if the timestamp is in range.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Confidence as a whole percentage, e.g. `0.87` → `87`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn confidence_percent(&self) -> Option<u8> {
        self.confidence
            .map(|c| (c.clamp(0.0, 1.0) * 100.0).round() as u8)
    }

    /// Case-insensitive substring match against the plate text.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        self.numberplate
            .to_lowercase()
            .contains(&term.to_lowercase())
    }
}
