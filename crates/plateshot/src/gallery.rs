//! Gallery: searching, sorting and rendering stored results.
//!
//! Everything here is a pure function over a slice of [`PlateResult`]s; the
//! store is read once by the caller.

use std::cmp::Ordering;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::plate::PlateResult;

/// Message shown when nothing has been stored yet.
pub const EMPTY_MESSAGE: &str = "No numberplates saved yet";

/// How to order gallery entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recent first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
    /// By plate text, ignoring case.
    Alphabetical,
}

impl SortOrder {
    fn compare(self, a: &PlateResult, b: &PlateResult) -> Ordering {
        match self {
            Self::Newest => b.timestamp.cmp(&a.timestamp),
            Self::Oldest => a.timestamp.cmp(&b.timestamp),
            Self::Alphabetical => a
                .numberplate
                .to_lowercase()
                .cmp(&b.numberplate.to_lowercase())
                .then_with(|| a.numberplate.cmp(&b.numberplate)),
        }
    }
}

/// A search term plus an ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryQuery {
    /// Case-insensitive substring to match against plate text.
    pub search: Option<String>,
    /// Result ordering.
    pub sort: SortOrder,
}

impl GalleryQuery {
    /// The effective search term; blank terms count as no search.
    fn term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Filter and sort `results`. The input is left untouched; sorting is stable.
    #[must_use]
    pub fn apply(&self, results: &[PlateResult]) -> Vec<PlateResult> {
        let mut view: Vec<PlateResult> = match self.term() {
            Some(term) => results.iter().filter(|p| p.matches(term)).cloned().collect(),
            None => results.to_vec(),
        };
        view.sort_by(|a, b| self.sort.compare(a, b));
        view
    }

    /// What to show when `apply` returned nothing.
    ///
    /// `total` is the number of stored results before filtering.
    #[must_use]
    pub fn empty_message(&self, total: usize) -> String {
        match self.term() {
            Some(term) if total > 0 => format!("No numberplates match '{term}'"),
            _ => EMPTY_MESSAGE.to_string(),
        }
    }
}

fn format_time(plate: &PlateResult) -> String {
    plate.created_at().map_or_else(
        || plate.timestamp.to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn format_confidence(plate: &PlateResult) -> String {
    plate
        .confidence_percent()
        .map_or_else(|| "-".to_string(), |p| format!("{p}%"))
}

/// What `gallery clear` says before deleting anything.
#[must_use]
pub fn clear_notice(count: usize) -> String {
    if count == 0 {
        EMPTY_MESSAGE.to_string()
    } else {
        format!("This will delete all {count} saved numberplates.\nUse --yes to confirm.")
    }
}

/// One line per result: `<plate>  <time>  <confidence>  [<id>]`.
#[must_use]
pub fn render_plain(results: &[PlateResult]) -> String {
    let mut out = String::new();
    for plate in results {
        let _ = writeln!(
            out,
            "{}  {}  {}  [{}]",
            plate.numberplate,
            format_time(plate),
            format_confidence(plate),
            plate.id
        );
    }
    out
}

/// An aligned table with a header row.
#[must_use]
pub fn render_table(results: &[PlateResult]) -> String {
    let plate_width = results
        .iter()
        .map(|p| p.numberplate.chars().count())
        .max()
        .unwrap_or(0)
        .max("NUMBERPLATE".len());
    let id_width = results
        .iter()
        .map(|p| p.id.len())
        .max()
        .unwrap_or(0)
        .max("ID".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<id_width$}  {:<plate_width$}  {:<19}  {:>10}",
        "ID", "NUMBERPLATE", "CAPTURED", "CONFIDENCE"
    );
    for plate in results {
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<plate_width$}  {:<19}  {:>10}",
            plate.id,
            plate.numberplate,
            format_time(plate),
            format_confidence(plate)
        );
    }
    out
}
