//! `plateshot` - numberplate capture client
//!
//! Captures a still image, sends it to an external numberplate recognition
//! API, and keeps the recognised plates in a small local store that can be
//! searched, sorted, pruned and synced.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod gallery;
pub mod logging;
pub mod plate;
pub mod recognize;
pub mod settings;
pub mod storage;
pub mod store;

pub use api::{HttpPlateApi, PlateApi, Recognition};
pub use capture::{CaptureSession, FileSource, Frame, FrameSource, SourceState, StdinSource};
pub use config::Config;
pub use error::{Error, Result};
pub use gallery::{GalleryQuery, SortOrder};
pub use logging::init_logging;
pub use plate::PlateResult;
pub use recognize::{Outcome, Recognizer};
pub use settings::Settings;
pub use storage::{Storage, StorageStats};
pub use store::ResultStore;
