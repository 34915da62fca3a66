//! The capture → recognise → store flow.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::api::{PlateApi, Recognition};
use crate::capture::Frame;
use crate::error::{Error, Result};
use crate::plate::PlateResult;
use crate::storage::Storage;
use crate::store::ResultStore;

/// What came of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A plate was recognised and stored.
    Saved(PlateResult),
    /// The API answered but read no plate; nothing was stored.
    NotRecognized,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::RequestInFlight);
        }
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Submits frames to a [`PlateApi`] and records the results.
///
/// At most one request is outstanding per recognizer; a concurrent call
/// fails fast with [`Error::RequestInFlight`].
pub struct Recognizer<'a, A: PlateApi> {
    api: A,
    store: ResultStore<'a>,
    images_dir: Option<PathBuf>,
    in_flight: AtomicBool,
}

impl<A: PlateApi> std::fmt::Debug for Recognizer<'_, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizer")
            .field("images_dir", &self.images_dir)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl<'a, A: PlateApi> Recognizer<'a, A> {
    /// Recognizer storing into `storage`.
    #[must_use]
    pub fn new(api: A, storage: &'a Storage) -> Self {
        Self {
            api,
            store: ResultStore::new(storage),
            images_dir: None,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Archive submitted images that were recognised into `dir`.
    #[must_use]
    pub fn keep_images_in(mut self, dir: PathBuf) -> Self {
        self.images_dir = Some(dir);
        self
    }

    /// Whether a request is currently outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The underlying API client.
    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Send `frame` for recognition and store the result if there is one.
    ///
    /// Nothing is stored on failure or when no plate is recognised. When
    /// images are kept, the plate is stored first; an image that cannot be
    /// archived is logged and the plate is kept without it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestInFlight`] if another submission is running,
    /// or the API/storage error that stopped this one.
    pub async fn submit(&self, frame: &Frame) -> Result<Outcome> {
        let _guard = InFlight::acquire(&self.in_flight)?;

        let (numberplate, confidence) = match self.api.recognize(frame).await? {
            Recognition::Plate {
                numberplate,
                confidence,
            } => (numberplate, confidence),
            Recognition::NotRecognized => {
                warn!("No numberplate detected or recognized");
                return Ok(Outcome::NotRecognized);
            }
        };

        let mut result = PlateResult::new(numberplate, confidence);
        self.store.append(result.clone())?;
        info!("Saved plate {} as {}", result.numberplate, result.id);

        if let Some(dir) = &self.images_dir {
            match frame.archive(dir) {
                Ok(path) => {
                    result = result.with_image(path);
                    self.store.update(result.clone())?;
                }
                Err(e) => warn!("Plate {} saved without its image: {}", result.id, e),
            }
        }
        Ok(Outcome::Saved(result))
    }

    /// Push the local list to the server and replace it with the reply.
    ///
    /// Returns the new local list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestInFlight`] if another request is running, or
    /// the API/storage error. Local storage is untouched on error.
    pub async fn sync(&self) -> Result<Vec<PlateResult>> {
        let _guard = InFlight::acquire(&self.in_flight)?;

        let local = self.store.list()?;
        let remote = self.api.sync(&local).await?;
        self.store.replace_all(&remote)?;
        info!(
            "Synced {} local plates, server returned {}",
            local.len(),
            remote.len()
        );
        Ok(remote)
    }
}
