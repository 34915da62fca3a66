//! The local result store.
//!
//! All results live in one JSON array under the [`PLATES_KEY`] key, in
//! insertion order. Every mutation reads the whole array, changes it and
//! writes it back.

use tracing::{debug, info};

use crate::error::Result;
use crate::plate::PlateResult;
use crate::storage::Storage;

/// Storage key holding the JSON array of results.
pub const PLATES_KEY: &str = "plates";

/// Ordered list of [`PlateResult`]s persisted in [`Storage`].
#[derive(Debug, Clone, Copy)]
pub struct ResultStore<'a> {
    storage: &'a Storage,
}

impl<'a> ResultStore<'a> {
    /// Wrap a storage handle.
    #[must_use]
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// All results, in insertion order. Empty when nothing has been stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails or the stored array is corrupt.
    pub fn list(&self) -> Result<Vec<PlateResult>> {
        match self.storage.get(PLATES_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Find a result by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored list cannot be read.
    pub fn get(&self, id: &str) -> Result<Option<PlateResult>> {
        Ok(self.list()?.into_iter().find(|p| p.id == id))
    }

    /// Number of stored results.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored list cannot be read.
    pub fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    /// Whether the store holds no results.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored list cannot be read.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Append a result at the end of the list.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored list cannot be read or written.
    pub fn append(&self, result: PlateResult) -> Result<()> {
        let mut results = self.list()?;
        debug!("Appending plate {} ({})", result.numberplate, result.id);
        results.push(result);
        self.save(&results)
    }

    /// Replace the entry sharing `result.id`, keeping its position.
    ///
    /// Returns `false`, without writing, if no entry has that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored list cannot be read or written.
    pub fn update(&self, result: PlateResult) -> Result<bool> {
        let mut results = self.list()?;
        let Some(slot) = results.iter_mut().find(|p| p.id == result.id) else {
            return Ok(false);
        };
        *slot = result;
        self.save(&results)?;
        Ok(true)
    }

    /// Delete the entry with the given id; the others keep their order.
    ///
    /// Returns `true` if anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored list cannot be read or written.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut results = self.list()?;
        let before = results.len();
        results.retain(|p| p.id != id);
        if results.len() == before {
            return Ok(false);
        }
        self.save(&results)?;
        info!("Deleted plate {}", id);
        Ok(true)
    }

    /// Remove every stored result.
    ///
    /// Returns how many results were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored list cannot be read or removed.
    pub fn clear(&self) -> Result<usize> {
        let count = self.len()?;
        self.storage.remove(PLATES_KEY)?;
        info!("Cleared {} plates", count);
        Ok(count)
    }

    /// Overwrite the whole list. Used by sync, where the server is authoritative.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be written.
    pub fn replace_all(&self, results: &[PlateResult]) -> Result<()> {
        info!("Replacing stored plates with {} entries", results.len());
        self.save(results)
    }

    fn save(&self, results: &[PlateResult]) -> Result<()> {
        let json = serde_json::to_string(results)?;
        self.storage.set(PLATES_KEY, &json)
    }
}
