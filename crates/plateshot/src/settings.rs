//! User settings: the recognition endpoint.
//!
//! The endpoint is saved in storage under [`ENDPOINT_KEY`]. Input is
//! validated before anything is written, so a rejected value never replaces
//! a good one.

use tracing::info;
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Storage key holding the saved endpoint.
pub const ENDPOINT_KEY: &str = "api_endpoint";

/// Validate an endpoint base URL and return its normalised form.
///
/// The URL must be absolute `http` or `https` with a host, and have no query
/// or fragment. Surrounding whitespace and trailing slashes are removed so
/// paths can be appended directly.
///
/// # Errors
///
/// Returns [`Error::InvalidEndpoint`] describing why the input was rejected.
pub fn parse_endpoint(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_endpoint(input, "empty"));
    }

    let url = Url::parse(trimmed).map_err(|e| Error::invalid_endpoint(input, e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::invalid_endpoint(
            input,
            format!("unsupported scheme '{}', expected http or https", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::invalid_endpoint(input, "missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::invalid_endpoint(
            input,
            "query strings and fragments are not allowed",
        ));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Read and write persisted settings.
#[derive(Debug, Clone, Copy)]
pub struct Settings<'a> {
    storage: &'a Storage,
}

impl<'a> Settings<'a> {
    /// Wrap a storage handle.
    #[must_use]
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// The saved endpoint, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn endpoint(&self) -> Result<Option<String>> {
        self.storage.get(ENDPOINT_KEY)
    }

    /// Validate and save a new endpoint, returning the normalised value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] (leaving the saved value untouched)
    /// or a storage error.
    pub fn save_endpoint(&self, input: &str) -> Result<String> {
        let endpoint = parse_endpoint(input)?;
        self.storage.set(ENDPOINT_KEY, &endpoint)?;
        info!("Saved API endpoint {}", endpoint);
        Ok(endpoint)
    }

    /// Forget the saved endpoint.
    ///
    /// Returns `true` if one was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear_endpoint(&self) -> Result<bool> {
        self.storage.remove(ENDPOINT_KEY)
    }

    /// The endpoint to use: the saved one, else `api.endpoint` from config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndpointNotConfigured`] when neither is set.
    pub fn effective_endpoint(&self, config: &Config) -> Result<String> {
        if let Some(saved) = self.endpoint()? {
            return Ok(saved);
        }
        match &config.api.endpoint {
            Some(fallback) => parse_endpoint(fallback),
            None => Err(Error::EndpointNotConfigured),
        }
    }

    /// Like [`effective_endpoint`](Self::effective_endpoint), but an unset
    /// endpoint is `None` rather than an error.
    ///
    /// # Errors
    ///
    /// Returns storage errors and an invalid configured endpoint.
    pub fn configured_endpoint(&self, config: &Config) -> Result<Option<String>> {
        match self.effective_endpoint(config) {
            Ok(endpoint) => Ok(Some(endpoint)),
            Err(Error::EndpointNotConfigured) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
