//! Client for the external recognition API.
//!
//! The API is a black box: it takes a JPEG as a multipart `image` part and
//! answers `{"numberplate": "...", "confidence": 0.87}`. A missing or empty
//! `numberplate` means nothing was read, which is an ordinary outcome
//! ([`Recognition::NotRecognized`]) and not an error.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::capture::Frame;
use crate::config::{ApiVariant, Config};
use crate::error::{Error, Result};
use crate::plate::PlateResult;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// File name sent with the image part.
pub const IMAGE_FILE_NAME: &str = "numberplate.jpg";

/// Outcome of a recognition call that reached the API and got a 2xx.
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    /// A plate was read.
    Plate {
        /// The plate text.
        numberplate: String,
        /// Confidence in `[0, 1]`, if reported and sane.
        confidence: Option<f64>,
    },
    /// The API found no readable plate.
    NotRecognized,
}

impl Recognition {
    /// Interpret a 2xx response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiResponse`] if the body is not a JSON object or
    /// `numberplate` has the wrong type.
    pub fn from_json(body: &Value) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::api_response(format!("expected a JSON object, got {body}")))?;

        let numberplate = match object.get("numberplate") {
            None | Some(Value::Null) => return Ok(Self::NotRecognized),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(Self::NotRecognized),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => {
                return Err(Error::api_response(format!(
                    "numberplate should be a string, got {other}"
                )))
            }
        };

        let confidence = match object.get("confidence") {
            None | Some(Value::Null) => None,
            Some(value) => match value.as_f64() {
                Some(c) if c.is_finite() && (0.0..=1.0).contains(&c) => Some(c),
                _ => {
                    warn!("Ignoring out-of-range confidence {}", value);
                    None
                }
            },
        };

        Ok(Self::Plate {
            numberplate,
            confidence,
        })
    }
}

/// Where each call goes, derived from the base URL and API variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Recognition URL.
    pub recognize: String,
    /// Sync URL; only the mobile variant has one.
    pub sync: Option<String>,
}

impl Endpoints {
    /// Build the URLs for `base` (no trailing slash).
    #[must_use]
    pub fn new(base: &str, variant: ApiVariant) -> Self {
        match variant {
            ApiVariant::Web => Self {
                recognize: format!("{base}/api/process-plate"),
                sync: None,
            },
            ApiVariant::Mobile => Self {
                recognize: format!("{base}/numberplates/analyze"),
                sync: Some(format!("{base}/numberplates")),
            },
        }
    }
}

/// The operations the app needs from the remote side.
#[async_trait]
pub trait PlateApi: Send + Sync {
    /// Submit a frame for recognition.
    async fn recognize(&self, frame: &Frame) -> Result<Recognition>;

    /// Send the local results and get back the authoritative list.
    async fn sync(&self, local: &[PlateResult]) -> Result<Vec<PlateResult>>;
}

/// Body of a sync request.
#[derive(Debug, Serialize)]
pub struct SyncRequest<'a> {
    /// The full local list.
    pub numberplates: &'a [PlateResult],
}

/// [`PlateApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPlateApi {
    client: Client,
    endpoints: Endpoints,
}

impl HttpPlateApi {
    /// Client for `base` using the variant and timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: &str, config: &Config) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoints: Endpoints::new(base, config.api.variant),
        })
    }

    /// The URLs this client talks to.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

/// Turn a non-2xx response into [`Error::ApiStatus`].
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(Error::ApiStatus {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("").to_string(),
    })
}

async fn read_json(response: Response) -> Result<Value> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| Error::api_response(format!("body is not JSON: {e}")))
}

#[async_trait]
impl PlateApi for HttpPlateApi {
    async fn recognize(&self, frame: &Frame) -> Result<Recognition> {
        let part = Part::bytes(frame.jpeg.clone())
            .file_name(IMAGE_FILE_NAME)
            .mime_str("image/jpeg")?;
        let form = Form::new().part(IMAGE_FIELD, part);

        debug!(
            "POST {} ({} byte image)",
            self.endpoints.recognize,
            frame.jpeg.len()
        );
        let response = self
            .client
            .post(&self.endpoints.recognize)
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response)?;
        let recognition = Recognition::from_json(&read_json(response).await?)?;

        match &recognition {
            Recognition::Plate { numberplate, .. } => info!("API recognised {}", numberplate),
            Recognition::NotRecognized => info!("API found no plate"),
        }
        Ok(recognition)
    }

    async fn sync(&self, local: &[PlateResult]) -> Result<Vec<PlateResult>> {
        let Some(url) = &self.endpoints.sync else {
            return Err(Error::ConfigValidation {
                message: format!(
                    "sync is only available with api.variant = \"{}\"",
                    ApiVariant::Mobile
                ),
            });
        };

        debug!("POST {} ({} plates)", url, local.len());
        let body = SyncRequest {
            numberplates: local,
        };
        let response = self.client.post(url).json(&body).send().await?;
        let response = check_status(response)?;
        let value = read_json(response).await?;
        let remote: Vec<PlateResult> = serde_json::from_value(value)
            .map_err(|e| Error::api_response(format!("sync response: {e}")))?;

        info!("Sync returned {} plates", remote.len());
        Ok(remote)
    }
}
