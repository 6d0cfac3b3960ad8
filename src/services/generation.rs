use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::multipart::Form;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::auth::CredentialStore;
use crate::error::PipelineError;
use crate::media::{ImageRef, LocalImage, REFETCHED_IMAGE_NAME, decode_data_url};

use super::http::{anonymous_cookie, build_service_client, image_part, service_error};

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    images: Vec<String>,
}

/// Client for the image-generation endpoint.
///
/// Applies one suggestion's instruction to a source image. The source may be
/// the user's uploaded file (first step), a URL returned by a previous step,
/// or a data URL; anything that is not already a file payload is
/// re-materialized before upload. Step calls carry no client-side deadline —
/// they rely on the transport default.
pub struct StepProcessor {
    base_url: String,
    client: Client,
    store: Arc<CredentialStore>,
}

impl StepProcessor {
    #[must_use]
    pub fn new(base_url: &str, store: Arc<CredentialStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_service_client(),
            store,
        }
    }

    /// Run one step: send `instruction` (the suggestion *description*) with
    /// the resolved source image, return the first produced image reference.
    pub async fn run(
        &self,
        source: &ImageRef,
        instruction: &str,
        step_index: usize,
    ) -> Result<ImageRef, PipelineError> {
        let payload = self.resolve_source(source).await?;

        let form = Form::new()
            .part(
                "image",
                image_part(&payload).map_err(|e| PipelineError::Unknown(e.to_string()))?,
            )
            .text("message", instruction.to_string());

        let url = format!("{}/api/chat-with-image", self.base_url);
        let mut request = self.client.post(&url).multipart(form);
        if let Some(token) = self.store.token() {
            request = request.bearer_auth(token);
        }
        if let Some(id) = self.store.anonymous_id() {
            request = request.header(COOKIE, anonymous_cookie(&id));
        }

        debug!(step = step_index + 1, source = %source.describe(), "applying suggestion");
        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Unknown(format!("step request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let body: GenerationResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Unknown(format!("unable to parse server response: {e}")))?;

        let Some(first) = body.images.into_iter().next() else {
            return Err(PipelineError::MalformedResponse(
                "no image was generated".into(),
            ));
        };
        Ok(ImageRef::Remote(first))
    }

    /// Normalize any source representation into a file-like payload.
    async fn resolve_source(&self, source: &ImageRef) -> Result<LocalImage, PipelineError> {
        match source {
            ImageRef::Local(image) => Ok(image.clone()),
            ImageRef::Remote(url) if url.starts_with("data:") => {
                decode_data_url(url).map_err(|e| PipelineError::SourceUnavailable(e.to_string()))
            }
            ImageRef::Remote(url) => self.fetch_remote(url).await,
        }
    }

    async fn fetch_remote(&self, raw: &str) -> Result<LocalImage, PipelineError> {
        let url = self.resolve_source_url(raw)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(format!("fetching {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::SourceUnavailable(format!(
                "status {} fetching {url}",
                response.status()
            )));
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok())
            .map_or_else(
                || mime::IMAGE_JPEG.essence_str().to_string(),
                |m| m.essence_str().to_string(),
            );

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(format!("reading {url}: {e}")))?;

        Ok(LocalImage::new(
            bytes.to_vec(),
            mime_type,
            REFETCHED_IMAGE_NAME,
        ))
    }

    /// Service URLs come back absolute or server-relative; relative ones are
    /// resolved against the service base.
    fn resolve_source_url(&self, raw: &str) -> Result<Url, PipelineError> {
        if let Ok(url) = Url::parse(raw) {
            return Ok(url);
        }
        Url::parse(&self.base_url)
            .and_then(|base| base.join(raw))
            .map_err(|e| PipelineError::SourceUnavailable(format!("invalid source URL {raw}: {e}")))
    }
}
