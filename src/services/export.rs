use std::path::Path;
use std::sync::Arc;

use reqwest::Client;
use reqwest::header::COOKIE;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::auth::CredentialStore;
use crate::error::ExportError;
use crate::pipeline::ResultHistory;
use crate::services::Suggestion;

use super::http::{anonymous_cookie, build_service_client, error_message_from_body};

#[derive(Debug, Serialize)]
struct SaveRequest<'a> {
    result_image: &'a str,
    suggestions: Vec<&'a Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_original_upload: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    #[serde(default)]
    success: bool,
    download_url: Option<String>,
    clipboard_content: Option<String>,
    error: Option<String>,
}

/// A server-prepared export of the selected result.
#[derive(Debug, Clone)]
pub struct SavedResult {
    pub download_url: String,
    pub clipboard_content: Option<String>,
}

/// Client for the save/export endpoint.
///
/// What gets exported is `ResultHistory::final_result()`: the last step when
/// the run completed, otherwise the most recent completed step.
pub struct ResultExporter {
    base_url: String,
    client: Client,
    store: Arc<CredentialStore>,
}

impl ResultExporter {
    #[must_use]
    pub fn new(base_url: &str, store: Arc<CredentialStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_service_client(),
            store,
        }
    }

    /// Register the export server-side and get back a download URL plus the
    /// formatted suggestion text.
    pub async fn save(&self, history: &ResultHistory) -> Result<SavedResult, ExportError> {
        let Some(final_step) = history.final_result() else {
            return Err(ExportError::NoResults);
        };
        let Some(result_image) = final_step.image.url() else {
            return Err(ExportError::Rejected(
                "result image has no server address".into(),
            ));
        };

        let request = SaveRequest {
            result_image,
            suggestions: history.iter().map(|r| &r.suggestion).collect(),
            use_original_upload: None,
        };

        let url = format!("{}/api/save-results", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(token) = self.store.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(id) = self.store.anonymous_id() {
            builder = builder.header(COOKIE, anonymous_cookie(&id));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExportError::Rejected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExportError::Rejected(error_message_from_body(
                &body,
                status.as_u16(),
            )));
        }

        let body: SaveResponse = response
            .json()
            .await
            .map_err(|e| ExportError::Rejected(e.to_string()))?;

        if !body.success {
            return Err(ExportError::Rejected(
                body.error.unwrap_or_else(|| "could not save the image".into()),
            ));
        }
        let download_url = body
            .download_url
            .ok_or_else(|| ExportError::Rejected("save response missing download URL".into()))?;

        info!(download_url = %download_url, "result registered for download");
        Ok(SavedResult {
            download_url,
            clipboard_content: body.clipboard_content,
        })
    }

    /// Fetch a prepared download to a local file.
    pub async fn download(&self, download_url: &str, dest: &Path) -> Result<(), ExportError> {
        let url = self
            .resolve_url(download_url)
            .map_err(ExportError::Download)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ExportError::Download(format!("fetching {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(ExportError::Download(format!(
                "status {} fetching {url}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::Download(e.to_string()))?;
        tokio::fs::write(dest, &bytes).await?;
        info!(path = %dest.display(), bytes = bytes.len(), "result downloaded");
        Ok(())
    }

    fn resolve_url(&self, raw: &str) -> Result<Url, String> {
        if let Ok(url) = Url::parse(raw) {
            return Ok(url);
        }
        Url::parse(&self.base_url)
            .and_then(|base| base.join(raw))
            .map_err(|e| format!("invalid download URL {raw}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ImageRef;
    use crate::pipeline::StepResult;
    use chrono::Utc;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(dir: &TempDir) -> Arc<CredentialStore> {
        Arc::new(CredentialStore::load_or_init(&dir.path().join("credentials.json")).unwrap())
    }

    fn history_with(indices: &[usize]) -> ResultHistory {
        let mut history = ResultHistory::new();
        for &index in indices {
            history.append(StepResult {
                index,
                suggestion: Suggestion {
                    title: format!("Step {index}"),
                    description: format!("description {index}"),
                },
                image: ImageRef::Remote(format!("/generated/{index}.png")),
                completed_at: Utc::now(),
            });
        }
        history
    }

    #[tokio::test]
    async fn save_posts_final_result_and_all_step_suggestions() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/save-results"))
            .and(body_partial_json(serde_json::json!({
                "result_image": "/generated/2.png",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "download_url": "/api/download/abc",
                "clipboard_content": "1. Step 0\n",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let exporter = ResultExporter::new(&server.uri(), store(&dir));
        let saved = exporter.save(&history_with(&[0, 1, 2])).await.unwrap();

        assert_eq!(saved.download_url, "/api/download/abc");
        assert_eq!(saved.clipboard_content.as_deref(), Some("1. Step 0\n"));
    }

    #[tokio::test]
    async fn save_of_partial_run_exports_latest_step() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/save-results"))
            .and(body_partial_json(serde_json::json!({
                "result_image": "/generated/1.png",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "download_url": "/api/download/xyz",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let exporter = ResultExporter::new(&server.uri(), store(&dir));
        let saved = exporter.save(&history_with(&[0, 1])).await.unwrap();

        assert_eq!(saved.download_url, "/api/download/xyz");
    }

    #[tokio::test]
    async fn save_with_no_results_fails_locally() {
        let dir = TempDir::new().unwrap();
        let exporter = ResultExporter::new("http://127.0.0.1:1", store(&dir));
        let err = exporter.save(&ResultHistory::new()).await.unwrap_err();
        assert!(matches!(err, ExportError::NoResults));
    }

    #[tokio::test]
    async fn save_surfaces_server_rejection() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/save-results"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "Result image not found"
            })))
            .mount(&server)
            .await;

        let exporter = ResultExporter::new(&server.uri(), store(&dir));
        let err = exporter.save(&history_with(&[0])).await.unwrap_err();

        assert!(matches!(err, ExportError::Rejected(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn download_writes_the_fetched_file() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/download/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
            .mount(&server)
            .await;

        let exporter = ResultExporter::new(&server.uri(), store(&dir));
        let dest = dir.path().join("result.jpg");
        exporter.download("/api/download/abc", &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg-bytes");
    }
}
