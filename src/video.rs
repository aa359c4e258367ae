//! Background video synthesis via a long-running generation job.
//!
//! The protocol is submit → poll → fetch: a job is submitted to the
//! `predictLongRunning` endpoint, its operation is re-queried on a fixed
//! interval until `done`, and the resulting locator is downloaded with the
//! API key appended. The wait is open-ended unless a deadline is set; the
//! backend's own job lifetime is the only bound, matching the source.

use crate::error::{classify_http_error, Result, SyncError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "veo-3.1-fast-generate-preview";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(8);

/// A playable video payload.
///
/// Exists only after successful job completion; cleared whenever an edit
/// starts so a stale clip never plays over a changed image.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundVideo {
    /// Raw video bytes.
    pub data: Vec<u8>,
    /// Media type, e.g. "video/mp4".
    pub mime_type: String,
}

impl BackgroundVideo {
    /// Returns the size of the video data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the video to the specified path.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

/// Builder for [`VideoClient`].
#[derive(Debug, Clone)]
pub struct VideoClientBuilder {
    api_key: Option<String>,
    model: Option<String>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl Default for VideoClientBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

impl VideoClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to the `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the video model id.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the polling interval for job status checks.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets an overall deadline for the job. Unset means wait forever.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client, resolving the API key.
    pub fn build(self) -> Result<VideoClient> {
        let api_key = crate::resolve_api_key(self.api_key)?;
        Ok(VideoClient {
            client: reqwest::Client::new(),
            api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        })
    }
}

/// Client for the asynchronous video-generation job endpoint.
pub struct VideoClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl VideoClient {
    /// Creates a new `VideoClientBuilder`.
    pub fn builder() -> VideoClientBuilder {
        VideoClientBuilder::new()
    }

    /// Generates a short cinematic clip of a landmark.
    ///
    /// Runs the full submit → poll → fetch protocol. Errors at any stage
    /// propagate; the orchestrator treats them as "no video available".
    pub async fn generate(&self, landmark: &str, city: &str) -> Result<BackgroundVideo> {
        let operation_name = self.submit(landmark, city).await?;
        tracing::debug!(operation = %operation_name, "submitted video generation job");

        let video_uri = self.poll(&operation_name).await?;
        tracing::debug!(uri = %video_uri, "video job complete, fetching result");

        let data = self.download(&video_uri).await?;
        Ok(BackgroundVideo {
            data,
            mime_type: "video/mp4".to_string(),
        })
    }

    /// Checks that the video model is reachable with the configured key.
    pub async fn health_check(&self) -> Result<()> {
        crate::model_health_check(
            &self.client,
            &format!("{BASE_URL}/models"),
            &self.model,
            &self.api_key,
        )
        .await
    }

    async fn submit(&self, landmark: &str, city: &str) -> Result<String> {
        let url = format!("{}/models/{}:predictLongRunning", BASE_URL, self.model);
        let body = VideoJobRequest::for_landmark(landmark, city);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &text, &headers));
        }

        let operation: OperationResponse = response.json().await?;
        Ok(operation.name)
    }

    async fn poll(&self, operation_name: &str) -> Result<String> {
        let url = format!("{}/{}", BASE_URL, operation_name);
        let start = Instant::now();

        loop {
            if let Some(deadline) = self.timeout {
                if start.elapsed() > deadline {
                    return Err(SyncError::Timeout(deadline));
                }
            }

            let response = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let headers = response.headers().clone();
                let text = response.text().await.unwrap_or_default();
                return Err(classify_http_error(status.as_u16(), &text, &headers));
            }

            let operation: OperationResponse = response.json().await?;

            if let Some(err) = operation.error {
                return Err(SyncError::VideoGeneration(
                    err.message.unwrap_or_else(|| "unknown error".into()),
                ));
            }

            if operation.done.unwrap_or(false) {
                return extract_video_uri(operation);
            }

            tracing::debug!(
                operation = %operation_name,
                elapsed_secs = start.elapsed().as_secs(),
                "video job still running"
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>> {
        if uri.starts_with("gs://") {
            return Err(SyncError::VideoGeneration(format!(
                "job returned a cloud-storage URI ({uri}) which cannot be fetched directly"
            )));
        }

        // The result locator requires the key as a query parameter.
        let url = append_key(uri, &self.api_key);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Api {
                status: response.status().as_u16(),
                message: "failed to download video".into(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Pulls the result locator out of a completed operation.
fn extract_video_uri(operation: OperationResponse) -> Result<String> {
    operation
        .response
        .and_then(|r| r.generate_video_response)
        .and_then(|r| r.generated_samples)
        .and_then(|samples| samples.into_iter().next())
        .and_then(|sample| sample.video)
        .and_then(|video| video.uri)
        .ok_or_else(|| {
            SyncError::UnexpectedResponse("video job completed but returned no video URI".into())
        })
}

fn append_key(uri: &str, key: &str) -> String {
    if uri.contains('?') {
        format!("{uri}&key={key}")
    } else {
        format!("{uri}?key={key}")
    }
}

fn drone_sweep_prompt(landmark: &str, city: &str) -> String {
    format!(
        "Cinematic drone sweep around {landmark} in {city}. Golden hour, soft lighting, 1080p, \
         ultra-smooth motion, professional travel documentary style."
    )
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoJobRequest {
    instances: Vec<VideoInstance>,
    parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
struct VideoInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters {
    number_of_videos: u32,
    resolution: String,
    aspect_ratio: String,
}

impl VideoJobRequest {
    fn for_landmark(landmark: &str, city: &str) -> Self {
        Self {
            instances: vec![VideoInstance {
                prompt: drone_sweep_prompt(landmark, city),
            }],
            parameters: VideoParameters {
                number_of_videos: 1,
                resolution: "720p".to_string(),
                aspect_ratio: "16:9".to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: String,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    response: Option<OperationResult>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    #[serde(default)]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Option<Vec<GeneratedSample>>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoResult>,
}

#[derive(Debug, Deserialize)]
struct VideoResult {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = VideoClient::builder().api_key("test-key").build().unwrap();
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.poll_interval, Duration::from_secs(8));
        assert!(client.timeout.is_none());
    }

    #[test]
    fn test_builder_custom_settings() {
        let client = VideoClient::builder()
            .api_key("test-key")
            .poll_interval(Duration::from_secs(2))
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap();
        assert_eq!(client.poll_interval, Duration::from_secs(2));
        assert_eq!(client.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_drone_sweep_prompt_interpolation() {
        let prompt = drone_sweep_prompt("Eiffel Tower", "Paris, France");
        assert!(prompt.starts_with("Cinematic drone sweep around Eiffel Tower in Paris, France."));
        assert!(prompt.contains("travel documentary style"));
    }

    #[test]
    fn test_job_request_wire_format() {
        let request = VideoJobRequest::for_landmark("Golden Gate Bridge", "San Francisco, California");
        let json = serde_json::to_value(&request).unwrap();

        assert!(json["instances"][0]["prompt"]
            .as_str()
            .unwrap()
            .contains("Golden Gate Bridge"));
        assert_eq!(json["parameters"]["numberOfVideos"], 1);
        assert_eq!(json["parameters"]["resolution"], "720p");
        assert_eq!(json["parameters"]["aspectRatio"], "16:9");
    }

    #[test]
    fn test_operation_response_not_done() {
        let json = r#"{"name": "operations/abc123", "done": false}"#;
        let operation: OperationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(operation.name, "operations/abc123");
        assert_eq!(operation.done, Some(false));
        assert!(operation.response.is_none());
    }

    #[test]
    fn test_operation_response_done_with_uri() {
        let json = r#"{
            "name": "operations/abc123",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{
                        "video": {"uri": "https://example.com/clip.mp4"}
                    }]
                }
            }
        }"#;
        let operation: OperationResponse = serde_json::from_str(json).unwrap();
        let uri = extract_video_uri(operation).unwrap();
        assert_eq!(uri, "https://example.com/clip.mp4");
    }

    #[test]
    fn test_operation_response_done_without_uri_is_an_error() {
        let json = r#"{"name": "operations/abc123", "done": true, "response": {}}"#;
        let operation: OperationResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            extract_video_uri(operation),
            Err(SyncError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_operation_response_with_error() {
        let json = r#"{
            "name": "operations/abc123",
            "done": false,
            "error": {"message": "Quota exceeded"}
        }"#;
        let operation: OperationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            operation.error.unwrap().message.as_deref(),
            Some("Quota exceeded")
        );
    }

    #[test]
    fn test_append_key() {
        assert_eq!(
            append_key("https://dl.example/v.mp4", "k1"),
            "https://dl.example/v.mp4?key=k1"
        );
        assert_eq!(
            append_key("https://dl.example/v.mp4?alt=media", "k1"),
            "https://dl.example/v.mp4?alt=media&key=k1"
        );
    }

    #[tokio::test]
    async fn test_download_rejects_gcs_uri() {
        let client = VideoClient::builder().api_key("test-key").build().unwrap();
        let result = client.download("gs://bucket/clip.mp4").await;
        assert!(matches!(result, Err(SyncError::VideoGeneration(_))));
    }
}
