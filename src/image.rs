//! Background image synthesis and natural-language editing.

use crate::error::{classify_http_error, Result, SyncError};
use base64::Engine;
use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
const WIDESCREEN: &str = "16:9";

/// An encoded image payload with its declared media type.
///
/// Replaced wholesale by each successful synthesis or edit; never merged.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Media type declared by the backend, e.g. "image/png".
    pub mime_type: String,
}

impl BackgroundImage {
    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Returns the image as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }

    /// Parses a `data:` URL, or bare base64, back into an image payload.
    ///
    /// Bare base64 input is assumed to be PNG.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let (mime_type, payload) = match url.split_once(";base64,") {
            Some((header, payload)) => {
                let mime = header.strip_prefix("data:").unwrap_or(header);
                (mime.to_string(), payload)
            }
            None => ("image/png".to_string(), url),
        };
        let data = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| SyncError::Decode(e.to_string()))?;
        Ok(Self { data, mime_type })
    }
}

/// Builder for [`ImageClient`].
#[derive(Debug, Clone, Default)]
pub struct ImageClientBuilder {
    api_key: Option<String>,
    model: Option<String>,
}

impl ImageClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to the `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the image model id.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds the client, resolving the API key.
    pub fn build(self) -> Result<ImageClient> {
        let api_key = crate::resolve_api_key(self.api_key)?;
        Ok(ImageClient {
            client: reqwest::Client::new(),
            api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Client for the image-generation and image-editing endpoint.
pub struct ImageClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ImageClient {
    /// Creates a new `ImageClientBuilder`.
    pub fn builder() -> ImageClientBuilder {
        ImageClientBuilder::new()
    }

    /// Synthesizes a widescreen background depicting a landmark.
    pub async fn generate(&self, landmark: &str, city: &str) -> Result<BackgroundImage> {
        let body = ImageRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart::Text {
                    text: landmark_prompt(landmark, city),
                }],
            }],
            generation_config: Some(ImageGenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: Some(ImageConfig {
                    aspect_ratio: WIDESCREEN.to_string(),
                }),
            }),
        };
        self.request_image(body).await
    }

    /// Applies a free-text edit instruction to an existing image.
    ///
    /// The payload is always declared as PNG regardless of its true format;
    /// the backend tolerates the mismatch. No retry is attempted.
    pub async fn edit(
        &self,
        image: &BackgroundImage,
        instruction: &str,
    ) -> Result<BackgroundImage> {
        let body = ImageRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                        },
                    },
                    RequestPart::Text {
                        text: edit_prompt(instruction),
                    },
                ],
            }],
            generation_config: None,
        };
        self.request_image(body).await
    }

    /// Checks that the image model is reachable with the configured key.
    pub async fn health_check(&self) -> Result<()> {
        crate::model_health_check(&self.client, BASE_URL, &self.model, &self.api_key).await
    }

    async fn request_image(&self, body: ImageRequest) -> Result<BackgroundImage> {
        let url = format!("{}/{}:generateContent", BASE_URL, self.model);

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

        let image_response: ImageResponse = response.json().await?;

        // Blocks are returned as HTTP 200 with promptFeedback populated.
        if let Some(feedback) = &image_response.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .clone()
                    .unwrap_or_else(|| format!("Prompt blocked: {reason}"));
                return Err(SyncError::ContentBlocked(msg));
            }
        }

        let candidate = image_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::UnexpectedResponse("no candidates in response".into()))?;

        if let Some(finish_reason) = &candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY" | "IMAGE_SAFETY" | "IMAGE_PROHIBITED_CONTENT" | "RECITATION"
                | "PROHIBITED_CONTENT" | "BLOCKLIST" => {
                    return Err(SyncError::ContentBlocked(format!(
                        "content blocked by safety filter: {finish_reason}"
                    )));
                }
                _ => {}
            }
        }

        let content = candidate
            .content
            .ok_or_else(|| SyncError::UnexpectedResponse("no content in candidate".into()))?;

        // First part carrying inline binary data wins.
        let inline_data = content
            .parts
            .into_iter()
            .find_map(|p| p.inline_data)
            .ok_or_else(|| SyncError::UnexpectedResponse("no image data in response".into()))?;

        let data = base64::engine::general_purpose::STANDARD
            .decode(&inline_data.data)
            .map_err(|e| SyncError::Decode(e.to_string()))?;

        Ok(BackgroundImage {
            data,
            mime_type: inline_data.mime_type,
        })
    }
}

fn landmark_prompt(landmark: &str, city: &str) -> String {
    format!(
        "A professional, cinematic, hyper-realistic artistic rendering of the famous landmark \
         \"{landmark}\" in \"{city}\". Style: Smooth, dreamlike, atmospheric, wide-angle shot, \
         golden hour lighting, 8k resolution, ethereal vibe. No text, no people, no UI elements. \
         Focus on a breathtaking view of {landmark}."
    )
}

fn edit_prompt(instruction: &str) -> String {
    format!(
        "Modify this image based on the following instruction: {instruction}. \
         Maintain the original landmark but apply the change smoothly."
    )
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ImageGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageGenerationConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    candidates: Vec<ImageCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_prompt_interpolation() {
        let prompt = landmark_prompt("Eiffel Tower", "Paris, France");
        assert!(prompt.contains("\"Eiffel Tower\" in \"Paris, France\""));
        assert!(prompt.ends_with("Focus on a breathtaking view of Eiffel Tower."));
    }

    #[test]
    fn test_edit_prompt_wraps_instruction() {
        let prompt = edit_prompt("make it snow");
        assert!(prompt.starts_with("Modify this image based on the following instruction: make it snow."));
        assert!(prompt.contains("Maintain the original landmark"));
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let client = ImageClient::builder().api_key("test-key").build();
        assert!(client.is_ok());
        assert_eq!(client.unwrap().model, DEFAULT_MODEL);
    }

    #[test]
    fn test_generate_request_wire_format() {
        let body = ImageRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart::Text {
                    text: landmark_prompt("Space Needle", "Seattle, Washington"),
                }],
            }],
            generation_config: Some(ImageGenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: Some(ImageConfig {
                    aspect_ratio: WIDESCREEN.to_string(),
                }),
            }),
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
        assert!(json["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Space Needle"));
    }

    #[test]
    fn test_edit_request_declares_png_and_orders_parts() {
        let image = BackgroundImage {
            data: vec![0xFF, 0xD8, 0xFF, 0xE0],
            mime_type: "image/jpeg".to_string(),
        };
        let body = ImageRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                        },
                    },
                    RequestPart::Text {
                        text: edit_prompt("add fog"),
                    },
                ],
            }],
            generation_config: None,
        };
        let json = serde_json::to_value(&body).unwrap();

        // Image part first, declared as PNG even for JPEG input.
        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert!(parts[1]["text"].as_str().unwrap().contains("add fog"));
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_response_deserialization_with_inline_data() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your image"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let response: ImageResponse = serde_json::from_str(json).unwrap();
        let content = response.candidates[0].content.as_ref().unwrap();
        let inline = content
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .unwrap();
        assert_eq!(inline.mime_type, "image/png");
    }

    #[test]
    fn test_response_with_prompt_feedback_block() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked"
            }
        }"#;
        let response: ImageResponse = serde_json::from_str(json).unwrap();
        let feedback = response.prompt_feedback.unwrap();
        assert_eq!(feedback.block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_data_url_round_trip() {
        let image = BackgroundImage {
            data: vec![1, 2, 3, 4],
            mime_type: "image/jpeg".to_string(),
        };
        let url = image.to_data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let parsed = BackgroundImage::from_data_url(&url).unwrap();
        assert_eq!(parsed, image);
    }

    #[test]
    fn test_from_data_url_bare_base64_assumes_png() {
        let parsed = BackgroundImage::from_data_url("AQIDBA==").unwrap();
        assert_eq!(parsed.data, vec![1, 2, 3, 4]);
        assert_eq!(parsed.mime_type, "image/png");
    }

    #[test]
    fn test_from_data_url_rejects_garbage() {
        assert!(BackgroundImage::from_data_url("data:image/png;base64,!!!").is_err());
    }
}
