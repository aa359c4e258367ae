//! Grounded weather and landmark lookup.
//!
//! Sends one `generateContent` request with the maps-grounding tool pinned
//! to a coordinate pair and asks the model for a single JSON object. The
//! contract is "best effort JSON in free text", not a strict schema: the
//! reply is scanned for the first-`{`-to-last-`}` span and parsed leniently.

use crate::error::{classify_http_error, Result};
use crate::location::Coordinates;
use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Where a grounding citation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationKind {
    /// A web page surfaced by search grounding.
    Web,
    /// A map entry surfaced by maps grounding.
    Maps,
}

impl std::fmt::Display for CitationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Maps => write!(f, "maps"),
        }
    }
}

/// A verifiable source attached to a snapshot by the grounding layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Link to the source.
    pub uri: String,
    /// Human-readable source title.
    pub title: String,
    /// Which grounding sub-field the source came from.
    pub kind: CitationKind,
}

/// One resolved weather/landmark result for a coordinate pair.
///
/// Every field the model fills in is a display string, not a parsed value;
/// a reply with no embedded JSON yields a snapshot with all fields `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    /// Resolved city and region, e.g. "Paris, France".
    #[serde(default)]
    pub city: Option<String>,
    /// Current temperature as a display string, e.g. "18°C".
    #[serde(default)]
    pub temperature: Option<String>,
    /// Current condition, e.g. "Cloudy".
    #[serde(default)]
    pub condition: Option<String>,
    /// Name of the chosen landmark.
    #[serde(default)]
    pub landmark_name: Option<String>,
    /// One-sentence landmark description.
    #[serde(default)]
    pub landmark_description: Option<String>,
    /// Grounding citations, in response order, not deduplicated.
    #[serde(skip)]
    pub sources: Vec<Citation>,
}

/// Builder for [`WeatherClient`].
#[derive(Debug, Clone, Default)]
pub struct WeatherClientBuilder {
    api_key: Option<String>,
    model: Option<String>,
}

impl WeatherClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to the `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the lookup model id.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds the client, resolving the API key.
    pub fn build(self) -> Result<WeatherClient> {
        let api_key = crate::resolve_api_key(self.api_key)?;
        Ok(WeatherClient {
            client: reqwest::Client::new(),
            api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Client for the grounded text-generation endpoint.
pub struct WeatherClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl WeatherClient {
    /// Creates a new `WeatherClientBuilder`.
    pub fn builder() -> WeatherClientBuilder {
        WeatherClientBuilder::new()
    }

    /// Fetches the current weather and a notable landmark for a position.
    ///
    /// Transport and API failures propagate: this is the one mandatory call
    /// of a load cycle and its failure is surfaced to the user.
    pub async fn fetch(&self, coords: Coordinates) -> Result<WeatherSnapshot> {
        let url = format!("{}/{}:generateContent", BASE_URL, self.model);
        let body = LookupRequest::for_coordinates(coords);

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

        let lookup: LookupResponse = response.json().await?;

        let raw_text = lookup.candidate_text();
        let mut snapshot = parse_snapshot(&raw_text)?;
        snapshot.sources = lookup.citations();
        Ok(snapshot)
    }

    /// Checks that the lookup model is reachable with the configured key.
    pub async fn health_check(&self) -> Result<()> {
        crate::model_health_check(&self.client, BASE_URL, &self.model, &self.api_key).await
    }
}

/// Parses a snapshot out of free text.
///
/// A greedy `{...}` span that exists but is invalid JSON is an error (fatal
/// for the cycle); a reply with no span at all parses the empty object.
fn parse_snapshot(raw: &str) -> Result<WeatherSnapshot> {
    match extract_json_span(raw) {
        Some(span) => Ok(serde_json::from_str(span)?),
        None => Ok(WeatherSnapshot::default()),
    }
}

/// Returns the greedy first-`{`-to-last-`}` span, spanning newlines.
fn extract_json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn lookup_prompt(coords: Coordinates) -> String {
    format!(
        "Identify the specific city and state for the coordinates (lat: {lat}, lng: {lng}).\n\
         Find current weather conditions and identify one EXTREMELY famous, culturally \
         significant landmark within that specific metropolitan area.\n\n\
         Format your response exactly as a JSON string like this:\n\
         {{\"city\": \"City Name, State\", \"temperature\": \"Degrees\", \"condition\": \"Condition\", \
         \"landmarkName\": \"Landmark Name\", \"landmarkDescription\": \"Short description\"}}\n\n\
         Do not include markdown markers or anything else. Just the JSON string.",
        lat = coords.latitude,
        lng = coords.longitude,
    )
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest {
    contents: Vec<LookupContent>,
    tools: Vec<LookupTool>,
    tool_config: LookupToolConfig,
}

#[derive(Debug, Serialize)]
struct LookupContent {
    parts: Vec<LookupPart>,
}

#[derive(Debug, Serialize)]
struct LookupPart {
    text: String,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct LookupTool {
    google_maps: GoogleMapsConfig,
}

#[derive(Debug, Serialize, Default)]
struct GoogleMapsConfig {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupToolConfig {
    retrieval_config: RetrievalConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfig {
    lat_lng: LatLng,
}

#[derive(Debug, Serialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

impl LookupRequest {
    fn for_coordinates(coords: Coordinates) -> Self {
        Self {
            contents: vec![LookupContent {
                parts: vec![LookupPart {
                    text: lookup_prompt(coords),
                }],
            }],
            tools: vec![LookupTool::default()],
            tool_config: LookupToolConfig {
                retrieval_config: RetrievalConfig {
                    lat_lng: LatLng {
                        latitude: coords.latitude,
                        longitude: coords.longitude,
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    candidates: Vec<LookupCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupCandidate {
    #[serde(default)]
    content: Option<LookupContentResponse>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct LookupContentResponse {
    #[serde(default)]
    parts: Vec<LookupPartResponse>,
}

#[derive(Debug, Deserialize)]
struct LookupPartResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<GroundingSource>,
    #[serde(default)]
    maps: Option<GroundingSource>,
}

#[derive(Debug, Deserialize)]
struct GroundingSource {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

impl LookupResponse {
    /// Concatenates the text parts of the first candidate.
    fn candidate_text(&self) -> String {
        let Some(candidate) = self.candidates.first() else {
            return String::new();
        };
        let Some(content) = &candidate.content else {
            return String::new();
        };
        content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// Maps grounding chunks to citations, preserving order.
    ///
    /// Chunks carrying neither a web nor a maps source are dropped.
    fn citations(&self) -> Vec<Citation> {
        let Some(candidate) = self.candidates.first() else {
            return Vec::new();
        };
        let Some(metadata) = &candidate.grounding_metadata else {
            return Vec::new();
        };

        metadata
            .grounding_chunks
            .iter()
            .filter_map(|chunk| {
                if let Some(web) = &chunk.web {
                    Some(Citation {
                        uri: web.uri.clone(),
                        title: web.title.clone(),
                        kind: CitationKind::Web,
                    })
                } else {
                    chunk.maps.as_ref().map(|maps| Citation {
                        uri: maps.uri.clone(),
                        title: maps.title.clone(),
                        kind: CitationKind::Maps,
                    })
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS_JSON: &str = r#"{"city":"Paris, France","temperature":"18°C","condition":"Cloudy","landmarkName":"Eiffel Tower","landmarkDescription":"Iconic iron lattice tower."}"#;

    #[test]
    fn test_lookup_prompt_contains_coordinates() {
        let prompt = lookup_prompt(Coordinates {
            latitude: 48.8566,
            longitude: 2.3522,
        });
        assert!(prompt.contains("lat: 48.8566"));
        assert!(prompt.contains("lng: 2.3522"));
        assert!(prompt.contains("landmarkName"));
    }

    #[test]
    fn test_extract_json_span_plain() {
        assert_eq!(extract_json_span(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_json_span_with_prose() {
        let raw = "Sure! Here is the JSON:\n```json\n{\"a\": 1}\n```\nHope that helps.";
        assert_eq!(extract_json_span(raw), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_json_span_is_greedy_across_lines() {
        let raw = "x {\"a\":\n{\"b\":2}} y";
        assert_eq!(extract_json_span(raw), Some("{\"a\":\n{\"b\":2}}"));
    }

    #[test]
    fn test_extract_json_span_absent() {
        assert_eq!(extract_json_span("no json here"), None);
        assert_eq!(extract_json_span("} backwards {"), None);
    }

    #[test]
    fn test_parse_snapshot_embedded_object() {
        let raw = format!("Here you go:\n{PARIS_JSON}\nEnjoy!");
        let snapshot = parse_snapshot(&raw).unwrap();
        assert_eq!(snapshot.city.as_deref(), Some("Paris, France"));
        assert_eq!(snapshot.temperature.as_deref(), Some("18°C"));
        assert_eq!(snapshot.condition.as_deref(), Some("Cloudy"));
        assert_eq!(snapshot.landmark_name.as_deref(), Some("Eiffel Tower"));
        assert_eq!(
            snapshot.landmark_description.as_deref(),
            Some("Iconic iron lattice tower.")
        );
    }

    #[test]
    fn test_parse_snapshot_no_json_yields_empty_snapshot() {
        let snapshot = parse_snapshot("I could not find anything.").unwrap();
        assert_eq!(snapshot, WeatherSnapshot::default());
        assert!(snapshot.city.is_none());
        assert!(snapshot.landmark_name.is_none());
    }

    #[test]
    fn test_parse_snapshot_invalid_span_is_an_error() {
        // A span exists but is not valid JSON: the cycle must fail, not
        // silently degrade.
        assert!(parse_snapshot("{not valid json}").is_err());
    }

    #[test]
    fn test_parse_snapshot_partial_fields() {
        let snapshot = parse_snapshot(r#"{"city":"Oslo, Norway"}"#).unwrap();
        assert_eq!(snapshot.city.as_deref(), Some("Oslo, Norway"));
        assert!(snapshot.temperature.is_none());
    }

    #[test]
    fn test_request_serialization_wire_format() {
        let request = LookupRequest::for_coordinates(Coordinates {
            latitude: 37.7749,
            longitude: -122.4194,
        });
        let json = serde_json::to_value(&request).unwrap();

        assert!(json["contents"][0]["parts"][0]["text"].is_string());
        assert!(json["tools"][0].get("googleMaps").is_some());
        let lat_lng = &json["toolConfig"]["retrievalConfig"]["latLng"];
        assert_eq!(lat_lng["latitude"], 37.7749);
        assert_eq!(lat_lng["longitude"], -122.4194);
    }

    #[test]
    fn test_candidate_text_concatenates_parts() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "part one "}, {"text": "part two"}]
                }
            }]
        }"#;
        let response: LookupResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.candidate_text(), "part one part two");
    }

    #[test]
    fn test_candidate_text_empty_response() {
        let response: LookupResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(response.candidate_text(), "");
    }

    #[test]
    fn test_citations_mapping_order_and_dropping() {
        let json = r#"{
            "candidates": [{
                "groundingMetadata": {
                    "groundingChunks": [
                        {"maps": {"uri": "https://maps.example/eiffel", "title": "Eiffel Tower"}},
                        {},
                        {"web": {"uri": "https://web.example/paris", "title": "Paris Weather"}},
                        {"maps": {"uri": "https://maps.example/eiffel", "title": "Eiffel Tower"}}
                    ]
                }
            }]
        }"#;
        let response: LookupResponse = serde_json::from_str(json).unwrap();
        let citations = response.citations();

        // Sourceless chunk dropped, order preserved, duplicates kept.
        assert_eq!(citations.len(), 3);
        assert_eq!(citations[0].kind, CitationKind::Maps);
        assert_eq!(citations[0].title, "Eiffel Tower");
        assert_eq!(citations[1].kind, CitationKind::Web);
        assert_eq!(citations[1].uri, "https://web.example/paris");
        assert_eq!(citations[2], citations[0]);
    }

    #[test]
    fn test_citations_web_wins_over_maps_in_one_chunk() {
        let json = r#"{
            "candidates": [{
                "groundingMetadata": {
                    "groundingChunks": [
                        {
                            "web": {"uri": "https://web.example", "title": "Web"},
                            "maps": {"uri": "https://maps.example", "title": "Maps"}
                        }
                    ]
                }
            }]
        }"#;
        let response: LookupResponse = serde_json::from_str(json).unwrap();
        let citations = response.citations();
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].kind, CitationKind::Web);
    }

    #[test]
    fn test_citation_kind_display() {
        assert_eq!(CitationKind::Web.to_string(), "web");
        assert_eq!(CitationKind::Maps.to_string(), "maps");
    }

    #[test]
    fn test_snapshot_camel_case_field_names() {
        let snapshot: WeatherSnapshot = serde_json::from_str(PARIS_JSON).unwrap();
        assert_eq!(snapshot.landmark_name.as_deref(), Some("Eiffel Tower"));
    }
}
