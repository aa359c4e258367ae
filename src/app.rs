//! Orchestration of a full sync cycle and of edit requests.

use crate::error::Result;
use crate::image::ImageClient;
use crate::location::{Coordinates, LocationResolver};
use crate::state::{AppState, CycleId};
use crate::video::VideoClient;
use crate::weather::WeatherClient;

/// User-facing message for a failed load cycle; dismissed by retrying.
pub const LOOKUP_ERROR_MESSAGE: &str =
    "Connection timeout or location sync failed. Tap retry below.";

/// Builder for [`App`].
#[derive(Debug, Clone, Default)]
pub struct AppBuilder {
    api_key: Option<String>,
    coordinates: Option<Coordinates>,
    video: Option<bool>,
}

impl AppBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to the `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Pins the position, skipping resolution entirely.
    pub fn coordinates(mut self, coords: Coordinates) -> Self {
        self.coordinates = Some(coords);
        self
    }

    /// Forces video synthesis on or off.
    ///
    /// When unset, video is attempted iff the environment reports a usable
    /// credential (the capability check gating the enhancement).
    pub fn video(mut self, enabled: bool) -> Self {
        self.video = Some(enabled);
        self
    }

    /// Builds the app and its clients.
    pub fn build(self) -> Result<App> {
        let api_key = crate::resolve_api_key(self.api_key)?;
        let video_enabled = self.video.unwrap_or_else(crate::credential_available);

        let video = if video_enabled {
            Some(VideoClient::builder().api_key(&api_key).build()?)
        } else {
            None
        };

        Ok(App {
            resolver: LocationResolver::builder().build(),
            weather: WeatherClient::builder().api_key(&api_key).build()?,
            image: ImageClient::builder().api_key(&api_key).build()?,
            video,
            coordinates: self.coordinates,
            state: AppState::new(),
        })
    }
}

/// Owns the clients and the state, and drives the cycle described by the
/// card UI: resolve location, fetch the snapshot, then synthesize media.
pub struct App {
    resolver: LocationResolver,
    weather: WeatherClient,
    image: ImageClient,
    video: Option<VideoClient>,
    coordinates: Option<Coordinates>,
    state: AppState,
}

impl App {
    /// Creates a new `AppBuilder`.
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Read access to the UI state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// True when a video client is configured for this app.
    pub fn video_enabled(&self) -> bool {
        self.video.is_some()
    }

    /// Runs one full load cycle.
    ///
    /// Only the weather lookup is mandatory: its failure ends the cycle
    /// with a retryable error. Image and video synthesis are independent
    /// enhancements, run concurrently (they share the snapshot's landmark
    /// and city but not each other's results) and degraded to absence on
    /// failure.
    pub async fn load(&mut self) -> CycleId {
        let cycle = self.state.begin_cycle();

        let coords = match self.coordinates {
            Some(coords) => coords,
            None => self.resolver.resolve().await,
        };

        let snapshot = match self.weather.fetch(coords).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("weather/landmark lookup failed: {e}");
                self.state.cycle_failed(cycle, LOOKUP_ERROR_MESSAGE);
                return cycle;
            }
        };

        let landmark = snapshot.landmark_name.clone().unwrap_or_default();
        let city = snapshot.city.clone().unwrap_or_default();
        self.state.snapshot_loaded(cycle, snapshot);

        let image_task = self.image.generate(&landmark, &city);
        let video_task = async {
            match &self.video {
                Some(client) => Some(client.generate(&landmark, &city).await),
                None => None,
            }
        };
        let (image_result, video_result) = tokio::join!(image_task, video_task);

        match image_result {
            Ok(image) => {
                self.state.image_ready(cycle, image);
            }
            Err(e) => tracing::warn!("image generation failed: {e}"),
        }

        if let Some(result) = video_result {
            match result {
                Ok(video) => {
                    self.state.video_ready(cycle, video);
                }
                Err(e) => tracing::warn!("video generation skipped/failed: {e}"),
            }
        }

        cycle
    }

    /// Re-enters the load sequence from scratch.
    pub async fn retry(&mut self) -> CycleId {
        self.load().await
    }

    /// Applies a natural-language edit to the current background image.
    ///
    /// Returns true when a replacement image was installed. A no-op (false)
    /// when no image exists or an edit is already in flight; on failure the
    /// previously displayed video is restored and the image left untouched.
    pub async fn edit(&mut self, instruction: &str) -> bool {
        let Some(current) = self.state.image().cloned() else {
            return false;
        };
        if !self.state.begin_edit() {
            return false;
        }

        let outcome = match self.image.edit(&current, instruction).await {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!("image edit failed: {e}");
                None
            }
        };

        let applied = outcome.is_some();
        self.state.finish_edit(outcome);
        applied
    }
}
