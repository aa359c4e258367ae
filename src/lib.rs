//! SkySync - a geolocated weather and landmark card with AI-generated
//! cinematic backgrounds.
//!
//! The pipeline resolves a position (falling back to a default city),
//! asks a grounded text model for the local weather and one famous
//! landmark, synthesizes a widescreen background image of that landmark,
//! optionally upgrades it to a short cinematic clip via a long-running
//! video job, and supports iterative natural-language edits of the image.
//!
//! # Quick Start
//!
//! ```no_run
//! use skysync::App;
//!
//! #[tokio::main]
//! async fn main() -> skysync::Result<()> {
//!     let mut app = App::builder().build()?;
//!     app.load().await;
//!     println!("{}", skysync::view::render(app.state()));
//!     app.edit("make it snow").await;
//!     Ok(())
//! }
//! ```
//!
//! Only the weather lookup is mandatory; image, video, and edits degrade
//! to absence on failure and never surface an error to the user.

mod app;
mod error;
mod image;
mod location;
mod state;
mod video;
mod weather;

pub mod view;

pub use app::{App, AppBuilder, LOOKUP_ERROR_MESSAGE};
pub use error::{Result, SyncError};
pub use image::{BackgroundImage, ImageClient, ImageClientBuilder};
pub use location::{Coordinates, LocationResolver, LocationResolverBuilder, DEFAULT_COORDINATES};
pub use state::{AppState, Backdrop, CycleId};
pub use video::{BackgroundVideo, VideoClient, VideoClientBuilder};
pub use weather::{Citation, CitationKind, WeatherClient, WeatherClientBuilder, WeatherSnapshot};

/// Environment variable holding the API key for every backend call.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Reports whether the environment carries a usable credential.
///
/// This is the capability check gating video synthesis: absence is not an
/// error, it simply skips the enhancement.
pub fn credential_available() -> bool {
    std::env::var(API_KEY_ENV).is_ok_and(|key| !key.trim().is_empty())
}

/// Resolves an explicit key or falls back to the environment.
pub(crate) fn resolve_api_key(explicit: Option<String>) -> Result<String> {
    explicit
        .filter(|key| !key.trim().is_empty())
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()))
        .ok_or_else(|| {
            SyncError::Auth(format!("{API_KEY_ENV} not set and no API key provided"))
        })
}

/// Probes a model's metadata endpoint to verify reachability and auth.
pub(crate) async fn model_health_check(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    api_key: &str,
) -> Result<()> {
    let url = format!("{base_url}/{model}");
    let response = client
        .get(&url)
        .header("x-goog-api-key", api_key)
        .send()
        .await?;

    match response.status().as_u16() {
        401 | 403 => Err(SyncError::Auth("invalid API key".into())),
        404 => Err(SyncError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        )),
        s if !(200..300).contains(&s) => Err(SyncError::Api {
            status: s,
            message: "health check failed".into(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_api_key_prefers_explicit() {
        assert_eq!(
            resolve_api_key(Some("explicit".into())).unwrap(),
            "explicit"
        );
    }

    #[test]
    fn test_resolve_api_key_rejects_blank_explicit_without_env() {
        // A whitespace-only key is treated as absent.
        if std::env::var(API_KEY_ENV).is_err() {
            assert!(resolve_api_key(Some("   ".into())).is_err());
            assert!(resolve_api_key(None).is_err());
        }
    }
}
