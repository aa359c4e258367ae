//! Application state and its transitions.
//!
//! All UI-facing state lives in one [`AppState`] with named slots, mutated
//! only through the transition methods below. Every load-cycle transition
//! carries the [`CycleId`] it belongs to and is ignored once a newer cycle
//! has begun, so a slow in-flight cycle can never overwrite a fresh one.

use crate::image::BackgroundImage;
use crate::video::BackgroundVideo;
use crate::weather::WeatherSnapshot;

/// Identifier of one load cycle, monotonically increasing.
pub type CycleId = u64;

/// Which backdrop layers are active.
///
/// When a video is present it is shown and the still image stays mounted
/// beneath it, hidden, so a failed or cleared video falls back instantly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backdrop {
    /// A video layer is present and playing.
    pub video_visible: bool,
    /// An image layer exists (possibly hidden under the video).
    pub image_mounted: bool,
    /// The image layer is the one actually shown.
    pub image_visible: bool,
}

/// UI state slots plus the bookkeeping that keeps them consistent.
#[derive(Debug, Default)]
pub struct AppState {
    snapshot: Option<WeatherSnapshot>,
    image: Option<BackgroundImage>,
    video: Option<BackgroundVideo>,
    stashed_video: Option<BackgroundVideo>,
    loading: bool,
    editing: bool,
    error: Option<String>,
    cycle: CycleId,
}

impl AppState {
    /// Creates the initial (pre-load) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active snapshot, if a cycle has completed its lookup.
    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        self.snapshot.as_ref()
    }

    /// The current background image.
    pub fn image(&self) -> Option<&BackgroundImage> {
        self.image.as_ref()
    }

    /// The current background video.
    pub fn video(&self) -> Option<&BackgroundVideo> {
        self.video.as_ref()
    }

    /// True between cycle start and snapshot arrival (or failure).
    pub fn loading(&self) -> bool {
        self.loading
    }

    /// True while an edit request is in flight.
    pub fn editing(&self) -> bool {
        self.editing
    }

    /// The user-facing error for the current cycle, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The id of the current cycle.
    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    /// Starts a new load cycle, discarding all prior cycle state.
    ///
    /// Retry is this same transition: snapshot, media, and error are all
    /// cleared so nothing stale bleeds into the new cycle's first render.
    pub fn begin_cycle(&mut self) -> CycleId {
        self.cycle += 1;
        self.loading = true;
        self.error = None;
        self.snapshot = None;
        self.image = None;
        self.video = None;
        self.stashed_video = None;
        self.cycle
    }

    /// Records the snapshot for `cycle`; loading ends as soon as it lands.
    ///
    /// Returns false (and changes nothing) when `cycle` is stale.
    pub fn snapshot_loaded(&mut self, cycle: CycleId, snapshot: WeatherSnapshot) -> bool {
        if cycle != self.cycle {
            return false;
        }
        self.snapshot = Some(snapshot);
        self.loading = false;
        true
    }

    /// Installs the background image for `cycle`.
    pub fn image_ready(&mut self, cycle: CycleId, image: BackgroundImage) -> bool {
        if cycle != self.cycle {
            return false;
        }
        self.image = Some(image);
        true
    }

    /// Installs the background video for `cycle`.
    pub fn video_ready(&mut self, cycle: CycleId, video: BackgroundVideo) -> bool {
        if cycle != self.cycle {
            return false;
        }
        self.video = Some(video);
        true
    }

    /// Fails `cycle` with a user-facing, retryable message.
    pub fn cycle_failed(&mut self, cycle: CycleId, message: impl Into<String>) -> bool {
        if cycle != self.cycle {
            return false;
        }
        self.error = Some(message.into());
        self.loading = false;
        true
    }

    /// Attempts to start an edit.
    ///
    /// Returns false without side effects when an edit is already in
    /// flight (the busy-flag guard) or when there is no image to edit.
    /// On success the current video is taken out of display into a stash
    /// so the change is visible while the edit runs.
    pub fn begin_edit(&mut self) -> bool {
        if self.editing || self.image.is_none() {
            return false;
        }
        self.editing = true;
        self.stashed_video = self.video.take();
        true
    }

    /// Completes the in-flight edit.
    ///
    /// A replacement image is installed and the stashed video dropped (the
    /// clip no longer matches the picture); on failure the stashed video is
    /// restored exactly as it was. The busy flag clears either way.
    pub fn finish_edit(&mut self, outcome: Option<BackgroundImage>) {
        match outcome {
            Some(image) => {
                self.image = Some(image);
                self.stashed_video = None;
            }
            None => {
                self.video = self.stashed_video.take();
            }
        }
        self.editing = false;
    }

    /// Computes backdrop layer precedence from the media slots.
    pub fn backdrop(&self) -> Backdrop {
        let video_visible = self.video.is_some();
        let image_mounted = self.image.is_some();
        Backdrop {
            video_visible,
            image_mounted,
            image_visible: image_mounted && !video_visible,
        }
    }
}
