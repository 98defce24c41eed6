//! Sound playback for reminders.
//!
//! This module provides audio notification capabilities, including:
//!
//! - The [`AudioService`] seam used by the side-effect dispatcher
//! - A rodio-backed implementation running on its own audio thread
//! - Cue-to-file resolution and a built-in fallback tone
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   PlayRequest   ┌──────────────────┐
//! │ RodioAudioService│ ──────────────▶ │   audio thread   │
//! │   (any thread)   │ ◀────────────── │  (OutputStream)  │
//! └──────────────────┘     result      └──────────────────┘
//! ```

mod error;
mod player;
mod source;

pub use error::SoundError;
pub use player::{try_create_audio_service, RodioAudioService};
pub use source::{default_sound_dir, SoundCue, SoundLibrary};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Trait for audio playback implementations.
///
/// Implementations must not block for the duration of the sound.
pub trait AudioService: Send + Sync {
    /// Plays the file at `path` at `volume` (`0.0..=1.0`).
    ///
    /// # Errors
    ///
    /// Returns an error if playback could not be started.
    fn play(&self, path: &Path, volume: f32) -> Result<(), SoundError>;
}

impl AudioService for RodioAudioService {
    fn play(&self, path: &Path, volume: f32) -> Result<(), SoundError> {
        RodioAudioService::play(self, path, volume)
    }
}

/// Audio service used when no output device exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct MutedAudioService;

impl AudioService for MutedAudioService {
    fn play(&self, path: &Path, _volume: f32) -> Result<(), SoundError> {
        tracing::debug!("ミュート中のため再生をスキップします: {}", path.display());
        Ok(())
    }
}

/// Mock audio service for testing.
#[derive(Debug, Default)]
pub struct MockAudioService {
    play_calls: Mutex<Vec<(PathBuf, f32)>>,
    should_fail: AtomicBool,
}

impl MockAudioService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn play_count(&self) -> usize {
        self.get_play_calls().len()
    }

    #[must_use]
    pub fn get_play_calls(&self) -> Vec<(PathBuf, f32)> {
        self.play_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// File names of every played sound, in order.
    #[must_use]
    pub fn played_files(&self) -> Vec<String> {
        self.get_play_calls()
            .iter()
            .filter_map(|(path, _)| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.play_calls.lock() {
            calls.clear();
        }
    }
}

impl AudioService for MockAudioService {
    fn play(&self, path: &Path, volume: f32) -> Result<(), SoundError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SoundError::PlaybackError("Mock failure".to_string()));
        }
        if let Ok(mut calls) = self.play_calls.lock() {
            calls.push((path.to_path_buf(), volume));
        }
        Ok(())
    }
}
