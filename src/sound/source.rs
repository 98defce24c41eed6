//! Sound cues and their files.
//!
//! Every reminder plays one of a small set of cues. A [`SoundLibrary`] maps
//! each cue to a file inside the sound directory.

use std::path::{Path, PathBuf};

/// Directory name used under the user's data directory.
const APP_DIR_NAME: &str = "pomodoro-reminder";

/// A reminder sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    /// Work interval finished
    WorkEnd,
    /// Break finished
    BreakEnd,
    /// Stopwatch reminder threshold reached
    Reminder,
}

impl SoundCue {
    /// File name of the cue inside the sound directory.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            SoundCue::WorkEnd | SoundCue::Reminder => "notification-piano.mp3",
            SoundCue::BreakEnd => "notification-chime.mp3",
        }
    }
}

/// Resolves cues to files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundLibrary {
    dir: PathBuf,
}

impl SoundLibrary {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path the cue is expected at.
    #[must_use]
    pub fn resolve(&self, cue: SoundCue) -> PathBuf {
        self.dir.join(cue.file_name())
    }
}

impl Default for SoundLibrary {
    fn default() -> Self {
        Self::new(default_sound_dir())
    }
}

/// Returns the default sound directory inside the user's data directory.
/// Falls back to `./sounds` when no data dir is found.
#[must_use]
pub fn default_sound_dir() -> PathBuf {
    match dirs::data_local_dir() {
        Some(data_dir) => data_dir.join(APP_DIR_NAME).join("sounds"),
        None => PathBuf::from("sounds"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_file_names() {
        assert_eq!(SoundCue::WorkEnd.file_name(), "notification-piano.mp3");
        assert_eq!(SoundCue::Reminder.file_name(), "notification-piano.mp3");
        assert_eq!(SoundCue::BreakEnd.file_name(), "notification-chime.mp3");
    }

    #[test]
    fn test_resolve_joins_dir() {
        let library = SoundLibrary::new("/opt/sounds");
        assert_eq!(
            library.resolve(SoundCue::BreakEnd),
            PathBuf::from("/opt/sounds/notification-chime.mp3")
        );
    }

    #[test]
    fn test_default_sound_dir() {
        assert!(default_sound_dir().ends_with("sounds"));
    }
}
