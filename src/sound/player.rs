//! Audio service implementation using rodio.
//!
//! rodio's `OutputStream` cannot move between threads, so the stream lives on
//! a dedicated audio thread. Play requests reach it over a crossbeam channel
//! and each request is answered with the playback result.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use rodio::source::{SineWave, Source};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, warn};

use super::error::SoundError;

/// How long `play` waits for the audio thread to accept a request.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Built-in tone used when a sound file is missing or unreadable.
const FALLBACK_FREQUENCY: f32 = 880.0;
const FALLBACK_TONE: Duration = Duration::from_millis(400);

struct PlayRequest {
    path: PathBuf,
    volume: f32,
    reply: Sender<Result<(), SoundError>>,
}

/// An audio service backed by rodio.
///
/// Playback is non-blocking; sounds continue playing in the background.
pub struct RodioAudioService {
    requests: Sender<PlayRequest>,
    disabled: AtomicBool,
}

impl RodioAudioService {
    /// Starts the audio thread and opens the default output device.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::DeviceNotAvailable` if no audio output device
    /// is available.
    pub fn new(disabled: bool) -> Result<Self, SoundError> {
        let (request_tx, request_rx) = unbounded::<PlayRequest>();
        let (init_tx, init_rx) = bounded::<Result<(), SoundError>>(1);

        thread::Builder::new()
            .name("audio".to_string())
            .spawn(move || audio_thread(request_rx, init_tx))
            .map_err(|e| SoundError::ThreadUnavailable(e.to_string()))?;

        init_rx
            .recv()
            .map_err(|e| SoundError::ThreadUnavailable(e.to_string()))??;

        debug!("オーディオ出力を初期化しました");

        Ok(Self {
            requests: request_tx,
            disabled: AtomicBool::new(disabled),
        })
    }

    /// Plays the file at `path` at the given volume (`0.0..=1.0`).
    ///
    /// Missing or undecodable files fall back to a short built-in tone.
    pub fn play(&self, path: &Path, volume: f32) -> Result<(), SoundError> {
        if self.disabled.load(Ordering::Relaxed) {
            debug!("サウンド無効のため再生をスキップします");
            return Ok(());
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.requests
            .send(PlayRequest {
                path: path.to_path_buf(),
                volume: volume.clamp(0.0, 1.0),
                reply: reply_tx,
            })
            .map_err(|e| SoundError::ThreadUnavailable(e.to_string()))?;

        reply_rx
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|e| SoundError::ThreadUnavailable(e.to_string()))?
    }

    /// Returns true if sound playback is currently disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    pub fn enable(&self) {
        self.disabled.store(false, Ordering::Relaxed);
        debug!("サウンド再生を有効化しました");
    }

    pub fn disable(&self) {
        self.disabled.store(true, Ordering::Relaxed);
        debug!("サウンド再生を無効化しました");
    }
}

impl std::fmt::Debug for RodioAudioService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioAudioService")
            .field("disabled", &self.disabled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn audio_thread(requests: Receiver<PlayRequest>, init: Sender<Result<(), SoundError>>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = init.send(Err(SoundError::DeviceNotAvailable(e.to_string())));
            return;
        }
    };
    if init.send(Ok(())).is_err() {
        return;
    }

    for request in requests.iter() {
        let result = play_with_fallback(&handle, &request.path, request.volume);
        let _ = request.reply.send(result);
    }
    debug!("オーディオスレッドを停止しました");
}

fn play_with_fallback(handle: &OutputStreamHandle, path: &Path, volume: f32) -> Result<(), SoundError> {
    match play_file(handle, path, volume) {
        Ok(()) => Ok(()),
        Err(e) if e.should_fallback_to_tone() => {
            warn!("{} の再生に失敗しました ({})。ビープ音で代替します", path.display(), e);
            play_tone(handle, volume)
        }
        Err(e) => Err(e),
    }
}

fn play_file(handle: &OutputStreamHandle, path: &Path, volume: f32) -> Result<(), SoundError> {
    let file = File::open(path)
        .map_err(|e| SoundError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    let decoder =
        Decoder::new(BufReader::new(file)).map_err(|e| SoundError::DecodeError(e.to_string()))?;

    let sink = Sink::try_new(handle).map_err(|e| SoundError::StreamError(e.to_string()))?;
    sink.set_volume(volume);
    sink.append(decoder);
    sink.detach(); // Non-blocking: sound continues after function returns

    debug!("サウンド再生開始: {}", path.display());
    Ok(())
}

fn play_tone(handle: &OutputStreamHandle, volume: f32) -> Result<(), SoundError> {
    let sink = Sink::try_new(handle).map_err(|e| SoundError::StreamError(e.to_string()))?;
    sink.set_volume(volume);
    sink.append(SineWave::new(FALLBACK_FREQUENCY).take_duration(FALLBACK_TONE));
    sink.detach();
    Ok(())
}

/// Creates an audio service, returning None if audio is unavailable.
///
/// If audio initialization fails, a warning is logged and None is returned.
#[must_use]
pub fn try_create_audio_service(disabled: bool) -> Option<Arc<RodioAudioService>> {
    match RodioAudioService::new(disabled) {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            warn!("オーディオが利用できないためサウンドを無効化します: {}", e);
            None
        }
    }
}
