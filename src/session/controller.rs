use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::config::{ControllerOptions, PlaybackMode};
use super::gain::GainLevel;
use super::state::{ActiveRecording, ControllerState, PlayableClip, Released, SessionSlots, Transition};
use super::stats::ControllerSnapshot;
use crate::error::ControllerError;
use crate::platform::{
    AudioMode, AudioPlatform, ClipUri, PermissionStatus, PlaybackStatus, SoundHandle, SoundOptions,
    StatusCallback,
};

/// Owns the recording and clip slots and drives the platform audio API
///
/// Operations are single-flight: while one is running, any other call
/// fails with `ControllerError::Busy` instead of touching the same handles.
pub struct RecorderController {
    platform: Arc<dyn AudioPlatform>,
    options: ControllerOptions,
    slots: Mutex<SessionSlots>,
    gain: AtomicU8,
    busy: AtomicBool,
}

/// Clears the busy flag when the operation ends, on every exit path
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RecorderController {
    pub fn new(platform: Arc<dyn AudioPlatform>, options: ControllerOptions) -> Self {
        info!(
            "Recorder controller on {} platform ({:?}, {:?} playback)",
            platform.name(),
            options.preset,
            options.playback_mode
        );

        let gain = AtomicU8::new(options.initial_gain.tenths());
        Self {
            platform,
            options,
            slots: Mutex::new(SessionSlots::default()),
            gain,
            busy: AtomicBool::new(false),
        }
    }

    fn begin(&self, operation: &str) -> Result<BusyGuard<'_>, ControllerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Rejected {}: another operation is still running", operation);
            return Err(ControllerError::Busy);
        }
        Ok(BusyGuard(&self.busy))
    }

    /// Open and start a new recording
    pub async fn start_recording(&self) -> Result<(), ControllerError> {
        let _guard = self.begin("start_recording")?;
        let mut slots = self.slots.lock().await;

        if slots.recording().is_some() {
            warn!("Recording already started");
            return Err(ControllerError::AlreadyRecording);
        }

        info!("Requesting permissions..");
        match self.platform.request_permission().await {
            Ok(PermissionStatus::Granted) => {}
            Ok(PermissionStatus::Denied) => {
                warn!("Microphone permission denied");
                return Err(ControllerError::PermissionDenied);
            }
            Err(e) => {
                error!("Permission request failed: {:#}", e);
                return Err(ControllerError::device(e.context("Permission request failed")));
            }
        }

        self.platform
            .configure_audio_mode(AudioMode::recording())
            .await
            .map_err(|e| {
                error!("Failed to configure audio mode: {:#}", e);
                ControllerError::device(e)
            })?;

        info!("Starting recording..");
        let mut handle = self
            .platform
            .open_recording(self.options.preset)
            .await
            .map_err(|e| {
                error!("Failed to open recording: {:#}", e);
                ControllerError::device(e)
            })?;

        if let Err(e) = handle.start().await {
            error!("Failed to start recording: {:#}", e);
            if let Err(release_err) = handle.release().await {
                warn!("Failed to release recording: {:#}", release_err);
            }
            return Err(ControllerError::device(e));
        }

        let released = slots.apply(Transition::BeginRecording(ActiveRecording::new(handle)))?;
        if let Some(clip) = &released.clip {
            info!("Discarding previous clip {}", clip.uri);
        }
        self.release(released).await;

        info!("Recording started");
        Ok(())
    }

    /// Finalize the active recording and load it as the clip (autoplaying)
    pub async fn stop_recording(&self) -> Result<ClipUri, ControllerError> {
        let _guard = self.begin("stop_recording")?;
        let mut slots = self.slots.lock().await;

        let Some(mut recording) = slots.apply(Transition::EndRecording)?.recording else {
            return Err(ControllerError::NotRecording);
        };

        info!("Stopping recording..");
        let uri = match recording.handle.stop_and_finalize().await {
            Ok(uri) => uri,
            Err(e) => {
                error!("Failed to finalize recording {}: {:#}", recording.id, e);
                slots.apply(Transition::AbandonFinalize)?;
                if let Err(release_err) = recording.handle.release().await {
                    warn!("Failed to release recording: {:#}", release_err);
                }
                return Err(ControllerError::finalize(e));
            }
        };
        info!("Recording stopped and stored at {}", uri);

        let playing = Arc::new(AtomicBool::new(false));
        let options = SoundOptions {
            should_play: true,
            volume: GainLevel::MAX.value(),
        };
        let sound = match self
            .platform
            .load_sound(&uri, options, self.status_callback(&playing))
            .await
        {
            Ok(sound) => sound,
            Err(e) => {
                error!("Failed to load recorded clip {}: {:#}", uri, e);
                slots.apply(Transition::AbandonFinalize)?;
                self.discard_clip(&uri).await;
                return Err(ControllerError::device(e));
            }
        };

        let released = slots.apply(Transition::InstallClip(PlayableClip::new(uri.clone(), sound, playing)))?;
        self.release(released).await;

        Ok(uri)
    }

    /// Restart the clip from the beginning at the current gain
    pub async fn play_sound(&self) -> Result<(), ControllerError> {
        let _guard = self.begin("play_sound")?;
        let mut slots = self.slots.lock().await;

        let gain = self.gain();
        let pitch = gain.pitch(self.options.pitch_per_gain);

        let (uri, playing) = {
            let clip = slots.clip_mut().ok_or(ControllerError::NoClip)?;
            info!("Playing sound..");

            if let Some(handle) = clip.handle.as_mut() {
                handle.stop().await.map_err(|e| {
                    warn!("Error stopping previous playback: {:#}", e);
                    ControllerError::playback(e)
                })?;
            }
            (clip.uri.clone(), clip.playing_flag())
        };
        slots.apply(Transition::MarkStopped)?;

        let options = SoundOptions {
            should_play: false,
            volume: gain.value(),
        };
        let mut fresh = self
            .platform
            .load_sound(&uri, options, self.status_callback(&playing))
            .await
            .map_err(|e| {
                warn!("Error playing sound: {:#}", e);
                ControllerError::playback(e)
            })?;

        // Raised before play so a finish update arriving early is not overwritten
        let tracked = self.options.playback_mode == PlaybackMode::Tracked;
        if tracked {
            slots.apply(Transition::MarkPlaying)?;
        }

        if let Err(e) = start_fresh(fresh.as_mut(), gain, pitch).await {
            warn!("Error playing sound: {:#}", e);
            slots.apply(Transition::MarkStopped)?;
            if let Err(unload_err) = fresh.unload().await {
                warn!("Failed to unload sound: {:#}", unload_err);
            }
            return Err(ControllerError::playback(e));
        }
        debug!("Playback issued at volume {} and pitch {}", gain, pitch);

        let released = slots.apply(Transition::SwapSoundHandle {
            handle: fresh,
            volume: gain,
        })?;
        self.release(released).await;

        match self.options.playback_mode {
            PlaybackMode::OneShot => {
                let released = slots.apply(Transition::ReleaseSoundHandle)?;
                if let Some(mut sound) = released.sound {
                    sound.set_on_playback_status_update(None);
                    if let Err(e) = sound.unload().await {
                        warn!("Failed to unload one-shot sound: {:#}", e);
                    }
                }
            }
            PlaybackMode::Tracked => {
                let is_playing = slots
                    .clip()
                    .and_then(|clip| clip.handle.as_ref())
                    .is_some_and(|handle| handle.status().is_playing);
                if !is_playing {
                    slots.apply(Transition::MarkStopped)?;
                }
            }
        }

        Ok(())
    }

    /// Stop the clip; a no-op when its handle was already released
    pub async fn stop_sound(&self) -> Result<(), ControllerError> {
        let _guard = self.begin("stop_sound")?;
        let mut slots = self.slots.lock().await;

        let clip = slots.clip_mut().ok_or(ControllerError::NoClip)?;
        info!("Stopping sound..");

        match clip.handle.as_mut() {
            Some(handle) => handle.stop().await.map_err(|e| {
                warn!("Error stopping sound: {:#}", e);
                ControllerError::playback(e)
            })?,
            None => debug!("Nothing to stop: sound handle already released"),
        }

        slots.apply(Transition::MarkStopped)?;
        Ok(())
    }

    /// Set the gain used by the next `play_sound`
    pub fn set_gain(&self, level: f32) -> GainLevel {
        let gain = GainLevel::new(level);
        self.gain.store(gain.tenths(), Ordering::SeqCst);
        debug!("Gain set to {}", gain);
        gain
    }

    pub fn gain(&self) -> GainLevel {
        GainLevel::from_tenths(self.gain.load(Ordering::SeqCst))
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub async fn state(&self) -> ControllerState {
        self.slots.lock().await.state()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        let slots = self.slots.lock().await;

        ControllerSnapshot {
            state: slots.state(),
            gain: self.gain(),
            clip_uri: slots.clip().map(|clip| clip.uri.to_string()),
            recording_started_at: slots.recording().map(|recording| recording.started_at),
            takes: slots.takes(),
            playback_mode: self.options.playback_mode,
            playback: slots
                .clip()
                .and_then(|clip| clip.handle.as_ref())
                .map(|handle| handle.status()),
        }
    }

    /// Release every handle the controller still holds
    pub async fn teardown(self) {
        let released = self.slots.lock().await.apply(Transition::Clear);
        match released {
            Ok(released) => self.release(released).await,
            Err(e) => warn!("Failed to clear session: {}", e),
        }
        info!("Recorder controller shut down");
    }

    /// Release displaced handles and delete displaced clips; failures are logged, never propagated
    async fn release(&self, released: Released) {
        if let Some(mut recording) = released.recording {
            if let Err(e) = recording.handle.release().await {
                warn!("Failed to release recording {}: {:#}", recording.id, e);
            }
        }

        if let Some(mut clip) = released.clip {
            if let Some(mut handle) = clip.handle.take() {
                if let Err(e) = handle.stop().await {
                    debug!("Failed to stop clip {} before unload: {:#}", clip.uri, e);
                }
                if let Err(e) = handle.unload().await {
                    warn!("Failed to unload clip {}: {:#}", clip.uri, e);
                }
            }
            self.discard_clip(&clip.uri).await;
        }

        if let Some(mut sound) = released.sound {
            if let Err(e) = sound.unload().await {
                warn!("Failed to unload sound: {:#}", e);
            }
        }
    }

    async fn discard_clip(&self, uri: &ClipUri) {
        if let Err(e) = self.platform.discard_clip(uri).await {
            warn!("Failed to discard clip {}: {:#}", uri, e);
        }
    }

    fn status_callback(&self, playing: &Arc<AtomicBool>) -> Option<StatusCallback> {
        match self.options.playback_mode {
            PlaybackMode::OneShot => None,
            PlaybackMode::Tracked => {
                let playing = Arc::clone(playing);
                Some(Arc::new(move |status: PlaybackStatus| {
                    playing.store(status.is_playing && !status.did_just_finish, Ordering::SeqCst);
                }))
            }
        }
    }
}

impl Drop for RecorderController {
    fn drop(&mut self) {
        if self.slots.get_mut().has_live_handles() {
            warn!("Recorder controller dropped with live audio handles; call teardown() first");
        }
    }
}

async fn start_fresh(handle: &mut dyn SoundHandle, gain: GainLevel, pitch: f32) -> anyhow::Result<()> {
    handle.set_volume(gain.value()).await?;
    handle.set_pitch(pitch).await?;
    handle.play().await
}
