// Scripted audio platform for controller tests
//
// Every platform and handle call is appended to a shared log so tests can
// assert on the exact sequence the controller issued.

#![allow(dead_code)]

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voice_memo::{
    AudioMode, AudioPlatform, ClipUri, PermissionStatus, PlaybackStatus, RecordingHandle, RecordingPreset,
    SoundHandle, SoundOptions, StatusCallback,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RequestPermission,
    ConfigureMode(AudioMode),
    OpenRecording(RecordingPreset),
    StartRecording(usize),
    Finalize(usize),
    ReleaseRecording(usize),
    LoadSound { uri: String, autoplay: bool, volume: f32, sound: usize },
    SetVolume(usize, f32),
    SetPitch(usize, f32),
    Play(usize),
    Stop(usize),
    ClearCallback(usize),
    Unload(usize),
    DiscardClip(String),
}

/// Failures to inject
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub deny_permission: bool,
    pub open_recording: bool,
    pub finalize: bool,
    pub load_sound: bool,
    pub play: bool,
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Failures>,
    next_recording: AtomicUsize,
    next_sound: AtomicUsize,
    /// Sounds report playing until stopped or unloaded
    sounds_keep_playing: AtomicBool,
    /// Delay inside finalize, to hold an operation in flight
    finalize_delay_ms: AtomicUsize,
    callbacks: Mutex<Vec<(usize, StatusCallback)>>,
    /// Clips finalized and not yet discarded
    stored: Mutex<Vec<String>>,
}

impl Inner {
    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[derive(Clone, Default)]
pub struct FakePlatform {
    inner: Arc<Inner>,
}

impl FakePlatform {
    pub fn new() -> Self {
        let platform = Self::default();
        platform.inner.sounds_keep_playing.store(true, Ordering::SeqCst);
        platform
    }

    pub fn fail(&self, update: impl FnOnce(&mut Failures)) {
        update(&mut self.inner.failures.lock().unwrap());
    }

    pub fn set_finalize_delay(&self, delay: Duration) {
        self.inner
            .finalize_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.inner.calls.lock().unwrap().clear();
    }

    /// Calls made on one sound handle, in order
    pub fn sound_calls(&self, sound: usize) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                Call::SetVolume(id, _) | Call::SetPitch(id, _) => *id == sound,
                Call::Play(id) | Call::Stop(id) | Call::ClearCallback(id) | Call::Unload(id) => *id == sound,
                Call::LoadSound { sound: id, .. } => *id == sound,
                _ => false,
            })
            .collect()
    }

    /// Ids of every sound loaded so far
    pub fn loaded_sounds(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::LoadSound { sound, .. } => Some(sound),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    /// Recordings started and neither finalized nor released
    pub fn live_recordings(&self) -> usize {
        let calls = self.calls();
        calls
            .iter()
            .filter(|call| match call {
                Call::StartRecording(id) => !calls
                    .iter()
                    .any(|c| *c == Call::Finalize(*id) || *c == Call::ReleaseRecording(*id)),
                _ => false,
            })
            .count()
    }

    /// Sound handles loaded and not yet unloaded
    pub fn live_sounds(&self) -> usize {
        let calls = self.calls();
        self.loaded_sounds()
            .into_iter()
            .filter(|id| !calls.contains(&Call::Unload(*id)))
            .count()
    }

    /// URIs of finalized clips that were never discarded
    pub fn stored_clips(&self) -> Vec<String> {
        self.inner.stored.lock().unwrap().clone()
    }

    /// Deliver a "playback finished" status to the callback of a sound
    pub fn finish_sound(&self, sound: usize) {
        let callbacks = self.inner.callbacks.lock().unwrap().clone();
        for (id, callback) in callbacks {
            if id == sound {
                callback(PlaybackStatus {
                    is_loaded: true,
                    is_playing: false,
                    did_just_finish: true,
                    ..Default::default()
                });
            }
        }
    }
}

#[async_trait::async_trait]
impl AudioPlatform for FakePlatform {
    async fn request_permission(&self) -> Result<PermissionStatus> {
        self.inner.log(Call::RequestPermission);
        if self.inner.failures.lock().unwrap().deny_permission {
            return Ok(PermissionStatus::Denied);
        }
        Ok(PermissionStatus::Granted)
    }

    async fn configure_audio_mode(&self, mode: AudioMode) -> Result<()> {
        self.inner.log(Call::ConfigureMode(mode));
        Ok(())
    }

    async fn open_recording(&self, preset: RecordingPreset) -> Result<Box<dyn RecordingHandle>> {
        self.inner.log(Call::OpenRecording(preset));
        if self.inner.failures.lock().unwrap().open_recording {
            bail!("no input device");
        }

        let id = self.inner.next_recording.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(FakeRecording {
            id,
            inner: Arc::clone(&self.inner),
            recording: false,
        }))
    }

    async fn load_sound(
        &self,
        uri: &ClipUri,
        options: SoundOptions,
        on_status: Option<StatusCallback>,
    ) -> Result<Box<dyn SoundHandle>> {
        if self.inner.failures.lock().unwrap().load_sound {
            bail!("cannot decode {}", uri);
        }

        let id = self.inner.next_sound.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.log(Call::LoadSound {
            uri: uri.to_string(),
            autoplay: options.should_play,
            volume: options.volume,
            sound: id,
        });
        if let Some(callback) = &on_status {
            self.inner.callbacks.lock().unwrap().push((id, Arc::clone(callback)));
        }

        Ok(Box::new(FakeSound {
            id,
            inner: Arc::clone(&self.inner),
            playing: options.should_play,
            volume: options.volume,
            pitch: 1.0,
            loaded: true,
        }))
    }

    async fn discard_clip(&self, uri: &ClipUri) -> Result<()> {
        self.inner.log(Call::DiscardClip(uri.to_string()));
        self.inner.stored.lock().unwrap().retain(|stored| stored != uri.as_str());
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeRecording {
    id: usize,
    inner: Arc<Inner>,
    recording: bool,
}

#[async_trait::async_trait]
impl RecordingHandle for FakeRecording {
    async fn start(&mut self) -> Result<()> {
        self.inner.log(Call::StartRecording(self.id));
        self.recording = true;
        Ok(())
    }

    async fn stop_and_finalize(&mut self) -> Result<ClipUri> {
        self.inner.log(Call::Finalize(self.id));
        let delay = self.inner.finalize_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.recording = false;

        if self.inner.failures.lock().unwrap().finalize {
            bail!("disk full");
        }
        let uri = format!("file:///recordings/take-{}.wav", self.id);
        self.inner.stored.lock().unwrap().push(uri.clone());
        Ok(ClipUri::new(uri))
    }

    async fn release(&mut self) -> Result<()> {
        self.inner.log(Call::ReleaseRecording(self.id));
        self.recording = false;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }
}

struct FakeSound {
    id: usize,
    inner: Arc<Inner>,
    playing: bool,
    volume: f32,
    pitch: f32,
    loaded: bool,
}

#[async_trait::async_trait]
impl SoundHandle for FakeSound {
    async fn play(&mut self) -> Result<()> {
        self.inner.log(Call::Play(self.id));
        if self.inner.failures.lock().unwrap().play {
            bail!("output device lost");
        }
        self.playing = self.inner.sounds_keep_playing.load(Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.inner.log(Call::Stop(self.id));
        self.playing = false;
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.inner.log(Call::SetVolume(self.id, volume));
        self.volume = volume;
        Ok(())
    }

    async fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        self.inner.log(Call::SetPitch(self.id, pitch));
        self.pitch = pitch;
        Ok(())
    }

    fn set_on_playback_status_update(&mut self, callback: Option<StatusCallback>) {
        if callback.is_none() {
            self.inner.log(Call::ClearCallback(self.id));
            self.inner.callbacks.lock().unwrap().retain(|(id, _)| *id != self.id);
        }
    }

    async fn unload(&mut self) -> Result<()> {
        self.inner.log(Call::Unload(self.id));
        self.loaded = false;
        self.playing = false;
        self.inner.callbacks.lock().unwrap().retain(|(id, _)| *id != self.id);
        Ok(())
    }

    fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            is_loaded: self.loaded,
            is_playing: self.playing,
            volume: self.volume,
            pitch: self.pitch,
            ..Default::default()
        }
    }
}
