//! Playback controller: the state machine driving the graph.
//!
//! The controller is single-threaded and clock-agnostic. The engine thread
//! feeds it commands, loader events and periodic ticks, each stamped with the
//! current `Instant`; tests do the same with fabricated instants.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::PlaybackError;
use crate::library::TrackRegistry;

use super::graph::AudioGraph;
use super::impulse::{ImpulseResponse, ImpulseShape, PROCEDURAL_SAMPLE_RATE};
use super::loader::{CancelToken, LoadRequest, LoadedStream, StreamLoader};
use super::progress::{PlayClock, ProgressTracker};
use super::retry::RetryHandler;
use super::types::{EngineCmd, EngineEvent, StateHandle, Status};

pub struct Controller<L> {
    registry: TrackRegistry,
    graph: AudioGraph,
    loader: L,
    progress: ProgressTracker,
    retry: RetryHandler,
    clock: PlayClock,
    impulse_shape: ImpulseShape,
    state: StateHandle,

    status: Status,
    current_index: usize,
    volume: u8,
    muted: bool,
    previous_volume: u8,
    /// Whether the user wants sound once the current load completes.
    play_intent: bool,

    generation: u64,
    cancel: Option<CancelToken>,
    duration: Option<Duration>,
    last_error: Option<PlaybackError>,
    disposed: bool,
}

impl<L> Controller<L>
where
    L: StreamLoader,
{
    pub fn new(registry: TrackRegistry, settings: &Settings, mut loader: L, state: StateHandle) -> Self {
        let mut graph = AudioGraph::new(&settings.audio, &settings.reverb);

        // The procedural impulse goes in first so the reverb is never a
        // no-op while a configured impulse is still being fetched.
        let impulse_shape = ImpulseShape::from_settings(&settings.reverb);
        graph.install_impulse(ImpulseResponse::procedural(
            &impulse_shape,
            PROCEDURAL_SAMPLE_RATE,
        ));
        if let Some(uri) = settings.reverb.impulse_uri.clone() {
            loader.load_impulse(uri);
        }

        let start = settings.playback.start_index;
        let current_index = if start < registry.count() {
            start
        } else {
            warn!(start, count = registry.count(), "start index out of range, using 0");
            0
        };
        let volume = settings.audio.volume.min(100);

        let mut ctl = Self {
            registry,
            graph,
            loader,
            progress: ProgressTracker::new(Duration::from_millis(
                settings.playback.progress_interval_ms,
            )),
            retry: RetryHandler::new(Duration::from_millis(settings.playback.retry_delay_ms)),
            clock: PlayClock::default(),
            impulse_shape,
            state,
            status: Status::Idle,
            current_index,
            volume,
            muted: false,
            previous_volume: volume,
            play_intent: false,
            generation: 0,
            cancel: None,
            duration: None,
            last_error: None,
            disposed: false,
        };
        if settings.playback.autoplay {
            // Queued only: the output stays locked until the first command.
            info!(start = current_index, "autoplay");
            ctl.load(current_index, true);
        }
        ctl.publish();
        ctl
    }

    pub fn handle_command(&mut self, cmd: EngineCmd, now: Instant) {
        if self.disposed {
            debug!(?cmd, "engine disposed, ignoring command");
            return;
        }
        debug!(?cmd, status = ?self.status, "command");

        if !self.graph.is_unlocked() && !matches!(cmd, EngineCmd::Quit) {
            let resumed = self.unlock(now);
            if resumed && matches!(cmd, EngineCmd::Play | EngineCmd::TogglePlay) {
                // The queued playback was what this command asked for.
                self.publish();
                return;
            }
        }

        match cmd {
            EngineCmd::Play => self.play(now),
            EngineCmd::Pause => self.pause(now),
            EngineCmd::TogglePlay => match self.status {
                Status::Playing => self.pause(now),
                Status::Idle | Status::Paused => self.play(now),
                Status::Loading | Status::Erroring => self.play_intent = !self.play_intent,
            },
            EngineCmd::Seek(percent) => self.seek(percent, now),
            EngineCmd::SetVolume(v) => self.set_volume(v),
            EngineCmd::ToggleMute => self.toggle_mute(),
            EngineCmd::Next => {
                let next = self.registry.next(self.current_index);
                self.load(next, self.play_intent);
            }
            EngineCmd::Previous => {
                let prev = self.registry.previous(self.current_index);
                self.load(prev, self.play_intent);
            }
            EngineCmd::SelectTrack(index) => self.select_track(index),
            EngineCmd::ToggleReverb => {
                let enabled = !self.graph.reverb_enabled();
                self.graph.set_reverb_enabled(enabled);
                info!(enabled, "reverb toggled");
            }
            EngineCmd::SetReverbAmount(w) => self.graph.set_reverb_wet_amount(w),
            EngineCmd::Quit => self.dispose(),
        }
        self.publish();
    }

    pub fn handle_event(&mut self, event: EngineEvent, now: Instant) {
        if self.disposed {
            return;
        }
        match event {
            EngineEvent::StreamReady {
                index,
                generation,
                stream,
            } => {
                if !self.is_current_load(generation) {
                    debug!(index, generation, "dropping stale stream");
                    return;
                }
                self.cancel = None;
                let duration = stream.duration().or_else(|| {
                    self.registry
                        .get(index)
                        .and_then(|t| t.nominal_duration())
                });
                self.on_ready(stream.with_duration(duration), now);
            }
            EngineEvent::StreamFailed {
                index,
                generation,
                error,
            } => {
                if !self.is_current_stream(generation) {
                    debug!(index, generation, %error, "dropping stale failure");
                    return;
                }
                self.cancel = None;
                self.on_error(error, now);
            }
            EngineEvent::ImpulseLoaded(Ok(impulse)) => {
                info!(
                    frames = impulse.frames(),
                    channels = impulse.channel_count(),
                    "impulse response loaded"
                );
                self.graph.install_impulse(impulse);
            }
            EngineEvent::ImpulseLoaded(Err(e)) => {
                warn!("impulse response unavailable, using procedural fallback: {e}");
                self.graph.install_impulse(ImpulseResponse::procedural(
                    &self.impulse_shape,
                    PROCEDURAL_SAMPLE_RATE,
                ));
            }
        }
        self.publish();
    }

    /// Periodic work: due retries, end of track, progress sampling.
    pub fn tick(&mut self, now: Instant) {
        if self.disposed {
            return;
        }

        if let Some(failed) = self.retry.take_due(now) {
            if self.status == Status::Erroring {
                let next = self.registry.next(failed);
                info!(failed, next, "advancing past failed track");
                self.load(next, self.play_intent);
            }
        }

        if self.status == Status::Playing {
            // A voice on the device reports its own position; without one
            // the wall clock stands in.
            let (elapsed, ended) = match self.graph.position() {
                Some(position) => (position, self.graph.finished()),
                None => {
                    let elapsed = self.clock.elapsed(now);
                    (elapsed, self.duration.is_some_and(|d| elapsed >= d))
                }
            };
            if ended {
                self.on_ended();
            } else {
                // The reverb tail plays past the end of the stream.
                let elapsed = self.duration.map_or(elapsed, |d| elapsed.min(d));
                self.progress.poll(now, elapsed, self.duration);
            }
        }
        self.publish();
    }

    /// Tear everything down. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.retry.cancel();
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        // Late loader callbacks can no longer match.
        self.generation += 1;
        self.progress.dispose();
        self.graph.dispose();
        self.clock.reset();
        self.duration = None;
        self.status = Status::Idle;
        info!("playback engine disposed");
        self.publish();
    }

    /// Open the output. Playback queued while the output was locked goes
    /// ahead; returns whether there was any.
    fn unlock(&mut self, now: Instant) -> bool {
        match self.graph.unlock(self.clock.elapsed(now)) {
            Ok(true) => {
                debug!("output unlocked by first command");
                match self.status {
                    Status::Paused if self.play_intent => {
                        self.play(now);
                        true
                    }
                    Status::Loading => self.play_intent,
                    _ => false,
                }
            }
            Ok(false) => false,
            Err(e) => {
                self.on_error(e, now);
                false
            }
        }
    }

    fn is_current_load(&self, generation: u64) -> bool {
        generation == self.generation && self.status == Status::Loading
    }

    /// Failures also count while the stream of the current load is bound.
    fn is_current_stream(&self, generation: u64) -> bool {
        generation == self.generation
            && matches!(self.status, Status::Loading | Status::Playing | Status::Paused)
    }

    fn load(&mut self, index: usize, play_intent: bool) {
        let Some(track) = self.registry.get(index) else {
            warn!(index, "no such track");
            return;
        };
        let uri = track.src.clone();
        info!(index, name = %track.name, "loading track");

        self.retry.cancel();
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.graph.detach();
        self.clock.reset();
        self.progress.suspend();
        self.progress.reset();
        self.duration = None;

        self.generation += 1;
        self.current_index = index;
        self.status = Status::Loading;
        self.play_intent = play_intent;

        let token = CancelToken::default();
        self.cancel = Some(token.clone());
        self.loader.load(LoadRequest {
            index,
            generation: self.generation,
            uri,
            cancel: token,
        });
        debug!(generation = self.generation, "load requested");
    }

    fn on_ready(&mut self, stream: LoadedStream, now: Instant) {
        let duration = stream.duration();
        if let Err(e) = self.graph.attach_source(stream) {
            self.on_error(e, now);
            return;
        }
        self.duration = duration;
        self.last_error = None;
        self.progress.resync(Duration::ZERO, duration);

        if self.play_intent && self.graph.is_unlocked() {
            self.status = Status::Playing;
            self.graph.play();
            self.clock.start(now);
            self.progress.resume(now);
        } else {
            // With the output still locked the play intent stays queued.
            self.status = Status::Paused;
        }
        info!(index = self.current_index, status = ?self.status, ?duration, "track ready");
    }

    fn on_error(&mut self, error: PlaybackError, now: Instant) {
        warn!(index = self.current_index, %error, "playback failed");
        self.graph.detach();
        self.clock.reset();
        self.progress.suspend();
        self.progress.reset();
        self.duration = None;
        self.status = Status::Erroring;
        self.retry.schedule(now, self.current_index, &error);
        self.last_error = Some(error);
    }

    fn on_ended(&mut self) {
        info!(index = self.current_index, "track ended");
        let next = self.registry.next(self.current_index);
        self.load(next, true);
    }

    fn select_track(&mut self, index: usize) {
        if index >= self.registry.count() {
            warn!(index, count = self.registry.count(), "select out of range, ignoring");
            return;
        }
        self.load(index, true);
    }

    fn play(&mut self, now: Instant) {
        match self.status {
            Status::Idle => self.load(self.current_index, true),
            Status::Paused => {
                self.status = Status::Playing;
                self.play_intent = true;
                self.graph.play();
                self.clock.start(now);
                self.progress.resume(now);
            }
            Status::Loading | Status::Erroring => self.play_intent = true,
            Status::Playing => {}
        }
    }

    fn pause(&mut self, now: Instant) {
        match self.status {
            Status::Playing => {
                self.status = Status::Paused;
                self.play_intent = false;
                self.graph.pause();
                self.clock.pause(now);
                self.progress.suspend();
                self.progress.resync(self.clock.elapsed(now), self.duration);
            }
            Status::Loading | Status::Erroring => self.play_intent = false,
            Status::Idle | Status::Paused => {}
        }
    }

    fn seek(&mut self, percent: f64, now: Instant) {
        if !matches!(self.status, Status::Playing | Status::Paused) {
            debug!(status = ?self.status, "seek ignored, no stream bound");
            return;
        }
        let Some(duration) = self.duration else {
            debug!("seek ignored, duration unknown");
            return;
        };
        if !percent.is_finite() {
            return;
        }
        let position = duration.mul_f64(percent.clamp(0.0, 100.0) / 100.0);

        if let Err(e) = self.graph.seek(position) {
            self.on_error(e, now);
            return;
        }
        self.clock
            .set(position, now, self.status == Status::Playing);
        self.progress.resync(position, self.duration);
        debug!(?position, "seeked");
    }

    fn set_volume(&mut self, volume: u8) {
        let volume = volume.min(100);
        self.volume = volume;
        if self.muted {
            self.previous_volume = volume;
        } else {
            self.graph.set_volume(volume);
        }
    }

    fn toggle_mute(&mut self) {
        if self.muted {
            self.muted = false;
            self.volume = self.previous_volume;
            self.graph.set_volume(self.volume);
        } else {
            self.previous_volume = self.volume;
            self.muted = true;
            self.graph.set_volume(0);
        }
    }

    fn publish(&self) {
        let snap = self.progress.snapshot();
        if let Ok(mut s) = self.state.lock() {
            s.status = self.status;
            s.current_index = self.current_index;
            s.progress_percent = snap.percent;
            s.elapsed_display = snap.elapsed_display();
            s.elapsed = snap.elapsed;
            s.duration = self.duration;
            s.volume = self.volume;
            s.muted = self.muted;
            s.reverb_enabled = self.graph.reverb_enabled();
            s.reverb_amount = self.graph.wet_amount();
            s.last_error = self.last_error.clone();
            s.output_unlocked = self.graph.is_unlocked();
        }
    }
}

#[cfg(test)]
impl<L> Controller<L>
where
    L: StreamLoader,
{
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// The gain actually applied, in percent.
    pub fn effective_volume(&self) -> u8 {
        if self.muted { 0 } else { self.volume }
    }

    pub fn play_intent(&self) -> bool {
        self.play_intent
    }

    pub fn progress(&self) -> super::progress::ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn position(&self, now: Instant) -> Duration {
        self.clock.elapsed(now)
    }

    pub fn retry_pending(&self) -> bool {
        self.retry.is_pending()
    }

    pub fn last_error(&self) -> Option<&PlaybackError> {
        self.last_error.as_ref()
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
