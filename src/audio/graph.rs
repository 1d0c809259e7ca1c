//! Audio graph manager.
//!
//! Owns the output device, the single active voice and the reverb routing.
//! The connection set is never patched edge by edge: `Routing::resolve`
//! derives the whole topology from `(enabled, wet_amount)` and the graph swaps
//! it in.

use std::sync::Arc;
use std::time::Duration;

use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::{debug, info, warn};

use crate::config::{AudioSettings, ReverbSettings};
use crate::error::PlaybackError;

use super::impulse::ImpulseResponse;
use super::loader::LoadedStream;
use super::mix::{MixControl, ReverbMix, StreamFormat, build_convolvers};

/// Largest share of the signal the wet path may take.
pub const MAX_WET_SHARE: f32 = 0.7;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    Source,
    Dry,
    Convolver,
    Wet,
    /// Volume stage shared by both paths.
    Master,
    Device,
}

pub type Connection = (Node, Node);

/// Dry and wet gains for a wet amount in percent.
///
/// `dry + wet == 1` for every amount, and `wet <= MAX_WET_SHARE`.
pub fn mix_gains(wet_amount: u8) -> (f32, f32) {
    let share = f32::from(wet_amount.min(100)) / 100.0 * MAX_WET_SHARE;
    (1.0 - share, share)
}

/// Complete signal path for one reverb configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Routing {
    connections: Vec<Connection>,
    pub dry_gain: f32,
    pub wet_gain: f32,
}

impl Routing {
    pub fn resolve(enabled: bool, wet_amount: u8) -> Self {
        if !enabled {
            return Self {
                connections: vec![(Node::Source, Node::Master), (Node::Master, Node::Device)],
                dry_gain: 1.0,
                wet_gain: 0.0,
            };
        }
        let (dry_gain, wet_gain) = mix_gains(wet_amount);
        Self {
            connections: vec![
                (Node::Source, Node::Dry),
                (Node::Source, Node::Convolver),
                (Node::Convolver, Node::Wet),
                (Node::Dry, Node::Master),
                (Node::Wet, Node::Master),
                (Node::Master, Node::Device),
            ],
            dry_gain,
            wet_gain,
        }
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn wet_active(&self) -> bool {
        self.connections.contains(&(Node::Convolver, Node::Wet))
    }
}

enum Output {
    /// No user command yet.
    Locked,
    /// Unlocked, but no device (disabled in config or failed to open).
    Unavailable,
    Open(OutputStream),
    Disposed,
}

struct Voice {
    stream: LoadedStream,
    sink: Option<Sink>,
    /// Stream position the sink started from.
    offset: Duration,
    format: Option<StreamFormat>,
}

pub struct AudioGraph {
    output_enabled: bool,
    output: Output,
    voice: Option<Voice>,
    control: Arc<MixControl>,
    routing: Routing,
    reverb_enabled: bool,
    wet_amount: u8,
    volume: u8,
    playing: bool,
    /// Serial of the most recently realized sink.
    voice_serial: u64,
}

impl AudioGraph {
    pub fn new(audio: &AudioSettings, reverb: &ReverbSettings) -> Self {
        let control = Arc::new(MixControl::new(reverb.block_size));
        let wet_amount = reverb.wet_amount.min(100);
        let routing = Routing::resolve(reverb.enabled, wet_amount);
        control.set_gains(routing.dry_gain, routing.wet_gain);
        control.rebuild(routing.wet_active());

        Self {
            output_enabled: audio.output,
            output: Output::Locked,
            voice: None,
            control,
            routing,
            reverb_enabled: reverb.enabled,
            wet_amount,
            volume: audio.volume.min(100),
            playing: false,
            voice_serial: 0,
        }
    }

    /// Open the output on the first user command.
    ///
    /// A voice attached while locked is realized at `position`. Returns
    /// whether this call did the unlocking.
    pub fn unlock(&mut self, position: Duration) -> Result<bool, PlaybackError> {
        if !matches!(self.output, Output::Locked) {
            return Ok(false);
        }

        self.output = if self.output_enabled {
            match OutputStreamBuilder::open_default_stream() {
                Ok(mut stream) => {
                    // rodio logs to stderr when the stream is dropped, which
                    // would scribble over the terminal UI.
                    stream.log_on_drop(false);
                    info!("audio output opened");
                    Output::Open(stream)
                }
                Err(e) => {
                    warn!("no audio output device, continuing silently: {e}");
                    Output::Unavailable
                }
            }
        } else {
            debug!("audio output disabled by config");
            Output::Unavailable
        };

        if self.voice.as_ref().is_some_and(|v| v.sink.is_none()) {
            self.realize(position)?;
        }
        Ok(true)
    }

    pub fn is_unlocked(&self) -> bool {
        !matches!(self.output, Output::Locked)
    }

    #[cfg(test)]
    pub fn has_device(&self) -> bool {
        matches!(self.output, Output::Open(_))
    }

    /// Bind `stream` as the only source, paused at the start.
    pub fn attach_source(&mut self, stream: LoadedStream) -> Result<(), PlaybackError> {
        self.detach();
        self.playing = false;
        self.voice = Some(Voice {
            stream,
            sink: None,
            offset: Duration::ZERO,
            format: None,
        });
        self.realize(Duration::ZERO)
    }

    /// Stop and drop the current voice.
    pub fn detach(&mut self) {
        if let Some(voice) = self.voice.take() {
            if let Some(sink) = voice.sink {
                sink.stop();
            }
        }
        self.control.clear_bank();
        self.playing = false;
    }

    #[cfg(test)]
    pub fn has_source(&self) -> bool {
        self.voice.is_some()
    }

    pub fn play(&mut self) {
        self.playing = true;
        if let Some(sink) = self.sink() {
            sink.play();
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
        if let Some(sink) = self.sink() {
            sink.pause();
        }
    }

    /// Rebuild the voice starting at `position`, keeping play/pause.
    pub fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        if let Some(voice) = self.voice.as_mut() {
            if let Some(sink) = voice.sink.take() {
                sink.stop();
            }
        }
        self.realize(position)
    }

    /// Master gain in percent; the caller passes 0 while muted.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        let gain = self.output_gain();
        if let Some(sink) = self.sink() {
            sink.set_volume(gain);
        }
    }

    pub fn output_gain(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }

    pub fn set_reverb_enabled(&mut self, enabled: bool) {
        self.reverb_enabled = enabled;
        self.routing = Routing::resolve(enabled, self.wet_amount);
        self.control
            .set_gains(self.routing.dry_gain, self.routing.wet_gain);
        self.control.rebuild(self.routing.wet_active());
        debug!(
            enabled,
            edges = self.routing.connections().len(),
            "reverb routing rebuilt"
        );
    }

    /// Update the wet/dry split in place; connections are untouched.
    pub fn set_reverb_wet_amount(&mut self, wet_amount: u8) {
        self.wet_amount = wet_amount.min(100);
        let routing = Routing::resolve(self.reverb_enabled, self.wet_amount);
        self.routing.dry_gain = routing.dry_gain;
        self.routing.wet_gain = routing.wet_gain;
        self.control
            .set_gains(self.routing.dry_gain, self.routing.wet_gain);
    }

    pub fn reverb_enabled(&self) -> bool {
        self.reverb_enabled
    }

    pub fn wet_amount(&self) -> u8 {
        self.wet_amount
    }

    #[cfg(test)]
    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    /// Make `impulse` the reverb impulse. Convolvers for a running voice are
    /// built here, on the caller's thread, and handed to its mixer.
    pub fn install_impulse(&mut self, impulse: ImpulseResponse) {
        debug!(?impulse, "installing impulse response");
        let impulse = Arc::new(impulse);
        let prepared = self
            .voice
            .as_ref()
            .filter(|v| v.sink.is_some())
            .and_then(|v| v.format)
            .map(|format| {
                (
                    self.voice_serial,
                    build_convolvers(&impulse, format, self.control.block()),
                )
            });
        self.control.install_impulse(impulse, prepared);
    }

    #[cfg(test)]
    pub fn impulse(&self) -> Option<Arc<ImpulseResponse>> {
        self.control.impulse()
    }

    /// Whether the device has drained the current voice.
    pub fn finished(&self) -> bool {
        self.voice
            .as_ref()
            .and_then(|v| v.sink.as_ref())
            .is_some_and(Sink::empty)
    }

    /// Stream position of the voice feeding the device, if there is one.
    pub fn position(&self) -> Option<Duration> {
        let voice = self.voice.as_ref()?;
        let sink = voice.sink.as_ref()?;
        Some(voice.offset + sink.get_pos())
    }

    /// Tear down the voice and release the device. Idempotent.
    pub fn dispose(&mut self) {
        self.detach();
        if !matches!(self.output, Output::Disposed) {
            self.output = Output::Disposed;
            debug!("audio output released");
        }
    }

    fn sink(&self) -> Option<&Sink> {
        self.voice.as_ref().and_then(|v| v.sink.as_ref())
    }

    fn realize(&mut self, position: Duration) -> Result<(), PlaybackError> {
        let Output::Open(ref out) = self.output else {
            return Ok(());
        };
        let Some(voice) = self.voice.as_mut() else {
            return Ok(());
        };

        let source = voice.stream.decoder()?.skip_duration(position);
        self.voice_serial += 1;
        voice.format = Some(StreamFormat::of(&source));
        voice.offset = position;

        let sink = Sink::connect_new(out.mixer());
        sink.pause();
        sink.set_volume(f32::from(self.volume) / 100.0);
        sink.append(ReverbMix::new(source, self.control.clone(), self.voice_serial));
        if self.playing {
            sink.play();
        }
        voice.sink = Some(sink);
        Ok(())
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_graph() -> AudioGraph {
        let audio = AudioSettings {
            output: false,
            ..AudioSettings::default()
        };
        AudioGraph::new(&audio, &ReverbSettings::default())
    }

    #[test]
    fn wet_gain_is_capped_and_total_never_exceeds_unity() {
        for w in 0..=100u8 {
            let r = Routing::resolve(true, w);
            assert!(r.wet_gain <= MAX_WET_SHARE + f32::EPSILON, "w={w}");
            assert!(r.dry_gain + r.wet_gain <= 1.0 + 1e-6, "w={w}");
            assert!(r.dry_gain >= 0.3 - 1e-6, "w={w}");
        }
        let (dry, wet) = mix_gains(100);
        assert!((dry - 0.3).abs() < 1e-6);
        assert!((wet - 0.7).abs() < 1e-6);
        // Out-of-range input clamps.
        assert_eq!(mix_gains(250), mix_gains(100));
    }

    #[test]
    fn disabled_routing_is_a_single_direct_path() {
        let r = Routing::resolve(false, 90);
        assert_eq!(
            r.connections(),
            &[(Node::Source, Node::Master), (Node::Master, Node::Device)]
        );
        assert_eq!((r.dry_gain, r.wet_gain), (1.0, 0.0));
        assert!(!r.wet_active());
    }

    #[test]
    fn enabled_routing_has_no_duplicate_edges() {
        let r = Routing::resolve(true, 40);
        let mut edges = r.connections().to_vec();
        edges.sort();
        edges.dedup();
        assert_eq!(edges.len(), r.connections().len());
        assert!(r.wet_active());
        assert!(r.connections().contains(&(Node::Dry, Node::Master)));
        assert!(!r.connections().contains(&(Node::Source, Node::Master)));
    }

    #[test]
    fn toggling_twice_restores_the_original_routing() {
        let mut g = silent_graph();
        let before = g.routing().clone();
        g.set_reverb_enabled(true);
        g.set_reverb_enabled(true);
        assert_eq!(g.routing(), &Routing::resolve(true, 30));
        g.set_reverb_enabled(false);
        assert_eq!(g.routing(), &before);
    }

    #[test]
    fn wet_amount_changes_gains_but_not_connections() {
        let mut g = silent_graph();
        g.set_reverb_enabled(true);
        let edges = g.routing().connections().to_vec();

        g.set_reverb_wet_amount(100);
        assert_eq!(g.routing().connections(), edges.as_slice());
        assert!((g.routing().wet_gain - 0.7).abs() < 1e-6);

        g.set_reverb_wet_amount(0);
        assert_eq!(g.routing().wet_gain, 0.0);
        assert_eq!(g.routing().dry_gain, 1.0);
    }

    #[test]
    fn volume_maps_to_output_gain() {
        let mut g = silent_graph();
        g.set_volume(25);
        assert!((g.output_gain() - 0.25).abs() < 1e-6);
        g.set_volume(200);
        assert_eq!(g.output_gain(), 1.0);
    }

    #[test]
    fn unlock_happens_once_and_silent_output_is_not_audible() {
        let mut g = silent_graph();
        assert!(!g.is_unlocked());
        assert!(g.unlock(Duration::ZERO).unwrap());
        assert!(g.is_unlocked());
        assert!(!g.unlock(Duration::ZERO).unwrap());
        assert!(!g.has_device());

        g.attach_source(LoadedStream::new(Arc::from(&[][..]), None))
            .unwrap();
        assert!(g.has_source());
        assert!(g.position().is_none());
        assert!(!g.finished());
    }

    #[test]
    fn attach_replaces_the_previous_source() {
        let mut g = silent_graph();
        let a = LoadedStream::new(Arc::from(&[1u8][..]), Some(Duration::from_secs(1)));
        let b = LoadedStream::new(Arc::from(&[2u8][..]), Some(Duration::from_secs(2)));
        g.attach_source(a).unwrap();
        g.play();
        g.attach_source(b).unwrap();
        assert!(g.has_source());
        assert!(!g.playing);
        g.detach();
        assert!(!g.has_source());
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut g = silent_graph();
        g.unlock(Duration::ZERO).unwrap();
        g.dispose();
        g.dispose();
        assert!(!g.has_source());
        // A disposed graph never reopens.
        assert!(!g.unlock(Duration::ZERO).unwrap());
    }
}
