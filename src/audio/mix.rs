//! Wet/dry reverb stage as a `rodio::Source` adapter.
//!
//! The graph publishes gains and convolvers into a shared `MixControl`; the
//! adapter running inside rodio's mixer picks them up on the next frame. All
//! FFT setup happens on the engine thread. The adapter only swaps in a
//! prepared `ConvolverBank`, and never blocks on the lock to do it.

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::Source;

use super::convolver::Convolver;
use super::impulse::ImpulseResponse;

/// Channel count and sample rate of a realized voice.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StreamFormat {
    pub channels: usize,
    pub sample_rate: u32,
}

impl StreamFormat {
    pub fn of<S: Source>(source: &S) -> Self {
        Self {
            channels: usize::from(source.channels()).max(1),
            sample_rate: source.sample_rate(),
        }
    }
}

/// One convolver per channel for `impulse`, resampled to `format`.
pub fn build_convolvers(
    impulse: &ImpulseResponse,
    format: StreamFormat,
    block: usize,
) -> Vec<Convolver> {
    let ir = impulse.resampled(format.sample_rate).normalized();
    (0..format.channels)
        .map(|c| Convolver::new(ir.channel(c), block))
        .collect()
}

/// Convolvers prepared for one voice and one impulse epoch.
pub struct ConvolverBank {
    voice: u64,
    epoch: u64,
    convolvers: Vec<Convolver>,
}

/// Mix parameters shared between the graph and the audio thread.
pub struct MixControl {
    dry: AtomicU32,
    wet: AtomicU32,
    wet_active: AtomicBool,
    /// Bumped whenever the routing is rebuilt; the adapter then drops its tail.
    routing_epoch: AtomicU64,
    impulse: Mutex<Option<Arc<ImpulseResponse>>>,
    /// Bumped after the impulse and its bank are in place.
    impulse_epoch: AtomicU64,
    bank: Mutex<Option<ConvolverBank>>,
    block: usize,
}

impl MixControl {
    pub fn new(block: usize) -> Self {
        Self {
            dry: AtomicU32::new(1.0f32.to_bits()),
            wet: AtomicU32::new(0.0f32.to_bits()),
            wet_active: AtomicBool::new(false),
            routing_epoch: AtomicU64::new(0),
            impulse: Mutex::new(None),
            impulse_epoch: AtomicU64::new(0),
            bank: Mutex::new(None),
            block,
        }
    }

    pub fn block(&self) -> usize {
        self.block
    }

    pub fn set_gains(&self, dry: f32, wet: f32) {
        self.dry.store(dry.to_bits(), Ordering::Relaxed);
        self.wet.store(wet.to_bits(), Ordering::Relaxed);
    }

    pub fn gains(&self) -> (f32, f32) {
        (
            f32::from_bits(self.dry.load(Ordering::Relaxed)),
            f32::from_bits(self.wet.load(Ordering::Relaxed)),
        )
    }

    /// Switch the wet path on or off and invalidate any convolver history.
    pub fn rebuild(&self, wet_active: bool) {
        self.wet_active.store(wet_active, Ordering::Release);
        self.routing_epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub fn wet_active(&self) -> bool {
        self.wet_active.load(Ordering::Acquire)
    }

    /// Publish a new impulse.
    ///
    /// `prepared` holds the running voice's convolvers for it, if a voice is
    /// playing. Must be called from the engine thread only.
    pub fn install_impulse(
        &self,
        impulse: Arc<ImpulseResponse>,
        prepared: Option<(u64, Vec<Convolver>)>,
    ) {
        let epoch = self.impulse_epoch.load(Ordering::Acquire) + 1;
        if let Ok(mut slot) = self.bank.lock() {
            *slot = prepared.map(|(voice, convolvers)| ConvolverBank {
                voice,
                epoch,
                convolvers,
            });
        }
        if let Ok(mut slot) = self.impulse.lock() {
            *slot = Some(impulse);
        }
        self.impulse_epoch.store(epoch, Ordering::Release);
    }

    pub fn impulse(&self) -> Option<Arc<ImpulseResponse>> {
        self.impulse.lock().ok().and_then(|slot| slot.clone())
    }

    /// Free convolvers left behind by a swap. Engine thread only.
    pub fn clear_bank(&self) {
        if let Ok(mut slot) = self.bank.lock() {
            *slot = None;
        }
    }
}

/// Source adapter splitting the signal into dry and convolved wet paths.
///
/// Once the inner source ends, silence keeps going through the convolvers
/// until the reverb tail has rung out.
pub struct ReverbMix<S> {
    inner: S,
    control: Arc<MixControl>,
    voice: u64,
    channels: usize,
    channel: usize,
    convolvers: Vec<Convolver>,
    /// Frames the wet path keeps sounding after the last input frame.
    tail_frames: usize,
    /// Frames of tail left, once the inner source is exhausted.
    tail_remaining: Option<usize>,
    routing_epoch: u64,
    impulse_epoch: u64,
    dry: f32,
    wet: f32,
    wet_active: bool,
}

impl<S> ReverbMix<S>
where
    S: Source,
{
    /// Wrap `inner` as voice number `voice`. Builds the convolvers for the
    /// current impulse, so call it off the audio thread.
    pub fn new(inner: S, control: Arc<MixControl>, voice: u64) -> Self {
        let format = StreamFormat::of(&inner);
        let impulse_epoch = control.impulse_epoch.load(Ordering::Acquire);
        let convolvers = control
            .impulse()
            .map(|ir| build_convolvers(&ir, format, control.block))
            .unwrap_or_default();

        let mut mix = Self {
            inner,
            control,
            voice,
            channels: format.channels,
            channel: 0,
            convolvers: Vec::new(),
            tail_frames: 0,
            tail_remaining: None,
            routing_epoch: 0,
            impulse_epoch,
            dry: 1.0,
            wet: 0.0,
            wet_active: false,
        };
        mix.set_convolvers(convolvers);
        mix.sync();
        mix
    }

    fn set_convolvers(&mut self, convolvers: Vec<Convolver>) -> Vec<Convolver> {
        self.tail_frames = convolvers
            .iter()
            .map(Convolver::tail_len)
            .max()
            .unwrap_or(0);
        mem::replace(&mut self.convolvers, convolvers)
    }

    /// Pick up parameter changes. Called on frame boundaries only.
    fn sync(&mut self) {
        let (dry, wet) = self.control.gains();
        self.dry = dry;
        self.wet = wet;
        self.wet_active = self.control.wet_active();

        let impulse_epoch = self.control.impulse_epoch.load(Ordering::Acquire);
        if impulse_epoch != self.impulse_epoch {
            self.take_bank(impulse_epoch);
        }

        let routing_epoch = self.control.routing_epoch.load(Ordering::Acquire);
        if routing_epoch != self.routing_epoch {
            self.routing_epoch = routing_epoch;
            for conv in &mut self.convolvers {
                conv.reset();
            }
        }
    }

    /// Swap in the convolvers prepared for `epoch`. The retired ones stay in
    /// the slot so they are freed on the engine thread.
    fn take_bank(&mut self, epoch: u64) {
        let control = Arc::clone(&self.control);
        // Contended: try again on the next frame.
        let Ok(mut slot) = control.bank.try_lock() else {
            return;
        };
        self.impulse_epoch = epoch;
        if let Some(bank) = slot.as_mut() {
            if bank.voice == self.voice
                && bank.epoch == epoch
                && bank.convolvers.len() == self.channels
            {
                let prepared = mem::take(&mut bank.convolvers);
                bank.convolvers = self.set_convolvers(prepared);
            }
        }
    }

    /// Input for the next sample once the inner source is exhausted.
    fn tail_input(&mut self, channel: usize) -> Option<f32> {
        let remaining = self.tail_remaining.get_or_insert(self.tail_frames);
        if *remaining == 0 || !self.wet_active || self.convolvers.is_empty() {
            return None;
        }
        if channel + 1 == self.channels {
            *remaining -= 1;
        }
        Some(0.0)
    }

    fn tail_samples_left(&self, frames: usize) -> usize {
        if self.wet_active && !self.convolvers.is_empty() {
            (frames * self.channels).saturating_sub(self.channel)
        } else {
            0
        }
    }
}

impl<S> Iterator for ReverbMix<S>
where
    S: Source,
{
    type Item = f32;

    #[inline]
    fn next(&mut self) -> Option<f32> {
        let c = self.channel;
        if c == 0 {
            self.sync();
        }
        let x = match self.tail_remaining {
            Some(_) => self.tail_input(c)?,
            None => match self.inner.next() {
                Some(x) => x,
                None if c == 0 => self.tail_input(c)?,
                None => return None,
            },
        };
        self.channel = (c + 1) % self.channels;

        let mut y = x * self.dry;
        if self.wet_active {
            if let Some(conv) = self.convolvers.get_mut(c) {
                y += conv.process_sample(x) * self.wet;
            }
        }
        Some(y)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.inner.size_hint().0, None)
    }
}

impl<S> Source for ReverbMix<S>
where
    S: Source,
{
    fn current_span_len(&self) -> Option<usize> {
        match self.tail_remaining {
            Some(frames) => Some(self.tail_samples_left(frames)),
            None => match self.inner.current_span_len() {
                // The inner source is spent but the tail still follows.
                Some(0) => Some(self.tail_samples_left(self.tail_frames)),
                len => len,
            },
        }
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::graph::Routing;
    use crate::audio::impulse::{ImpulseOrigin, ImpulseShape};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rodio::buffer::SamplesBuffer;

    fn control_for(enabled: bool, wet_amount: u8) -> Arc<MixControl> {
        let control = Arc::new(MixControl::new(16));
        let routing = Routing::resolve(enabled, wet_amount);
        control.set_gains(routing.dry_gain, routing.wet_gain);
        control.rebuild(routing.wet_active());
        control
    }

    fn unit_impulse() -> Arc<ImpulseResponse> {
        Arc::new(ImpulseResponse::new(vec![vec![1.0]], 1_000, ImpulseOrigin::Loaded).unwrap())
    }

    fn silent_impulse() -> ImpulseResponse {
        ImpulseResponse::new(vec![vec![0.0]], 1_000, ImpulseOrigin::Loaded).unwrap()
    }

    const MONO: StreamFormat = StreamFormat {
        channels: 1,
        sample_rate: 1_000,
    };

    fn noise(len: usize) -> Vec<f32> {
        (0..len).map(|i| ((i * 7919 % 199) as f32 / 99.0) - 1.0).collect()
    }

    #[test]
    fn disabled_reverb_is_transparent() {
        let control = control_for(false, 80);
        let ir = ImpulseResponse::new(vec![vec![1.0, 0.5]], 1_000, ImpulseOrigin::Loaded).unwrap();
        control.install_impulse(Arc::new(ir), None);

        let input = noise(200);
        let out: Vec<f32> =
            ReverbMix::new(SamplesBuffer::new(1, 1_000, input.clone()), control, 0).collect();
        assert_eq!(out, input);
    }

    #[test]
    fn enabled_reverb_scales_dry_and_adds_wet_after_latency() {
        let control = control_for(true, 100);
        // Unit impulse: wet path is the input delayed by one block.
        let ir = ImpulseResponse::new(vec![vec![1.0]], 1_000, ImpulseOrigin::Loaded).unwrap();
        control.install_impulse(Arc::new(ir), None);

        let mut input = vec![0.0; 64];
        input[0] = 1.0;
        let out: Vec<f32> = ReverbMix::new(SamplesBuffer::new(1, 1_000, input), control, 0).collect();

        assert!((out[0] - 0.3).abs() < 1e-5, "dry part {}", out[0]);
        assert!((out[16] - 0.7).abs() < 1e-4, "wet part {}", out[16]);
    }

    #[test]
    fn procedural_impulse_audibly_changes_the_signal() {
        let control = control_for(true, 50);
        let mut rng = StdRng::seed_from_u64(11);
        let shape = ImpulseShape {
            length: Duration::from_millis(50),
            ..ImpulseShape::default()
        };
        control.install_impulse(
            Arc::new(ImpulseResponse::procedural_with(&shape, 8_000, &mut rng)),
            None,
        );

        let input = noise(4_000);
        let out: Vec<f32> =
            ReverbMix::new(SamplesBuffer::new(2, 8_000, input.clone()), control, 0).collect();

        // Subtract the dry contribution; what is left is the wet path.
        let dry = Routing::resolve(true, 50).dry_gain;
        let diff: f32 = out
            .iter()
            .zip(&input)
            .skip(64)
            .map(|(a, b)| (a - b * dry) * (a - b * dry))
            .sum();
        assert!(diff > 1.0, "wet path contributed nothing (diff {diff})");
    }

    #[test]
    fn gain_changes_apply_without_rebuilding_the_source() {
        let control = control_for(false, 0);
        let mut mix = ReverbMix::new(SamplesBuffer::new(1, 1_000, vec![1.0; 8]), control.clone(), 0);
        assert_eq!(mix.next(), Some(1.0));

        control.set_gains(0.5, 0.0);
        assert_eq!(mix.next(), Some(0.5));
    }

    #[test]
    fn wet_tail_rings_out_after_the_source_ends() {
        let control = control_for(true, 100);
        control.install_impulse(unit_impulse(), None);

        let mut input = vec![0.0; 64];
        input[63] = 1.0;
        let out: Vec<f32> = ReverbMix::new(SamplesBuffer::new(1, 1_000, input), control, 0).collect();

        // One partition of impulse plus one block of latency.
        assert_eq!(out.len(), 64 + 32);
        assert!((out[63] - 0.3).abs() < 1e-5, "dry part {}", out[63]);
        assert!((out[63 + 16] - 0.7).abs() < 1e-4, "wet part {}", out[63 + 16]);
    }

    #[test]
    fn tail_stops_when_reverb_is_switched_off() {
        let control = control_for(true, 100);
        control.install_impulse(unit_impulse(), None);
        let mut mix = ReverbMix::new(SamplesBuffer::new(1, 1_000, vec![1.0; 4]), control.clone(), 0);

        assert_eq!(mix.by_ref().take(6).count(), 6);
        assert!(mix.current_span_len().is_some_and(|n| n > 0));
        control.rebuild(false);
        assert_eq!(mix.next(), None);
    }

    #[test]
    fn prepared_bank_is_swapped_in_for_its_own_voice() {
        let control = control_for(true, 100);
        control.install_impulse(unit_impulse(), None);

        let mut input = vec![0.0; 64];
        input[0] = 1.0;
        let mix = ReverbMix::new(SamplesBuffer::new(1, 1_000, input), control.clone(), 3);

        let silent = silent_impulse();
        let bank = build_convolvers(&silent, MONO, control.block());
        control.install_impulse(Arc::new(silent), Some((3, bank)));

        let out: Vec<f32> = mix.collect();
        assert!((out[0] - 0.3).abs() < 1e-5);
        assert!(out[16].abs() < 1e-6, "old impulse still active: {}", out[16]);

        // The replaced convolvers are left for the engine thread to free.
        let slot = control.bank.lock().unwrap();
        assert_eq!(slot.as_ref().map(|b| b.convolvers.len()), Some(1));
    }

    #[test]
    fn bank_for_another_voice_is_left_alone() {
        let control = control_for(true, 100);
        control.install_impulse(unit_impulse(), None);

        let mut input = vec![0.0; 64];
        input[0] = 1.0;
        let mix = ReverbMix::new(SamplesBuffer::new(1, 1_000, input), control.clone(), 1);

        let silent = silent_impulse();
        let bank = build_convolvers(&silent, MONO, control.block());
        control.install_impulse(Arc::new(silent), Some((2, bank)));

        let out: Vec<f32> = mix.collect();
        assert!((out[16] - 0.7).abs() < 1e-4, "wet part {}", out[16]);
    }
}
