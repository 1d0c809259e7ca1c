//! Impulse responses for the convolution reverb.
//!
//! An impulse is either decoded from a fetched audio file or generated
//! procedurally: exponentially decaying white noise per channel. The
//! procedural one is what keeps the reverb audible when nothing can be
//! fetched.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rodio::{Decoder, Source};

use crate::config::{MAX_DECAY_SECS, MAX_PRE_DELAY_MS, ReverbSettings};
use crate::error::{ErrorKind, PlaybackError};

/// Rate procedural impulses are generated at before resampling to the stream.
pub const PROCEDURAL_SAMPLE_RATE: u32 = 48_000;

/// Decoded impulses longer than this are truncated.
const MAX_IMPULSE_SECS: u32 = 6;

/// Parameters of the procedural impulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseShape {
    pub length: Duration,
    /// Exponent of the `(1 - t)^curve` envelope.
    pub decay_curve: f32,
    pub pre_delay: Duration,
    pub channels: usize,
}

impl Default for ImpulseShape {
    fn default() -> Self {
        Self {
            length: Duration::from_secs(2),
            decay_curve: 3.0,
            pre_delay: Duration::ZERO,
            channels: 2,
        }
    }
}

impl ImpulseShape {
    /// Shape for the configured reverb. Out-of-range values are clamped.
    pub fn from_settings(settings: &ReverbSettings) -> Self {
        let defaults = Self::default();
        let length = Duration::try_from_secs_f32(settings.decay_secs.min(MAX_DECAY_SECS))
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(defaults.length);
        Self {
            length,
            decay_curve: settings.decay_curve,
            pre_delay: Duration::from_millis(settings.pre_delay_ms.min(MAX_PRE_DELAY_MS)),
            channels: defaults.channels,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImpulseOrigin {
    Procedural,
    Loaded,
}

/// Deinterleaved impulse response.
#[derive(Clone, PartialEq)]
pub struct ImpulseResponse {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    origin: ImpulseOrigin,
}

impl ImpulseResponse {
    pub fn new(
        channels: Vec<Vec<f32>>,
        sample_rate: u32,
        origin: ImpulseOrigin,
    ) -> Result<Self, PlaybackError> {
        if sample_rate == 0 {
            return Err(PlaybackError::new(
                ErrorKind::DecodeFailure,
                "impulse has a zero sample rate",
            ));
        }
        let frames = channels.first().map_or(0, Vec::len);
        if frames == 0 || channels.iter().any(|c| c.len() != frames) {
            return Err(PlaybackError::new(
                ErrorKind::DecodeFailure,
                "impulse is empty or has ragged channels",
            ));
        }
        Ok(Self {
            channels,
            sample_rate,
            origin,
        })
    }

    /// Generate a noise impulse using the thread-local RNG.
    pub fn procedural(shape: &ImpulseShape, sample_rate: u32) -> Self {
        Self::procedural_with(shape, sample_rate, &mut rand::thread_rng())
    }

    pub fn procedural_with<R: Rng + ?Sized>(
        shape: &ImpulseShape,
        sample_rate: u32,
        rng: &mut R,
    ) -> Self {
        let sample_rate = sample_rate.max(1);
        let frames = ((shape.length.as_secs_f64() * f64::from(sample_rate)).round() as usize).max(1);
        let pre = (shape.pre_delay.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        let curve = shape.decay_curve.max(0.0);

        let channels = (0..shape.channels.max(1))
            .map(|_| {
                let mut ch = vec![0.0f32; pre];
                ch.reserve(frames);
                for i in 0..frames {
                    let env = (1.0 - i as f32 / frames as f32).powf(curve);
                    ch.push(rng.gen_range(-1.0f32..1.0) * env);
                }
                ch
            })
            .collect();

        Self {
            channels,
            sample_rate,
            origin: ImpulseOrigin::Procedural,
        }
    }

    /// Decode an impulse from an encoded audio file (wav, ogg, flac, mp3).
    pub fn decode(bytes: Arc<[u8]>) -> Result<Self, PlaybackError> {
        if bytes.is_empty() {
            return Err(PlaybackError::new(ErrorKind::DecodeFailure, "empty impulse"));
        }
        let decoder =
            Decoder::new(Cursor::new(bytes)).map_err(|e| PlaybackError::from_decoder(&e))?;
        let channel_count = usize::from(decoder.channels()).max(1);
        let sample_rate = decoder.sample_rate();
        let max_samples = (sample_rate * MAX_IMPULSE_SECS) as usize * channel_count;

        let mut channels = vec![Vec::new(); channel_count];
        for (i, s) in decoder.take(max_samples).enumerate() {
            channels[i % channel_count].push(s);
        }
        // A trailing partial frame would leave the channels ragged.
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in &mut channels {
            ch.truncate(frames);
        }
        Self::new(channels, sample_rate, ImpulseOrigin::Loaded)
    }

    /// Linear-interpolation resample to `rate`.
    pub fn resampled(&self, rate: u32) -> Self {
        if rate == self.sample_rate || rate == 0 {
            return self.clone();
        }
        let ratio = f64::from(self.sample_rate) / f64::from(rate);
        let frames = self.frames();
        let out_frames = ((frames as f64) / ratio).ceil().max(1.0) as usize;

        let channels = self
            .channels
            .iter()
            .map(|src| {
                (0..out_frames)
                    .map(|j| {
                        let pos = j as f64 * ratio;
                        let i0 = (pos.floor() as usize).min(frames - 1);
                        let i1 = (i0 + 1).min(frames - 1);
                        let frac = (pos - i0 as f64) as f32;
                        src[i0] * (1.0 - frac) + src[i1] * frac
                    })
                    .collect()
            })
            .collect();

        Self {
            channels,
            sample_rate: rate,
            origin: self.origin,
        }
    }

    /// Scale to unit energy (averaged over channels) so the wet path keeps
    /// roughly the loudness of the dry path.
    pub fn normalized(mut self) -> Self {
        let energy = self.energy();
        if energy > f32::EPSILON {
            let scale = 1.0 / energy.sqrt();
            for ch in &mut self.channels {
                for s in ch.iter_mut() {
                    *s *= scale;
                }
            }
        }
        self
    }

    /// Sum of squares per channel, averaged over channels.
    pub fn energy(&self) -> f32 {
        let total: f32 = self
            .channels
            .iter()
            .map(|c| c.iter().map(|s| s * s).sum::<f32>())
            .sum();
        total / self.channels.len() as f32
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[cfg(test)]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    pub fn origin(&self) -> ImpulseOrigin {
        self.origin
    }

    /// Samples of channel `i`, wrapping when the stream has more channels.
    pub fn channel(&self, i: usize) -> &[f32] {
        &self.channels[i % self.channels.len()]
    }
}

impl fmt::Debug for ImpulseResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpulseResponse")
            .field("channels", &self.channel_count())
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("origin", &self.origin)
            .finish()
    }
}
