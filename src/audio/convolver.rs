//! Uniformly partitioned FFT convolution (overlap-save).
//!
//! The impulse is split into partitions of `block` frames, each transformed
//! once at construction. Every `block` input samples the newest input window
//! is transformed, pushed onto a frequency-domain delay line and multiplied
//! against all partitions. Output lags input by exactly `block` samples.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Single-channel streaming convolver.
pub struct Convolver {
    block: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Spectra of the impulse partitions, each `2 * block` bins.
    partitions: Vec<Vec<Complex<f32>>>,
    /// Frequency-domain delay line of input windows; `head` is the newest.
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    prev_input: Vec<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
    pos: usize,
    window: Vec<Complex<f32>>,
    acc: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Convolver {
    /// Build a convolver for `impulse`. `block` must be a power of two.
    pub fn new(impulse: &[f32], block: usize) -> Self {
        let block = block.max(1).next_power_of_two();
        let size = block * 2;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let mut scratch = vec![Complex::default(); scratch_len];

        let partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(block)
            .map(|chunk| {
                let mut bins = vec![Complex::default(); size];
                for (b, &s) in bins.iter_mut().zip(chunk) {
                    b.re = s;
                }
                fft.process_with_scratch(&mut bins, &mut scratch);
                bins
            })
            .collect();
        let history = vec![vec![Complex::default(); size]; partitions.len().max(1)];

        Self {
            block,
            fft,
            ifft,
            partitions,
            history,
            head: 0,
            prev_input: vec![0.0; block],
            input: vec![0.0; block],
            output: vec![0.0; block],
            pos: 0,
            window: vec![Complex::default(); size],
            acc: vec![Complex::default(); size],
            scratch,
        }
    }

    /// Samples of output that can still be non-zero after the last non-zero
    /// input: the impulse length rounded up to whole blocks, plus one block
    /// of latency.
    pub fn tail_len(&self) -> usize {
        (self.partitions.len() + 1) * self.block
    }

    /// Push one input sample and pull one output sample.
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let y = self.output[self.pos];
        self.input[self.pos] = x;
        self.pos += 1;
        if self.pos == self.block {
            self.process_block();
            self.pos = 0;
        }
        y
    }

    /// Forget all history, as if freshly constructed.
    pub fn reset(&mut self) {
        for bins in &mut self.history {
            bins.fill(Complex::default());
        }
        self.prev_input.fill(0.0);
        self.input.fill(0.0);
        self.output.fill(0.0);
        self.pos = 0;
    }

    fn process_block(&mut self) {
        let b = self.block;
        let size = b * 2;

        for i in 0..b {
            self.window[i] = Complex::new(self.prev_input[i], 0.0);
            self.window[b + i] = Complex::new(self.input[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.window, &mut self.scratch);

        let depth = self.history.len();
        self.head = (self.head + depth - 1) % depth;
        self.history[self.head].copy_from_slice(&self.window);

        self.acc.fill(Complex::default());
        for (p, h) in self.partitions.iter().enumerate() {
            let x = &self.history[(self.head + p) % depth];
            for ((a, xi), hi) in self.acc.iter_mut().zip(x).zip(h) {
                *a += xi * hi;
            }
        }
        self.ifft.process_with_scratch(&mut self.acc, &mut self.scratch);

        // Only the second half of the circular result is alias-free.
        let scale = 1.0 / size as f32;
        for i in 0..b {
            self.output[i] = self.acc[b + i].re * scale;
        }
        self.prev_input.copy_from_slice(&self.input);
    }
}
