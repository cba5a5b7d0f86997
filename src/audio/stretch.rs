//! Pitch-preserving time-stretch (phase vocoder).
//!
//! Frames are read from the input every `speed * SYNTHESIS_HOP` samples and written to the
//! output every `SYNTHESIS_HOP` samples. Each bin's phase is advanced by its measured
//! instantaneous frequency rather than copied, so frequencies (and therefore pitch) are
//! kept while duration scales by `1 / speed`.

use std::f64::consts::PI;

use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

/// Analysis/synthesis frame length in samples.
pub const FRAME_SIZE: usize = 2048;

/// Output hop. 1/8 of a frame keeps the per-bin phase estimate unambiguous up to 2x speed.
pub const SYNTHESIS_HOP: usize = FRAME_SIZE / 8;

/// Speed factors this close to 1.0 return the input unchanged.
const IDENTITY_TOLERANCE: f32 = 1e-3;

/// Output length for `len` input samples played at `speed`.
pub fn stretched_len(len: usize, speed: f32) -> usize {
    (len as f64 / speed as f64).round() as usize
}

/// Change the duration of `samples` by `1 / speed` without changing pitch.
///
/// `speed > 1` shortens the audio, `speed < 1` lengthens it. The result has exactly
/// [`stretched_len`] samples. Non-finite or non-positive speeds leave the input unchanged.
pub fn time_stretch(samples: &[f32], speed: f32) -> Vec<f32> {
    if !speed.is_finite() || speed <= 0.0 {
        log::warn!("Ignoring invalid time-stretch speed {speed}");
        return samples.to_vec();
    }
    if samples.is_empty() || (speed - 1.0).abs() < IDENTITY_TOLERANCE {
        return samples.to_vec();
    }

    let n = FRAME_SIZE;
    let half = n / 2;
    let bins = half + 1;
    let hs = SYNTHESIS_HOP;
    let ha = hs as f64 * speed as f64;

    let out_len = stretched_len(samples.len(), speed);
    let num_frames = (out_len + n) / hs + 1;

    let window = hann(n);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    // Input is read as if padded with `half` zeros in front so frame k is centred on
    // input sample k * ha and output sample k * hs.
    let read = |i: isize| -> f32 {
        if i < 0 {
            0.0
        } else {
            samples.get(i as usize).copied().unwrap_or(0.0)
        }
    };

    let mut output = vec![0.0f32; num_frames * hs + n];
    let mut window_sum = vec![0.0f32; output.len()];
    let mut prev_phase = vec![0.0f64; bins];
    let mut synth_phase = vec![0.0f64; bins];
    let mut prev_start: isize = 0;
    let mut buffer = vec![Complex32::new(0.0, 0.0); n];

    for k in 0..num_frames {
        let start = (k as f64 * ha).round() as isize - half as isize;
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex32::new(read(start + i as isize) * window[i], 0.0);
        }
        fft.process(&mut buffer);

        let advance = (start - prev_start) as f64;
        for bin in 0..bins {
            let c = buffer[bin];
            let magnitude = c.norm();
            let phase = c.arg() as f64;

            if k == 0 || advance <= 0.0 {
                synth_phase[bin] = phase;
            } else {
                let omega = 2.0 * PI * bin as f64 / n as f64;
                let deviation = wrap_phase(phase - prev_phase[bin] - omega * advance);
                let true_freq = omega + deviation / advance;
                synth_phase[bin] = wrap_phase(synth_phase[bin] + true_freq * hs as f64);
            }
            prev_phase[bin] = phase;

            buffer[bin] = Complex32::from_polar(magnitude, synth_phase[bin] as f32);
        }
        // Mirror so the inverse transform is real.
        for bin in 1..half {
            buffer[n - bin] = buffer[bin].conj();
        }
        prev_start = start;

        ifft.process(&mut buffer);

        let offset = k * hs;
        for i in 0..n {
            let w = window[i];
            output[offset + i] += buffer[i].re / n as f32 * w;
            window_sum[offset + i] += w * w;
        }
    }

    output
        .iter()
        .zip(&window_sum)
        .skip(half)
        .take(out_len)
        .map(|(&s, &w)| if w > 1e-6 { s / w } else { 0.0 })
        .collect()
}

fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos())
        .collect()
}

fn wrap_phase(phase: f64) -> f64 {
    phase - 2.0 * PI * (phase / (2.0 * PI)).round()
}
