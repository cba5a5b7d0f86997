//! Sample-level post-processing applied after synthesis.

pub mod stretch;

pub use stretch::time_stretch;

/// Scale `samples` by `volume` and hard-clip to `[-1.0, 1.0]`.
///
/// Returns the number of samples that had to be clipped.
pub fn apply_volume(samples: &mut [f32], volume: f32) -> usize {
    let volume = volume.clamp(0.0, 1.0);
    let mut clipped = 0;
    for s in samples.iter_mut() {
        let scaled = *s * volume;
        if scaled.abs() > 1.0 {
            clipped += 1;
        }
        *s = scaled.clamp(-1.0, 1.0);
    }
    if clipped > 0 {
        log::debug!("Clipped {clipped} of {} samples after volume scaling", samples.len());
    }
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_scales_linearly() {
        let mut samples = vec![0.5, -0.5, 0.25];
        assert_eq!(apply_volume(&mut samples, 0.5), 0);
        assert_eq!(samples, vec![0.25, -0.25, 0.125]);
    }

    #[test]
    fn loud_model_output_is_clipped() {
        let mut samples = vec![1.4, -2.0, 0.9];
        assert_eq!(apply_volume(&mut samples, 1.0), 2);
        assert_eq!(samples, vec![1.0, -1.0, 0.9]);
    }

    #[test]
    fn volume_is_clamped_to_unit_range() {
        let mut samples = vec![0.5];
        apply_volume(&mut samples, 3.0);
        assert_eq!(samples, vec![0.5]);
        apply_volume(&mut samples, -1.0);
        assert_eq!(samples, vec![0.0]);
    }
}
