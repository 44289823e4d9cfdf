//! Volume percent/factor mapping and the callback-shared factor cell
//!
//! Volumes are 0-100 integers everywhere user-facing and linear 0.0-1.0
//! factors inside the audio callback. The mapping is linear: the driver
//! multiplies every sample by the factor, so 42 maps to exactly 0.42.

use std::sync::atomic::{AtomicU32, Ordering};

/// Convert a 0-100 volume percentage to a linear gain factor
///
/// Values above 100 clamp to unity.
pub fn factor_from_percent(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

/// Atomic volume factor shared between the command thread and an audio
/// callback
///
/// The command thread writes, the callback reads once per buffer. Stored as
/// f32 bits in an `AtomicU32` so neither side ever takes a lock.
#[derive(Debug)]
pub struct VolumeFactor {
    bits: AtomicU32,
}

impl VolumeFactor {
    /// Create a factor cell, clamped to 0.0-1.0
    pub fn new(factor: f32) -> Self {
        Self {
            bits: AtomicU32::new(factor.clamp(0.0, 1.0).to_bits()),
        }
    }

    /// Replace the factor (command thread)
    pub fn set(&self, factor: f32) {
        self.bits
            .store(factor.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Read the factor (audio callback)
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Multiply a sample buffer by the current factor (in-place)
    pub fn apply(&self, buffer: &mut [f32]) {
        let factor = self.get();

        if factor == 0.0 {
            buffer.fill(0.0);
        } else if factor != 1.0 {
            for sample in buffer.iter_mut() {
                *sample *= factor;
            }
        }
    }
}

impl Default for VolumeFactor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_mapping_is_linear() {
        assert_eq!(factor_from_percent(0), 0.0);
        assert_eq!(factor_from_percent(42), 0.42);
        assert_eq!(factor_from_percent(100), 1.0);
        // Out-of-range clamps
        assert_eq!(factor_from_percent(130), 1.0);
    }

    #[test]
    fn set_and_get() {
        let factor = VolumeFactor::default();
        assert_eq!(factor.get(), 1.0);

        factor.set(0.42);
        assert!((factor.get() - 0.42).abs() < f32::EPSILON);

        // Clamped
        factor.set(7.0);
        assert_eq!(factor.get(), 1.0);
        factor.set(-1.0);
        assert_eq!(factor.get(), 0.0);
    }

    #[test]
    fn apply_to_buffer() {
        let factor = VolumeFactor::new(0.5);
        let mut buffer = vec![1.0, -0.8, 0.2];
        factor.apply(&mut buffer);
        assert_eq!(buffer, vec![0.5, -0.4, 0.1]);
    }

    #[test]
    fn apply_zero_silences() {
        let factor = VolumeFactor::new(0.0);
        let mut buffer = vec![0.9, -0.9];
        factor.apply(&mut buffer);
        assert_eq!(buffer, vec![0.0, 0.0]);
    }

    #[test]
    fn shared_across_threads() {
        use std::sync::Arc;

        let factor = Arc::new(VolumeFactor::default());
        let writer = factor.clone();

        let handle = std::thread::spawn(move || {
            writer.set(0.25);
        });
        handle.join().unwrap();

        assert_eq!(factor.get(), 0.25);
    }
}
