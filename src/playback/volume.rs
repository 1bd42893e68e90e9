// SPDX-License-Identifier: MPL-2.0
//! Volume value type and the lock-free cell shared with the audio callback.
//!
//! Volumes are within 0.0–1.5, where 1.0 = 100%.

use crate::config::{DEFAULT_VOLUME, MAX_VOLUME, MIN_VOLUME, VOLUME_STEP};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Volume level, guaranteed to be within valid range (0.0–1.5).
///
/// Values above 1.0 represent amplification (up to 150%).
///
/// # Example
///
/// ```
/// use syncplay::playback::Volume;
///
/// let vol = Volume::new(0.5);
/// assert_eq!(vol.value(), 0.5);
///
/// // Values outside range are clamped
/// let too_loud = Volume::new(2.0);
/// assert_eq!(too_loud.value(), 1.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume(f32);

impl Volume {
    /// Creates a new volume level, clamping to valid range.
    #[must_use]
    pub fn new(volume: f32) -> Self {
        Self(volume.clamp(MIN_VOLUME, MAX_VOLUME))
    }

    #[must_use]
    pub fn value(self) -> f32 {
        self.0
    }

    /// Gain applied to samples.
    ///
    /// Squaring makes the control perceptually linear:
    /// - 50% → 25% actual (-12 dB)
    /// - 100% → 100% actual (0 dB)
    /// - 150% → 225% actual (+7 dB)
    #[must_use]
    pub fn gain(self) -> f32 {
        self.0 * self.0
    }

    #[must_use]
    pub fn increase(self) -> Self {
        Self::new(self.0 + VOLUME_STEP)
    }

    #[must_use]
    pub fn decrease(self) -> Self {
        Self::new(self.0 - VOLUME_STEP)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(DEFAULT_VOLUME)
    }
}

/// Volume shared between the control side and the device callback.
///
/// Stored as the bits of an `f32` so the callback never takes a lock.
#[derive(Debug, Clone)]
pub struct SharedVolume(Arc<AtomicU32>);

impl SharedVolume {
    #[must_use]
    pub fn new(volume: Volume) -> Self {
        Self(Arc::new(AtomicU32::new(volume.value().to_bits())))
    }

    #[must_use]
    pub fn get(&self) -> Volume {
        Volume(f32::from_bits(self.0.load(Ordering::Relaxed)))
    }

    pub fn set(&self, volume: Volume) {
        self.0.store(volume.value().to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedVolume {
    fn default() -> Self {
        Self::new(Volume::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_to_valid_range() {
        assert_eq!(Volume::new(-0.5).value(), MIN_VOLUME);
        assert_eq!(Volume::new(3.0).value(), MAX_VOLUME);
        assert_eq!(Volume::new(0.5).value(), 0.5);
    }

    #[test]
    fn gain_is_quadratic() {
        assert_eq!(Volume::new(0.5).gain(), 0.25);
        assert_eq!(Volume::new(1.0).gain(), 1.0);
        assert!((Volume::new(1.5).gain() - 2.25).abs() < 1e-6);
    }

    #[test]
    fn steps_stay_in_range() {
        assert!((Volume::new(0.5).increase().value() - 0.55).abs() < 1e-6);
        assert_eq!(Volume::new(MAX_VOLUME).increase().value(), MAX_VOLUME);
        assert_eq!(Volume::new(MIN_VOLUME).decrease().value(), MIN_VOLUME);
    }

    #[test]
    fn shared_volume_is_visible_across_clones() {
        let shared = SharedVolume::default();
        let other = shared.clone();
        assert_eq!(other.get(), Volume::default());

        shared.set(Volume::new(1.2));
        assert_eq!(other.get().value(), 1.2);
    }
}
