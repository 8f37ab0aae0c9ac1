//! Block loudness in dBFS.
//!
//! ## Algorithm
//!
//! 1. Normalise every sample to a centred amplitude in [-1, 1].
//! 2. Mean of the squared amplitudes → RMS.
//! 3. `20 * log10(RMS)`.
//!
//! Silence (RMS = 0) is `-inf`. That is a valid reading; the display helpers
//! below clamp it for presentation, the meter itself never does.

use crate::buffering::AudioBlock;

/// Decibel loudness of one block relative to full scale.
pub type LoudnessReading = f64;

/// Bottom of the display scale (dBFS).
pub const DISPLAY_FLOOR_DB: f64 = -60.0;

/// Loudness of `block` in dBFS.
pub fn measure(block: &AudioBlock) -> LoudnessReading {
    amplitude_to_db(rms(block))
}

/// Root-mean-square of the block's normalised samples. Empty blocks are silent.
pub fn rms(block: &AudioBlock) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = block.normalized().map(|s| s * s).sum();
    (sum_sq / block.len() as f64).sqrt()
}

/// `20 * log10(amplitude)`; zero maps to `-inf`.
pub fn amplitude_to_db(amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * amplitude.log10()
}

/// Clamp a reading to `floor` so it can be formatted or plotted.
///
/// NaN is shown as the floor as well.
pub fn display_db(reading: LoudnessReading, floor: f64) -> f64 {
    if reading.is_nan() {
        return floor;
    }
    reading.max(floor)
}

/// Position of `db` on the -60 dB..0 dB meter scale, in [0, 1].
pub fn meter_fraction(db: f64) -> f64 {
    let clamped = display_db(db, DISPLAY_FLOOR_DB);
    ((clamped - DISPLAY_FLOOR_DB) / -DISPLAY_FLOOR_DB).clamp(0.0, 1.0)
}

/// Coarse band for colouring a level bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelBand {
    Quiet,
    Moderate,
    Loud,
}

impl LevelBand {
    pub fn of(db: f64) -> Self {
        let fraction = meter_fraction(db);
        if fraction > 0.8 {
            LevelBand::Loud
        } else if fraction > 0.5 {
            LevelBand::Moderate
        } else {
            LevelBand::Quiet
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn silence_is_negative_infinity() {
        let block = AudioBlock::from_u8(vec![128; 2048], 48_000);
        assert_eq!(measure(&block), f64::NEG_INFINITY);

        let block = AudioBlock::from_f32(vec![0.0; 2048], 48_000);
        assert_eq!(measure(&block), f64::NEG_INFINITY);
    }

    #[test]
    fn empty_block_is_silence_not_nan() {
        let block = AudioBlock::from_f32(vec![], 48_000);
        assert_eq!(measure(&block), f64::NEG_INFINITY);
    }

    #[test]
    fn full_scale_square_wave_is_zero_db() {
        let samples: Vec<f32> = (0..2048)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let block = AudioBlock::from_f32(samples, 48_000);
        assert_eq!(measure(&block), 0.0);
    }

    #[test]
    fn u8_extremes_are_close_to_full_scale() {
        // 255 normalises to 127/128, so the square wave sits just under 0 dB.
        let samples: Vec<u8> = (0..2048).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        let db = measure(&AudioBlock::from_u8(samples, 48_000));
        assert!(db < 0.0);
        assert_abs_diff_eq!(db, 0.0, epsilon = 0.05);
    }

    #[test]
    fn half_scale_square_wave_is_minus_six_db() {
        let samples: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let db = measure(&AudioBlock::from_f32(samples, 16_000));
        assert_abs_diff_eq!(db, 20.0 * 0.5f64.log10(), epsilon = 1e-9);
    }

    #[test]
    fn display_helpers_clamp_silence() {
        assert_eq!(display_db(f64::NEG_INFINITY, DISPLAY_FLOOR_DB), -60.0);
        assert_eq!(display_db(f64::NAN, -80.0), -80.0);
        assert_eq!(display_db(-12.5, DISPLAY_FLOOR_DB), -12.5);
        assert_eq!(meter_fraction(f64::NEG_INFINITY), 0.0);
        assert_eq!(meter_fraction(0.0), 1.0);
        assert_eq!(meter_fraction(6.0), 1.0);
        assert_abs_diff_eq!(meter_fraction(-30.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn level_bands_follow_meter_fraction() {
        assert_eq!(LevelBand::of(f64::NEG_INFINITY), LevelBand::Quiet);
        assert_eq!(LevelBand::of(-30.0), LevelBand::Quiet);
        assert_eq!(LevelBand::of(-20.0), LevelBand::Moderate);
        assert_eq!(LevelBand::of(-6.0), LevelBand::Loud);
    }
}
