//! Typed audio block handed from a capture handle to the level meter.

/// Sample payload of one block, tagged with its encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    /// Unsigned 8-bit PCM centred at 128 (browser analyser byte data, WAV u8).
    U8(Vec<u8>),
    /// Normalised floating-point PCM in [-1.0, 1.0].
    F32(Vec<f32>),
}

/// A contiguous block of mono samples captured in one cycle.
///
/// Produced by a `CaptureHandle`, consumed (by reference) by the meter and
/// dropped at the end of the cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Samples,
    /// Sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
}

impl AudioBlock {
    pub fn new(samples: Samples, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn from_f32(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(Samples::F32(samples), sample_rate)
    }

    pub fn from_u8(samples: Vec<u8>, sample_rate: u32) -> Self {
        Self::new(Samples::U8(samples), sample_rate)
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Number of samples in the block.
    pub fn len(&self) -> usize {
        match &self.samples {
            Samples::U8(s) => s.len(),
            Samples::F32(s) => s.len(),
        }
    }

    /// Returns true if the block contains no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the duration of this block in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Iterate samples as centred amplitudes in [-1.0, 1.0].
    pub fn normalized(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match &self.samples {
            Samples::U8(s) => Box::new(s.iter().map(|&v| (f64::from(v) - 128.0) / 128.0)),
            Samples::F32(s) => Box::new(s.iter().map(|&v| f64::from(v))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_midpoint_normalizes_to_zero() {
        let block = AudioBlock::from_u8(vec![128, 0, 255], 8_000);
        let values: Vec<f64> = block.normalized().collect();
        assert_eq!(values[0], 0.0);
        assert_eq!(values[1], -1.0);
        assert!((values[2] - 127.0 / 128.0).abs() < 1e-12);
    }

    #[test]
    fn duration_uses_sample_rate() {
        let block = AudioBlock::from_f32(vec![0.0; 4_800], 48_000);
        assert!((block.duration_secs() - 0.1).abs() < 1e-12);
        assert_eq!(AudioBlock::from_f32(vec![0.0; 10], 0).duration_secs(), 0.0);
    }
}
