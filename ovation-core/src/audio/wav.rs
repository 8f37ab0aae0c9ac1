//! WAV file replay as a capture source.
//!
//! Useful for rehearsing a vote against a recording of the venue, and for
//! deterministic tests. Each `read_block` returns the next `block_size` frames
//! mixed to mono; a short tail block is returned once before end-of-file.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use super::{CaptureHandle, CaptureProvider, DEFAULT_BLOCK_SIZE};
use crate::buffering::AudioBlock;
use crate::error::{OvationError, Result};

#[derive(Debug, Clone)]
pub struct WavFileCapture {
    path: PathBuf,
    block_size: usize,
    looping: bool,
}

impl WavFileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_size: DEFAULT_BLOCK_SIZE,
            looping: false,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Rewind at end-of-file instead of failing the read.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureProvider for WavFileCapture {
    fn acquire(&mut self) -> Result<Box<dyn CaptureHandle>> {
        let reader = WavReader::open(&self.path).map_err(|e| {
            OvationError::CaptureUnavailable(format!("{}: {e}", self.path.display()))
        })?;
        let spec = reader.spec();
        info!(
            path = %self.path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            bits = spec.bits_per_sample,
            "replaying WAV file"
        );
        Ok(Box::new(WavHandle {
            reader,
            block_size: self.block_size,
            looping: self.looping,
        }))
    }

    fn describe(&self) -> String {
        format!("file '{}'", self.path.display())
    }
}

struct WavHandle {
    reader: WavReader<BufReader<File>>,
    block_size: usize,
    looping: bool,
}

impl WavHandle {
    /// Pull up to `block_size` frames of interleaved samples as f32.
    fn read_interleaved(&mut self) -> Result<Vec<f32>> {
        let spec = self.reader.spec();
        let wanted = self.block_size * usize::from(spec.channels.max(1));
        let mut out = Vec::with_capacity(wanted);
        match spec.sample_format {
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    out.push(sample.map_err(read_error)?);
                }
            }
            SampleFormat::Int => {
                let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                for sample in self.reader.samples::<i32>().take(wanted) {
                    out.push(sample.map_err(read_error)? as f32 / scale);
                }
            }
        }
        Ok(out)
    }
}

impl CaptureHandle for WavHandle {
    fn read_block(&mut self) -> Result<AudioBlock> {
        let mut interleaved = self.read_interleaved()?;
        if interleaved.is_empty() && self.looping {
            debug!("end of WAV file, rewinding");
            self.reader.seek(0).map_err(read_error)?;
            interleaved = self.read_interleaved()?;
        }
        if interleaved.is_empty() {
            return Err(OvationError::CaptureRead("end of WAV file".into()));
        }

        let spec = self.reader.spec();
        let ch = usize::from(spec.channels.max(1));
        let mono = interleaved
            .chunks(ch)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        Ok(AudioBlock::from_f32(mono, spec.sample_rate))
    }
}

fn read_error<E: std::fmt::Display>(e: E) -> OvationError {
    OvationError::CaptureRead(e.to_string())
}
