//! WAV export of offline renders.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::offline::RenderOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    Int16,
    Int24,
    Float32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub bit_depth: BitDepth,
    /// Duplicate the mono render into two channels.
    pub stereo: bool,
    pub normalize: bool,
    /// TPDF dither on integer formats.
    pub dither: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            bit_depth: BitDepth::Int16,
            stereo: true,
            normalize: false,
            dither: true,
        }
    }
}

/// Writes `render` to `path`.
#[instrument(skip(render, config), fields(frames = render.samples.len()))]
pub fn write_wav(path: &Path, render: &RenderOutput, config: &ExportConfig) -> Result<(), anyhow::Error> {
    let (bits_per_sample, sample_format) = match config.bit_depth {
        BitDepth::Int16 => (16, SampleFormat::Int),
        BitDepth::Int24 => (24, SampleFormat::Int),
        BitDepth::Float32 => (32, SampleFormat::Float),
    };
    let channels: u16 = if config.stereo { 2 } else { 1 };
    let spec = WavSpec {
        channels,
        sample_rate: render.sample_rate,
        bits_per_sample,
        sample_format,
    };
    let mut writer = WavWriter::create(path, spec)?;

    let norm_gain = if config.normalize {
        1.0 / render.peak().max(1e-10)
    } else {
        1.0
    };
    let mut dither = Dither::new(config.dither, bits_per_sample as u32);

    for &sample in &render.samples {
        let s = sample * norm_gain;
        for _ in 0..channels {
            match config.bit_depth {
                BitDepth::Float32 => writer.write_sample(s)?,
                BitDepth::Int16 => writer.write_sample(quantize(s + dither.next(), 16) as i16)?,
                BitDepth::Int24 => writer.write_sample(quantize(s + dither.next(), 24))?,
            }
        }
    }

    writer.finalize()?;
    info!(path = %path.display(), seconds = render.duration_seconds(), "wrote wav");
    Ok(())
}

fn quantize(sample: f32, bits: u32) -> i32 {
    let scale = (1i64 << (bits - 1)) as f32 - 1.0;
    (sample * scale).round().clamp(-(scale + 1.0), scale) as i32
}

/// Triangular dither from two LCG draws, one LSB wide.
struct Dither {
    enabled: bool,
    state: u32,
    lsb: f32,
}

impl Dither {
    fn new(enabled: bool, bits: u32) -> Self {
        Self {
            enabled: enabled && bits < 32,
            state: 0x5EED_CAFE,
            lsb: 1.0 / (1u64 << (bits.min(31) - 1)) as f32,
        }
    }

    fn draw(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        self.state as f32 / u32::MAX as f32 * 2.0 - 1.0
    }

    fn next(&mut self) -> f32 {
        if !self.enabled {
            return 0.0;
        }
        (self.draw() - self.draw()) * self.lsb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render() -> RenderOutput {
        RenderOutput {
            samples: vec![0.0, 0.5, -0.5, 1.0],
            sample_rate: 8000,
            events: Vec::new(),
            pattern_seconds: 0.0,
        }
    }

    #[test]
    fn writes_stereo_int16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let config = ExportConfig {
            dither: false,
            ..ExportConfig::default()
        };
        write_wav(&path, &render(), &config).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 0, 16384, 16384, -16384, -16384, 32767, 32767]);
    }

    #[test]
    fn float_export_can_normalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut quiet = render();
        quiet.samples.iter_mut().for_each(|s| *s *= 0.25);
        let config = ExportConfig {
            bit_depth: BitDepth::Float32,
            stereo: false,
            normalize: true,
            dither: false,
        };
        write_wav(&path, &quiet, &config).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.0, 0.5, -0.5, 1.0]);
    }

    #[test]
    fn quantize_clamps() {
        assert_eq!(quantize(2.0, 16), 32767);
        assert_eq!(quantize(-2.0, 16), -32768);
    }
}
