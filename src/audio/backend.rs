use anyhow::Result;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Capture configuration, fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate in Hz
    pub sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Index into the input device list; `None` picks the default device
    pub device_index: Option<usize>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            device_index: None,
        }
    }
}

/// Audio capture backend trait
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. The
    /// channel closes when the backend is stopped or the underlying
    /// stream dies.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio and close the frame channel. Idempotent.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Convert f32 samples from the driver to 16-bit PCM
pub fn to_i16_samples(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Adapt interleaved samples between channel layouts.
///
/// Downmixes any layout to mono by averaging, widens mono to stereo by
/// duplication. Other combinations are rejected when the stream is built,
/// so they pass through unchanged here.
pub fn convert_channels(samples: Vec<i16>, from: u16, to: u16) -> Vec<i16> {
    if from == to {
        return samples;
    }

    match (from, to) {
        (_, 1) => samples
            .chunks_exact(from as usize)
            .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / from as i32) as i16)
            .collect(),
        (1, 2) => samples.iter().flat_map(|&s| [s, s]).collect(),
        _ => samples,
    }
}
