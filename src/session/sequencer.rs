use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::audio::AudioFrame;

const FILE_PREFIX: &str = "recording_";
const FILE_SUFFIX: &str = ".wav";

/// Assigns sequence numbers from the recordings directory itself.
///
/// The directory is the ground truth: numbers come from scanning existing
/// filenames on every call, so recordings added or removed between runs
/// are accounted for. Filenames that do not match `recording_<N>.wav` are
/// ignored.
pub struct FileSequencer {
    dir: PathBuf,
}

impl FileSequencer {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Next free sequence number: one past the highest of the directory
    /// scan and `floor`.
    ///
    /// `floor` is the caller's own high-water mark of numbers it has
    /// already issued, which keeps a just-deleted number from being
    /// reissued within one run. Creates the directory on first use.
    pub fn next_sequence(&self, floor: u32) -> Result<u32> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create recordings directory {}", self.dir.display())
        })?;

        let mut highest = floor;
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read {}", self.dir.display()))?;

        for entry in entries {
            let entry = entry.with_context(|| format!("failed to read {}", self.dir.display()))?;
            if let Some(sequence) = parse_sequence(&entry.file_name().to_string_lossy()) {
                highest = highest.max(sequence);
            }
        }

        Ok(highest + 1)
    }

    pub fn path_for(&self, sequence: u32) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{sequence}{FILE_SUFFIX}"))
    }

    /// Remove the recording with the given sequence number.
    ///
    /// Returns whether a file was actually removed; never touches any
    /// other file. A missing file is not an error.
    pub fn delete(&self, sequence: u32) -> Result<bool> {
        let path = self.path_for(sequence);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to delete {}", path.display())),
        }
    }

    /// Serialize buffered frames to `path` as 16-bit PCM WAV.
    ///
    /// Returns the number of samples written. A partially written file is
    /// removed on failure so a failed save leaves nothing behind.
    pub fn write(
        &self,
        path: &Path,
        frames: &[AudioFrame],
        sample_rate: u32,
        channels: u16,
    ) -> Result<usize> {
        let result = write_wav(path, frames, sample_rate, channels);

        if result.is_err() {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("could not remove partial file {}: {}", path.display(), e);
                }
            }
        }

        result
    }
}

fn write_wav(path: &Path, frames: &[AudioFrame], sample_rate: u32, channels: u16) -> Result<usize> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create WAV file {}", path.display()))?;

    let mut written = 0usize;
    for frame in frames {
        for &sample in &frame.samples {
            writer
                .write_sample(sample)
                .context("failed to write sample to WAV")?;
        }
        written += frame.samples.len();
    }

    writer.finalize().context("failed to finalize WAV file")?;

    info!("wrote {} samples to {}", written, path.display());

    Ok(written)
}

fn parse_sequence(name: &str) -> Option<u32> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}
