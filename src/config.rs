use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub audio: AudioConfig,
    pub recordings: RecordingsConfig,
    pub keys: KeyConfig,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Input device index; omit to use the default device
    #[serde(default)]
    pub device: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RecordingsConfig {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyConfig {
    pub primary: String,
    pub cancel: String,
}

impl Config {
    /// Load configuration from `<path>.toml`, falling back to defaults for
    /// anything missing. The file itself is optional.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("audio.sample_rate", 44100_i64)?
            .set_default("audio.channels", 2_i64)?
            .set_default("recordings.path", "recordings")?
            .set_default("keys.primary", "space")?
            .set_default("keys.cancel", "delete")?
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
