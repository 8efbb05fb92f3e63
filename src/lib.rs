pub mod audio;
pub mod config;
pub mod input;
pub mod session;

pub use audio::{
    list_input_devices, AudioBackend, AudioFrame, CaptureConfig, CpalBackend, DeviceInfo,
};
pub use config::Config;
pub use session::{CaptureWorker, Command, FileSequencer, Notice, SessionController};
