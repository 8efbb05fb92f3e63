pub mod backend;
pub mod cpal_backend;

pub use backend::{convert_channels, to_i16_samples, AudioBackend, AudioFrame, CaptureConfig};
pub use cpal_backend::{list_input_devices, CpalBackend, DeviceInfo};
