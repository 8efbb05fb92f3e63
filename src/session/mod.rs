pub mod controller;
pub mod sequencer;
pub mod worker;

pub use controller::{Command, Notice, SessionController};
pub use sequencer::FileSequencer;
pub use worker::CaptureWorker;
