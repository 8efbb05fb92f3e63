// Microphone capture via cpal.
//
// The cpal stream is not Send, so it lives on a dedicated thread for the
// lifetime of a session. The driver callback converts samples to interleaved
// i16 and forwards frames over a bounded channel; the controller side never
// blocks the callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel as std_channel, Receiver as StdReceiver, RecvTimeoutError, Sender as StdSender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{convert_channels, to_i16_samples, AudioBackend, AudioFrame, CaptureConfig};

/// How many frames may queue between the driver callback and the consumer
/// before new frames are dropped.
const FRAME_CHANNEL_CAPACITY: usize = 256;

/// How often the stream thread checks for a fatal stream error while
/// waiting for shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// An input device as shown by the `devices` subcommand
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
}

/// List devices exposing at least one input channel
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let devices = host
        .input_devices()
        .context("failed to enumerate input devices")?
        .enumerate()
        .filter_map(|(index, d)| {
            d.name().ok().map(|name| DeviceInfo {
                index,
                is_default: name == default_name,
                name,
            })
        })
        .collect();

    Ok(devices)
}

/// cpal microphone backend
pub struct CpalBackend {
    config: CaptureConfig,
    stream: Option<StreamHandle>,
}

struct StreamHandle {
    shutdown_tx: StdSender<()>,
    thread: thread::JoinHandle<()>,
}

impl CpalBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for CpalBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.stream.is_some() {
            bail!("already capturing");
        }

        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = std_channel();
        let config = self.config.clone();

        let thread = thread::Builder::new()
            .name("capture-stream".into())
            .spawn(move || stream_thread(config, frames_tx, ready_tx, shutdown_rx))
            .context("failed to spawn capture thread")?;

        match ready_rx.await {
            Ok(Ok(())) => {
                self.stream = Some(StreamHandle {
                    shutdown_tx,
                    thread,
                });
                info!(
                    "capture started ({}Hz, {} channels)",
                    self.config.sample_rate, self.config.channels
                );
                Ok(frames_rx)
            }
            Ok(Err(e)) => {
                // Thread reported the build error and has already returned.
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(anyhow!("capture thread exited before the stream was ready"))
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.stream.take() else {
            return Ok(());
        };

        let _ = handle.shutdown_tx.send(());

        // Full join: once this returns the callback is gone and the frame
        // channel is closed, so no further frames can arrive.
        tokio::task::spawn_blocking(move || handle.thread.join())
            .await
            .context("failed to join capture thread")?
            .map_err(|_| anyhow!("capture thread panicked"))?;

        info!("capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

/// Owns the cpal stream for one session.
///
/// Reports build success or failure once through `ready_tx`, then parks
/// until `shutdown_rx` fires or the error callback flags a fatal stream
/// error. Dropping the stream drops the callback and with it the frame
/// sender, which closes the frame channel.
fn stream_thread(
    config: CaptureConfig,
    frames_tx: mpsc::Sender<AudioFrame>,
    ready_tx: oneshot::Sender<Result<()>>,
    shutdown_rx: StdReceiver<()>,
) {
    let fatal = Arc::new(AtomicBool::new(false));

    let stream = match build_stream(&config, frames_tx, Arc::clone(&fatal)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    loop {
        match shutdown_rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if fatal.load(Ordering::SeqCst) {
                    error!("capture stream reported a fatal error, shutting down");
                    break;
                }
            }
        }
    }

    drop(stream);
}

fn build_stream(
    config: &CaptureConfig,
    frames_tx: mpsc::Sender<AudioFrame>,
    fatal: Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = match config.device_index {
        Some(index) => host
            .input_devices()
            .context("failed to enumerate input devices")?
            .nth(index)
            .ok_or_else(|| anyhow!("no input device at index {index}"))?,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("no default input device"))?,
    };
    let device_name = device.name().unwrap_or_else(|_| "<unknown>".into());

    let supported = select_config(&device, config).with_context(|| {
        format!(
            "device '{}' does not support {}Hz capture",
            device_name, config.sample_rate
        )
    })?;
    let device_channels = supported.channels();
    let sample_format = supported.sample_format();

    let adaptable = device_channels == config.channels
        || config.channels == 1
        || (device_channels == 1 && config.channels == 2);
    if !adaptable {
        bail!(
            "cannot adapt {} device channels to {} output channels",
            device_channels,
            config.channels
        );
    }

    info!(
        "opening '{}' ({} channels at {}Hz, {:?})",
        device_name,
        device_channels,
        supported.sample_rate().0,
        sample_format
    );

    let started = Instant::now();
    let target_channels = config.channels;
    let sample_rate = config.sample_rate;
    let stream_config: cpal::StreamConfig = supported.config();

    let stream = match sample_format {
        SampleFormat::F32 => {
            let tx = frames_tx.clone();
            let err_fn = make_err_fn(Arc::clone(&fatal));
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    forward(
                        to_i16_samples(data),
                        device_channels,
                        target_channels,
                        sample_rate,
                        started,
                        &tx,
                    );
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let tx = frames_tx.clone();
            let err_fn = make_err_fn(fatal);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    forward(
                        data.to_vec(),
                        device_channels,
                        target_channels,
                        sample_rate,
                        started,
                        &tx,
                    );
                },
                err_fn,
                None,
            )
        }
        other => bail!("unsupported sample format: {other:?}"),
    }
    .context("failed to build input stream")?;

    stream.play().context("failed to start input stream")?;

    Ok(stream)
}

/// Runs on the driver thread: adapt one chunk and hand it to the consumer.
///
/// A full queue means the consumer fell behind; the chunk is dropped and
/// capture continues.
fn forward(
    samples: Vec<i16>,
    device_channels: u16,
    target_channels: u16,
    sample_rate: u32,
    started: Instant,
    tx: &mpsc::Sender<AudioFrame>,
) {
    let frame = AudioFrame {
        samples: convert_channels(samples, device_channels, target_channels),
        sample_rate,
        channels: target_channels,
        timestamp_ms: started.elapsed().as_millis() as u64,
    };

    match tx.try_send(frame) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!("frame queue full, dropping one chunk"),
        Err(TrySendError::Closed(_)) => {}
    }
}

fn make_err_fn(fatal: Arc<AtomicBool>) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| match err {
        cpal::StreamError::DeviceNotAvailable => {
            error!("capture device disconnected");
            fatal.store(true, Ordering::SeqCst);
        }
        other => warn!("capture stream error, chunk skipped: {other}"),
    }
}

/// Pick a supported config at the target sample rate, preferring an exact
/// channel match so no conversion is needed.
fn select_config(device: &cpal::Device, config: &CaptureConfig) -> Result<cpal::SupportedStreamConfig> {
    let rate = SampleRate(config.sample_rate);

    let mut ranges: Vec<_> = device
        .supported_input_configs()
        .context("failed to query supported input configs")?
        .filter(|r| r.min_sample_rate() <= rate && r.max_sample_rate() >= rate)
        .filter(|r| matches!(r.sample_format(), SampleFormat::F32 | SampleFormat::I16))
        .collect();

    ranges.sort_by_key(|r| {
        (
            r.channels() != config.channels,
            r.sample_format() != SampleFormat::F32,
        )
    });

    match ranges.into_iter().next() {
        Some(range) => Ok(range.with_sample_rate(rate)),
        None => {
            let default = device
                .default_input_config()
                .context("failed to query default input config")?;
            if default.sample_rate() == rate {
                Ok(default)
            } else {
                bail!("no supported input configuration at {}Hz", config.sample_rate)
            }
        }
    }
}
