use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::controller::Command;
use crate::audio::AudioFrame;

/// Drains capture frames into an in-memory buffer on its own task.
///
/// The buffer lives inside the task and is only handed out by [`join`],
/// so once `join` returns there is no writer left that could touch it.
///
/// [`join`]: CaptureWorker::join
pub struct CaptureWorker {
    handle: JoinHandle<Vec<AudioFrame>>,
    stop_requested: Arc<AtomicBool>,
}

impl CaptureWorker {
    /// Spawn the drain task for one session.
    ///
    /// If the frame channel closes without [`request_stop`] having been
    /// called first, the stream died on its own and the worker posts
    /// [`Command::CaptureEnded`] onto the controller's command queue.
    ///
    /// [`request_stop`]: CaptureWorker::request_stop
    pub fn spawn(mut frames: mpsc::Receiver<AudioFrame>, commands: mpsc::Sender<Command>) -> Self {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop_requested);

        let handle = tokio::spawn(async move {
            let mut buffer = Vec::new();

            while let Some(frame) = frames.recv().await {
                buffer.push(frame);
            }

            if !stop_flag.load(Ordering::SeqCst) {
                let _ = commands.send(Command::CaptureEnded).await;
            }

            buffer
        });

        Self {
            handle,
            stop_requested,
        }
    }

    /// Mark the stop as operator-initiated so the drain task does not
    /// report the closing frame channel as an abnormal end.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Wait for the drain task to finish and take the buffered frames.
    ///
    /// The frame channel must be closed first (stop the backend),
    /// otherwise this waits for frames forever.
    pub async fn join(self) -> Result<Vec<AudioFrame>> {
        self.handle.await.context("capture worker panicked")
    }
}
