use std::mem;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::sequencer::FileSequencer;
use super::worker::CaptureWorker;
use crate::audio::{AudioBackend, AudioFrame};

/// Commands accepted by the session controller.
///
/// Every producer (key listener, capture worker) funnels into one queue,
/// so transitions are processed strictly one at a time in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start recording, or stop and save the session in flight
    Primary,
    /// Discard the session in flight, or delete the last saved recording
    Cancel,
    /// The capture stream closed without a stop request
    CaptureEnded,
    /// Stop any in-flight capture without saving and exit the event loop
    Shutdown,
}

/// User-visible outcome of handling one command
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Started,
    Saved {
        sequence: u32,
        path: PathBuf,
        duration_secs: f64,
    },
    Discarded,
    /// Stop requested before any audio was captured; nothing written
    NothingCaptured,
    DeletedLast {
        path: PathBuf,
    },
    /// Delete requested with no tracked last-saved recording
    NothingToDelete,
    /// The capture device could not be opened; still idle
    DeviceUnavailable {
        reason: String,
    },
    /// Persisting the recording failed; the session's audio is lost
    RecordingLost {
        reason: String,
    },
    /// The capture stream ended without an operator stop
    StreamEnded,
    DeleteFailed {
        reason: String,
    },
}

struct RecordingSession {
    worker: CaptureWorker,
    started_at: Instant,
}

enum SessionState {
    Idle,
    Recording(RecordingSession),
}

struct SavedRecording {
    sequence: u32,
    path: PathBuf,
}

enum SessionExit {
    Save,
    Discard,
}

/// The recording-session state machine.
///
/// Owns the capture backend, the per-session worker, and the last-saved
/// bookkeeping. All transitions happen on the task that calls
/// [`handle`]/[`run`]; nothing here is shared.
///
/// [`handle`]: SessionController::handle
/// [`run`]: SessionController::run
pub struct SessionController {
    backend: Box<dyn AudioBackend>,
    sequencer: FileSequencer,
    sample_rate: u32,
    channels: u16,
    state: SessionState,
    last_saved: Option<SavedRecording>,
    /// Highest sequence saved by this process. Passed to the sequencer as
    /// a floor so a just-deleted number is not reissued within one run.
    highest_saved: u32,
    commands: mpsc::Sender<Command>,
}

impl SessionController {
    /// `commands` must be a sender onto the same queue this controller is
    /// driven from; the capture worker uses it to report an abnormally
    /// ended stream.
    pub fn new(
        backend: Box<dyn AudioBackend>,
        recordings_dir: PathBuf,
        sample_rate: u32,
        channels: u16,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            backend,
            sequencer: FileSequencer::new(recordings_dir),
            sample_rate,
            channels,
            state: SessionState::Idle,
            last_saved: None,
            highest_saved: 0,
            commands,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, SessionState::Recording(_))
    }

    /// Consume the command queue until a shutdown command arrives or the
    /// queue closes.
    ///
    /// Commands are processed one at a time: a command arriving while a
    /// start or stop is still in progress waits in the queue and is never
    /// interleaved with the transition.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) -> Result<()> {
        while let Some(command) = commands.recv().await {
            let shutdown = command == Command::Shutdown;
            self.handle(command).await;
            if shutdown {
                return Ok(());
            }
        }

        // Input source closed without an explicit shutdown command.
        warn!("command queue closed, shutting down");
        self.handle(Command::Shutdown).await;
        Ok(())
    }

    /// Process one command and return the user-visible outcome(s).
    ///
    /// All backend and persistence errors are recovered here and turned
    /// into notices; none of them propagate.
    pub async fn handle(&mut self, command: Command) -> Vec<Notice> {
        match command {
            Command::Primary => match mem::replace(&mut self.state, SessionState::Idle) {
                SessionState::Idle => self.start_session().await,
                SessionState::Recording(session) => {
                    self.stop_session(session, SessionExit::Save).await
                }
            },
            Command::Cancel => match mem::replace(&mut self.state, SessionState::Idle) {
                SessionState::Idle => self.delete_last(),
                SessionState::Recording(session) => {
                    self.stop_session(session, SessionExit::Discard).await
                }
            },
            Command::CaptureEnded => match mem::replace(&mut self.state, SessionState::Idle) {
                // Stale notification from a stream that was already
                // stopped through the normal path.
                SessionState::Idle => Vec::new(),
                SessionState::Recording(session) => {
                    warn!("capture stream ended unexpectedly, saving buffered audio");
                    let mut notices = vec![Notice::StreamEnded];
                    notices.extend(self.stop_session(session, SessionExit::Save).await);
                    notices
                }
            },
            Command::Shutdown => {
                if let SessionState::Recording(session) =
                    mem::replace(&mut self.state, SessionState::Idle)
                {
                    info!("shutting down with a session in flight, discarding it");
                    self.stop_session(session, SessionExit::Discard).await
                } else {
                    Vec::new()
                }
            }
        }
    }

    async fn start_session(&mut self) -> Vec<Notice> {
        match self.backend.start().await {
            Ok(frames) => {
                let worker = CaptureWorker::spawn(frames, self.commands.clone());
                self.state = SessionState::Recording(RecordingSession {
                    worker,
                    started_at: Instant::now(),
                });
                info!("recording started on {}", self.backend.name());
                vec![Notice::Started]
            }
            Err(e) => {
                warn!("could not open capture device: {e:#}");
                vec![Notice::DeviceUnavailable {
                    reason: format!("{e:#}"),
                }]
            }
        }
    }

    async fn stop_session(&mut self, session: RecordingSession, exit: SessionExit) -> Vec<Notice> {
        let frames = self.collect_frames(session.worker).await;
        let elapsed = session.started_at.elapsed().as_secs_f64();

        match exit {
            SessionExit::Discard => {
                info!(
                    "discarded {} buffered chunks after {:.1}s",
                    frames.len(),
                    elapsed
                );
                vec![Notice::Discarded]
            }
            SessionExit::Save => {
                if frames.is_empty() {
                    info!("recording stopped before any audio was captured");
                    return vec![Notice::NothingCaptured];
                }

                match self.persist(&frames) {
                    Ok((sequence, path, duration_secs)) => {
                        info!(
                            "saved recording {} ({:.1}s) to {}",
                            sequence,
                            duration_secs,
                            path.display()
                        );
                        self.last_saved = Some(SavedRecording {
                            sequence,
                            path: path.clone(),
                        });
                        self.highest_saved = sequence;
                        vec![Notice::Saved {
                            sequence,
                            path,
                            duration_secs,
                        }]
                    }
                    Err(e) => {
                        warn!("failed to persist recording, audio lost: {e:#}");
                        self.last_saved = None;
                        vec![Notice::RecordingLost {
                            reason: format!("{e:#}"),
                        }]
                    }
                }
            }
        }
    }

    /// Stop the capture path and take the session's buffer.
    ///
    /// Order matters: flag the stop first so the worker does not report an
    /// abnormal end, stop the backend to close the frame channel, then
    /// join the worker. After the join returns the buffer is complete and
    /// nothing can append to it.
    async fn collect_frames(&mut self, worker: CaptureWorker) -> Vec<AudioFrame> {
        worker.request_stop();

        if let Err(e) = self.backend.stop().await {
            warn!("error stopping capture backend: {e:#}");
        }

        match worker.join().await {
            Ok(frames) => frames,
            Err(e) => {
                error!("capture worker failed: {e:#}");
                Vec::new()
            }
        }
    }

    fn persist(&mut self, frames: &[AudioFrame]) -> Result<(u32, PathBuf, f64)> {
        let sequence = self.sequencer.next_sequence(self.highest_saved)?;
        let path = self.sequencer.path_for(sequence);
        let samples = self
            .sequencer
            .write(&path, frames, self.sample_rate, self.channels)?;
        let duration_secs = samples as f64 / (self.sample_rate as f64 * self.channels as f64);
        Ok((sequence, path, duration_secs))
    }

    fn delete_last(&mut self) -> Vec<Notice> {
        let Some(saved) = self.last_saved.take() else {
            info!("no recording to delete");
            return vec![Notice::NothingToDelete];
        };

        match self.sequencer.delete(saved.sequence) {
            Ok(true) => {
                info!("deleted last recording {}", saved.path.display());
                vec![Notice::DeletedLast { path: saved.path }]
            }
            Ok(false) => {
                warn!("last recording {} was already gone", saved.path.display());
                vec![Notice::NothingToDelete]
            }
            Err(e) => {
                warn!("could not delete {}: {e:#}", saved.path.display());
                vec![Notice::DeleteFailed {
                    reason: format!("{e:#}"),
                }]
            }
        }
    }
}
