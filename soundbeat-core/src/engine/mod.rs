//! `MeterEngine` — lifecycle controller around one metering run at a time.
//!
//! ## Lifecycle
//!
//! ```text
//! MeterEngine::new()
//!     └─► start(open, sink)  → source opened on worker, status = Running
//!         ├─► stop()         → stop signal raised, loop exits after current block
//!         └─► wait().await   → RunSummary | RunError, status = Finished/Stopped/Error
//! ```
//!
//! ## Threading
//!
//! Sources may wrap decoder handles that are not `Send`. The `open` closure is
//! therefore executed *inside* the `spawn_blocking` worker, so the source is
//! created, used and closed on one thread. A sync oneshot channel carries the
//! open result back to `start()`.

pub mod pipeline;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    config::MeteringConfig,
    error::{MeterError, Result, RunError},
    events::{MeterStatus, MeterStatusEvent},
    sink::Sink,
    source::SampleSource,
};

use pipeline::{
    DiagnosticsSnapshot, MeterDiagnostics, MeteringPipeline, RunSummary, StopReason, StopSignal,
};

/// Broadcast channel capacity for status events.
const STATUS_CAP: usize = 32;

type RunResult = std::result::Result<RunSummary, RunError>;

/// The top-level engine handle.
///
/// `MeterEngine` is `Send + Sync`; wrap it in an `Arc` to share it between a
/// signal handler and the task awaiting the run.
pub struct MeterEngine {
    config: MeteringConfig,
    /// Stop signal of the active run, if any.
    stop: Mutex<Option<StopSignal>>,
    status: Arc<Mutex<MeterStatus>>,
    status_tx: broadcast::Sender<MeterStatusEvent>,
    diagnostics: Arc<MeterDiagnostics>,
    worker: Mutex<Option<JoinHandle<RunResult>>>,
}

impl MeterEngine {
    pub fn new(config: MeteringConfig) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CAP);
        Self {
            config,
            stop: Mutex::new(None),
            status: Arc::new(Mutex::new(MeterStatus::Idle)),
            status_tx,
            diagnostics: Arc::new(MeterDiagnostics::default()),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MeteringConfig {
        &self.config
    }

    /// Open a source on a blocking worker and start metering it into `sink`.
    ///
    /// Blocks until `open` has returned, then lets the loop continue in the
    /// background. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `MeterError::AlreadyRunning` if a run is active.
    /// - `MeterError::Config` if the configuration is invalid.
    /// - Whatever `open` returned if the source could not be opened.
    pub fn start<S, F, K>(&self, open: F, mut sink: K) -> Result<()>
    where
        S: SampleSource + 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
        K: Sink + Send + 'static,
    {
        {
            let mut status = self.status.lock();
            if *status == MeterStatus::Running {
                return Err(MeterError::AlreadyRunning);
            }
            self.config.validate()?;
            *status = MeterStatus::Running;
        }
        let _ = self.status_tx.send(MeterStatusEvent {
            status: MeterStatus::Running,
            detail: None,
        });

        self.diagnostics.reset();
        let stop = StopSignal::new();
        *self.stop.lock() = Some(stop.clone());

        let pipeline = MeteringPipeline::new(self.config.clone())
            .with_stop(stop)
            .with_diagnostics(Arc::clone(&self.diagnostics));
        let status = Arc::clone(&self.status);
        let status_tx = self.status_tx.clone();

        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<()>>();

        let handle = tokio::task::spawn_blocking(move || {
            // ── Open source (on THIS thread) ──────────────────────────────────
            let source = match open() {
                Ok(s) => {
                    let _ = open_tx.send(Ok(()));
                    s
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e.duplicate()));
                    return Err(RunError::new(e, 0));
                }
            };

            // ── Run pipeline ──────────────────────────────────────────────────
            let result = pipeline.run(source, &mut sink);

            let (new_status, detail) = match &result {
                Ok(summary) if summary.stop_reason == StopReason::Stopped => {
                    (MeterStatus::Stopped, None)
                }
                Ok(_) => (MeterStatus::Finished, None),
                Err(e) => (MeterStatus::Error, Some(e.to_string())),
            };
            *status.lock() = new_status;
            let _ = status_tx.send(MeterStatusEvent {
                status: new_status,
                detail,
            });
            result
        });
        *self.worker.lock() = Some(handle);

        match open_rx.recv() {
            Ok(Ok(())) => {
                info!("engine started");
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_status(MeterStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                self.set_status(MeterStatus::Error, Some("metering worker died".into()));
                Err(MeterError::Other(anyhow::anyhow!(
                    "metering worker died before opening its source"
                )))
            }
        }
    }

    /// Ask the active run to stop after its current block.
    ///
    /// # Errors
    /// `MeterError::NotRunning` if no run is active.
    pub fn stop(&self) -> Result<()> {
        if *self.status.lock() != MeterStatus::Running {
            return Err(MeterError::NotRunning);
        }
        if let Some(stop) = self.stop.lock().as_ref() {
            stop.stop();
        }
        info!("engine stop requested");
        Ok(())
    }

    /// Wait for the active run to end and return its outcome.
    pub async fn wait(&self) -> RunResult {
        let handle = self.worker.lock().take();
        let Some(handle) = handle else {
            return Err(RunError::new(MeterError::NotRunning, 0));
        };
        *self.stop.lock() = None;

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("metering worker panicked: {e}");
                let emitted = self.diagnostics.snapshot().records_published;
                self.set_status(MeterStatus::Error, Some(e.to_string()));
                Err(RunError::new(MeterError::Other(anyhow::anyhow!(e)), emitted))
            }
        }
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> MeterStatus {
        *self.status.lock()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<MeterStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Counters of the current or last run.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    fn set_status(&self, new_status: MeterStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(MeterStatusEvent {
            status: new_status,
            detail,
        });
    }
}
