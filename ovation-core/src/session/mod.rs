//! `SamplingSession`: start/stop lifecycle around the cycle loop.
//!
//! ## Lifecycle
//!
//! ```text
//! SamplingSession::new()      status = Idle
//!     └─► start()             capture acquired, engine reset, status = Running
//!         ├─► start()         full stop, then a fresh start
//!         ├─► read fault      capture released, last_error set, status = Idle
//!         └─► stop()          cancel + join worker, capture released, status = Idle
//! ```
//!
//! `stop()` is idempotent and a no-op while Idle.
//!
//! ## Threading
//!
//! Cycles run on one worker thread. `cpal::Stream` is `!Send`, so the capture
//! handle is acquired *inside* that thread; a sync oneshot channel carries the
//! acquisition result back to `start()`. `stop()` signals a cancel channel the
//! worker waits on between cycles and joins the thread, so no cycle can run
//! after `stop()` returns.

pub mod worker;

use std::sync::{
    atomic::{AtomicU32, Ordering},
    mpsc, Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::{
    audio::CaptureSource,
    decision::{ApprovalState, DecisionEngine},
    error::{OvationError, Result},
    ipc::events::{ReadingEvent, SessionStatus, SessionStatusEvent},
    meter::LoudnessReading,
    threshold::{OccupancyCount, RequiredLevel, ThresholdModel},
};

pub use worker::{CycleDiagnostics, DiagnosticsSnapshot};

/// Broadcast channel capacity: 256 events buffered for slow observers.
const BROADCAST_CAP: usize = 256;

/// Shortest cadence accepted; anything lower is clamped.
pub const MIN_CYCLE_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for `SamplingSession`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time between cycles. Default: 16 ms (one 60 Hz display frame).
    pub cycle_interval: Duration,
    /// Occupancy → required level model.
    pub threshold: ThresholdModel,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_millis(16),
            threshold: ThresholdModel::default(),
        }
    }
}

/// State written by the worker and read by observers.
#[derive(Debug, Default)]
pub struct SessionState {
    pub engine: DecisionEngine,
    pub status: SessionStatus,
    /// Why the last session ended on its own, if it did.
    pub last_error: Option<String>,
}

/// Point-in-time view for observers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub occupancy: OccupancyCount,
    /// Required level for the current occupancy, recomputed on every call.
    pub required_level: RequiredLevel,
    pub latest_reading: Option<LoudnessReading>,
    /// `-inf` until a non-silent block arrives.
    pub peak_level: LoudnessReading,
    pub approval: ApprovalState,
    pub diagnostics: DiagnosticsSnapshot,
    pub last_error: Option<String>,
}

struct Worker {
    cancel_tx: Sender<()>,
    join: JoinHandle<()>,
}

/// The session handle.
///
/// `SamplingSession` is `Send + Sync`; all fields use interior mutability.
/// Wrap in `Arc<SamplingSession>` to share between a controller and observers.
pub struct SamplingSession {
    config: SessionConfig,
    source: CaptureSource,
    occupancy: Arc<AtomicU32>,
    state: Arc<Mutex<SessionState>>,
    /// At most one live worker. Held for the whole of `start()`/`stop()`.
    worker: Mutex<Option<Worker>>,
    reading_tx: broadcast::Sender<ReadingEvent>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    diagnostics: Arc<CycleDiagnostics>,
}

impl SamplingSession {
    /// Create an idle session. Nothing is acquired until `start()`.
    pub fn new(config: SessionConfig, source: CaptureSource) -> Self {
        let (reading_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            source,
            occupancy: Arc::new(AtomicU32::new(0)),
            state: Arc::new(Mutex::new(SessionState::default())),
            worker: Mutex::new(None),
            reading_tx,
            status_tx,
            diagnostics: Arc::new(CycleDiagnostics::default()),
        }
    }

    /// Start sampling, restarting if already running.
    ///
    /// Blocks until the capture resource is confirmed open (or fails).
    ///
    /// # Errors
    /// Acquisition errors from the capture provider. The session is left Idle
    /// and the previous session's statistics are untouched.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.worker.lock();
        if let Some(previous) = slot.take() {
            if self.is_running() {
                info!("restart requested, stopping current session first");
            } else {
                debug!("reaping worker of a session that ended on its own");
            }
            shutdown(previous);
        }

        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded(1);
        // Sync oneshot: worker signals acquisition success/failure to start().
        let (open_tx, open_rx) = mpsc::channel::<Result<()>>();

        let ctx = worker::WorkerContext {
            source: self.source.clone(),
            threshold: self.config.threshold,
            cycle_interval: self.config.cycle_interval.max(MIN_CYCLE_INTERVAL),
            occupancy: Arc::clone(&self.occupancy),
            state: Arc::clone(&self.state),
            diagnostics: Arc::clone(&self.diagnostics),
            cancel_rx,
            reading_tx: self.reading_tx.clone(),
            status_tx: self.status_tx.clone(),
        };

        let join = thread::Builder::new()
            .name("ovation-sampler".into())
            .spawn(move || worker::run(ctx, open_tx))?;

        match open_rx.recv() {
            Ok(Ok(())) => {
                *slot = Some(Worker { cancel_tx, join });
                info!(occupancy = self.occupancy(), "session started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                // Channel closed before a message was sent: the worker panicked.
                let _ = join.join();
                Err(OvationError::Other(anyhow::anyhow!(
                    "sampling worker died before acquiring capture"
                )))
            }
        }
    }

    /// Stop sampling and release the capture resource.
    ///
    /// No further cycle runs once this returns. A no-op while Idle.
    pub fn stop(&self) {
        let mut slot = self.worker.lock();
        let Some(worker) = slot.take() else {
            return;
        };
        shutdown(worker);
        info!("session stopped");
    }

    /// Update the occupancy count. Takes effect from the next cycle.
    pub fn set_occupancy(&self, occupancy: OccupancyCount) {
        let previous = self.occupancy.swap(occupancy, Ordering::Relaxed);
        if previous != occupancy {
            debug!(
                occupancy,
                required_db = self.config.threshold.required_level(occupancy),
                "occupancy updated"
            );
        }
    }

    pub fn occupancy(&self) -> OccupancyCount {
        self.occupancy.load(Ordering::Relaxed)
    }

    /// Required level for the current occupancy.
    pub fn required_level(&self) -> RequiredLevel {
        self.config.threshold.required_level(self.occupancy())
    }

    pub fn threshold_model(&self) -> &ThresholdModel {
        &self.config.threshold
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == SessionStatus::Running
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let occupancy = self.occupancy();
        let state = self.state.lock();
        SessionSnapshot {
            status: state.status,
            occupancy,
            required_level: self.config.threshold.required_level(occupancy),
            latest_reading: state.engine.latest_reading(),
            peak_level: state.engine.peak_level(),
            approval: state.engine.approval(),
            diagnostics: self.diagnostics.snapshot(),
            last_error: state.last_error.clone(),
        }
    }

    /// Subscribe to per-cycle reading events.
    pub fn subscribe_readings(&self) -> broadcast::Receiver<ReadingEvent> {
        self.reading_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status_tx.subscribe()
    }
}

impl Drop for SamplingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Cancel the worker and wait for it to release capture and exit.
fn shutdown(worker: Worker) {
    // The worker may already have exited after a read fault; the send then
    // fails and the join returns immediately.
    let _ = worker.cancel_tx.try_send(());
    drop(worker.cancel_tx);
    if worker.join.join().is_err() {
        error!("sampling worker panicked");
    }
}
