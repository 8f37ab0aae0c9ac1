//! Cycle loop run on the session's worker thread.
//!
//! ## Per cycle
//!
//! ```text
//! 1. Wait until the next deadline, or return early on cancel
//! 2. CaptureHandle::read_block
//! 3. meter::measure → dBFS
//! 4. ThresholdModel::required_level(current occupancy)
//! 5. DecisionEngine::on_reading
//! 6. Broadcast ReadingEvent
//! ```
//!
//! The capture handle is acquired, read and dropped on this thread only.
//! A panic inside a cycle is caught and ends the session like a read fault.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicU32, AtomicU64, Ordering},
    mpsc, Arc,
};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span};

use super::SessionState;
use crate::{
    audio::{CaptureHandle, CaptureSource},
    error::Result,
    ipc::events::{finite_or_none, ReadingEvent, SessionStatus, SessionStatusEvent},
    meter,
    threshold::ThresholdModel,
};

/// Cycles between periodic level log lines.
const LEVEL_LOG_EVERY: u64 = 50;

/// Per-session counters, reset when a session starts.
#[derive(Default)]
pub struct CycleDiagnostics {
    pub cycles: AtomicU64,
    pub silent_blocks: AtomicU64,
    pub approved_cycles: AtomicU64,
    pub read_failures: AtomicU64,
}

impl CycleDiagnostics {
    pub fn reset(&self) {
        self.cycles.store(0, Ordering::Relaxed);
        self.silent_blocks.store(0, Ordering::Relaxed);
        self.approved_cycles.store(0, Ordering::Relaxed);
        self.read_failures.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            silent_blocks: self.silent_blocks.load(Ordering::Relaxed),
            approved_cycles: self.approved_cycles.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub cycles: u64,
    pub silent_blocks: u64,
    pub approved_cycles: u64,
    pub read_failures: u64,
}

/// Everything the worker needs, moved into the thread in one piece.
pub struct WorkerContext {
    pub source: CaptureSource,
    pub threshold: ThresholdModel,
    pub cycle_interval: Duration,
    pub occupancy: Arc<AtomicU32>,
    pub state: Arc<Mutex<SessionState>>,
    pub diagnostics: Arc<CycleDiagnostics>,
    pub cancel_rx: Receiver<()>,
    pub reading_tx: broadcast::Sender<ReadingEvent>,
    pub status_tx: broadcast::Sender<SessionStatusEvent>,
}

/// Acquire capture, report the outcome on `opened`, then cycle until cancelled
/// or a read fails.
pub fn run(ctx: WorkerContext, opened: mpsc::Sender<Result<()>>) {
    let span = info_span!("session", source = %ctx.source.describe());
    let _enter = span.enter();

    let mut handle = match ctx.source.acquire() {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "failed to acquire capture resource");
            let _ = opened.send(Err(e));
            return;
        }
    };

    {
        let mut state = ctx.state.lock();
        state.engine.reset();
        state.status = SessionStatus::Running;
        state.last_error = None;
        ctx.diagnostics.reset();
    }
    let _ = ctx.status_tx.send(SessionStatusEvent {
        status: SessionStatus::Running,
        detail: None,
    });
    let _ = opened.send(Ok(()));
    info!(interval_ms = ctx.cycle_interval.as_millis() as u64, "sampling started");

    let mut seq = 0u64;
    let mut deadline = Instant::now() + ctx.cycle_interval;
    let fault = loop {
        match ctx.cancel_rx.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break None,
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run_cycle(&ctx, handle.as_mut(), seq)
        }));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(format!(
                "capture worker panicked: {}",
                panic_message(&*payload)
            )),
        };
        if let Some(message) = failure {
            ctx.diagnostics.read_failures.fetch_add(1, Ordering::Relaxed);
            error!(error = %message, cycle = seq, "capture read failed, ending session");
            break Some(message);
        }
        seq += 1;

        // Fixed cadence; if a cycle overran, restart the grid instead of bursting.
        let now = Instant::now();
        deadline += ctx.cycle_interval;
        if deadline <= now {
            deadline = now + ctx.cycle_interval;
        }
    };

    // Release the capture resource on this thread before reporting Idle.
    drop(handle);

    {
        let mut state = ctx.state.lock();
        state.status = SessionStatus::Idle;
        if fault.is_some() {
            state.last_error = fault.clone();
        }
    }
    let _ = ctx.status_tx.send(SessionStatusEvent {
        status: SessionStatus::Idle,
        detail: fault,
    });

    let snap = ctx.diagnostics.snapshot();
    info!(
        cycles = snap.cycles,
        silent_blocks = snap.silent_blocks,
        approved_cycles = snap.approved_cycles,
        read_failures = snap.read_failures,
        "sampling stopped"
    );
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

fn run_cycle(ctx: &WorkerContext, handle: &mut dyn CaptureHandle, seq: u64) -> Result<()> {
    let block = handle.read_block()?;
    let reading = meter::measure(&block);
    let occupancy = ctx.occupancy.load(Ordering::Relaxed);
    let required = ctx.threshold.required_level(occupancy);

    let (peak, approval) = {
        let mut state = ctx.state.lock();
        state.engine.on_reading(reading, required);
        (state.engine.peak_level(), state.engine.approval())
    };

    ctx.diagnostics.cycles.fetch_add(1, Ordering::Relaxed);
    if reading == f64::NEG_INFINITY {
        ctx.diagnostics.silent_blocks.fetch_add(1, Ordering::Relaxed);
    }
    if approval.is_approved() {
        ctx.diagnostics.approved_cycles.fetch_add(1, Ordering::Relaxed);
    }

    if seq % LEVEL_LOG_EVERY == 0 {
        debug!(
            loudness_db = format_args!("{:.2}", reading),
            peak_db = format_args!("{:.2}", peak),
            required_db = format_args!("{:.2}", required),
            occupancy,
            ?approval,
            samples = block.len(),
            "level check"
        );
    }

    let _ = ctx.reading_tx.send(ReadingEvent {
        seq,
        loudness_db: finite_or_none(reading),
        peak_db: finite_or_none(peak),
        required_db: required,
        occupancy,
        approval,
    });
    Ok(())
}
