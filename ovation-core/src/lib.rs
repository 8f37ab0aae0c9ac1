//! # ovation-core
//!
//! Live applause-level approval engine.
//!
//! ## Architecture
//!
//! ```text
//! CaptureHandle::read_block ─► meter::measure (dBFS)
//!                                     │
//!        occupancy ─► ThresholdModel ─┤
//!                                     ▼
//!                          DecisionEngine::on_reading
//!                                     │
//!             SessionSnapshot (poll) / broadcast::Sender<ReadingEvent> (push)
//! ```
//!
//! One worker thread per running session owns the capture handle and runs the
//! cycles back to back at a fixed cadence.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod decision;
pub mod error;
pub mod ipc;
pub mod meter;
pub mod session;
pub mod threshold;

// Convenience re-exports for downstream crates
pub use audio::{
    CaptureConfig, CaptureHandle, CaptureProvider, CaptureSource, CpalCapture, WavFileCapture,
};
pub use buffering::AudioBlock;
pub use decision::{ApprovalState, DecisionEngine};
pub use error::OvationError;
pub use ipc::events::{ReadingEvent, SessionStatus, SessionStatusEvent};
pub use session::{SamplingSession, SessionConfig, SessionSnapshot};
pub use threshold::ThresholdModel;
