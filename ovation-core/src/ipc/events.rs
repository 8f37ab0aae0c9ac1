//! Event types published to observers.
//!
//! Loudness values are `Option<f64>`: `None` stands for a silent block
//! (`-inf` dB), which JSON cannot carry.

use serde::{Deserialize, Serialize};

use crate::decision::ApprovalState;

/// Drop non-finite values so they serialise as `null`.
pub fn finite_or_none(db: f64) -> Option<f64> {
    db.is_finite().then_some(db)
}

// ---------------------------------------------------------------------------
// Reading events
// ---------------------------------------------------------------------------

/// Published once per completed cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingEvent {
    /// Cycle number within the current session, starting at 0.
    pub seq: u64,
    /// Loudness of this cycle's block in dBFS; `None` for silence.
    pub loudness_db: Option<f64>,
    /// Running peak since session start; `None` while every block was silent.
    pub peak_db: Option<f64>,
    /// Threshold the reading was compared against.
    pub required_db: f64,
    pub occupancy: u32,
    pub approval: ApprovalState,
}

// ---------------------------------------------------------------------------
// Session status events
// ---------------------------------------------------------------------------

/// Published whenever the session changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub status: SessionStatus,
    /// Optional human-readable detail (e.g. why capture stopped).
    pub detail: Option<String>,
}

/// Lifecycle state of a sampling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Not sampling. Initial state, and the state after any stop or fault.
    #[default]
    Idle,
    /// Capture resource held and cycles scheduled.
    Running,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_event_serializes_silence_as_null() {
        let event = ReadingEvent {
            seq: 4,
            loudness_db: finite_or_none(f64::NEG_INFINITY),
            peak_db: finite_or_none(-18.5),
            required_db: 74.11,
            occupancy: 5000,
            approval: ApprovalState::Rejected,
        };

        let json = serde_json::to_value(&event).expect("serialize reading event");
        assert_eq!(json["seq"], 4);
        assert!(json["loudnessDb"].is_null());
        assert_eq!(json["peakDb"], -18.5);
        assert_eq!(json["occupancy"], 5000);
        assert_eq!(json["approval"], "rejected");

        let round_trip: ReadingEvent =
            serde_json::from_value(json).expect("deserialize reading event");
        assert_eq!(round_trip.loudness_db, None);
        assert_eq!(round_trip.approval, ApprovalState::Rejected);
    }

    #[test]
    fn status_event_serializes_with_lowercase_status() {
        let event = SessionStatusEvent {
            status: SessionStatus::Idle,
            detail: Some("end of WAV file".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "idle");
        assert_eq!(json["detail"], "end of WAV file");
    }

    #[test]
    fn status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<SessionStatus>(r#""Running""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
