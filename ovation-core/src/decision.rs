//! Running peak and approval verdict for one session.

use serde::{Deserialize, Serialize};

use crate::meter::LoudnessReading;
use crate::threshold::RequiredLevel;

/// Verdict after the latest reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    /// No reading yet in the current session.
    #[default]
    Undetermined,
    /// Latest reading strictly exceeded the required level.
    Approved,
    /// Latest reading was at or below the required level.
    Rejected,
}

impl ApprovalState {
    pub fn is_approved(self) -> bool {
        self == ApprovalState::Approved
    }
}

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    peak: LoudnessReading,
    latest: Option<LoudnessReading>,
    approval: ApprovalState,
    readings: u64,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self {
            peak: f64::NEG_INFINITY,
            latest: None,
            approval: ApprovalState::Undetermined,
            readings: 0,
        }
    }

    /// Fold one reading into the session statistics.
    ///
    /// Approval requires `reading > threshold`; a tie is a rejection. A NaN
    /// reading never raises the peak and is rejected.
    pub fn on_reading(&mut self, reading: LoudnessReading, threshold: RequiredLevel) {
        self.peak = self.peak.max(reading);
        self.latest = Some(reading);
        self.readings = self.readings.saturating_add(1);
        self.approval = if reading > threshold {
            ApprovalState::Approved
        } else {
            ApprovalState::Rejected
        };
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn peak_level(&self) -> LoudnessReading {
        self.peak
    }

    pub fn latest_reading(&self) -> Option<LoudnessReading> {
        self.latest
    }

    pub fn approval(&self) -> ApprovalState {
        self.approval
    }

    /// Readings folded in since the last reset.
    pub fn readings(&self) -> u64 {
        self.readings
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}
