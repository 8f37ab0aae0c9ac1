//! Plain-text rendering of session state for the terminal.

use ovation_core::{
    audio::device::DeviceInfo,
    meter::{display_db, meter_fraction, LevelBand},
    ApprovalState, ReadingEvent, SessionSnapshot, SessionStatus, ThresholdModel,
};

const BAR_WIDTH: usize = 30;

fn verdict(approval: ApprovalState) -> &'static str {
    match approval {
        ApprovalState::Undetermined => "--",
        ApprovalState::Approved => "APPROVED",
        ApprovalState::Rejected => "rejected",
    }
}

fn bar(db: f64) -> String {
    let filled = (meter_fraction(db) * BAR_WIDTH as f64).round() as usize;
    let fill = match LevelBand::of(db) {
        LevelBand::Quiet => '=',
        LevelBand::Moderate => '+',
        LevelBand::Loud => '#',
    };
    let mut out = String::with_capacity(BAR_WIDTH + 2);
    out.push('[');
    out.extend(std::iter::repeat(fill).take(filled));
    out.extend(std::iter::repeat(' ').take(BAR_WIDTH - filled));
    out.push(']');
    out
}

/// Silence and "no data yet" both render at the floor.
fn db_or_floor(db: Option<f64>, floor_db: f64) -> f64 {
    display_db(db.unwrap_or(f64::NEG_INFINITY), floor_db)
}

pub fn reading_line(event: &ReadingEvent, floor_db: f64) -> String {
    let level = db_or_floor(event.loudness_db, floor_db);
    let peak = db_or_floor(event.peak_db, floor_db);
    format!(
        "{} {:>7.2} dB  peak {:>7.2} dB  need > {:.2} dB  {}",
        bar(level),
        level,
        peak,
        event.required_db,
        verdict(event.approval)
    )
}

pub fn summary_line(snapshot: &SessionSnapshot, floor_db: f64) -> String {
    let status = match snapshot.status {
        SessionStatus::Idle => "idle",
        SessionStatus::Running => "running",
    };
    let mut line = format!(
        "{status}: occupancy {}  need > {:.2} dB  peak {:.2} dB  verdict {}  cycles {}",
        snapshot.occupancy,
        snapshot.required_level,
        display_db(snapshot.peak_level, floor_db),
        verdict(snapshot.approval),
        snapshot.diagnostics.cycles,
    );
    if let Some(error) = &snapshot.last_error {
        line.push_str(&format!("  (last error: {error})"));
    }
    line
}

pub fn threshold_line(model: &ThresholdModel, occupancy: u32) -> String {
    if occupancy == 0 {
        return "occupancy 0: no threshold configured".into();
    }
    format!(
        "occupancy {occupancy}: density {:.4} people/m³, approval needs > {:.2} dB",
        model.density(occupancy),
        model.required_level(occupancy)
    )
}

pub fn device_line(device: &DeviceInfo) -> String {
    let mut line = device.name.clone();
    if device.is_default {
        line.push_str("  (default)");
    }
    if device.is_loopback_like {
        line.push_str("  (playback loopback, not the room)");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_reading_renders_at_floor() {
        let event = ReadingEvent {
            seq: 0,
            loudness_db: None,
            peak_db: None,
            required_db: 52.41,
            occupancy: 500,
            approval: ApprovalState::Rejected,
        };
        let line = reading_line(&event, -60.0);
        assert!(line.starts_with(&format!("[{}]", " ".repeat(BAR_WIDTH))));
        assert!(line.contains("-60.00 dB"));
        assert!(line.contains("rejected"));
        assert!(!line.contains("inf"));
    }

    #[test]
    fn full_scale_fills_the_bar() {
        assert_eq!(bar(0.0), format!("[{}]", "#".repeat(BAR_WIDTH)));
        assert_eq!(bar(-30.0).matches('=').count(), BAR_WIDTH / 2);
    }

    #[test]
    fn threshold_line_reports_density() {
        let line = threshold_line(&ThresholdModel::default(), 5000);
        assert!(line.contains("0.4823"));
        assert!(line.contains("74.11"));
        assert_eq!(
            threshold_line(&ThresholdModel::default(), 0),
            "occupancy 0: no threshold configured"
        );
    }
}
