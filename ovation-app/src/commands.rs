//! Console command handlers.
//!
//! Each line typed on stdin is parsed into a [`Command`] and applied to the
//! session. `start`/`stop` block on the worker thread, so callers run
//! [`apply`] inside `spawn_blocking`.

use ovation_core::{audio::device::list_input_devices, SamplingSession};
use tracing::{info, warn};

use crate::report;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bare number: new occupancy count.
    Occupancy(u32),
    Start,
    Stop,
    Status,
    Devices,
    Help,
    Quit,
}

/// What the input loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub const HELP: &str = "commands: <number> set occupancy | start | stop | status | devices | quit";

pub fn parse(line: &str) -> Result<Command, String> {
    let trimmed = line.trim();
    if let Ok(n) = trimmed.parse::<u32>() {
        return Ok(Command::Occupancy(n));
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "start" | "s" | "restart" | "r" => Ok(Command::Start),
        "stop" | "x" => Ok(Command::Stop),
        "status" | "?" => Ok(Command::Status),
        "devices" | "d" => Ok(Command::Devices),
        "help" | "h" | "" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}'\n{HELP}")),
    }
}

/// Apply a command to the session and print the outcome.
pub fn apply(session: &SamplingSession, command: Command, floor_db: f64) -> Flow {
    match command {
        Command::Occupancy(n) => {
            session.set_occupancy(n);
            println!("{}", report::threshold_line(session.threshold_model(), n));
            if n == 0 && session.is_running() {
                println!("occupancy is 0: no threshold configured, stopping");
                session.stop();
            }
        }
        Command::Start => {
            if let Err(message) = start_gated(session) {
                println!("{message}");
            }
        }
        Command::Stop => {
            session.stop();
            println!("{}", report::summary_line(&session.snapshot(), floor_db));
        }
        Command::Status => {
            println!("{}", report::summary_line(&session.snapshot(), floor_db));
        }
        Command::Devices => {
            for device in list_input_devices() {
                println!("{}", report::device_line(&device));
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {
            session.stop();
            return Flow::Exit;
        }
    }
    Flow::Continue
}

/// Start (or restart) the session, refusing while occupancy is 0.
pub fn start_gated(session: &SamplingSession) -> Result<(), String> {
    if session.occupancy() == 0 {
        return Err("enter the occupancy before starting".into());
    }
    match session.start() {
        Ok(()) => {
            info!(
                occupancy = session.occupancy(),
                required_db = session.required_level(),
                "approval measurement started"
            );
            Ok(())
        }
        Err(e) => {
            warn!("failed to start capture: {e}");
            let hint = if e.is_acquisition() {
                "; check the input device or file and retry"
            } else {
                ""
            };
            Err(format!("could not open the capture source ({e}){hint}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use ovation_core::{CaptureSource, SessionConfig, SessionStatus, WavFileCapture};

    use super::*;

    #[test]
    fn numbers_set_occupancy() {
        assert_eq!(parse(" 500 "), Ok(Command::Occupancy(500)));
        assert_eq!(parse("0"), Ok(Command::Occupancy(0)));
    }

    #[test]
    fn words_and_shortcuts_parse() {
        assert_eq!(parse("START"), Ok(Command::Start));
        assert_eq!(parse("r"), Ok(Command::Start));
        assert_eq!(parse("stop"), Ok(Command::Stop));
        assert_eq!(parse(""), Ok(Command::Help));
        assert_eq!(parse("q"), Ok(Command::Quit));
    }

    #[test]
    fn negative_and_unknown_input_is_rejected() {
        assert!(parse("-3").is_err());
        assert!(parse("applause").is_err());
    }

    fn write_fixture(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "ovation-commands-{name}-{}.wav",
            std::process::id()
        ));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).expect("create fixture");
        for i in 0..512 {
            writer
                .write_sample(if i % 2 == 0 { 8_000i16 } else { -8_000 })
                .expect("write sample");
        }
        writer.finalize().expect("finalize fixture");
        path
    }

    fn wav_session(path: &Path) -> SamplingSession {
        let config = SessionConfig {
            cycle_interval: Duration::from_millis(5),
            ..SessionConfig::default()
        };
        let source = CaptureSource::new(
            WavFileCapture::new(path)
                .with_block_size(64)
                .looping(true),
        );
        SamplingSession::new(config, source)
    }

    #[test]
    fn start_is_refused_at_occupancy_zero() {
        let path = write_fixture("gate");
        let session = wav_session(&path);

        assert_eq!(
            start_gated(&session),
            Err("enter the occupancy before starting".to_string())
        );
        assert!(!session.is_running());
        assert_eq!(apply(&session, Command::Start, -60.0), Flow::Continue);
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.snapshot().diagnostics.cycles, 0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn occupancy_back_to_zero_stops_a_running_session() {
        let path = write_fixture("reset");
        let session = wav_session(&path);
        session.set_occupancy(300);
        start_gated(&session).expect("start at occupancy 300");
        assert!(session.is_running());

        assert_eq!(apply(&session, Command::Occupancy(0), -60.0), Flow::Continue);
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.occupancy(), 0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn failed_start_names_the_capture_source() {
        let session = wav_session(Path::new("/nonexistent/ovation/applause.wav"));
        session.set_occupancy(300);

        let message = start_gated(&session).expect_err("missing file must not start");
        assert!(message.starts_with("could not open the capture source"));
        assert!(!message.contains("microphone"));
        assert!(!session.is_running());
    }
}
