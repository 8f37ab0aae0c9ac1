//! Observer-facing types.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so hosts can
//! forward them to a UI or log them as JSON lines.

pub mod events;
