//! Audio input device enumeration.

use serde::{Deserialize, Serialize};

/// Metadata about an audio input device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default input device.
    pub is_default: bool,
    /// Device probably captures playback audio, not the room.
    pub is_loopback_like: bool,
}

const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "wave out",
    "what u hear",
    "what you hear",
    "loopback",
    "virtual output",
    "monitor of",
    "mix stereo",
];

/// Best-effort heuristic for loopback/system-output capture devices, which
/// would measure the PA system rather than the audience.
pub fn is_loopback_like_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// List all available audio input devices, default first, loopback last.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
                    device_info(name, default_name.as_deref())
                })
                .collect::<Vec<_>>();
            sort_devices(&mut list);
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            default_name
                .map(|name| vec![device_info(name.clone(), Some(&name))])
                .unwrap_or_default()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    vec![]
}

fn device_info(name: String, default_name: Option<&str>) -> DeviceInfo {
    DeviceInfo {
        is_default: default_name == Some(name.as_str()),
        is_loopback_like: is_loopback_like_name(&name),
        name,
    }
}

fn sort_devices(list: &mut [DeviceInfo]) {
    list.sort_by_key(|d| (!d.is_default, d.is_loopback_like, d.name.to_ascii_lowercase()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_loopback_names() {
        assert!(is_loopback_like_name("Stereo Mix (Realtek Audio)"));
        assert!(is_loopback_like_name("Monitor of Built-in Audio Analog Stereo"));
        assert!(!is_loopback_like_name("USB PnP Sound Device"));
    }

    #[test]
    fn default_sorts_first_and_loopback_last() {
        let mut list = vec![
            device_info("Stereo Mix".into(), Some("Gym Mic")),
            device_info("b-mic".into(), Some("Gym Mic")),
            device_info("Gym Mic".into(), Some("Gym Mic")),
            device_info("A-mic".into(), Some("Gym Mic")),
        ];
        sort_devices(&mut list);
        let names: Vec<&str> = list.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Gym Mic", "A-mic", "b-mic", "Stereo Mix"]);
        assert!(list[0].is_default);
        assert!(list[3].is_loopback_like);
    }
}
