//! Device signals used to derive the local storage encryption key.

use serde::{Deserialize, Serialize};

/// Environment signals a host can observe about the device it runs on.
///
/// None of these are secret. Together with a fixed application salt they
/// produce a fingerprint that is stable across restarts on one device and
/// differs between devices, which is enough to keep stored ciphertext from
/// being trivially portable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSignals {
    pub user_agent: String,
    pub language: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u32,
    /// Minutes west of UTC, the sign convention of `Date#getTimezoneOffset`.
    pub timezone_offset: i32,
    /// `None` when the host cannot report it.
    pub hardware_concurrency: Option<u32>,
}

impl DeviceSignals {
    /// Signal components in fingerprint order.
    pub fn components(&self) -> Vec<String> {
        vec![
            self.user_agent.clone(),
            self.language.clone(),
            self.screen_width.to_string(),
            self.screen_height.to_string(),
            self.color_depth.to_string(),
            self.timezone_offset.to_string(),
            self.hardware_concurrency
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        ]
    }
}

/// Source of [`DeviceSignals`] provided by the host.
pub trait DeviceSignalSource: Send + Sync {
    fn signals(&self) -> DeviceSignals;
}

impl DeviceSignalSource for DeviceSignals {
    fn signals(&self) -> DeviceSignals {
        self.clone()
    }
}
