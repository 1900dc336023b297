use bridge_traits::device::{DeviceSignalSource, DeviceSignals};
use chrono::{Local, Offset};

/// Device signals as a desktop process can observe them.
///
/// Desktop processes have no screen metrics without a windowing toolkit, so
/// the display fields are fixed unless the shell overrides them with
/// [`with_screen`](Self::with_screen).
#[derive(Debug, Clone)]
pub struct DesktopDeviceSignals {
    screen_width: u32,
    screen_height: u32,
    color_depth: u32,
}

impl Default for DesktopDeviceSignals {
    fn default() -> Self {
        Self {
            screen_width: 1920,
            screen_height: 1080,
            color_depth: 24,
        }
    }
}

impl DesktopDeviceSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screen(mut self, width: u32, height: u32, color_depth: u32) -> Self {
        self.screen_width = width;
        self.screen_height = height;
        self.color_depth = color_depth;
        self
    }
}

fn language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
        .map(|value| {
            // en_US.UTF-8 -> en-US
            value
                .split('.')
                .next()
                .unwrap_or_default()
                .replace('_', "-")
        })
        .unwrap_or_else(|| "en-US".to_string())
}

/// Minutes west of UTC.
fn timezone_offset() -> i32 {
    -Local::now().offset().fix().local_minus_utc() / 60
}

impl DeviceSignalSource for DesktopDeviceSignals {
    fn signals(&self) -> DeviceSignals {
        DeviceSignals {
            user_agent: format!(
                "k2-desktop/{} ({}; {})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            language: language(),
            screen_width: self.screen_width,
            screen_height: self.screen_height,
            color_depth: self.color_depth,
            timezone_offset: timezone_offset(),
            hardware_concurrency: std::thread::available_parallelism()
                .ok()
                .and_then(|n| u32::try_from(n.get()).ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_are_stable() {
        let source = DesktopDeviceSignals::new().with_screen(2560, 1440, 30);
        let first = source.signals();

        assert_eq!(first, source.signals());
        assert_eq!(first.screen_width, 2560);
        assert!(first.user_agent.starts_with("k2-desktop/"));
        assert!(!first.language.contains('_'));
    }
}
