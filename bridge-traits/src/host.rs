//! Native Host Transports
//!
//! The two native shells expose very different surfaces:
//! - **Desktop**: a generic IPC `invoke(command, args)` returning JSON, with
//!   named commands such as `daemon_exec`, `get_udid` or `check_update_now`.
//! - **Mobile**: a VPN plugin with one method per operation (`getStatus`,
//!   `connect`, ...) plus push events.
//!
//! Both can push events to the core. Hosts hand those out as a
//! [`HostEventStream`]; the core drains it on a background task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Update metadata announced by the desktop shell's `update-ready` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub current_version: String,
    pub new_version: String,
    #[serde(default)]
    pub release_notes: Option<String>,
}

/// Result of the mobile plugin's readiness probe.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PluginReady {
    pub ready: bool,
    #[serde(default)]
    pub version: Option<String>,
}

/// Event pushed by a native host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Desktop `update-ready`: an update has been downloaded and installed.
    UpdateReady(UpdateInfo),
    /// Mobile `vpnStateChange`: raw native status payload.
    VpnStateChange(Value),
    /// Mobile `vpnError`: structured code when the plugin provides one.
    VpnError { code: Option<i32>, message: String },
}

/// Stream of host events. `None` means the host closed the channel.
#[async_trait]
pub trait HostEventStream: Send {
    async fn next(&mut self) -> Option<HostEvent>;
}

/// Desktop shell IPC.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::host::DesktopIpc;
/// use serde_json::json;
///
/// async fn status(ipc: &dyn DesktopIpc) -> Result<serde_json::Value> {
///     ipc.invoke("daemon_exec", json!({"action": "status", "params": null})).await
/// }
/// ```
#[async_trait]
pub trait DesktopIpc: Send + Sync {
    /// Invoke a named shell command with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error when the command is unknown to the shell or the
    /// command itself rejects (shell commands return `Result<_, String>`).
    async fn invoke(&self, command: &str, args: Value) -> Result<Value>;

    /// Subscribe to events emitted by the shell (e.g. `update-ready`).
    async fn subscribe_events(&self) -> Result<Box<dyn HostEventStream>>;
}

/// Mobile shell VPN plugin.
#[async_trait]
pub trait MobilePlugin: Send + Sync {
    /// `checkReady()`
    async fn check_ready(&self) -> Result<PluginReady>;

    /// `getStatus()`: raw native status.
    async fn get_status(&self) -> Result<Value>;

    /// `connect({config})` where `config` is JSON text.
    async fn connect(&self, config: String) -> Result<()>;

    /// `disconnect()`
    async fn disconnect(&self) -> Result<()>;

    /// `getVersion()`
    async fn get_version(&self) -> Result<Value>;

    /// `getUDID()`
    async fn get_udid(&self) -> Result<String>;

    /// Subscribe to `vpnStateChange` / `vpnError`.
    async fn subscribe_events(&self) -> Result<Box<dyn HostEventStream>>;
}
