//! The `adb` subprocess bridge.
//!
//! Each [`DeviceBridge`] call spawns one `adb` process and waits for it to
//! exit.  Arguments are passed straight to the executable, never through a
//! local shell; only the instruction after `shell` is interpreted, by the
//! device's own shell.
//!
//! | Operation        | Invocation                              |
//! |------------------|-----------------------------------------|
//! | `invoke`         | `adb [-s <id>] shell <instruction>`     |
//! | `invoke_list`    | `adb devices`                           |
//! | `connect`        | `adb connect <ip:port>`                 |
//! | `disconnect`     | `adb disconnect <id>`                   |
//! | `capture_frame`  | `adb [-s <id>] exec-out screencap -p`   |
//!
//! Children are spawned with `kill_on_drop`, so dropping a pending call (for
//! example when a capture loop is cancelled) also ends the process.

use std::process::Stdio;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use droid_remote_core::{parse_device_list, DeviceRecord};
use tokio::process::Command;
use tracing::debug;

use crate::application::bridge::{BridgeError, DeviceBridge};

/// Runs the `adb` executable at `program` (a path or a name on `PATH`).
#[derive(Debug, Clone)]
pub struct AdbBridge {
    program: String,
}

impl AdbBridge {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, device_id: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(id) = device_id {
            cmd.arg("-s").arg(id);
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Runs `cmd` to completion and returns its stdout.
    async fn run(&self, mut cmd: Command) -> Result<Vec<u8>, BridgeError> {
        let output = cmd.output().await.map_err(|e| BridgeError::Spawn {
            program: self.program.clone(),
            reason: e.to_string(),
        })?;
        interpret(
            output.status.success(),
            output.status.code(),
            output.stdout,
            &output.stderr,
        )
    }

    async fn run_text(&self, cmd: Command) -> Result<String, BridgeError> {
        let stdout = self.run(cmd).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Applies the bridge's success rule: exit code zero and nothing on stderr.
fn interpret(
    success: bool,
    code: Option<i32>,
    stdout: Vec<u8>,
    stderr: &[u8],
) -> Result<Vec<u8>, BridgeError> {
    let diagnostic = String::from_utf8_lossy(stderr);
    let diagnostic = diagnostic.trim();
    if !diagnostic.is_empty() {
        return Err(BridgeError::Failed(diagnostic.to_string()));
    }
    if !success {
        let status = match code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        };
        return Err(BridgeError::Failed(status));
    }
    Ok(stdout)
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn invoke(&self, device_id: Option<&str>, instruction: &str) -> Result<String, BridgeError> {
        debug!(device = device_id.unwrap_or("default"), "adb shell");
        let mut cmd = self.command(device_id);
        cmd.arg("shell").arg(instruction);
        self.run_text(cmd).await
    }

    async fn invoke_list(&self) -> Result<Vec<DeviceRecord>, BridgeError> {
        let mut cmd = self.command(None);
        cmd.arg("devices");
        let output = self.run_text(cmd).await?;
        Ok(parse_device_list(&output))
    }

    async fn connect(&self, target: &str) -> Result<String, BridgeError> {
        let mut cmd = self.command(None);
        cmd.arg("connect").arg(target);
        self.run_text(cmd).await
    }

    async fn disconnect(&self, device_id: &str) -> Result<String, BridgeError> {
        let mut cmd = self.command(None);
        cmd.arg("disconnect").arg(device_id);
        self.run_text(cmd).await
    }

    async fn capture_frame(&self, device_id: Option<&str>, instruction: &str) -> Result<String, BridgeError> {
        // exec-out keeps the PNG bytes intact; `shell` would translate newlines
        // on some devices.
        let mut cmd = self.command(device_id);
        cmd.arg("exec-out").args(instruction.split_whitespace());
        let png = self.run(cmd).await?;
        Ok(BASE64.encode(png))
    }
}
