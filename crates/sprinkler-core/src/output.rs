//! The relay line.
//!
//! Writes are fire-and-forget: an adapter that fails to drive the line logs
//! the failure and carries on, so the controller never branches on it.

use std::path::PathBuf;
#[cfg(any(test, feature = "test-utils"))]
use std::sync::{Arc, Mutex};

/// BCM number of the line the relay is wired to.
pub const RELAY_PIN: u32 = 25;

pub trait OutputSink: Send + 'static {
    fn set_high(&mut self);
    fn set_low(&mut self);
    /// Give the line back to the system. Called once, on shutdown.
    fn release(&mut self);
}

// ---------------------------------------------------------------------------
// SysfsGpio
// ---------------------------------------------------------------------------

/// Relay driven through the kernel's sysfs GPIO interface.
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    pin: u32,
}

impl SysfsGpio {
    /// Export `pin` under `root` and configure it as an output.
    pub fn open(root: impl Into<PathBuf>, pin: u32) -> std::io::Result<Self> {
        let root = root.into();
        let line_dir = root.join(format!("gpio{pin}"));
        if !line_dir.exists() {
            std::fs::write(root.join("export"), pin.to_string())?;
        }
        std::fs::write(line_dir.join("direction"), "out")?;
        tracing::info!(pin, "gpio line configured as output");
        Ok(Self { root, pin })
    }

    fn line_file(&self, name: &str) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin)).join(name)
    }

    fn write_value(&self, value: &str) {
        if let Err(e) = std::fs::write(self.line_file("value"), value) {
            tracing::warn!(pin = self.pin, value, "failed to write gpio value: {e}");
        }
    }
}

impl OutputSink for SysfsGpio {
    fn set_high(&mut self) {
        self.write_value("1");
        tracing::info!(pin = self.pin, "gpio pin set to high");
    }

    fn set_low(&mut self) {
        self.write_value("0");
        tracing::info!(pin = self.pin, "gpio pin set to low");
    }

    fn release(&mut self) {
        // The line floats once unexported; leave the relay de-energised.
        self.write_value("0");
        if let Err(e) = std::fs::write(self.root.join("unexport"), self.pin.to_string()) {
            tracing::warn!(pin = self.pin, "failed to unexport gpio line: {e}");
        }
        tracing::info!(pin = self.pin, "gpio line released");
    }
}

// ---------------------------------------------------------------------------
// DryRunSink
// ---------------------------------------------------------------------------

/// Logs commands without touching hardware.
#[derive(Debug, Default)]
pub struct DryRunSink;

impl OutputSink for DryRunSink {
    fn set_high(&mut self) {
        tracing::info!(pin = RELAY_PIN, "[dry-run] relay high");
    }

    fn set_low(&mut self) {
        tracing::info!(pin = RELAY_PIN, "[dry-run] relay low");
    }

    fn release(&mut self) {
        tracing::info!(pin = RELAY_PIN, "[dry-run] relay released");
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCommand {
    High,
    Low,
    Release,
}

#[cfg(any(test, feature = "test-utils"))]
/// Records every command it receives. Clones share the same journal, so a
/// test can hand one to the controller and keep the other for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    commands: Arc<Mutex<Vec<SinkCommand>>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<SinkCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, command: SinkCommand) -> usize {
        self.commands().iter().filter(|c| **c == command).count()
    }

    pub fn last(&self) -> Option<SinkCommand> {
        self.commands().last().copied()
    }

    fn push(&self, command: SinkCommand) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl OutputSink for RecordingSink {
    fn set_high(&mut self) {
        self.push(SinkCommand::High);
    }

    fn set_low(&mut self) {
        self.push(SinkCommand::Low);
    }

    fn release(&mut self) {
        self.push(SinkCommand::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_sysfs(dir: &TempDir) -> PathBuf {
        // Pre-create the line directory the kernel would make on export.
        std::fs::create_dir_all(dir.path().join(format!("gpio{RELAY_PIN}"))).unwrap();
        dir.path().to_path_buf()
    }

    fn read(dir: &TempDir, rel: &str) -> String {
        std::fs::read_to_string(dir.path().join(rel)).unwrap()
    }

    #[test]
    fn sysfs_open_sets_direction() {
        let dir = TempDir::new().unwrap();
        let root = fake_sysfs(&dir);
        SysfsGpio::open(&root, RELAY_PIN).unwrap();
        assert_eq!(read(&dir, "gpio25/direction"), "out");
    }

    #[test]
    fn sysfs_writes_levels_and_releases() {
        let dir = TempDir::new().unwrap();
        let root = fake_sysfs(&dir);
        let mut gpio = SysfsGpio::open(&root, RELAY_PIN).unwrap();

        gpio.set_high();
        assert_eq!(read(&dir, "gpio25/value"), "1");
        gpio.set_low();
        assert_eq!(read(&dir, "gpio25/value"), "0");

        gpio.set_high();
        gpio.release();
        assert_eq!(read(&dir, "gpio25/value"), "0");
        assert_eq!(read(&dir, "unexport"), "25");
    }

    #[test]
    fn sysfs_open_fails_without_gpio_tree() {
        let dir = TempDir::new().unwrap();
        assert!(SysfsGpio::open(dir.path().join("missing"), RELAY_PIN).is_err());
    }

    #[test]
    fn recording_sink_clones_share_journal() {
        let sink = RecordingSink::new();
        let mut handle = sink.clone();
        handle.set_high();
        handle.set_low();
        assert_eq!(sink.commands(), vec![SinkCommand::High, SinkCommand::Low]);
        assert_eq!(sink.last(), Some(SinkCommand::Low));
    }
}
