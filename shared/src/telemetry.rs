//! Append-only mission telemetry.
//!
//! Each event is one line of colon-separated fields, the first being the
//! simulation timestamp. Lines are routed to one of a fixed set of channels.
//! Diagnostics that are not mission telemetry go through `log` instead.

use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Telemetry channel a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogChannel {
    /// Mission parameters and configuration echoes
    Parameters,
    /// Vision samples and the final angular-velocity estimate
    Estimation,
    /// Thrust commands from the guidance law
    Thrust,
    /// Forward-projected landing site during pre-approach
    PreApproach,
}

impl LogChannel {
    pub const ALL: [LogChannel; 4] = [
        LogChannel::Parameters,
        LogChannel::Estimation,
        LogChannel::Thrust,
        LogChannel::PreApproach,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogChannel::Parameters => "parameters",
            LogChannel::Estimation => "estimation",
            LogChannel::Thrust => "thrust",
            LogChannel::PreApproach => "pre_approach",
        }
    }
}

impl fmt::Display for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Format a telemetry line: `timestamp:v0:v1:...`
pub fn telemetry_line(timestamp: f64, values: &[f64]) -> String {
    let mut line = format!("{timestamp:.3}");
    for v in values {
        line.push(':');
        line.push_str(&format!("{v}"));
    }
    line
}

/// Destination for telemetry lines.
///
/// Appending never fails from the caller's point of view; sinks report their
/// own I/O problems through `log`.
pub trait TelemetrySink: Send + Sync {
    fn append(&self, channel: LogChannel, line: &str);
}

/// Writes each channel to `<dir>/<channel>.log`
pub struct FileTelemetrySink {
    dir: PathBuf,
    writers: Mutex<HashMap<LogChannel, BufWriter<File>>>,
}

impl FileTelemetrySink {
    /// Create the output directory and open (append) one file per channel.
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mut writers = HashMap::new();
        for channel in LogChannel::ALL {
            let path = dir.join(format!("{}.log", channel.name()));
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            writers.insert(channel, BufWriter::new(file));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            writers: Mutex::new(writers),
        })
    }

    /// Flush every channel to disk
    pub fn flush(&self) -> std::io::Result<()> {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        for writer in writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl TelemetrySink for FileTelemetrySink {
    fn append(&self, channel: LogChannel, line: &str) {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = writers.get_mut(&channel) {
            if let Err(e) = writeln!(writer, "{line}") {
                log::warn!("Failed to write {channel} telemetry: {e}");
            }
        }
    }
}

impl Drop for FileTelemetrySink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("Failed to flush telemetry in {}: {e}", self.dir.display());
        }
    }
}

/// Keeps telemetry in memory, for tests and headless runs
#[derive(Debug, Default)]
pub struct MemoryTelemetrySink {
    lines: Mutex<Vec<(LogChannel, String)>>,
}

impl MemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines recorded on one channel, in append order
    pub fn lines(&self, channel: LogChannel) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, l)| l.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TelemetrySink for MemoryTelemetrySink {
    fn append(&self, channel: LogChannel, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel, line.to_string()));
    }
}
