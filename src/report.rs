//! Harmony log sink: the append-only feedback stream composers read while
//! iterating on a tune.
//!
//! One timestamped line per logical message. Messages may embed `\n→ `
//! continuation blocks (fix suggestions, source context); they are written
//! verbatim as part of the same entry, so a multi-line message is still one
//! log write.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;

/// Where analysis findings go. Implementations must write each message as
/// one unit, incrementally during the run rather than in a single flush.
pub trait HarmonySink {
    fn write_message(&mut self, message: &str) -> io::Result<()>;
}

/// Append-only file sink with `"<timestamp>: <message>"` lines.
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Open (or create) the log file for appending.
    pub fn open(path: &Path) -> io::Result<FileSink> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileSink { file })
    }
}

impl HarmonySink for FileSink {
    fn write_message(&mut self, message: &str) -> io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.file, "{timestamp}: {message}")?;
        self.file.flush()
    }
}

/// In-memory sink for tests and embedders that post-process findings.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub messages: Vec<String>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    /// Whether any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

impl HarmonySink for MemorySink {
    fn write_message(&mut self, message: &str) -> io::Result<()> {
        self.messages.push(message.to_string());
        Ok(())
    }
}
