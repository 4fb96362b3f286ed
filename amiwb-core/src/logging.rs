//! Log redirection and rotation (spec.md SS6 "Logging").
//!
//! Builds on `tracing_subscriber::fmt()` exactly as `wmctl/src/logger.rs`
//! does, but swaps the default stdout writer for a truncate-on-startup file
//! wrapped in [`CappingWriter`], which implements the `LOG_CAP_ENABLED`
//! behavior from `original_source/src/amiwb/config.h` that spec.md's
//! peripheral-utilities non-goal names only at the content boundary -- the
//! rotation policy itself is ambient plumbing every subsystem relies on.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::Level;

use crate::config;

/// A `Write` implementation that truncates the backing file back to empty
/// once it grows past `cap_bytes` (spec.md SS6 "optionally capped at 5
/// MiB").
struct CappingWriter {
    file: File,
    path: PathBuf,
    written: u64,
    cap_bytes: Option<u64>,
}

impl Write for CappingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.written += n as u64;
        if let Some(cap) = self.cap_bytes {
            if self.written > cap {
                self.file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
                self.written = 0;
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Shared handle so `tracing_subscriber`'s `MakeWriter` closure can hand out
/// a fresh `&mut` each call while all calls still write to the same file.
struct SharedCappingWriter(&'static Mutex<CappingWriter>);

impl Write for SharedCappingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

/// Initializes global `tracing` logging: truncates
/// `$HOME/.config/amiwb/amiwb.log` at startup, redirects all subsequent
/// output there, and caps it per [`config::Config::log_cap_bytes`]. `level`
/// overrides the `LOG_LEVEL` env var / `INFO` default, mirroring
/// `wmctl::init_logging`'s priority order.
pub fn init(level: Option<Level>, cap_bytes: Option<u64>) {
    let loglevel = match level {
        Some(l) => l,
        None => match std::env::var("LOG_LEVEL") {
            Ok(val) => val.parse().unwrap_or(Level::INFO),
            Err(_) => Level::INFO,
        },
    };

    let path = config::log_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let writer = OpenOptions::new().create(true).write(true).truncate(true).open(&path).map(|file| {
        let capping = CappingWriter { file, path: path.clone(), written: 0, cap_bytes };
        let boxed: &'static Mutex<CappingWriter> = Box::leak(Box::new(Mutex::new(capping)));
        boxed
    });

    match writer {
        Ok(boxed) => {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(loglevel)
                .with_writer(move || SharedCappingWriter(boxed))
                .init();
        },
        Err(_) => {
            // Can't open the log file (e.g. no $HOME): fall back to stderr
            // rather than losing all diagnostics.
            tracing_subscriber::fmt().with_target(false).with_max_level(loglevel).init();
        },
    }
}
