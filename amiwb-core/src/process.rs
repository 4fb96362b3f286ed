//! Child-process tracking (spec.md SS4.G, SS9 "Event-driven I/O").
//!
//! File operations that can be slow -- copy, delete, archive extraction,
//! directory-size queries -- run out-of-process and wake the select loop
//! through a pipe rather than blocking it (spec.md SS9 "communicating via
//! pipes and status files"). This module owns the tracking table and the
//! spawn/reap mechanics; the dispatcher in [`crate::events`] is the only
//! caller and owns what happens with a finished operation's result.

use std::collections::HashMap;
use std::io::Read;
use std::os::fd::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::warn;

/// What kind of background operation a tracked child performs (spec.md
/// SS4.G "Child processes (copy, delete, archive-extract, directory-size)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildOpKind {
    Copy { src: PathBuf, dest: PathBuf },
    Delete { target: PathBuf },
    ArchiveExtract { archive: PathBuf, dest: PathBuf },
    DirectorySize { target: PathBuf },
    /// A fire-and-forget program launch (Suspend, Restart, a custom-menu
    /// command, a file's default handler) that the dispatcher doesn't need
    /// to wait on, but still wants reaped through this table's pipe-EOF
    /// mechanism rather than left as a zombie (spec.md SS4.F "launch
    /// configured tools").
    Launch { program: String },
}

/// A single tracked child process: its kind, and the read end of the pipe
/// the main loop selects on to learn it's done (spec.md SS4.G "on completion
/// they unblock the UI by closing a pipe the loop is selecting on").
pub struct ChildOp {
    pub kind: ChildOpKind,
    pub pid: Pid,
    wake_read: std::fs::File,
    stderr: Option<std::process::ChildStderr>,
}

impl ChildOp {
    /// The fd the event loop should add to its poll set; readable (or at
    /// EOF, once the write end closes on exit) means the child is done.
    pub fn wake_fd(&self) -> RawFd {
        self.wake_read.as_raw_fd()
    }
}

/// The live table of in-flight child operations, keyed by pid (spec.md
/// SS4.G "tracked in a small table").
#[derive(Default)]
pub struct ProcessTable {
    children: HashMap<i32, ChildOp>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `program` with `args`, running `kind` in the background, and
    /// tracks it keyed by pid. `nix::unistd::pipe` opens both ends without
    /// `CLOEXEC`, so the write end survives into the child across `exec`
    /// without any extra wiring; once the parent drops its own copy, the
    /// child's exit (and the kernel closing its fd table) is what produces
    /// EOF on the read end the loop is polling (spec.md SS4.G).
    pub fn spawn(&mut self, kind: ChildOpKind, program: &str, args: &[&str]) -> std::io::Result<i32> {
        let (read_fd, write_fd) = nix::unistd::pipe()?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        let pid = Pid::from_raw(child.id() as i32);
        let stderr = child.stderr.take();
        drop(child); // reaped explicitly via waitpid in `reap`; stderr handle kept above

        drop(write_fd); // only the child's copy should remain open

        let op = ChildOp { kind, pid, wake_read: std::fs::File::from(read_fd), stderr };
        let raw_pid = pid.as_raw();
        self.children.insert(raw_pid, op);
        Ok(raw_pid)
    }

    /// Sends `SIGTERM` to the child for `pid`, the dispatcher's only
    /// cancellation mechanism (spec.md SS4.G "no cancellation beyond sending
    /// SIGTERM to the child").
    pub fn terminate(&self, pid: i32) -> bool {
        match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => true,
            Err(err) => {
                warn!("process: SIGTERM to pid {} failed: {}", pid, err);
                false
            },
        }
    }

    /// Reaps a completed child (non-blocking `waitpid`), returning its
    /// [`ChildOpKind`], exit status if it had actually exited, and its
    /// stderr tail (spec.md SS7 "Show the error dialog with the child's
    /// stderr tail"), removing it from the table either way.
    pub fn reap(&mut self, pid: i32) -> Option<(ChildOpKind, Option<i32>, String)> {
        let op = self.children.remove(&pid)?;
        let tail = op.stderr.map(|s| stderr_tail(s, 4096)).unwrap_or_default();
        match waitpid(op.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => Some((op.kind, Some(code), tail)),
            Ok(WaitStatus::Signaled(..)) => Some((op.kind, None, tail)),
            _ => Some((op.kind, None, tail)),
        }
    }

    pub fn wake_fd(&self, pid: i32) -> Option<RawFd> {
        self.children.get(&pid).map(|op| op.wake_fd())
    }

    pub fn all_wake_fds(&self) -> impl Iterator<Item = (i32, RawFd)> + '_ {
        self.children.iter().map(|(pid, op)| (*pid, op.wake_fd()))
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Reads a spawned-and-finished child's stderr tail for the error dialog
/// (spec.md SS7 "Show the error dialog with the child's stderr tail").
/// Best-effort: returns an empty string on any read failure.
pub fn stderr_tail(mut stderr: impl Read, max_bytes: usize) -> String {
    let mut buf = Vec::new();
    if stderr.read_to_end(&mut buf).is_ok() {
        let start = buf.len().saturating_sub(max_bytes);
        String::from_utf8_lossy(&buf[start..]).into_owned()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_tail_truncates_to_last_bytes() {
        let data = b"0123456789abcdef";
        let tail = stderr_tail(&data[..], 4);
        assert_eq!(tail, "cdef");
    }

    #[test]
    fn empty_table_reports_empty() {
        let table = ProcessTable::new();
        assert!(table.is_empty());
        assert!(table.wake_fd(123).is_none());
    }
}
