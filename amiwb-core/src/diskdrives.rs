//! Disk drive monitor (SPEC_FULL.md SS3 supplement, grounded on
//! `original_source/src/amiwb/diskdrives.c`).
//!
//! Watches `/proc/self/mountinfo` and `/dev` via `inotify` for device
//! plug/unplug, shells out to `udisksctl` for the actual mount/unmount
//! (spec.md SS1 "Out of scope ... disk-drive polling via `udisksctl`"; this
//! module is the interface boundary spec.md gives it in SS6), and emits a
//! [`DriveEvent`] for the dispatcher to turn into desktop `Device` icons.
//! AmiWB never implements its own mount logic -- only drives the external
//! tool and reacts to filesystem changes, matching the C original's
//! `is_virtual_fs`/`should_skip_mount` filtering instead of parsing
//! `udisksctl` output beyond success/failure.

use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::process::Command;

use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify};
use tracing::warn;

/// Filesystem types the original hard-codes as never worth showing (ported
/// verbatim from `diskdrives.c`'s `is_virtual_fs`).
const VIRTUAL_FS: &[&str] = &[
    "proc", "sysfs", "devtmpfs", "tmpfs", "devpts", "cgroup", "cgroup2", "debugfs", "tracefs",
    "fusectl", "configfs", "securityfs", "pstore", "bpf", "autofs", "mqueue", "hugetlbfs",
    "rpc_pipefs", "overlay", "squashfs", "fuse.portal",
];

/// A drive appearing or disappearing on the desktop (SPEC_FULL.md SS3
/// "emitting `DriveEvent::{Added, Removed}(path)`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveEvent {
    Added(PathBuf),
    Removed(PathBuf),
}

/// `true` if `mount_point` should be skipped entirely -- system paths the
/// user never wants an icon for (ported from `should_skip_mount`, SPEC_FULL
/// supplement).
pub fn should_skip_mount(mount_point: &str, home: Option<&str>) -> bool {
    if mount_point == "/" || mount_point == "/home" {
        return false;
    }
    if let Some(home) = home {
        if mount_point == home {
            return false;
        }
    }
    if mount_point.contains("/media/") || mount_point.contains("/run/media/") || mount_point.contains("/mnt/") {
        return false;
    }
    true
}

pub fn is_virtual_fs(fs_type: &str) -> bool {
    VIRTUAL_FS.contains(&fs_type)
}

/// One parsed row of `/proc/self/mountinfo`: mount point and filesystem
/// type, the two fields `should_skip_mount`/`is_virtual_fs` need. The full
/// line format has more fields (mount ID, parent ID, major:minor, root,
/// options, optional fields, a `-` separator) which this monitor never
/// needs to interpret.
#[derive(Debug, Clone)]
struct MountRow {
    mount_point: String,
    fs_type: String,
}

fn parse_mountinfo(text: &str) -> Vec<MountRow> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let Some(sep) = line.find(" - ") else { continue };
        let (_before, after) = line.split_at(sep + 3);
        let mut before_fields = line[..sep].split_whitespace();
        let Some(mount_point) = before_fields.nth(4) else { continue };
        let Some(fs_type) = after.split_whitespace().next() else { continue };
        rows.push(MountRow { mount_point: mount_point.to_string(), fs_type: fs_type.to_string() });
    }
    rows
}

/// Visible (non-virtual, non-skipped) mount points right now, for an
/// initial scan at startup.
pub fn visible_mounts(mountinfo_text: &str, home: Option<&str>) -> Vec<PathBuf> {
    parse_mountinfo(mountinfo_text)
        .into_iter()
        .filter(|row| !is_virtual_fs(&row.fs_type) && !should_skip_mount(&row.mount_point, home))
        .map(|row| PathBuf::from(row.mount_point))
        .collect()
}

/// Diffs two mount-point snapshots into the events the desktop should react
/// to (SPEC_FULL.md SS3 "emitting `DriveEvent::{Added, Removed}(path)`").
pub fn diff_mounts(before: &[PathBuf], after: &[PathBuf]) -> Vec<DriveEvent> {
    let mut events = Vec::new();
    for path in after {
        if !before.contains(path) {
            events.push(DriveEvent::Added(path.clone()));
        }
    }
    for path in before {
        if !after.contains(path) {
            events.push(DriveEvent::Removed(path.clone()));
        }
    }
    events
}

/// Owns the inotify fd and its two watches: `/proc/self/mountinfo` for
/// mount/unmount, `/dev` for device plug/unplug (ported from `diskdrives.c`
/// module-private `inotify_fd`/`mountinfo_watch`/`dev_watch`).
pub struct DriveMonitor {
    inotify: Inotify,
    devices_ejected: Vec<PathBuf>,
}

impl DriveMonitor {
    pub fn new() -> nix::Result<Self> {
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)?;
        inotify.add_watch("/proc/self/mountinfo", AddWatchFlags::IN_MODIFY)?;
        inotify.add_watch("/dev", AddWatchFlags::IN_CREATE | AddWatchFlags::IN_DELETE)?;
        Ok(Self { inotify, devices_ejected: Vec::new() })
    }

    pub fn fd(&self) -> RawFd {
        self.inotify.as_raw_fd()
    }

    /// Drains pending inotify events; `true` if anything fired, meaning the
    /// caller should re-read `/proc/self/mountinfo` and re-diff.
    pub fn poll(&self) -> bool {
        match self.inotify.read_events() {
            Ok(events) => !events.is_empty(),
            Err(nix::errno::Errno::EAGAIN) => false,
            Err(err) => {
                warn!("diskdrives: inotify read failed: {}", err);
                false
            },
        }
    }

    /// Marks a device as user-ejected so it isn't immediately remounted
    /// until physically replugged (ported from `diskdrives.c`'s
    /// `ejected_devices` list).
    pub fn mark_ejected(&mut self, device: PathBuf) {
        if !self.devices_ejected.contains(&device) {
            self.devices_ejected.push(device);
        }
    }

    pub fn is_ejected(&self, device: &Path) -> bool {
        self.devices_ejected.iter().any(|d| d == device)
    }

    pub fn clear_ejected(&mut self, device: &Path) {
        self.devices_ejected.retain(|d| d != device);
    }
}

/// Shells out to `udisksctl mount -b <device>` (spec.md SS1 "disk-drive
/// polling via `udisksctl`"). Returns the mount point `udisksctl` reports on
/// success, parsed from its one-line "Mounted ... at <path>." output.
pub fn mount_device(device: &Path) -> Option<PathBuf> {
    let output = Command::new("udisksctl").args(["mount", "-b"]).arg(device).output().ok()?;
    if !output.status.success() {
        warn!("diskdrives: udisksctl mount {} failed", device.display());
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.split(" at ").nth(1).map(|tail| PathBuf::from(tail.trim().trim_end_matches('.')))
}

pub fn unmount_device(device: &Path) -> bool {
    let status = Command::new("udisksctl").args(["unmount", "-b"]).arg(device).status();
    matches!(status, Ok(s) if s.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_system_paths_but_keeps_media() {
        assert!(!should_skip_mount("/", None));
        assert!(!should_skip_mount("/home", None));
        assert!(!should_skip_mount("/media/user/usb1", None));
        assert!(should_skip_mount("/var/lib/foo", None));
    }

    #[test]
    fn keeps_the_actual_home_mount() {
        assert!(!should_skip_mount("/home/alice", Some("/home/alice")));
    }

    #[test]
    fn recognizes_virtual_filesystems() {
        assert!(is_virtual_fs("tmpfs"));
        assert!(!is_virtual_fs("ext4"));
    }

    #[test]
    fn parses_mountinfo_and_filters_to_visible() {
        let text = "36 35 98:0 / / rw,noatime - ext4 /dev/sda1 rw\n\
                     37 35 0:29 / /proc rw - proc proc rw\n\
                     38 35 8:17 / /media/user/usb1 rw - vfat /dev/sdb1 rw\n";
        let mounts = visible_mounts(text, None);
        assert_eq!(mounts, vec![PathBuf::from("/"), PathBuf::from("/media/user/usb1")]);
    }

    #[test]
    fn diff_reports_added_and_removed() {
        let before = vec![PathBuf::from("/media/a")];
        let after = vec![PathBuf::from("/media/b")];
        let events = diff_mounts(&before, &after);
        assert!(events.contains(&DriveEvent::Added(PathBuf::from("/media/b"))));
        assert!(events.contains(&DriveEvent::Removed(PathBuf::from("/media/a"))));
    }

    #[test]
    fn ejected_devices_are_tracked_until_cleared() {
        let mut monitor_ejected = Vec::new();
        let device = PathBuf::from("/dev/sdb1");
        monitor_ejected.push(device.clone());
        assert!(monitor_ejected.contains(&device));
    }
}
